use std::collections::{BTreeMap, HashMap};

use crate::models::{
    CourseId, Discussion, DiscussionId, Forum, ForumId, Post, User, UserId, ALL_FORUMS,
};

pub trait ForumStore {
    fn posts(&self, discussion_id: DiscussionId) -> Vec<Post>;

    /// Discussion ids of one forum, or of every forum in the course when
    /// `forum_id` is [`ALL_FORUMS`].
    fn discussions(&self, forum_id: ForumId, course_id: CourseId) -> Vec<DiscussionId>;

    fn nationality(&self, user_id: UserId) -> Option<String>;

    fn forum_name(&self, forum_id: ForumId) -> Option<String>;
}

#[derive(Debug, Clone, Default)]
pub struct ForumSnapshot {
    forums: BTreeMap<ForumId, Forum>,
    discussions: BTreeMap<DiscussionId, Discussion>,
    posts: HashMap<DiscussionId, BTreeMap<i64, Post>>,
    users: HashMap<UserId, User>,
}

impl ForumSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_forum(&mut self, forum: Forum) {
        self.forums.insert(forum.id, forum);
    }

    pub fn add_discussion(&mut self, discussion: Discussion) {
        self.discussions.insert(discussion.id, discussion);
    }

    pub fn add_post(&mut self, post: Post) {
        self.posts
            .entry(post.discussion_id)
            .or_default()
            .insert(post.id, post);
    }

    pub fn add_user(&mut self, user: User) {
        self.users.insert(user.id, user);
    }

    pub fn forums(&self) -> impl Iterator<Item = &Forum> {
        self.forums.values()
    }

    pub fn all_discussions(&self) -> impl Iterator<Item = &Discussion> {
        self.discussions.values()
    }

    pub fn all_posts(&self) -> impl Iterator<Item = &Post> {
        self.posts.values().flat_map(BTreeMap::values)
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn post_count(&self) -> usize {
        self.posts.values().map(BTreeMap::len).sum()
    }
}

impl ForumStore for ForumSnapshot {
    fn posts(&self, discussion_id: DiscussionId) -> Vec<Post> {
        self.posts
            .get(&discussion_id)
            .map(|posts| posts.values().cloned().collect())
            .unwrap_or_default()
    }

    fn discussions(&self, forum_id: ForumId, course_id: CourseId) -> Vec<DiscussionId> {
        self.discussions
            .values()
            .filter(|discussion| {
                if forum_id == ALL_FORUMS {
                    self.forums
                        .get(&discussion.forum_id)
                        .is_some_and(|forum| forum.course_id == course_id)
                } else {
                    discussion.forum_id == forum_id
                }
            })
            .map(|discussion| discussion.id)
            .collect()
    }

    fn nationality(&self, user_id: UserId) -> Option<String> {
        self.users
            .get(&user_id)
            .and_then(|user| user.nationality.clone())
            .filter(|nationality| !nationality.trim().is_empty())
    }

    fn forum_name(&self, forum_id: ForumId) -> Option<String> {
        self.forums.get(&forum_id).map(|forum| forum.name.clone())
    }
}
