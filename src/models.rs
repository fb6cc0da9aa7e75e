use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type PostId = i64;
pub type DiscussionId = i64;
pub type ForumId = i64;
pub type CourseId = i64;

/// Forum id meaning "every forum in the course".
pub const ALL_FORUMS: ForumId = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub discussion_id: DiscussionId,
    pub parent_id: PostId,
    pub author_id: UserId,
    pub created_at: i64,
}

impl Post {
    pub fn is_root(&self) -> bool {
        self.parent_id <= 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discussion {
    pub id: DiscussionId,
    pub forum_id: ForumId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Forum {
    pub id: ForumId,
    pub course_id: CourseId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub nationality: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ParticipantEngagement {
    pub user_id: UserId,
    pub l1: u32,
    pub l2: u32,
    pub l3: u32,
    pub l4_up: u32,
    pub max: Option<u32>,
    pub average: Option<f64>,
}
