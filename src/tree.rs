use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{Post, PostId, UserId};

/// Inclusive `[from, to]` bound on post creation time. A missing bound leaves
/// that side open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub from: Option<i64>,
    pub to: Option<i64>,
}

impl TimeWindow {
    pub fn new(from: Option<i64>, to: Option<i64>) -> Self {
        Self { from, to }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        self.from.map_or(true, |from| timestamp >= from)
            && self.to.map_or(true, |to| timestamp <= to)
    }
}

#[derive(Debug, Clone)]
pub struct TreeNode {
    pub post: Post,
    pub in_window: bool,
    pub children: Vec<usize>,
}

/// One discussion's posts arranged under its first post.
///
/// Nodes live in an arena; `children` hold arena indices in post id order.
/// Posts whose parent is missing from the discussion stay in the arena but are
/// never reachable from the root.
#[derive(Debug, Clone)]
pub struct DiscussionTree {
    nodes: Vec<TreeNode>,
    root: usize,
}

impl DiscussionTree {
    /// Returns `None` when the discussion has no posts or no parentless post.
    pub fn build(posts: Vec<Post>, window: &TimeWindow) -> Option<Self> {
        let mut posts = posts;
        posts.sort_by_key(|post| post.id);
        posts.dedup_by_key(|post| post.id);

        let Some(root_post) = posts.iter().find(|post| post.is_root()) else {
            debug!(posts = posts.len(), "discussion has no root post");
            return None;
        };
        let root_id = root_post.id;

        let index: HashMap<PostId, usize> = posts
            .iter()
            .enumerate()
            .map(|(idx, post)| (post.id, idx))
            .collect();

        let mut nodes: Vec<TreeNode> = posts
            .into_iter()
            .map(|post| TreeNode {
                in_window: window.contains(post.created_at),
                post,
                children: Vec::new(),
            })
            .collect();

        let mut orphans = 0usize;
        for idx in 0..nodes.len() {
            let post = &nodes[idx].post;
            if post.is_root() || post.parent_id == post.id {
                continue;
            }
            let parent_id = post.parent_id;
            match index.get(&parent_id) {
                Some(&parent) => nodes[parent].children.push(idx),
                None => orphans += 1,
            }
        }
        if orphans > 0 {
            debug!(orphans, "posts reference a parent outside their discussion");
        }

        let root = index.get(&root_id).copied()?;
        Some(Self { nodes, root })
    }

    pub fn root(&self) -> usize {
        self.root
    }

    pub fn node(&self, idx: usize) -> &TreeNode {
        &self.nodes[idx]
    }

    pub fn children(&self, idx: usize) -> &[usize] {
        &self.nodes[idx].children
    }

    pub fn author(&self, idx: usize) -> UserId {
        self.nodes[idx].post.author_id
    }

    pub fn reachable(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(idx) = stack.pop() {
            order.push(idx);
            stack.extend(self.children(idx).iter().rev());
        }
        order
    }

    pub fn participants(&self) -> Vec<UserId> {
        let mut seen = HashSet::new();
        let mut participants = Vec::new();
        for idx in self.reachable() {
            let author = self.author(idx);
            if seen.insert(author) {
                participants.push(author);
            }
        }
        participants
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: i64, parent_id: i64, author_id: i64, created_at: i64) -> Post {
        Post {
            id,
            discussion_id: 1,
            parent_id,
            author_id,
            created_at,
        }
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let window = TimeWindow::new(Some(10), Some(20));
        assert!(window.contains(10));
        assert!(window.contains(20));
        assert!(!window.contains(9));
        assert!(!window.contains(21));
        assert!(TimeWindow::unbounded().contains(i64::MIN));
        assert!(TimeWindow::new(None, Some(5)).contains(-100));
        assert!(!TimeWindow::new(Some(5), None).contains(4));
    }

    #[test]
    fn builds_children_under_parents() {
        let posts = vec![post(3, 1, 7, 0), post(1, 0, 5, 0), post(2, 1, 6, 0), post(4, 2, 5, 0)];
        let tree = DiscussionTree::build(posts, &TimeWindow::unbounded()).expect("tree");
        let root = tree.root();
        assert_eq!(tree.node(root).post.id, 1);
        let child_ids: Vec<i64> = tree
            .children(root)
            .iter()
            .map(|&idx| tree.node(idx).post.id)
            .collect();
        assert_eq!(child_ids, vec![2, 3]);
        assert_eq!(tree.reachable().len(), 4);
        assert_eq!(tree.participants(), vec![5, 6, 7]);
    }

    #[test]
    fn orphans_are_unreachable() {
        let posts = vec![post(1, 0, 5, 0), post(2, 1, 6, 0), post(3, 99, 7, 0), post(4, 3, 8, 0)];
        let tree = DiscussionTree::build(posts, &TimeWindow::unbounded()).expect("tree");
        assert_eq!(tree.reachable().len(), 2);
        assert_eq!(tree.participants(), vec![5, 6]);
    }

    #[test]
    fn empty_or_rootless_discussion_has_no_tree() {
        assert!(DiscussionTree::build(Vec::new(), &TimeWindow::unbounded()).is_none());
        let rootless = vec![post(2, 1, 6, 0)];
        assert!(DiscussionTree::build(rootless, &TimeWindow::unbounded()).is_none());
    }

    #[test]
    fn out_of_window_posts_stay_in_tree() {
        let posts = vec![post(1, 0, 5, 100), post(2, 1, 6, 50), post(3, 2, 7, 150)];
        let tree = DiscussionTree::build(posts, &TimeWindow::new(Some(100), None)).expect("tree");
        let flags: Vec<bool> = tree
            .reachable()
            .into_iter()
            .map(|idx| tree.node(idx).in_window)
            .collect();
        assert_eq!(flags, vec![true, false, true]);
    }

    #[test]
    fn lowest_parentless_post_is_root() {
        let posts = vec![post(8, 0, 2, 0), post(3, 0, 1, 0), post(9, 8, 4, 0)];
        let tree = DiscussionTree::build(posts, &TimeWindow::unbounded()).expect("tree");
        assert_eq!(tree.node(tree.root()).post.id, 3);
        assert_eq!(tree.reachable().len(), 1);
    }
}
