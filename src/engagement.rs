use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::levels::EngagementResult;
use crate::models::UserId;
use crate::tree::DiscussionTree;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngagementMethod {
    PersonToPerson,
    ThreadTotalCount,
    ThreadEngagement,
}

impl EngagementMethod {
    pub const fn id(self) -> i64 {
        match self {
            Self::PersonToPerson => 1,
            Self::ThreadTotalCount => 2,
            Self::ThreadEngagement => 3,
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        Self::all().into_iter().find(|method| method.id() == id)
    }

    pub const fn all() -> [Self; 3] {
        [
            Self::PersonToPerson,
            Self::ThreadTotalCount,
            Self::ThreadEngagement,
        ]
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::PersonToPerson => "Maximum Engagement Level (Person-to-Person)",
            Self::ThreadTotalCount => "Maximum Engagement Level (Thread Total Count)",
            Self::ThreadEngagement => "Maximum Engagement Level (Thread)",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::PersonToPerson => {
                "The engagement level increases each time a user replies to the same user in the same thread."
            }
            Self::ThreadTotalCount => {
                "The engagement level increases each time a user participates in the same thread."
            }
            Self::ThreadEngagement => {
                "The engagement level increases each time a user participates in a reply where they already participated in the parent posts."
            }
        }
    }

    pub fn calculate(self, tree: &DiscussionTree, rule: &ReplyRule<'_>) -> EngagementResult {
        match self {
            Self::PersonToPerson => person_to_person(tree, rule),
            Self::ThreadTotalCount => thread_total_count(tree, rule),
            Self::ThreadEngagement => thread_engagement(tree, rule),
        }
    }
}

pub struct ReplyRule<'a> {
    user_id: UserId,
    partner_filter: Option<&'a dyn Fn(UserId) -> bool>,
}

impl<'a> ReplyRule<'a> {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            partner_filter: None,
        }
    }

    pub fn with_partner_filter(mut self, filter: &'a dyn Fn(UserId) -> bool) -> Self {
        self.partner_filter = Some(filter);
        self
    }

    pub fn qualifies(&self, reply_author: UserId, parent_author: UserId) -> bool {
        reply_author == self.user_id
            && reply_author != parent_author
            && self.partner_filter.map_or(true, |accept| accept(parent_author))
    }
}

fn push_children(stack: &mut Vec<(usize, usize)>, tree: &DiscussionTree, parent: usize) {
    stack.extend(tree.children(parent).iter().rev().map(|&child| (child, parent)));
}

fn person_to_person(tree: &DiscussionTree, rule: &ReplyRule<'_>) -> EngagementResult {
    let mut result = EngagementResult::new();
    let mut replies_to: HashMap<UserId, u32> = HashMap::new();
    let mut stack = Vec::new();
    push_children(&mut stack, tree, tree.root());

    while let Some((idx, parent)) = stack.pop() {
        let partner = tree.author(parent);
        if rule.qualifies(tree.author(idx), partner) {
            let count = replies_to.entry(partner).or_insert(0);
            *count += 1;
            if tree.node(idx).in_window {
                result.increase(*count);
            }
        }
        push_children(&mut stack, tree, idx);
    }

    result
}

fn thread_total_count(tree: &DiscussionTree, rule: &ReplyRule<'_>) -> EngagementResult {
    let mut result = EngagementResult::new();
    let root = tree.root();

    for &thread in tree.children(root) {
        let mut count = 0u32;
        if rule.qualifies(tree.author(thread), tree.author(root)) {
            count += 1;
            if tree.node(thread).in_window {
                result.increase(1);
            }
        }

        let mut stack = Vec::new();
        push_children(&mut stack, tree, thread);
        while let Some((idx, parent)) = stack.pop() {
            if tree.node(idx).in_window && rule.qualifies(tree.author(idx), tree.author(parent)) {
                count += 1;
                result.increase(count);
            }
            push_children(&mut stack, tree, idx);
        }
    }

    result
}

fn thread_engagement(tree: &DiscussionTree, rule: &ReplyRule<'_>) -> EngagementResult {
    let mut result = EngagementResult::new();
    let root = tree.root();
    let mut stack: Vec<(usize, usize, u32)> = tree
        .children(root)
        .iter()
        .rev()
        .map(|&child| (child, root, 1))
        .collect();

    while let Some((idx, parent, level)) = stack.pop() {
        let next_level = if rule.qualifies(tree.author(idx), tree.author(parent)) {
            if tree.node(idx).in_window {
                result.increase(level);
            }
            level + 1
        } else {
            level
        };
        stack.extend(
            tree.children(idx)
                .iter()
                .rev()
                .map(|&child| (child, idx, next_level)),
        );
    }

    result
}
