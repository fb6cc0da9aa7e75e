use std::collections::HashSet;
use std::fmt::Write;

use crate::engagement::EngagementMethod;
use crate::metrics::MetricResolver;
use crate::models::{CourseId, ForumId, ParticipantEngagement, UserId};
use crate::store::ForumStore;
use crate::tree::{DiscussionTree, TimeWindow};

pub fn engagement_report<S: ForumStore + ?Sized>(
    store: &S,
    course_id: CourseId,
    forum_id: ForumId,
    method: EngagementMethod,
    window: TimeWindow,
) -> Vec<ParticipantEngagement> {
    let mut seen: HashSet<UserId> = HashSet::new();
    let mut participants: Vec<UserId> = Vec::new();
    for discussion in store.discussions(forum_id, course_id) {
        if let Some(tree) = DiscussionTree::build(store.posts(discussion), &window) {
            for user in tree.participants() {
                if seen.insert(user) {
                    participants.push(user);
                }
            }
        }
    }

    let resolver = MetricResolver::new(store, course_id, forum_id, window);
    let mut rows: Vec<ParticipantEngagement> = participants
        .into_iter()
        .map(|user_id| {
            let result = resolver.engagement(method, false, user_id);
            ParticipantEngagement {
                user_id,
                l1: result.l1(),
                l2: result.l2(),
                l3: result.l3(),
                l4_up: result.l4_up(),
                max: result.max(),
                average: result.average(),
            }
        })
        .collect();

    rows.sort_by(|a, b| b.max.cmp(&a.max).then(a.user_id.cmp(&b.user_id)));
    rows
}

pub fn build_report(
    scope: &str,
    method: EngagementMethod,
    window: TimeWindow,
    rows: &[ParticipantEngagement],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Forum Engagement Report");
    let _ = writeln!(output, "Generated for {scope}");
    let _ = writeln!(output);
    let _ = writeln!(output, "## Method");
    let _ = writeln!(output, "{}: {}", method.name(), method.description());

    match (window.from, window.to) {
        (None, None) => {}
        (from, to) => {
            let bound = |ts: Option<i64>| ts.map_or_else(|| "open".to_string(), |ts| ts.to_string());
            let _ = writeln!(output, "Window: {} to {} (unix seconds)", bound(from), bound(to));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Participants");

    if rows.is_empty() {
        let _ = writeln!(output, "No participants in this scope.");
    } else {
        for row in rows {
            let max = row.max.map_or_else(|| "-".to_string(), |max| max.to_string());
            let average = row
                .average
                .map_or_else(|| "-".to_string(), |average| format!("{average:.2}"));
            let _ = writeln!(
                output,
                "- user {}: L1 {} / L2 {} / L3 {} / L4+ {} (max {}, avg {})",
                row.user_id, row.l1, row.l2, row.l3, row.l4_up, max, average
            );
        }
    }

    output
}
