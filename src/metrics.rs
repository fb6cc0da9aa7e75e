use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::debug;

use crate::engagement::{EngagementMethod, ReplyRule};
use crate::levels::EngagementResult;
use crate::models::{CourseId, ForumId, UserId};
use crate::store::ForumStore;
use crate::tree::{DiscussionTree, TimeWindow};

const SECONDS_PER_DAY: i64 = 86_400;
const MAX_ENGAGEMENT_PREFIX: &str = "maxengagement_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    NumReplies,
    NumNationalities,
    UniqueDaysActive,
    MaxEngagement {
        method: EngagementMethod,
        international: bool,
    },
}

impl Metric {
    pub fn parse(name: &str, international: bool) -> Option<Self> {
        match name {
            "numreplies" => Some(Self::NumReplies),
            "numnationalities" => Some(Self::NumNationalities),
            "uniquedaysactive" => Some(Self::UniqueDaysActive),
            other => {
                let id = other.strip_prefix(MAX_ENGAGEMENT_PREFIX)?.parse().ok()?;
                let method = EngagementMethod::from_id(id)?;
                Some(Self::MaxEngagement {
                    method,
                    international,
                })
            }
        }
    }

    pub fn key(&self) -> String {
        match self {
            Self::NumReplies => "numreplies".to_string(),
            Self::NumNationalities => "numnationalities".to_string(),
            Self::UniqueDaysActive => "uniquedaysactive".to_string(),
            Self::MaxEngagement { method, .. } => format!("{MAX_ENGAGEMENT_PREFIX}{}", method.id()),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::NumReplies => "Number of replies".to_string(),
            Self::NumNationalities => "Number of nationalities engaged".to_string(),
            Self::UniqueDaysActive => "Unique days active".to_string(),
            Self::MaxEngagement {
                method,
                international: true,
            } => format!("International {}", method.name()),
            Self::MaxEngagement { method, .. } => method.name().to_string(),
        }
    }
}

pub fn metric_options() -> Vec<(String, String)> {
    let mut options: Vec<Metric> = vec![
        Metric::NumReplies,
        Metric::NumNationalities,
        Metric::UniqueDaysActive,
    ];
    options.extend(EngagementMethod::all().into_iter().map(|method| Metric::MaxEngagement {
        method,
        international: false,
    }));
    options
        .into_iter()
        .map(|metric| (metric.key(), metric.label()))
        .collect()
}

pub struct MetricResolver<'a, S: ForumStore + ?Sized> {
    store: &'a S,
    course_id: CourseId,
    forum_id: ForumId,
    window: TimeWindow,
}

impl<'a, S: ForumStore + ?Sized> MetricResolver<'a, S> {
    pub fn new(store: &'a S, course_id: CourseId, forum_id: ForumId, window: TimeWindow) -> Self {
        Self {
            store,
            course_id,
            forum_id,
            window,
        }
    }

    pub fn resolve_name(&self, name: &str, international: bool, user_id: UserId) -> Option<i64> {
        let Some(metric) = Metric::parse(name, international) else {
            debug!(metric = name, "unknown metric");
            return None;
        };
        Some(self.resolve(&metric, user_id))
    }

    pub fn resolve(&self, metric: &Metric, user_id: UserId) -> i64 {
        let value = match metric {
            Metric::NumReplies => self.num_replies(user_id),
            Metric::NumNationalities => self.num_nationalities(user_id),
            Metric::UniqueDaysActive => self.unique_days_active(user_id),
            Metric::MaxEngagement {
                method,
                international,
            } => self.max_engagement(*method, *international, user_id),
        };
        debug!(
            metric = %metric.key(),
            user_id,
            course_id = self.course_id,
            forum_id = self.forum_id,
            value,
            "resolved metric"
        );
        value
    }

    pub fn num_replies(&self, user_id: UserId) -> i64 {
        let mut count = 0i64;
        for discussion in self.store.discussions(self.forum_id, self.course_id) {
            count += self
                .store
                .posts(discussion)
                .iter()
                .filter(|post| {
                    post.author_id == user_id
                        && !post.is_root()
                        && self.window.contains(post.created_at)
                })
                .count() as i64;
        }
        count
    }

    pub fn num_nationalities(&self, user_id: UserId) -> i64 {
        let own = self.store.nationality(user_id);
        let mut cache: HashMap<UserId, Option<String>> = HashMap::new();
        let mut seen: BTreeSet<String> = BTreeSet::new();

        for discussion in self.store.discussions(self.forum_id, self.course_id) {
            let posts = self.store.posts(discussion);
            if !posts.iter().any(|post| post.author_id == user_id) {
                continue;
            }
            for post in &posts {
                if post.author_id == user_id || !self.window.contains(post.created_at) {
                    continue;
                }
                let nationality = cache
                    .entry(post.author_id)
                    .or_insert_with(|| self.store.nationality(post.author_id));
                if let Some(nationality) = nationality.as_ref() {
                    if own.as_ref() != Some(nationality) {
                        seen.insert(nationality.clone());
                    }
                }
            }
        }

        seen.len() as i64
    }

    pub fn unique_days_active(&self, user_id: UserId) -> i64 {
        let mut days: HashSet<i64> = HashSet::new();
        for discussion in self.store.discussions(self.forum_id, self.course_id) {
            days.extend(
                self.store
                    .posts(discussion)
                    .iter()
                    .filter(|post| post.author_id == user_id && self.window.contains(post.created_at))
                    .map(|post| post.created_at.div_euclid(SECONDS_PER_DAY)),
            );
        }
        days.len() as i64
    }

    /// Engagement merged over every discussion in scope. The window only
    /// decides which replies score, every post still shapes the tree.
    pub fn engagement(
        &self,
        method: EngagementMethod,
        international: bool,
        user_id: UserId,
    ) -> EngagementResult {
        let own = if international {
            self.store.nationality(user_id)
        } else {
            None
        };
        let mut merged = EngagementResult::new();

        for discussion in self.store.discussions(self.forum_id, self.course_id) {
            let Some(tree) = DiscussionTree::build(self.store.posts(discussion), &self.window) else {
                continue;
            };
            let result = if international {
                let foreign: HashSet<UserId> = tree
                    .participants()
                    .into_iter()
                    .filter(|&partner| {
                        self.store
                            .nationality(partner)
                            .is_some_and(|nationality| own.as_ref() != Some(&nationality))
                    })
                    .collect();
                let accept = |partner: UserId| foreign.contains(&partner);
                let rule = ReplyRule::new(user_id).with_partner_filter(&accept);
                method.calculate(&tree, &rule)
            } else {
                method.calculate(&tree, &ReplyRule::new(user_id))
            };
            merged.merge(&result);
        }

        merged
    }

    pub fn max_engagement(&self, method: EngagementMethod, international: bool, user_id: UserId) -> i64 {
        self.engagement(method, international, user_id)
            .max()
            .map_or(0, i64::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, COURSE, FORUM_1, FORUM_2, POST_USER, REPLY_USER_1, REPLY_USER_2};
    use crate::models::{Discussion, Forum, Post, User, ALL_FORUMS};
    use crate::store::ForumSnapshot;

    const USERS: [UserId; 3] = [POST_USER, REPLY_USER_1, REPLY_USER_2];

    fn assert_metric(metric: Metric, expected: [[i64; 3]; 3]) {
        let store = fixtures::reference_forum();
        for (user, row) in USERS.iter().zip(expected) {
            for (forum, want) in [FORUM_1, FORUM_2, ALL_FORUMS].into_iter().zip(row) {
                let resolver = MetricResolver::new(&store, COURSE, forum, TimeWindow::unbounded());
                assert_eq!(
                    resolver.resolve(&metric, *user),
                    want,
                    "{} for user {user} in forum {forum}",
                    metric.key()
                );
            }
        }
    }

    fn engagement_metric(method: EngagementMethod) -> Metric {
        Metric::MaxEngagement {
            method,
            international: false,
        }
    }

    #[test]
    fn parses_metric_keys() {
        assert_eq!(Metric::parse("numreplies", false), Some(Metric::NumReplies));
        assert_eq!(
            Metric::parse("maxengagement_3", true),
            Some(Metric::MaxEngagement {
                method: EngagementMethod::ThreadEngagement,
                international: true,
            })
        );
        assert_eq!(Metric::parse("maxengagement_9", false), None);
        assert_eq!(Metric::parse("maxengagement", false), None);
        assert_eq!(Metric::parse("karma", false), None);
    }

    #[test]
    fn option_list_covers_every_method() {
        let keys: Vec<String> = metric_options().into_iter().map(|(key, _)| key).collect();
        assert_eq!(
            keys,
            vec![
                "numreplies",
                "numnationalities",
                "uniquedaysactive",
                "maxengagement_1",
                "maxengagement_2",
                "maxengagement_3",
            ]
        );
    }

    #[test]
    fn unknown_metric_has_no_signal() {
        let store = fixtures::reference_forum();
        let resolver = MetricResolver::new(&store, COURSE, ALL_FORUMS, TimeWindow::unbounded());
        assert_eq!(resolver.resolve_name("karma", false, REPLY_USER_1), None);
        assert_eq!(resolver.resolve_name("numreplies", false, REPLY_USER_1), Some(3));
    }

    #[test]
    fn num_replies() {
        assert_metric(Metric::NumReplies, [[0, 0, 0], [1, 2, 3], [2, 0, 2]]);
    }

    #[test]
    fn num_nationalities() {
        assert_metric(Metric::NumNationalities, [[2, 1, 2], [2, 1, 2], [2, 0, 2]]);
    }

    #[test]
    fn unique_days_active() {
        assert_metric(Metric::UniqueDaysActive, [[1, 1, 2], [1, 1, 1], [2, 0, 2]]);
    }

    #[test]
    fn max_engagement_person_to_person() {
        assert_metric(
            engagement_metric(EngagementMethod::PersonToPerson),
            [[0, 0, 0], [1, 2, 2], [1, 0, 1]],
        );
    }

    #[test]
    fn max_engagement_thread_total_count() {
        assert_metric(
            engagement_metric(EngagementMethod::ThreadTotalCount),
            [[0, 0, 0], [1, 1, 1], [1, 0, 1]],
        );
    }

    #[test]
    fn max_engagement_thread_engagement() {
        assert_metric(
            engagement_metric(EngagementMethod::ThreadEngagement),
            [[0, 0, 0], [1, 1, 1], [1, 0, 1]],
        );
    }

    #[test]
    fn same_day_posts_count_once() {
        let store = fixtures::reference_forum();
        let resolver = MetricResolver::new(&store, COURSE, FORUM_2, TimeWindow::unbounded());
        assert_eq!(resolver.num_replies(REPLY_USER_1), 2);
        assert_eq!(resolver.unique_days_active(REPLY_USER_1), 1);
    }

    #[test]
    fn own_nationality_is_never_counted() {
        let mut store = fixtures::reference_forum();
        store.add_user(User {
            id: REPLY_USER_2,
            nationality: Some("TH".to_string()),
        });
        let resolver = MetricResolver::new(&store, COURSE, FORUM_1, TimeWindow::unbounded());
        // Discussion 12 partners only postuser (TH), discussion 11 adds replyuser1 (JP).
        assert_eq!(resolver.num_nationalities(REPLY_USER_2), 1);
        assert_eq!(resolver.num_nationalities(POST_USER), 1);
    }

    #[test]
    fn nationalities_skip_unknown_users_and_window_only_partners() {
        let mut store = ForumSnapshot::new();
        store.add_forum(Forum {
            id: 1,
            course_id: 1,
            name: "Forum".to_string(),
        });
        store.add_discussion(Discussion { id: 1, forum_id: 1 });
        for (id, nationality) in [(1, Some("TH")), (2, Some("JP")), (3, None), (4, Some("  ")), (5, Some("ES"))] {
            store.add_user(User {
                id,
                nationality: nationality.map(str::to_string),
            });
        }
        // User 1 only posts before the window opens; 5 also posts too early.
        for (id, parent_id, author_id, created_at) in [
            (1, 0, 1, 10),
            (2, 1, 5, 20),
            (3, 1, 2, 200),
            (4, 1, 3, 210),
            (5, 1, 4, 220),
        ] {
            store.add_post(Post {
                id,
                discussion_id: 1,
                parent_id,
                author_id,
                created_at,
            });
        }

        let windowed = MetricResolver::new(&store, 1, ALL_FORUMS, TimeWindow::new(Some(100), None));
        assert_eq!(windowed.num_nationalities(1), 1);
        let unbounded = MetricResolver::new(&store, 1, ALL_FORUMS, TimeWindow::unbounded());
        assert_eq!(unbounded.num_nationalities(1), 2);
    }

    #[test]
    fn shrinking_window_never_increases_values() {
        let store = fixtures::reference_forum();
        let windows = [
            TimeWindow::unbounded(),
            TimeWindow::new(Some(fixtures::october_2023(2, 0, 0)), None),
            TimeWindow::new(
                Some(fixtures::october_2023(2, 0, 0)),
                Some(fixtures::october_2023(2, 12, 45)),
            ),
            TimeWindow::new(Some(fixtures::october_2023(5, 0, 0)), None),
        ];
        let mut metrics = vec![Metric::NumReplies, Metric::NumNationalities, Metric::UniqueDaysActive];
        metrics.extend(EngagementMethod::all().into_iter().map(engagement_metric));

        for metric in &metrics {
            for user in USERS {
                let values: Vec<i64> = windows
                    .iter()
                    .map(|window| MetricResolver::new(&store, COURSE, ALL_FORUMS, *window).resolve(metric, user))
                    .collect();
                assert!(
                    values.windows(2).all(|pair| pair[1] <= pair[0]),
                    "{} for user {user}: {values:?}",
                    metric.key()
                );
                assert_eq!(values[3], 0);
            }
        }
    }

    #[test]
    fn international_engagement_skips_compatriots() {
        let mut store = ForumSnapshot::new();
        store.add_forum(Forum {
            id: 1,
            course_id: 1,
            name: "Forum".to_string(),
        });
        store.add_discussion(Discussion { id: 1, forum_id: 1 });
        for (id, nationality) in [(1, Some("TH")), (2, Some("TH")), (3, Some("JP")), (4, None)] {
            store.add_user(User {
                id,
                nationality: nationality.map(str::to_string),
            });
        }
        // 1 roots; 2 replies to 1 twice, to 3 once, to 4 once.
        for (id, parent_id, author_id) in [(1, 0, 1), (2, 1, 2), (3, 1, 3), (4, 3, 2), (5, 1, 2), (6, 1, 4), (7, 6, 2)] {
            store.add_post(Post {
                id,
                discussion_id: 1,
                parent_id,
                author_id,
                created_at: 0,
            });
        }

        let resolver = MetricResolver::new(&store, 1, ALL_FORUMS, TimeWindow::unbounded());
        let method = EngagementMethod::PersonToPerson;
        assert_eq!(resolver.max_engagement(method, false, 2), 2);
        assert_eq!(resolver.engagement(method, false, 2).total(), 4);
        let international = resolver.engagement(method, true, 2);
        assert_eq!(international.total(), 1);
        assert_eq!(international.max(), Some(1));
    }

    #[test]
    fn empty_discussions_contribute_nothing() {
        let mut store = fixtures::reference_forum();
        store.add_discussion(Discussion { id: 99, forum_id: FORUM_1 });
        let resolver = MetricResolver::new(&store, COURSE, FORUM_1, TimeWindow::unbounded());
        assert_eq!(resolver.max_engagement(EngagementMethod::ThreadEngagement, false, REPLY_USER_2), 1);
        assert_eq!(resolver.num_replies(REPLY_USER_2), 2);
    }
}
