//! Reference course used by the `seed` command and the test suite.
//!
//! ```text
//! Forum 1
//!  ├ discussion 11 by postuser (day 1)
//!  │   └ replyuser1 (day 2)
//!  │       └ replyuser2 (day 3)
//!  └ discussion 12 by postuser (day 1)
//!      └ replyuser2 (day 2)
//! Forum 2
//!  └ discussion 21 by postuser (day 2)
//!      ├ replyuser1 (day 2)
//!      └ replyuser1 (day 2)
//! ```
//!
//! A second course holds one more discussion between postuser and
//! replyuser1 that must never leak into the first course's metrics.

use chrono::{TimeZone, Utc};

use crate::models::{CourseId, Discussion, Forum, ForumId, Post, User, UserId};
use crate::store::ForumSnapshot;

pub const COURSE: CourseId = 1;
pub const OTHER_COURSE: CourseId = 2;

pub const FORUM_1: ForumId = 1;
pub const FORUM_2: ForumId = 2;
pub const OTHER_FORUM: ForumId = 3;

pub const POST_USER: UserId = 100;
pub const REPLY_USER_1: UserId = 101;
pub const REPLY_USER_2: UserId = 102;

pub fn october_2023(day: u32, hour: u32, minute: u32) -> i64 {
    Utc.with_ymd_and_hms(2023, 10, day, hour, minute, 0)
        .single()
        .map(|dt| dt.timestamp())
        .unwrap_or_default()
}

pub fn reference_forum() -> ForumSnapshot {
    let mut store = ForumSnapshot::new();

    for (id, course_id, name) in [
        (FORUM_1, COURSE, "Forum 1"),
        (FORUM_2, COURSE, "Forum 2"),
        (OTHER_FORUM, OTHER_COURSE, "Other Forum"),
    ] {
        store.add_forum(Forum {
            id,
            course_id,
            name: name.to_string(),
        });
    }

    for (id, forum_id) in [(11, FORUM_1), (12, FORUM_1), (21, FORUM_2), (31, OTHER_FORUM)] {
        store.add_discussion(Discussion { id, forum_id });
    }

    for (id, nationality) in [(POST_USER, "TH"), (REPLY_USER_1, "JP"), (REPLY_USER_2, "ES")] {
        store.add_user(User {
            id,
            nationality: Some(nationality.to_string()),
        });
    }

    let posts = [
        (1110, 11, 0, POST_USER, october_2023(1, 12, 0)),
        (1111, 11, 1110, REPLY_USER_1, october_2023(2, 12, 30)),
        (1112, 11, 1111, REPLY_USER_2, october_2023(3, 12, 30)),
        (1210, 12, 0, POST_USER, october_2023(1, 12, 30)),
        (1211, 12, 1210, REPLY_USER_2, october_2023(2, 12, 0)),
        (2110, 21, 0, POST_USER, october_2023(2, 12, 0)),
        (2111, 21, 2110, REPLY_USER_1, october_2023(2, 12, 30)),
        (2112, 21, 2110, REPLY_USER_1, october_2023(2, 13, 0)),
        (3110, 31, 0, POST_USER, october_2023(1, 9, 0)),
        (3111, 31, 3110, REPLY_USER_1, october_2023(1, 10, 0)),
    ];
    for (id, discussion_id, parent_id, author_id, created_at) in posts {
        store.add_post(Post {
            id,
            discussion_id,
            parent_id,
            author_id,
            created_at,
        });
    }

    store
}
