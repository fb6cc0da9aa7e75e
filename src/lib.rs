//! Forum participation metrics and the engagement engine behind the
//! forum-metric activity gate.

pub mod condition;
pub mod db;
pub mod engagement;
pub mod error;
pub mod fixtures;
pub mod levels;
pub mod metrics;
pub mod models;
pub mod report;
pub mod store;
pub mod tree;

pub use condition::{Comparison, ConditionPayload, DateSetting, Description, MetricCondition};
pub use engagement::{EngagementMethod, ReplyRule};
pub use error::ConditionError;
pub use levels::EngagementResult;
pub use metrics::{Metric, MetricResolver};
pub use store::{ForumSnapshot, ForumStore};
pub use tree::{DiscussionTree, TimeWindow};
