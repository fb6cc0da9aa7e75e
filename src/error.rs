use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConditionError {
    #[error("invalid condition type: {0}")]
    WrongType(String),

    #[error("invalid date: {date} {time}")]
    InvalidDate { date: String, time: String },

    #[error("invalid condition payload: {0}")]
    Payload(#[from] serde_json::Error),
}
