use crate::model::{BookingKey, Day};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Effective end not after effective start. Excluded from layout and aggregation.
    DegenerateInterval {
        key: BookingKey,
        start: Day,
        end: Day,
    },
    /// Candidate window missing a side or not ordered. The resolver yields no result.
    InvalidCandidateWindow,
    /// A second booking with the same `(kind, id)` on one car. Dropped before aggregating.
    DuplicateIdentity(BookingKey),
    LimitExceeded(&'static str),
    TaskFailed(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::DegenerateInterval { key, start, end } => {
                write!(f, "degenerate interval {key}: end {end} not after start {start}")
            }
            EngineError::InvalidCandidateWindow => {
                write!(f, "invalid candidate window: check-in must be before check-out")
            }
            EngineError::DuplicateIdentity(key) => write!(f, "duplicate booking identity: {key}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::TaskFailed(e) => write!(f, "view computation failed: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
