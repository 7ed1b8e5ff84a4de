use thiserror::Error;

/// Errors raised around the timeline: decoding metadata and talking to collaborators
#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("malformed segment metadata: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Segment metadata request failed; treated as "no data yet"
    #[error("segment fetch failed: {0}")]
    Fetch(String),

    #[error("stream resolution failed: {0}")]
    Resolve(String),

    #[error("invalid time window: start {start} is not before end {end}")]
    InvalidWindow { start: i64, end: i64 },
}
