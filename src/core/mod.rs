pub mod event;
pub mod route;
pub mod segment;

pub use event::{Annotation, Event};
pub use route::{GpsPoint, OffsetRange, Route, SegmentView};
pub use segment::SegmentRecord;

use serde::{Deserialize, Serialize};

/// Length of one recorded segment in milliseconds
pub const SEGMENT_LENGTH: i64 = 60_000;

/// Processing status the backend reports for a fully processed stream
pub const PROCESSED: i32 = 40;

/// A reviewed time window, in UTC epoch milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

impl TimeWindow {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Window length in milliseconds
    pub fn duration(&self) -> i64 {
        self.end - self.start
    }

    /// Check whether `other` lies entirely within this window
    pub fn covers(&self, other: &TimeWindow) -> bool {
        other.start >= self.start && other.end <= self.end
    }
}
