pub mod cache;
pub mod segments;

pub use cache::SegmentCache;
pub use segments::{build_routes, current_segment, next_segment};
