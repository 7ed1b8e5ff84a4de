//! Timeline and playback engine for reviewing recorded drives.
//!
//! Segment metadata is folded into routes ([`timeline`]), a virtual playhead
//! runs over the selected window ([`playback`]), and a sync controller keeps a
//! streaming video player converged on that playhead ([`sync`]). A
//! [`TimelineContext`] owns all three.

pub mod config;
pub mod context;
pub mod core;
pub mod error;
pub mod input;
pub mod playback;
pub mod player;
pub mod sync;
pub mod timeline;

pub use config::TimelineConfig;
pub use context::{RouteUrlResolver, SegmentSource, StaticSegments, StreamResolver, TimelineContext};
pub use error::TimelineError;
