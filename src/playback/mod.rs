pub mod clock;

pub use clock::{apply, settle, Action, ActiveRoute, LoopRange, PlaybackState};

/// Coarse playback state, for rendering controls and overlays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Playing,
    Paused,
    /// Clock frozen until video catches up
    Buffering,
}
