pub mod controller;
pub mod scheduler;
pub mod timer;

pub use controller::{SourceRequest, SyncSnapshot, SyncStatus, TickOutcome, VideoSyncController};
pub use scheduler::{FrameThrottle, TickScheduler};
pub use timer::{SyncTimer, Tick};
