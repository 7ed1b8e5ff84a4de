use async_trait::async_trait;
use crate::player::PlayerError;

/// Result type for player operations
pub type PlayerResult<T> = Result<T, PlayerError>;

/// How much media the player has, mirroring `HTMLMediaElement.readyState`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    HaveNothing = 0,
    HaveMetadata = 1,
    HaveCurrentData = 2,
    HaveFutureData = 3,
    HaveEnoughData = 4,
}

impl ReadyState {
    /// Enough data to render the current frame
    pub fn can_play(self) -> bool {
        self >= ReadyState::HaveCurrentData
    }
}

/// Notifications raised by the player between reconciliation ticks
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// Playback stalled waiting for data
    Buffer,
    /// Enough data arrived to continue
    BufferEnd,
    /// First frame of a new source is playing
    Start,
    /// Playback resumed
    Play,
    Error(PlayerError),
}

/// Trait for streaming video players driven by the sync controller
///
/// Implementations wrap a real media element (an HLS player in a web
/// view, a native decoder) or simulate one for tests.
#[async_trait]
pub trait VideoPlayer: Send {
    /// Currently loaded stream URL
    fn source(&self) -> Option<&str>;

    /// Load a stream URL, or unload with `None`
    fn load(&mut self, source: Option<String>);

    /// Media duration in seconds, `None` until metadata is known
    fn duration(&self) -> Option<f64>;

    /// Playback position in seconds
    fn current_time(&self) -> f64;

    /// End of the buffered media in seconds
    fn seconds_loaded(&self) -> f64;

    fn seek_to(&mut self, seconds: f64);

    /// Start or resume playback
    async fn play(&mut self) -> PlayerResult<()>;

    fn pause(&mut self);

    fn is_paused(&self) -> bool;

    fn playback_rate(&self) -> f64;

    fn set_playback_rate(&mut self, rate: f64);

    fn ready_state(&self) -> ReadyState;

    /// Take the next pending event (non-blocking, returns None if there is none)
    fn poll_event(&mut self) -> Option<PlayerEvent>;
}
