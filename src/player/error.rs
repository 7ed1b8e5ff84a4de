use thiserror::Error;

/// Errors reported by a video player
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlayerError {
    #[error("network error: {0}")]
    Network(String),

    /// Segment not uploaded yet, or deleted
    #[error("video segment not found")]
    NotFound,

    #[error("http error {status}")]
    Http { status: u16, text: Option<String> },

    /// Stream stalled waiting for data, not a failure
    #[error("buffer stalled")]
    Stalled,

    /// Load aborted by a source change
    #[error("playback aborted")]
    Aborted,

    /// `play()` superseded by a `pause()` before it started
    #[error("play interrupted")]
    Interrupted,

    #[error("media error: {0}")]
    Media(String),
}

impl PlayerError {
    /// Classify an HTTP failure status
    pub fn from_status(status: u16, text: Option<String>) -> Self {
        match status {
            404 => PlayerError::NotFound,
            _ => PlayerError::Http { status, text },
        }
    }

    /// Errors that need no attention at all
    pub fn is_ignorable(&self) -> bool {
        matches!(self, PlayerError::Aborted | PlayerError::Interrupted)
    }

    /// Message to show the user, `None` for benign errors
    pub fn user_message(&self) -> Option<String> {
        match self {
            PlayerError::Stalled | PlayerError::Aborted | PlayerError::Interrupted => None,
            PlayerError::Network(_) => Some("Unable to load video. Check network connection.".to_string()),
            PlayerError::NotFound => {
                Some("This video segment has not uploaded yet or has been deleted.".to_string())
            }
            PlayerError::Http { text: Some(text), .. } if !text.is_empty() => Some(text.clone()),
            PlayerError::Http { .. } | PlayerError::Media(_) => Some("Unable to load video".to_string()),
        }
    }
}
