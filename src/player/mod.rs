pub mod error;
pub mod interface;
pub mod simulated;

pub use error::PlayerError;
pub use interface::{PlayerEvent, PlayerResult, ReadyState, VideoPlayer};
pub use simulated::SimulatedPlayer;
