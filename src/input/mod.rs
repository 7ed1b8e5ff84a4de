pub mod metadata;

pub use metadata::{load_metadata, parse_metadata, window_for};
