use async_trait::async_trait;
use crate::player::interface::{PlayerEvent, PlayerResult, ReadyState, VideoPlayer};
use crate::player::PlayerError;
use std::collections::VecDeque;

/// In-memory video player for testing without a media element
///
/// Media time only moves when [`SimulatedPlayer::advance`] is called, so
/// tests can script position, buffering and readiness exactly. Every source
/// reports the same media duration.
pub struct SimulatedPlayer {
    source: Option<String>,
    media_duration: f64,
    duration: Option<f64>,
    current_time: f64,
    loaded: f64,
    /// Seconds of media downloaded per second of wall time, 0 for instant
    download_rate: f64,
    paused: bool,
    rate: f64,
    ready_state: ReadyState,
    events: VecDeque<PlayerEvent>,
    seeks: Vec<f64>,
    interrupt_next_play: bool,
}

impl SimulatedPlayer {
    /// Create a player whose sources are `media_duration` seconds long
    pub fn new(media_duration: f64) -> Self {
        Self {
            source: None,
            media_duration,
            duration: None,
            current_time: 0.0,
            loaded: 0.0,
            download_rate: 0.0,
            paused: true,
            rate: 1.0,
            ready_state: ReadyState::HaveNothing,
            events: VecDeque::new(),
            seeks: Vec::new(),
            interrupt_next_play: false,
        }
    }

    /// Download media progressively instead of instantly
    pub fn with_download_rate(mut self, rate: f64) -> Self {
        self.download_rate = rate;
        self
    }

    /// Advance wall time by `seconds`, playing and downloading media
    pub fn advance(&mut self, seconds: f64) {
        let Some(duration) = self.duration else {
            return;
        };

        if self.download_rate > 0.0 {
            self.loaded = (self.loaded + seconds * self.download_rate).min(duration);
        }

        if !self.paused && self.ready_state.can_play() {
            self.current_time = (self.current_time + seconds * self.rate).min(self.loaded);
        }

        let starved = self.current_time >= self.loaded && self.loaded < duration;
        if starved && self.ready_state.can_play() {
            self.ready_state = ReadyState::HaveMetadata;
            self.events.push_back(PlayerEvent::Buffer);
        } else if !starved && !self.ready_state.can_play() {
            self.ready_state = ReadyState::HaveEnoughData;
            self.events.push_back(PlayerEvent::BufferEnd);
        }
    }

    /// Override the buffered end
    pub fn set_loaded(&mut self, seconds: f64) {
        self.loaded = seconds;
    }

    pub fn set_current_time(&mut self, seconds: f64) {
        self.current_time = seconds;
    }

    pub fn set_ready_state(&mut self, state: ReadyState) {
        self.ready_state = state;
    }

    /// Make the next `play()` fail as if interrupted by a pause
    pub fn interrupt_next_play(&mut self) {
        self.interrupt_next_play = true;
    }

    /// Queue an event for the controller
    pub fn inject_event(&mut self, event: PlayerEvent) {
        self.events.push_back(event);
    }

    /// Take all seeks issued since the last call (for verification)
    pub fn take_seeks(&mut self) -> Vec<f64> {
        std::mem::take(&mut self.seeks)
    }
}

#[async_trait]
impl VideoPlayer for SimulatedPlayer {
    fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    fn load(&mut self, source: Option<String>) {
        self.current_time = 0.0;
        self.paused = true;
        self.events.clear();

        if source.is_some() {
            self.duration = Some(self.media_duration);
            if self.download_rate > 0.0 {
                self.loaded = 0.0;
                self.ready_state = ReadyState::HaveMetadata;
            } else {
                self.loaded = self.media_duration;
                self.ready_state = ReadyState::HaveEnoughData;
            }
        } else {
            self.duration = None;
            self.loaded = 0.0;
            self.ready_state = ReadyState::HaveNothing;
        }
        self.source = source;
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn current_time(&self) -> f64 {
        self.current_time
    }

    fn seconds_loaded(&self) -> f64 {
        self.loaded
    }

    fn seek_to(&mut self, seconds: f64) {
        let target = seconds.clamp(0.0, self.duration.unwrap_or(0.0));
        self.seeks.push(target);
        self.current_time = target;

        // seeking outside the buffer restarts the download there
        if target > self.loaded {
            self.loaded = target;
            if self.ready_state.can_play() {
                self.ready_state = ReadyState::HaveMetadata;
                self.events.push_back(PlayerEvent::Buffer);
            }
        }
    }

    async fn play(&mut self) -> PlayerResult<()> {
        if self.source.is_none() {
            return Err(PlayerError::Media("no source loaded".to_string()));
        }
        if self.interrupt_next_play {
            self.interrupt_next_play = false;
            return Err(PlayerError::Interrupted);
        }
        if self.paused {
            self.paused = false;
            self.events.push_back(PlayerEvent::Play);
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn playback_rate(&self) -> f64 {
        self.rate
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.rate = rate;
    }

    fn ready_state(&self) -> ReadyState {
        self.ready_state
    }

    fn poll_event(&mut self) -> Option<PlayerEvent> {
        self.events.pop_front()
    }
}
