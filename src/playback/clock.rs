use crate::core::{Route, TimeWindow};
use crate::playback::PlaybackStatus;

/// Loop region in wall-clock milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopRange {
    pub start: i64,
    pub end: i64,
    pub duration: i64,
}

impl LoopRange {
    /// Create a loop over `[start, end]`. Empty or inverted ranges are no loop at all.
    pub fn new(start: i64, end: i64) -> Option<Self> {
        (end > start).then_some(Self {
            start,
            end,
            duration: end - start,
        })
    }

    /// Loop bounds as window offsets
    pub fn bounds(&self, window: &TimeWindow) -> (f64, f64) {
        let start = (self.start - window.start) as f64;
        (start, start + self.duration as f64)
    }
}

/// The route under the playhead, as far as the clock cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveRoute {
    /// Route start as a window offset
    pub offset: i64,
    /// Lead-in before the route's video starts, 0 when there is none
    pub video_start_offset: i64,
}

impl From<&Route> for ActiveRoute {
    fn from(route: &Route) -> Self {
        Self {
            offset: route.offset,
            video_start_offset: route.video_start_offset.unwrap_or(0),
        }
    }
}

/// Clock transitions
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    /// Jump to a window offset
    Seek(f64),
    /// Play at a speed multiplier (0 = paused)
    Play(f64),
    Pause,
    /// Install a loop over wall-clock `[start, end]`, or clear it when either is missing
    SetLoop { start: Option<i64>, end: Option<i64> },
    /// Freeze or release the clock while video catches up
    BufferVideo(bool),
    Reset,
    /// Record the route under the playhead, or none in a gap
    SelectRoute(Option<ActiveRoute>),
}

/// Virtual playhead over a time window.
///
/// The current offset is never stored; it is extrapolated from the anchor
/// (`offset` at `start_time`) with the effective speed.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub window: TimeWindow,
    /// Anchor offset in milliseconds from the window start
    pub offset: f64,
    /// Wall-clock instant the anchor was set, UTC epoch milliseconds
    pub start_time: i64,
    /// Requested speed, kept while buffering
    pub desired_speed: f64,
    pub is_buffering: bool,
    pub loop_range: Option<LoopRange>,
    pub route: Option<ActiveRoute>,
}

impl PlaybackState {
    /// Fresh clock at the window start, waiting for video
    pub fn new(window: TimeWindow, now: i64) -> Self {
        Self {
            window,
            offset: 0.0,
            start_time: now,
            desired_speed: 1.0,
            is_buffering: true,
            loop_range: None,
            route: None,
        }
    }

    /// Speed used for extrapolation: zero while buffering
    pub fn effective_speed(&self) -> f64 {
        if self.is_buffering {
            0.0
        } else {
            self.desired_speed
        }
    }

    /// Playhead at wall-clock `now`
    pub fn current_offset(&self, now: i64) -> f64 {
        let speed = self.effective_speed();
        if speed == 0.0 {
            return self.offset;
        }
        self.offset + (now - self.start_time) as f64 * speed
    }

    /// Active loop bounds as window offsets
    pub fn loop_bounds(&self) -> Option<(f64, f64)> {
        self.loop_range.map(|l| l.bounds(&self.window))
    }

    pub fn status(&self) -> PlaybackStatus {
        if self.is_buffering {
            PlaybackStatus::Buffering
        } else if self.desired_speed > 0.0 {
            PlaybackStatus::Playing
        } else {
            PlaybackStatus::Paused
        }
    }

    /// Move the anchor to the current playhead
    fn anchored(&self, now: i64) -> Self {
        Self {
            offset: self.current_offset(now),
            start_time: now,
            ..self.clone()
        }
    }
}

/// Apply one transition at wall-clock `now`, returning the replacement state
pub fn apply(state: &PlaybackState, action: Action, now: i64) -> PlaybackState {
    let next = match action {
        Action::Seek(target) => {
            let offset = match state.loop_bounds() {
                Some((start, end)) => target.clamp(start, end),
                None => target,
            };
            PlaybackState {
                offset,
                start_time: now,
                ..state.clone()
            }
        }
        Action::Play(speed) => {
            let speed = speed.max(0.0);
            if speed == state.desired_speed {
                state.clone()
            } else {
                PlaybackState {
                    desired_speed: speed,
                    ..state.anchored(now)
                }
            }
        }
        Action::Pause => PlaybackState {
            desired_speed: 0.0,
            ..state.anchored(now)
        },
        Action::SetLoop { start, end } => {
            let loop_range = match (start, end) {
                (Some(start), Some(end)) => LoopRange::new(start, end),
                _ => None,
            };
            PlaybackState {
                loop_range,
                ..state.anchored(now)
            }
        }
        Action::BufferVideo(is_buffering) => PlaybackState {
            is_buffering,
            ..state.anchored(now)
        },
        Action::Reset => PlaybackState {
            offset: 0.0,
            start_time: now,
            desired_speed: 1.0,
            is_buffering: true,
            ..state.clone()
        },
        Action::SelectRoute(route) => PlaybackState {
            route,
            ..state.clone()
        },
    };

    normalize(skip_lead_in(next), now)
}

/// A loop starting at the active route's start begins after its video-less
/// lead-in instead, keeping its end
fn skip_lead_in(mut state: PlaybackState) -> PlaybackState {
    let (Some(route), Some(range)) = (state.route, state.loop_range) else {
        return state;
    };
    if route.video_start_offset <= 0 || range.start != state.window.start + route.offset {
        return state;
    }
    if let Some(trimmed) = LoopRange::new(range.start + route.video_start_offset, range.end) {
        state.loop_range = Some(trimmed);
    }
    state
}

/// Trap the playhead inside an active loop: wrap past the end, snap up to the start
fn normalize(mut state: PlaybackState, now: i64) -> PlaybackState {
    let Some((start, end)) = state.loop_bounds() else {
        return state;
    };

    let offset = state.current_offset(now);
    if offset < start {
        state.offset = start;
        state.start_time = now;
    } else if offset > end {
        state.offset = start + (offset - start) % (end - start);
        state.start_time = now;
    }
    state
}

/// Re-apply loop trapping without a transition, for continuous playback ticks
pub fn settle(state: &PlaybackState, now: i64) -> PlaybackState {
    normalize(state.clone(), now)
}
