/// Coalesces reconciliation requests.
///
/// The first request opens a window; every request inside it folds into one
/// trailing run once the window closes, so reconciliation runs at most once
/// per window however often it is asked for.
#[derive(Debug, Clone)]
pub struct TickScheduler {
    window_ms: i64,
    pending_since: Option<i64>,
    last_run: Option<i64>,
}

impl TickScheduler {
    pub fn new(window_ms: i64) -> Self {
        Self {
            window_ms,
            pending_since: None,
            last_run: None,
        }
    }

    /// Ask for a reconciliation at `now`
    pub fn request(&mut self, now: i64) {
        if self.pending_since.is_none() {
            self.pending_since = Some(now);
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending_since.is_some()
    }

    /// Check whether the pending run is due, clearing it if so
    pub fn take_due(&mut self, now: i64) -> bool {
        match self.pending_since {
            Some(since) if now - since >= self.window_ms => {
                self.pending_since = None;
                self.last_run = Some(now);
                true
            }
            _ => false,
        }
    }

    pub fn last_run(&self) -> Option<i64> {
        self.last_run
    }

    /// Drop any pending run
    pub fn cancel(&mut self) {
        self.pending_since = None;
    }
}

/// Acts on every Nth animation frame
#[derive(Debug, Clone)]
pub struct FrameThrottle {
    every: u32,
    frame: u64,
}

impl FrameThrottle {
    pub fn new(every: u32) -> Self {
        Self {
            every: every.max(1),
            frame: 0,
        }
    }

    /// Count a frame, returning true when this one should act
    pub fn frame(&mut self) -> bool {
        self.frame += 1;
        self.frame % self.every as u64 == 0
    }
}
