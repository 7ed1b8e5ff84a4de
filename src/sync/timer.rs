use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Pending ticks beyond this are dropped; the scheduler coalesces them anyway
const TICK_CHANNEL_SIZE: usize = 8;

/// Which driver produced a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Fixed-interval reconciliation timer
    Reconcile,
    /// Animation-frame driver
    Frame,
}

/// Cancellable repeating timer feeding the sync loop
///
/// Runs the reconciliation interval and the frame driver on one background
/// task. Ticks arrive on the receiver returned by [`SyncTimer::start`].
pub struct SyncTimer {
    stop_signal: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SyncTimer {
    /// Start both drivers. Must be called from within a tokio runtime.
    pub fn start(tick_interval: Duration, frame_interval: Duration) -> (Self, mpsc::Receiver<Tick>) {
        let (tx, rx) = mpsc::channel(TICK_CHANNEL_SIZE);
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop = stop_signal.clone();

        let handle = tokio::spawn(async move {
            let mut reconcile = tokio::time::interval(tick_interval);
            let mut frames = tokio::time::interval(frame_interval);
            reconcile.set_missed_tick_behavior(MissedTickBehavior::Skip);
            frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                let tick = tokio::select! {
                    _ = reconcile.tick() => Tick::Reconcile,
                    _ = frames.tick() => Tick::Frame,
                };

                if stop.load(Ordering::SeqCst) || tx.is_closed() {
                    break;
                }

                // a full channel means the loop is behind; dropping is fine
                let _ = tx.try_send(tick);
            }
            debug!("Sync timer stopped");
        });

        (
            Self {
                stop_signal,
                handle: Some(handle),
            },
            rx,
        )
    }

    /// Stop the timer; no ticks are produced afterwards
    pub fn stop(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for SyncTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
