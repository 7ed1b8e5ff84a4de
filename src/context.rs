//! Timeline context: the single owner of the playback clock, the segment
//! index and the video sync controller, with the collaborators they need.

use async_trait::async_trait;
use chrono::Utc;
use crate::config::TimelineConfig;
use crate::core::{Route, SegmentRecord, SegmentView, TimeWindow};
use crate::error::TimelineError;
use crate::playback::{apply, settle, Action, ActiveRoute, PlaybackState};
use crate::player::VideoPlayer;
use crate::sync::{FrameThrottle, SourceRequest, SyncStatus, SyncTimer, Tick, TickScheduler, VideoSyncController};
use crate::timeline::{current_segment, next_segment, SegmentCache};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Backend segment metadata API
#[async_trait]
pub trait SegmentSource: Send + Sync {
    /// Fetch the segment records of `dongle_id` overlapping `window`
    async fn fetch_segment_metadata(
        &self,
        dongle_id: &str,
        window: TimeWindow,
    ) -> Result<Vec<SegmentRecord>, TimelineError>;
}

/// Turns a route into a playable stream URL
#[async_trait]
pub trait StreamResolver: Send + Sync {
    async fn resolve_stream_url(&self, route: &Route) -> Result<String, TimelineError>;
}

/// Segment source serving records already in memory
pub struct StaticSegments {
    records: Vec<SegmentRecord>,
}

impl StaticSegments {
    pub fn new(records: Vec<SegmentRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl SegmentSource for StaticSegments {
    async fn fetch_segment_metadata(
        &self,
        _dongle_id: &str,
        window: TimeWindow,
    ) -> Result<Vec<SegmentRecord>, TimelineError> {
        Ok(self
            .records
            .iter()
            .filter(|r| {
                r.end_time_utc_millis >= window.start as f64 && r.start_time_utc_millis <= window.end as f64
            })
            .cloned()
            .collect())
    }
}

/// Resolves the low-resolution camera stream stored next to a route's segments
pub struct RouteUrlResolver;

#[async_trait]
impl StreamResolver for RouteUrlResolver {
    async fn resolve_stream_url(&self, route: &Route) -> Result<String, TimelineError> {
        if route.url.is_empty() {
            return Err(TimelineError::Resolve(format!("route {} has no url", route.id)));
        }
        Ok(format!("{}/qcamera.m3u8", route.url))
    }
}

/// Completed stream resolution, tagged with the request it answers
struct Resolution {
    generation: u64,
    route_id: String,
    result: Result<String, TimelineError>,
}

/// Current wall-clock time in UTC epoch milliseconds
fn now() -> i64 {
    Utc::now().timestamp_millis()
}

fn check_window(window: TimeWindow) -> Result<(), TimelineError> {
    if window.start >= window.end {
        return Err(TimelineError::InvalidWindow {
            start: window.start,
            end: window.end,
        });
    }
    Ok(())
}

/// Timeline state for one device and time window.
///
/// Every clock transition goes through [`TimelineContext::dispatch`] and
/// replaces the clock wholesale. Methods ending in `_at` take the wall-clock
/// time explicitly; the others read it from the system clock.
pub struct TimelineContext<P: VideoPlayer> {
    config: TimelineConfig,
    dongle_id: String,
    window: TimeWindow,
    clock: PlaybackState,
    segments: Option<SegmentCache>,
    /// Request whose fetch last failed, not retried until the request changes
    fetch_failed_for: Option<(String, TimeWindow)>,
    controller: VideoSyncController,
    scheduler: TickScheduler,
    frames: FrameThrottle,
    player: P,
    source: Arc<dyn SegmentSource>,
    resolver: Arc<dyn StreamResolver>,
    resolved_tx: mpsc::UnboundedSender<Resolution>,
    resolved_rx: mpsc::UnboundedReceiver<Resolution>,
}

impl<P: VideoPlayer> TimelineContext<P> {
    pub fn new(
        config: TimelineConfig,
        dongle_id: &str,
        window: TimeWindow,
        player: P,
        source: Arc<dyn SegmentSource>,
        resolver: Arc<dyn StreamResolver>,
    ) -> Result<Self, TimelineError> {
        Self::new_at(config, dongle_id, window, player, source, resolver, now())
    }

    pub fn new_at(
        config: TimelineConfig,
        dongle_id: &str,
        window: TimeWindow,
        player: P,
        source: Arc<dyn SegmentSource>,
        resolver: Arc<dyn StreamResolver>,
        now: i64,
    ) -> Result<Self, TimelineError> {
        check_window(window)?;
        let (resolved_tx, resolved_rx) = mpsc::unbounded_channel();

        Ok(Self {
            controller: VideoSyncController::new(&config),
            scheduler: TickScheduler::new(config.debounce_ms as i64),
            frames: FrameThrottle::new(config.frame_throttle),
            config,
            dongle_id: dongle_id.to_string(),
            window,
            clock: PlaybackState::new(window, now),
            segments: None,
            fetch_failed_for: None,
            player,
            source,
            resolver,
            resolved_tx,
            resolved_rx,
        })
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    pub fn dongle_id(&self) -> &str {
        &self.dongle_id
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }

    pub fn clock(&self) -> &PlaybackState {
        &self.clock
    }

    /// Playhead in milliseconds from the window start
    pub fn current_offset(&self) -> f64 {
        self.current_offset_at(now())
    }

    pub fn current_offset_at(&self, now: i64) -> f64 {
        self.clock.current_offset(now)
    }

    /// Apply a clock transition and schedule a reconciliation
    pub fn dispatch(&mut self, action: Action) {
        self.dispatch_at(action, now());
    }

    pub fn dispatch_at(&mut self, action: Action, now: i64) {
        debug!("Clock action {:?}", action);
        self.clock = apply(&self.clock, action, now);
        self.scheduler.request(now);
    }

    /// Routes of the current window, empty until metadata arrives
    pub fn routes(&self) -> &[Route] {
        self.segments.as_ref().map(|s| s.routes()).unwrap_or(&[])
    }

    pub fn has_segment_metadata(&self) -> bool {
        self.segments
            .as_ref()
            .is_some_and(|s| s.covers(&self.dongle_id, &self.window))
    }

    pub fn current_segment_at(&self, offset: f64) -> Option<SegmentView<'_>> {
        current_segment(self.routes(), offset)
    }

    pub fn next_segment_at(&self, offset: f64) -> Option<SegmentView<'_>> {
        next_segment(self.routes(), offset)
    }

    pub fn is_buffering(&self) -> bool {
        self.clock.is_buffering
    }

    /// Error message to overlay on the video, if any
    pub fn video_error(&self) -> Option<&str> {
        self.controller.error()
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.controller.status()
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut P {
        &mut self.player
    }

    /// Replace the routes with ones built from freshly received metadata
    pub fn insert_segment_metadata(&mut self, records: &[SegmentRecord]) {
        let cache = SegmentCache::from_records(&self.dongle_id, self.window, records);
        info!(
            "Segment metadata for {}: {} routes from {} records",
            self.dongle_id,
            cache.routes().len(),
            records.len()
        );
        self.segments = Some(cache);
        self.fetch_failed_for = None;
    }

    /// Fetch segment metadata unless the current request is already answered.
    ///
    /// A failed request is not retried until the window or device changes,
    /// or [`TimelineContext::refresh_segments`] is called.
    pub async fn update_segments(&mut self) -> Result<(), TimelineError> {
        if self.has_segment_metadata() {
            return Ok(());
        }
        let request = (self.dongle_id.clone(), self.window);
        if self.fetch_failed_for.as_ref() == Some(&request) {
            return Ok(());
        }
        self.refresh_segments().await
    }

    /// Fetch segment metadata unconditionally
    pub async fn refresh_segments(&mut self) -> Result<(), TimelineError> {
        let window = self.window;
        let dongle_id = self.dongle_id.clone();
        debug!("Fetching segment metadata for {} in {:?}", dongle_id, window);

        match self.source.fetch_segment_metadata(&dongle_id, window).await {
            Ok(records) => {
                self.insert_segment_metadata(&records);
                self.scheduler.request(now());
                Ok(())
            }
            Err(e) => {
                warn!("Segment metadata fetch for {} failed: {}", dongle_id, e);
                self.fetch_failed_for = Some((dongle_id, window));
                Err(e)
            }
        }
    }

    /// Switch to another device or time window
    pub fn set_window(&mut self, dongle_id: &str, window: TimeWindow) -> Result<(), TimelineError> {
        self.set_window_at(dongle_id, window, now())
    }

    pub fn set_window_at(&mut self, dongle_id: &str, window: TimeWindow, now: i64) -> Result<(), TimelineError> {
        check_window(window)?;
        info!("Timeline window for {}: {} - {}", dongle_id, window.start, window.end);

        self.dongle_id = dongle_id.to_string();
        self.window = window;
        self.clock = PlaybackState::new(window, now);
        self.segments = None;
        self.fetch_failed_for = None;
        self.controller.reset(&mut self.player);
        self.scheduler.cancel();
        self.scheduler.request(now);
        Ok(())
    }

    pub fn request_sync_at(&mut self, now: i64) {
        self.scheduler.request(now);
    }

    /// Animation-frame driver: keeps the loop trapped and periodically asks
    /// for a reconciliation. Returns the playhead for on-screen indicators.
    pub fn on_frame_at(&mut self, now: i64) -> f64 {
        if self.frames.frame() {
            self.scheduler.request(now);
        }
        self.clock = settle(&self.clock, now);
        self.clock.current_offset(now)
    }

    /// Run a reconciliation if one is due. Returns true if it ran.
    pub async fn poll_at(&mut self, now: i64) -> bool {
        if !self.scheduler.take_due(now) {
            return false;
        }
        self.reconcile_at(now).await;
        true
    }

    /// Handle one tick from the [`SyncTimer`]
    pub async fn handle_tick(&mut self, tick: Tick, now: i64) {
        match tick {
            Tick::Reconcile => self.request_sync_at(now),
            Tick::Frame => {
                self.on_frame_at(now);
            }
        }
        self.poll_at(now).await;
    }

    /// One full reconciliation pass: adopt resolved sources, react to player
    /// events, then sync the player against the clock
    pub async fn reconcile_at(&mut self, now: i64) {
        while let Ok(resolution) = self.resolved_rx.try_recv() {
            match resolution.result {
                Ok(url) => {
                    self.controller
                        .adopt_source(resolution.generation, &resolution.route_id, url, &mut self.player);
                }
                Err(e) => {
                    self.controller
                        .source_failed(resolution.generation, &resolution.route_id, &e.to_string());
                }
            }
        }

        self.clock = settle(&self.clock, now);
        let routes = self.segments.as_ref().map(|s| s.routes()).unwrap_or(&[]);

        let active = current_segment(routes, self.clock.current_offset(now)).map(|view| ActiveRoute::from(view.route));
        if active != self.clock.route {
            self.clock = apply(&self.clock, Action::SelectRoute(active), now);
        }

        while let Some(event) = self.player.poll_event() {
            let actions = self
                .controller
                .handle_event(event, &self.clock, routes, &mut self.player, now);
            for action in actions {
                self.clock = apply(&self.clock, action, now);
            }
        }

        let outcome = self.controller.tick(&self.clock, routes, &mut self.player, now).await;
        for action in outcome.actions {
            self.clock = apply(&self.clock, action, now);
        }

        if let Some(request) = outcome.resolve {
            self.resolve_source(request);
        }

        if outcome.request_segments {
            // failures are logged and remembered; nothing else to do until the next tick
            let _ = self.update_segments().await;
        }
    }

    /// Resolve a stream URL in the background; the result is picked up by a later reconciliation
    fn resolve_source(&self, request: SourceRequest) {
        let resolver = self.resolver.clone();
        let tx = self.resolved_tx.clone();

        tokio::spawn(async move {
            let result = resolver.resolve_stream_url(&request.route).await;
            let _ = tx.send(Resolution {
                generation: request.generation,
                route_id: request.route.id,
                result,
            });
        });
    }

    /// Drive the timeline from a [`SyncTimer`] until `shutdown` flips to true
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let (mut timer, mut ticks) = SyncTimer::start(self.config.tick_interval(), self.config.frame_interval());
        let _ = self.update_segments().await;

        loop {
            tokio::select! {
                tick = ticks.recv() => match tick {
                    Some(tick) => self.handle_tick(tick, now()).await,
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        timer.stop();
        info!("Timeline loop stopped");
    }
}
