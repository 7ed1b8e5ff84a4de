//! Video sync controller: keeps a streaming player's position converged on
//! the virtual playhead, and reports buffering and errors back to the clock.

use crate::config::TimelineConfig;
use crate::core::Route;
use crate::playback::{Action, PlaybackState};
use crate::player::{PlayerError, PlayerEvent, VideoPlayer};
use crate::timeline::{current_segment, next_segment};
use tracing::{debug, error, info, warn};

/// Per-route sync state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Nothing visible to play
    NoSource,
    /// Resolving or loading the visible route's stream
    Loading,
    Syncing,
    Buffering,
    /// A user-visible error is showing; reconciliation carries on
    Error,
}

/// Stream URL resolution requested by a tick
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRequest {
    /// Tag for discarding stale results
    pub generation: u64,
    pub route: Route,
}

/// What a reconciliation tick asks of its owner
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutcome {
    /// Clock transitions to apply, in order
    pub actions: Vec<Action>,
    /// No route is visible; segment metadata should be refreshed
    pub request_segments: bool,
    /// The visible route changed and its stream URL must be resolved
    pub resolve: Option<SourceRequest>,
}

/// Player readings from the last reconciliation
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSnapshot {
    pub source: Option<String>,
    pub current_time: f64,
    pub seconds_loaded: f64,
    /// Wall-clock time of the reading
    pub at: i64,
}

/// Reconciles a [`VideoPlayer`] against the playback clock
pub struct VideoSyncController {
    lookahead_ms: i64,
    micro_correction_s: f64,
    sufficient_buffer_s: f64,
    status: SyncStatus,
    /// Route the next resolved source must belong to
    target_route: Option<String>,
    /// Route whose stream is loaded in the player
    loaded_route: Option<String>,
    generation: u64,
    first_seek_pending: bool,
    error: Option<String>,
    snapshot: Option<SyncSnapshot>,
}

impl VideoSyncController {
    pub fn new(config: &TimelineConfig) -> Self {
        Self {
            lookahead_ms: config.lookahead_ms,
            micro_correction_s: config.micro_correction_s,
            sufficient_buffer_s: config.sufficient_buffer_s,
            status: SyncStatus::NoSource,
            target_route: None,
            loaded_route: None,
            generation: 0,
            first_seek_pending: true,
            error: None,
            snapshot: None,
        }
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    /// User-visible error message, if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn snapshot(&self) -> Option<&SyncSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn loaded_route(&self) -> Option<&str> {
        self.loaded_route.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Route to show at `offset`: the one containing it, or one starting
    /// within the lookahead
    pub fn visible_route<'a>(&self, routes: &'a [Route], offset: f64) -> Option<&'a Route> {
        if let Some(view) = current_segment(routes, offset) {
            return Some(view.route);
        }
        next_segment(routes, offset)
            .filter(|next| (next.start_offset() as f64 - offset) < self.lookahead_ms as f64)
            .map(|next| next.route)
    }

    /// Seconds into the route's stream that correspond to `offset`
    pub fn desired_video_time(route: &Route, offset: f64) -> f64 {
        let lead_in = route.video_start_offset.unwrap_or(0);
        ((offset - route.offset as f64 - lead_in as f64) / 1000.0).max(0.0)
    }

    /// Forget all sources and pending resolutions, e.g. when the window or device changes
    pub fn reset<P: VideoPlayer + ?Sized>(&mut self, player: &mut P) {
        self.generation += 1;
        self.target_route = None;
        self.loaded_route = None;
        self.first_seek_pending = true;
        self.error = None;
        self.snapshot = None;
        self.status = SyncStatus::NoSource;
        if player.source().is_some() {
            player.load(None);
        }
    }

    /// Start targeting a new route; its stream still has to be resolved
    fn retarget(&mut self, route: &Route) -> SourceRequest {
        self.generation += 1;
        self.target_route = Some(route.id.clone());
        self.first_seek_pending = true;
        self.error = None;
        self.status = SyncStatus::Loading;
        info!("Switching video to route {}", route.id);

        SourceRequest {
            generation: self.generation,
            route: route.clone(),
        }
    }

    /// Load a resolved stream, unless the request has gone stale.
    ///
    /// Returns true if the source was adopted.
    pub fn adopt_source<P: VideoPlayer + ?Sized>(
        &mut self,
        generation: u64,
        route_id: &str,
        url: String,
        player: &mut P,
    ) -> bool {
        if generation != self.generation || self.target_route.as_deref() != Some(route_id) {
            debug!("Discarding stale stream for route {}", route_id);
            return false;
        }

        info!("Loading stream for route {}: {}", route_id, url);
        player.load(Some(url));
        self.loaded_route = Some(route_id.to_string());
        self.first_seek_pending = true;
        self.status = SyncStatus::Loading;
        true
    }

    /// Record a failed resolution, unless the request has gone stale
    pub fn source_failed(&mut self, generation: u64, route_id: &str, reason: &str) {
        if generation != self.generation || self.target_route.as_deref() != Some(route_id) {
            return;
        }
        warn!("Could not resolve stream for route {}: {}", route_id, reason);
        self.error = Some("Unable to load video".to_string());
        self.status = SyncStatus::Error;
    }

    /// One reconciliation pass at wall-clock `now`
    pub async fn tick<P: VideoPlayer + ?Sized>(
        &mut self,
        clock: &PlaybackState,
        routes: &[Route],
        player: &mut P,
        now: i64,
    ) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        let offset = clock.current_offset(now);

        let Some(route) = self.visible_route(routes, offset) else {
            outcome.request_segments = true;
            if clock.is_buffering {
                debug!("Stop buffering: nothing visible at {:.0}", offset);
                outcome.actions.push(Action::BufferVideo(false));
            }
            if self.target_route.is_some() || player.source().is_some() {
                self.reset(player);
            }
            return outcome;
        };

        if self.target_route.as_deref() != Some(route.id.as_str()) {
            outcome.resolve = Some(self.retarget(route));
        }

        // until the new stream resolves, the previous one keeps playing untouched
        if self.loaded_route.as_deref() != Some(route.id.as_str()) {
            return outcome;
        }

        let Some(duration) = player.duration().filter(|d| *d > 0.0) else {
            return outcome;
        };

        self.reconcile(clock, route, player, offset, duration, now, &mut outcome).await;
        outcome
    }

    #[allow(clippy::too_many_arguments)]
    async fn reconcile<P: VideoPlayer + ?Sized>(
        &mut self,
        clock: &PlaybackState,
        route: &Route,
        player: &mut P,
        offset: f64,
        duration: f64,
        now: i64,
        outcome: &mut TickOutcome,
    ) {
        let mut current = player.current_time();
        let loaded = player.seconds_loaded();
        let ready = player.ready_state();
        self.snapshot = Some(SyncSnapshot {
            source: player.source().map(str::to_string),
            current_time: current,
            seconds_loaded: loaded,
            at: now,
        });

        if offset < route.offset as f64 {
            self.hold_for_pre_roll(clock, player, outcome);
            return;
        }

        let sufficient = (duration - current).min(self.sufficient_buffer_s);
        let has_sufficient_buffer = loaded - current >= sufficient;
        let starved = current >= loaded && current < duration;

        let mut buffering = clock.is_buffering;
        if clock.is_buffering && has_sufficient_buffer && ready.can_play() {
            debug!("Stop buffering: {:.1}s buffered ahead", loaded - current);
            outcome.actions.push(Action::BufferVideo(false));
            buffering = false;
        } else if !clock.is_buffering && (starved || !ready.can_play()) {
            debug!("Buffering: player at {:.1}s, loaded {:.1}s, {:?}", current, loaded, ready);
            outcome.actions.push(Action::BufferVideo(true));
            buffering = true;
        }

        let desired = Self::desired_video_time(route, offset);
        if self.first_seek_pending {
            self.first_seek_pending = false;
            player.seek_to(desired);
            current = desired;
        }

        let mut rate = clock.desired_speed;
        let diff = desired - current;
        if diff.abs() <= self.micro_correction_s {
            rate = (rate + diff).max(0.0);
        } else if desired == 0.0 && diff < 0.0 && current != duration && offset >= route.offset as f64 {
            // log starts before the video: move the playhead up to the video
            outcome.actions.push(Action::Seek(offset - diff * 1000.0));
        } else {
            player.seek_to(desired);
        }

        let rate = (rate * 10.0).round() / 10.0;
        let player_rate = if player.is_paused() { 0.0 } else { player.playback_rate() };

        if player.is_paused() && rate != 0.0 && has_sufficient_buffer {
            match player.play().await {
                Ok(()) => {}
                Err(e) if e.is_ignorable() => debug!("Resume skipped: {}", e),
                Err(e) => warn!("Could not resume video: {}", e),
            }
        } else if rate == 0.0 && !player.is_paused() {
            player.pause();
        }

        if player_rate != rate && rate != 0.0 {
            player.set_playback_rate(rate);
        }

        self.status = if self.error.is_some() {
            SyncStatus::Error
        } else if buffering {
            SyncStatus::Buffering
        } else {
            SyncStatus::Syncing
        };
    }

    /// Before the visible route starts: park its stream on the first frame.
    ///
    /// The clock runs freely through the gap and is never held for video here.
    fn hold_for_pre_roll<P: VideoPlayer + ?Sized>(
        &mut self,
        clock: &PlaybackState,
        player: &mut P,
        outcome: &mut TickOutcome,
    ) {
        if self.first_seek_pending {
            self.first_seek_pending = false;
            player.seek_to(0.0);
        }
        if !player.is_paused() {
            player.pause();
        }
        if clock.is_buffering {
            debug!("Stop buffering: route not started yet");
            outcome.actions.push(Action::BufferVideo(false));
        }
        self.status = if self.error.is_some() {
            SyncStatus::Error
        } else {
            SyncStatus::Loading
        };
    }

    /// React to a player notification, returning clock transitions to apply
    pub fn handle_event<P: VideoPlayer + ?Sized>(
        &mut self,
        event: PlayerEvent,
        clock: &PlaybackState,
        routes: &[Route],
        player: &mut P,
        now: i64,
    ) -> Vec<Action> {
        match event {
            PlayerEvent::Buffer => self.on_buffer(clock, routes, player, now),
            PlayerEvent::BufferEnd | PlayerEvent::Start | PlayerEvent::Play => {
                debug!("Stop buffering: player resumed ({:?})", event);
                self.error = None;
                if self.loaded_route.is_some() {
                    self.status = SyncStatus::Syncing;
                }
                vec![Action::BufferVideo(false)]
            }
            PlayerEvent::Error(e) => self.on_error(e),
        }
    }

    fn on_buffer<P: VideoPlayer + ?Sized>(
        &mut self,
        clock: &PlaybackState,
        routes: &[Route],
        player: &mut P,
        now: i64,
    ) -> Vec<Action> {
        let offset = clock.current_offset(now);
        let route = self.visible_route(routes, offset);
        let Some(duration) = player.duration().filter(|d| *d > 0.0) else {
            debug!("Buffering: no media loaded");
            return vec![Action::BufferVideo(true)];
        };
        let Some(route) = route else {
            debug!("Buffering: nothing visible");
            return vec![Action::BufferVideo(true)];
        };

        if offset < route.offset as f64 {
            debug!("Ignoring stall before route {} starts", route.id);
            return Vec::new();
        }

        if self.first_seek_pending && self.loaded_route.as_deref() == Some(route.id.as_str()) {
            self.first_seek_pending = false;
            player.seek_to(Self::desired_video_time(route, offset));
        }

        let current = player.current_time();
        let sufficient = (duration - current).min(self.sufficient_buffer_s);
        let has_sufficient_buffer = player.seconds_loaded() - current >= sufficient;
        if !has_sufficient_buffer || !player.ready_state().can_play() {
            debug!("Buffering: player reported a stall");
            self.status = SyncStatus::Buffering;
            return vec![Action::BufferVideo(true)];
        }
        Vec::new()
    }

    fn on_error(&mut self, e: PlayerError) -> Vec<Action> {
        if e.is_ignorable() {
            debug!("Ignoring player error: {}", e);
            return Vec::new();
        }

        match e.user_message() {
            None => {
                debug!("Buffering: {}", e);
                self.status = SyncStatus::Buffering;
            }
            Some(message) => {
                if matches!(e, PlayerError::Network(_)) {
                    error!("Video network error: {}", e);
                } else {
                    warn!("Video error: {}", e);
                }
                self.error = Some(message);
                self.status = SyncStatus::Error;
            }
        }
        vec![Action::BufferVideo(true)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::segment::tests::record;
    use crate::core::{TimeWindow, SEGMENT_LENGTH};
    use crate::playback::apply;
    use crate::player::{ReadyState, SimulatedPlayer};
    use crate::timeline::build_routes;

    const T0: i64 = 1_700_000_000_000;
    const ROUTE: &str = "d|2023-11-14--22-13-20";
    const OTHER: &str = "d|2023-11-15--08-00-00";

    fn routes() -> Vec<Route> {
        let mut records: Vec<_> = (0..3).map(|i| record(ROUTE, i, T0 + 60_000 + i as i64 * SEGMENT_LENGTH)).collect();
        records.extend((0..2).map(|i| record(OTHER, i, T0 + 600_000 + i as i64 * SEGMENT_LENGTH)));
        build_routes(&records, T0)
    }

    fn clock_at(offset: f64, buffering: bool) -> PlaybackState {
        let state = PlaybackState::new(TimeWindow::new(T0, T0 + 3_600_000), T0);
        let state = apply(&state, Action::Seek(offset), T0);
        apply(&state, Action::BufferVideo(buffering), T0)
    }

    /// Controller already playing `ROUTE` from a fully buffered player
    async fn synced(routes: &[Route], clock: &PlaybackState) -> (VideoSyncController, SimulatedPlayer) {
        let mut controller = VideoSyncController::new(&TimelineConfig::default());
        let mut player = SimulatedPlayer::new(180.0);

        let outcome = controller.tick(clock, routes, &mut player, T0).await;
        let request = outcome.resolve.expect("route should be targeted");
        assert!(controller.adopt_source(request.generation, &request.route.id, "stream".into(), &mut player));
        (controller, player)
    }

    #[test]
    fn test_visible_route_prefers_current_then_lookahead() {
        let routes = routes();
        let controller = VideoSyncController::new(&TimelineConfig::default());

        assert_eq!(controller.visible_route(&routes, 70_000.0).map(|r| r.id.as_str()), Some(ROUTE));
        assert_eq!(controller.visible_route(&routes, 596_000.0).map(|r| r.id.as_str()), Some(OTHER));
        assert!(controller.visible_route(&routes, 500_000.0).is_none());
    }

    #[test]
    fn test_desired_video_time() {
        let routes = routes();
        assert_eq!(VideoSyncController::desired_video_time(&routes[0], 90_000.0), 30.0);
        assert_eq!(VideoSyncController::desired_video_time(&routes[0], 10_000.0), 0.0);

        let mut lead_in = routes[0].clone();
        lead_in.video_start_offset = Some(10_000);
        assert_eq!(VideoSyncController::desired_video_time(&lead_in, 90_000.0), 20.0);
    }

    #[tokio::test]
    async fn test_no_visible_route_requests_segments() {
        let routes = routes();
        let mut controller = VideoSyncController::new(&TimelineConfig::default());
        let mut player = SimulatedPlayer::new(180.0);

        let outcome = controller.tick(&clock_at(400_000.0, true), &routes, &mut player, T0).await;
        assert!(outcome.request_segments);
        assert_eq!(outcome.actions, vec![Action::BufferVideo(false)]);
        assert!(outcome.resolve.is_none());
        assert_eq!(controller.status(), SyncStatus::NoSource);
    }

    #[tokio::test]
    async fn test_route_change_requests_source() {
        let routes = routes();
        let mut controller = VideoSyncController::new(&TimelineConfig::default());
        let mut player = SimulatedPlayer::new(180.0);
        let clock = clock_at(90_000.0, true);

        let outcome = controller.tick(&clock, &routes, &mut player, T0).await;
        let request = outcome.resolve.unwrap();
        assert_eq!(request.route.id, ROUTE);
        assert_eq!(controller.status(), SyncStatus::Loading);

        // still targeting the same route: no second request
        let outcome = controller.tick(&clock, &routes, &mut player, T0 + 250).await;
        assert!(outcome.resolve.is_none());
        assert!(player.source().is_none());
    }

    #[tokio::test]
    async fn test_stale_source_discarded() {
        let routes = routes();
        let mut controller = VideoSyncController::new(&TimelineConfig::default());
        let mut player = SimulatedPlayer::new(180.0);

        let first = controller.tick(&clock_at(90_000.0, true), &routes, &mut player, T0).await.resolve.unwrap();
        let second = controller.tick(&clock_at(610_000.0, true), &routes, &mut player, T0).await.resolve.unwrap();
        assert_eq!(second.route.id, OTHER);

        assert!(!controller.adopt_source(first.generation, ROUTE, "old".into(), &mut player));
        assert!(player.source().is_none());
        assert!(controller.adopt_source(second.generation, OTHER, "new".into(), &mut player));
        assert_eq!(player.source(), Some("new"));
        assert_eq!(controller.loaded_route(), Some(OTHER));
    }

    #[tokio::test]
    async fn test_first_tick_seeks_and_plays() {
        let routes = routes();
        let clock = clock_at(90_000.0, true);
        let (mut controller, mut player) = synced(&routes, &clock).await;

        let outcome = controller.tick(&clock, &routes, &mut player, T0).await;
        assert_eq!(outcome.actions, vec![Action::BufferVideo(false)]);
        assert_eq!(player.take_seeks(), vec![30.0]);
        assert!(!player.is_paused());
        assert_eq!(player.playback_rate(), 1.0);
        assert_eq!(controller.status(), SyncStatus::Syncing);
    }

    #[tokio::test]
    async fn test_small_drift_nudges_rate() {
        let routes = routes();
        let clock = clock_at(90_000.0, false);
        let (mut controller, mut player) = synced(&routes, &clock).await;
        controller.tick(&clock, &routes, &mut player, T0).await;
        player.take_seeks();

        // video 0.2s behind
        player.set_current_time(29.8);
        controller.tick(&clock, &routes, &mut player, T0).await;
        assert!(player.take_seeks().is_empty());
        assert_eq!(player.playback_rate(), 1.2);

        // video 0.25s ahead
        player.set_current_time(30.25);
        controller.tick(&clock, &routes, &mut player, T0).await;
        assert_eq!(player.playback_rate(), 0.8);
    }

    #[tokio::test]
    async fn test_large_drift_seeks_player() {
        let routes = routes();
        let clock = clock_at(90_000.0, false);
        let (mut controller, mut player) = synced(&routes, &clock).await;
        controller.tick(&clock, &routes, &mut player, T0).await;
        player.take_seeks();

        player.set_current_time(12.0);
        controller.tick(&clock, &routes, &mut player, T0).await;
        assert_eq!(player.take_seeks(), vec![30.0]);
    }

    #[tokio::test]
    async fn test_log_before_video_advances_clock() {
        let routes = routes();
        // playhead before the route's video: desired video time clamps to 0
        let clock = clock_at(60_000.0, false);
        let (mut controller, mut player) = synced(&routes, &clock).await;
        controller.tick(&clock, &routes, &mut player, T0).await;
        player.take_seeks();

        player.set_current_time(2.0);
        let outcome = controller.tick(&clock, &routes, &mut player, T0).await;
        assert_eq!(outcome.actions, vec![Action::Seek(62_000.0)]);
        assert!(player.take_seeks().is_empty());
    }

    #[tokio::test]
    async fn test_paused_clock_pauses_player() {
        let routes = routes();
        let clock = clock_at(90_000.0, false);
        let (mut controller, mut player) = synced(&routes, &clock).await;
        controller.tick(&clock, &routes, &mut player, T0).await;
        assert!(!player.is_paused());

        let paused = apply(&clock, Action::Pause, T0);
        controller.tick(&paused, &routes, &mut player, T0).await;
        assert!(player.is_paused());
        assert_eq!(player.playback_rate(), 1.0);
    }

    #[tokio::test]
    async fn test_starved_player_signals_buffering() {
        let routes = routes();
        let clock = clock_at(90_000.0, false);
        let (mut controller, mut player) = synced(&routes, &clock).await;
        controller.tick(&clock, &routes, &mut player, T0).await;

        player.set_loaded(30.0);
        let outcome = controller.tick(&clock, &routes, &mut player, T0).await;
        assert_eq!(outcome.actions, vec![Action::BufferVideo(true)]);
        assert_eq!(controller.status(), SyncStatus::Buffering);
    }

    #[tokio::test]
    async fn test_buffering_clears_only_with_buffer_and_ready() {
        let routes = routes();
        let clock = clock_at(90_000.0, true);
        let (mut controller, mut player) = synced(&routes, &clock).await;

        player.set_ready_state(ReadyState::HaveMetadata);
        let outcome = controller.tick(&clock, &routes, &mut player, T0).await;
        assert!(outcome.actions.is_empty());

        player.set_ready_state(ReadyState::HaveEnoughData);
        player.set_loaded(45.0);
        let outcome = controller.tick(&clock, &routes, &mut player, T0).await;
        assert!(outcome.actions.is_empty());

        player.set_loaded(60.0);
        let outcome = controller.tick(&clock, &routes, &mut player, T0).await;
        assert_eq!(outcome.actions, vec![Action::BufferVideo(false)]);
    }

    #[tokio::test]
    async fn test_error_events() {
        let routes = routes();
        let clock = clock_at(90_000.0, false);
        let (mut controller, mut player) = synced(&routes, &clock).await;

        let actions = controller.handle_event(PlayerEvent::Error(PlayerError::Stalled), &clock, &routes, &mut player, T0);
        assert_eq!(actions, vec![Action::BufferVideo(true)]);
        assert!(controller.error().is_none());

        let actions = controller.handle_event(PlayerEvent::Error(PlayerError::Aborted), &clock, &routes, &mut player, T0);
        assert!(actions.is_empty());

        let actions = controller.handle_event(PlayerEvent::Error(PlayerError::NotFound), &clock, &routes, &mut player, T0);
        assert_eq!(actions, vec![Action::BufferVideo(true)]);
        assert_eq!(
            controller.error(),
            Some("This video segment has not uploaded yet or has been deleted.")
        );
        assert_eq!(controller.status(), SyncStatus::Error);

        // the loop keeps reconciling while the error shows
        controller.tick(&clock, &routes, &mut player, T0).await;
        assert_eq!(controller.status(), SyncStatus::Error);

        let actions = controller.handle_event(PlayerEvent::BufferEnd, &clock, &routes, &mut player, T0);
        assert_eq!(actions, vec![Action::BufferVideo(false)]);
        assert!(controller.error().is_none());
        assert_eq!(controller.status(), SyncStatus::Syncing);
    }

    #[tokio::test]
    async fn test_buffer_event_with_short_buffer() {
        let routes = routes();
        let clock = clock_at(90_000.0, false);
        let (mut controller, mut player) = synced(&routes, &clock).await;

        // first buffer event performs the pending first seek
        player.set_loaded(40.0);
        let actions = controller.handle_event(PlayerEvent::Buffer, &clock, &routes, &mut player, T0);
        assert_eq!(player.take_seeks(), vec![30.0]);
        assert_eq!(actions, vec![Action::BufferVideo(true)]);

        player.set_loaded(120.0);
        let actions = controller.handle_event(PlayerEvent::Buffer, &clock, &routes, &mut player, T0);
        assert!(player.take_seeks().is_empty());
        assert!(actions.is_empty());
    }

    #[tokio::test]
    async fn test_pre_roll_holds_video_without_moving_clock() {
        let routes = routes();
        // 4s before the second route, inside the lookahead
        let mut clock = clock_at(596_000.0, false);
        let mut controller = VideoSyncController::new(&TimelineConfig::default());
        let mut player = SimulatedPlayer::new(120.0);

        let request = controller.tick(&clock, &routes, &mut player, T0).await.resolve.unwrap();
        assert_eq!(request.route.id, OTHER);
        assert!(controller.adopt_source(request.generation, OTHER, "next".into(), &mut player));

        let mut now = T0;
        for _ in 0..20 {
            now += 250;
            player.advance(0.25);
            let outcome = controller.tick(&clock, &routes, &mut player, now).await;
            if now < T0 + 4_000 {
                assert!(outcome.actions.is_empty());
                assert!(player.is_paused());
                assert_eq!(controller.status(), SyncStatus::Loading);
            }
            for action in outcome.actions {
                clock = apply(&clock, action, now);
            }
        }

        // 5s of wall time moved the clock exactly 5s
        assert_eq!(clock.current_offset(now), 601_000.0);
        // parked on the first frame once, then played in without a hard seek
        assert_eq!(player.take_seeks(), vec![0.0]);
        assert!(!player.is_paused());
        assert!((player.current_time() - 1.0).abs() < 1e-9);
        assert_eq!(controller.status(), SyncStatus::Syncing);
    }

    #[tokio::test]
    async fn test_pre_roll_releases_buffering_clock() {
        let routes = routes();
        let clock = clock_at(597_000.0, true);
        let (mut controller, mut player) = synced(&routes, &clock).await;

        let outcome = controller.tick(&clock, &routes, &mut player, T0).await;
        assert_eq!(outcome.actions, vec![Action::BufferVideo(false)]);

        let actions = controller.handle_event(PlayerEvent::Buffer, &clock, &routes, &mut player, T0);
        assert!(actions.is_empty());
    }

    #[tokio::test]
    async fn test_interrupted_resume_is_retried_quietly() {
        let routes = routes();
        let clock = clock_at(90_000.0, false);
        let (mut controller, mut player) = synced(&routes, &clock).await;
        controller.tick(&clock, &routes, &mut player, T0).await;

        let paused = apply(&clock, Action::Pause, T0);
        controller.tick(&paused, &routes, &mut player, T0).await;
        assert!(player.is_paused());

        let resumed = apply(&paused, Action::Play(1.0), T0);
        player.interrupt_next_play();
        controller.tick(&resumed, &routes, &mut player, T0).await;
        assert!(player.is_paused());
        assert!(controller.error().is_none());
        assert_eq!(controller.status(), SyncStatus::Syncing);

        controller.tick(&resumed, &routes, &mut player, T0).await;
        assert!(!player.is_paused());
        assert!(controller.error().is_none());
    }

    #[tokio::test]
    async fn test_leaving_routes_unloads_player() {
        let routes = routes();
        let clock = clock_at(90_000.0, false);
        let (mut controller, mut player) = synced(&routes, &clock).await;
        controller.tick(&clock, &routes, &mut player, T0).await;

        let gap = clock_at(400_000.0, false);
        let outcome = controller.tick(&gap, &routes, &mut player, T0).await;
        assert!(outcome.request_segments);
        assert!(outcome.actions.is_empty());
        assert!(player.source().is_none());
        assert_eq!(controller.loaded_route(), None);
    }
}
