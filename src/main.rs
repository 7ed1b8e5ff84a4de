use anyhow::{bail, Context, Result};
use chrono::{TimeZone, Utc};
use drive_timeline::core::TimeWindow;
use drive_timeline::input::{load_metadata, window_for};
use drive_timeline::playback::Action;
use drive_timeline::player::{SimulatedPlayer, VideoPlayer};
use drive_timeline::sync::Tick;
use drive_timeline::timeline::build_routes;
use drive_timeline::{RouteUrlResolver, StaticSegments, TimelineConfig, TimelineContext};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: drive-timeline <metadata.json> [--window START END] [--seconds N] [--speed S]";

/// Media downloaded per second of playback by the simulated player
const DOWNLOAD_RATE: f64 = 4.0;

struct Args {
    metadata: String,
    window: Option<TimeWindow>,
    seconds: f64,
    speed: f64,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut metadata = None;
    let mut window = None;
    let mut seconds = 30.0;
    let mut speed = 1.0;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--window" => {
                let start = args.next().context(USAGE)?.parse().context("Invalid window start")?;
                let end = args.next().context(USAGE)?.parse().context("Invalid window end")?;
                window = Some(TimeWindow::new(start, end));
            }
            "--seconds" => seconds = args.next().context(USAGE)?.parse().context("Invalid --seconds")?,
            "--speed" => speed = args.next().context(USAGE)?.parse().context("Invalid --speed")?,
            "-h" | "--help" => bail!(USAGE),
            _ if metadata.is_none() => metadata = Some(arg),
            _ => bail!("Unexpected argument {}\n{}", arg, USAGE),
        }
    }

    Ok(Args {
        metadata: metadata.context(USAGE)?,
        window,
        seconds,
        speed,
    })
}

fn format_time(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    let records = load_metadata(&args.metadata)?;
    let window = args
        .window
        .or_else(|| window_for(&records))
        .context("Segment metadata holds no segments")?;
    let dongle_id = records
        .first()
        .and_then(|r| r.canonical_route_name.split('|').next())
        .unwrap_or("unknown")
        .to_string();

    let routes = build_routes(&records, window.start);
    info!(
        "{} routes for {} between {} and {}",
        routes.len(),
        dongle_id,
        format_time(window.start),
        format_time(window.end)
    );
    for route in &routes {
        info!(
            "  {} at +{}s: {} segments, {:.1}s, {:.2} mi, {} events, video {:?}",
            route.id,
            route.offset / 1000,
            route.segment_count,
            route.duration as f64 / 1000.0,
            route.distance_miles,
            route.events.len(),
            route.video_available_between_offsets
        );
    }

    // every simulated source is as long as the longest route
    let media_duration = routes.iter().map(|r| r.duration).max().unwrap_or(0) as f64 / 1000.0;
    let player = SimulatedPlayer::new(media_duration).with_download_rate(DOWNLOAD_RATE);

    let config = TimelineConfig::load();
    let frame_ms = config.frame_interval_ms.max(1) as i64;
    let tick_ms = config.tick_interval_ms.max(1) as i64;

    let start = Utc::now().timestamp_millis();
    let mut ctx = TimelineContext::new_at(
        config,
        &dongle_id,
        window,
        player,
        Arc::new(StaticSegments::new(records)),
        Arc::new(RouteUrlResolver),
        start,
    )?;
    ctx.update_segments().await?;
    if let Some(first_offset) = ctx.routes().first().map(|r| r.offset) {
        ctx.dispatch_at(Action::Seek(first_offset as f64), start);
    }
    ctx.dispatch_at(Action::Play(args.speed), start);

    // simulated wall clock, stepped one frame at a time
    let end = start + (args.seconds * 1000.0) as i64;
    let mut now = start;
    let mut next_tick = start;
    let mut next_report = start;
    while now < end {
        now += frame_ms;
        ctx.player_mut().advance(frame_ms as f64 / 1000.0);

        if now >= next_tick {
            ctx.handle_tick(Tick::Reconcile, now).await;
            next_tick += tick_ms;
        }
        ctx.handle_tick(Tick::Frame, now).await;
        // let stream resolutions land
        tokio::task::yield_now().await;

        if now >= next_report {
            let offset = ctx.current_offset_at(now);
            let route = ctx.current_segment_at(offset).map(|s| format!("{} #{}", s.route_id(), s.segment));
            info!(
                "t+{:>5.1}s offset {:>9.1}s {:?} {:?} video {:.1}s/{:.1}s {}",
                (now - start) as f64 / 1000.0,
                offset / 1000.0,
                ctx.clock().status(),
                ctx.sync_status(),
                ctx.player().current_time(),
                ctx.player().seconds_loaded(),
                route.unwrap_or_else(|| "-".to_string())
            );
            if let Some(error) = ctx.video_error() {
                info!("  video error: {}", error);
            }
            next_report += 1_000;
        }
    }

    Ok(())
}
