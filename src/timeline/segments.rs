//! Segment index: folds per-minute segment metadata into routes and looks
//! routes up by window offset.

use crate::core::event::pair_engagements;
use crate::core::{Event, GpsPoint, OffsetRange, Route, SegmentRecord, SegmentView, SEGMENT_LENGTH};
use tracing::debug;

/// Build time-ordered routes from segment records in arrival order.
///
/// A new route starts whenever the canonical route name changes. Time gaps
/// between records of the same route do not split it.
pub fn build_routes(records: &[SegmentRecord], window_start: i64) -> Vec<Route> {
    let mut routes = Vec::new();
    let mut open: Option<RouteBuilder> = None;

    for record in records.iter().filter(|r| r.is_usable()) {
        let offset = record.offset(window_start);

        let continues = open
            .as_ref()
            .is_some_and(|builder| builder.route.id == record.canonical_route_name);
        if !continues {
            if let Some(builder) = open.take() {
                routes.push(builder.finish());
            }
            open = Some(RouteBuilder::start(record, offset));
        }

        if let Some(builder) = open.as_mut() {
            builder.push(record, offset);
        }
    }

    if let Some(builder) = open {
        routes.push(builder.finish());
    }

    debug!("Built {} routes from {} segment records", routes.len(), records.len());
    routes
}

/// Accumulates one route while folding over its records
struct RouteBuilder {
    route: Route,
    events: Vec<Event>,
    /// Window offset at which the current run of video started
    video_open_at: Option<i64>,
    /// Closed video runs, in window offsets
    video_ranges: Vec<OffsetRange>,
}

impl RouteBuilder {
    fn start(record: &SegmentRecord, offset: i64) -> Self {
        let url = record.url.as_deref().unwrap_or_default();

        Self {
            route: Route {
                id: record.canonical_route_name.clone(),
                url: route_url(url),
                offset: offset - record.segment_number() as i64 * SEGMENT_LENGTH,
                duration: 0,
                segment_count: 0,
                start_time: record.start_time_utc_millis.round() as i64,
                start_coord: record.start_coord().map(GpsPoint::from),
                end_coord: None,
                has_video: false,
                has_driver_camera: false,
                has_driver_camera_stream: false,
                hpgps: false,
                device_type: record.devicetype,
                events: Vec::new(),
                video_available_between_offsets: Vec::new(),
                video_start_offset: None,
                distance_miles: 0.0,
                camera_stream_seg_count: 0,
                driver_camera_stream_seg_count: 0,
            },
            events: Vec::new(),
            video_open_at: None,
            video_ranges: Vec::new(),
        }
    }

    fn push(&mut self, record: &SegmentRecord, offset: i64) {
        let has_video = record.has_video();
        match (has_video, self.video_open_at) {
            (true, None) => self.video_open_at = Some(offset),
            (false, Some(start)) => {
                self.video_ranges.push((start, offset));
                self.video_open_at = None;
            }
            _ => {}
        }

        let route = &mut self.route;
        route.has_video |= has_video;
        route.has_driver_camera |= record.has_driver_camera();
        route.has_driver_camera_stream |= record.has_driver_camera_stream();
        route.hpgps |= record.hpgps;
        route.duration = (offset - route.offset) + record.duration();
        route.segment_count = route.segment_count.max(record.segment_number() + 1);
        route.end_coord = record.end_coord().map(GpsPoint::from);
        route.distance_miles += record.length;
        route.camera_stream_seg_count += u32::from(has_video);
        route.driver_camera_stream_seg_count += u32::from(record.has_driver_camera_stream());

        self.events.extend(record.events());
    }

    fn finish(mut self) -> Route {
        let end = self.route.end();
        if let Some(start) = self.video_open_at.take() {
            self.video_ranges.push((start, end));
        }

        let base = self.route.offset;
        let ranges: Vec<OffsetRange> = self
            .video_ranges
            .into_iter()
            .map(|(start, end)| (start - base, end - base))
            .collect();

        Route {
            video_start_offset: ranges.first().map(|&(start, _)| start).filter(|&start| start > 0),
            video_available_between_offsets: ranges,
            events: pair_engagements(self.events),
            ..self.route
        }
    }
}

/// Strip a trailing segment number from a segment url
fn route_url(url: &str) -> String {
    match url.rsplit_once('/') {
        Some((base, last)) if !last.is_empty() && last.parse::<u64>().is_ok() => base.to_string(),
        _ => url.to_string(),
    }
}

/// Minute of the route containing `offset`, or `None` in a gap or past the end
pub fn current_segment(routes: &[Route], offset: f64) -> Option<SegmentView<'_>> {
    for route in routes {
        if route.offset as f64 > offset {
            break;
        }
        if route.contains(offset) {
            let segment = ((offset - route.offset as f64) / SEGMENT_LENGTH as f64).floor() as u32;
            return Some(route.segment_view(segment));
        }
    }
    None
}

/// First minute starting strictly after `offset`: the next minute of the
/// current route, or minute 0 of the following route.
pub fn next_segment(routes: &[Route], offset: f64) -> Option<SegmentView<'_>> {
    for route in routes {
        if route.offset as f64 > offset {
            return Some(route.segment_view(0));
        }
        if route.contains(offset) {
            let segment = ((offset - route.offset as f64) / SEGMENT_LENGTH as f64).floor() as u32;
            if segment + 1 < route.segment_count {
                return Some(route.segment_view(segment + 1));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::segment::tests::record;
    use crate::core::PROCESSED;

    const ROUTE: &str = "a2a0ccea32023010|2023-07-27--13-01-19";
    const OTHER: &str = "a2a0ccea32023010|2023-07-27--15-40-02";

    fn contiguous(route: &str, count: u32, start: i64) -> Vec<SegmentRecord> {
        (0..count)
            .map(|i| record(route, i, start + i as i64 * SEGMENT_LENGTH))
            .collect()
    }

    #[test]
    fn test_single_route() {
        let records = contiguous(ROUTE, 3, 10_000);
        let routes = build_routes(&records, 10_000);

        assert_eq!(routes.len(), 1);
        let route = &routes[0];
        assert_eq!(route.id, ROUTE);
        assert_eq!(route.offset, 0);
        assert_eq!(route.duration, 180_000);
        assert_eq!(route.segment_count, 3);
        assert_eq!(route.video_available_between_offsets, vec![(0, 180_000)]);
        assert_eq!(route.video_start_offset, None);
        assert!(route.has_video && route.has_driver_camera && route.has_driver_camera_stream);
        assert_eq!(route.camera_stream_seg_count, 3);
        assert!((route.distance_miles - 1.5).abs() < 1e-9);
        assert_eq!(route.url, "https://example.com/a2a0ccea32023010/2023-07-27--13-01-19");
    }

    #[test]
    fn test_video_gap_mid_route() {
        let mut records = contiguous(ROUTE, 3, 0);
        records[1].proc_camera = 20;
        let routes = build_routes(&records, 0);

        assert_eq!(
            routes[0].video_available_between_offsets,
            vec![(0, 60_000), (120_000, 180_000)]
        );
        assert!(routes[0].has_camera_at_offset(30_000));
        assert!(!routes[0].has_camera_at_offset(90_000));
    }

    #[test]
    fn test_video_off_at_end_stays_closed() {
        let mut records = contiguous(ROUTE, 3, 0);
        records[2].proc_camera = 20;
        let routes = build_routes(&records, 0);

        assert_eq!(routes[0].video_available_between_offsets, vec![(0, 120_000)]);
    }

    #[test]
    fn test_video_lead_in() {
        let mut records = contiguous(ROUTE, 3, 0);
        records[0].proc_camera = 0;
        let routes = build_routes(&records, 0);

        assert_eq!(routes[0].video_available_between_offsets, vec![(60_000, 180_000)]);
        assert_eq!(routes[0].video_start_offset, Some(60_000));
    }

    #[test]
    fn test_route_offset_aligned_to_segment_zero() {
        // first available segment is number 3
        let records: Vec<_> = (3..5).map(|i| record(ROUTE, i, 500_000 + i as i64 * SEGMENT_LENGTH)).collect();
        let routes = build_routes(&records, 500_000);

        assert_eq!(routes[0].offset, 0);
        assert_eq!(routes[0].duration, 5 * SEGMENT_LENGTH);
        assert_eq!(routes[0].segment_count, 5);
        assert_eq!(routes[0].video_available_between_offsets, vec![(180_000, 300_000)]);
    }

    #[test]
    fn test_unusable_records_filtered() {
        let mut records = contiguous(ROUTE, 2, 0);
        records[1].url = None;
        let mut pending = record(OTHER, 0, 600_000);
        pending.proc_log = 10;
        pending.proc_qlog = 10;
        records.push(pending);

        let routes = build_routes(&records, 0);
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].segment_count, 1);
    }

    #[test]
    fn test_route_id_change_splits() {
        let mut records = contiguous(ROUTE, 2, 0);
        records.extend(contiguous(OTHER, 2, 600_000));
        let routes = build_routes(&records, 0);

        assert_eq!(routes.len(), 2);
        assert_eq!(routes[1].offset, 600_000);
        assert_eq!(routes[1].duration, 120_000);
    }

    #[test]
    fn test_time_gap_does_not_split() {
        let mut records = contiguous(ROUTE, 1, 0);
        records.push(record(ROUTE, 5, 5 * SEGMENT_LENGTH));
        let routes = build_routes(&records, 0);

        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].duration, 6 * SEGMENT_LENGTH);
        assert_eq!(routes[0].segment_count, 6);
    }

    #[test]
    fn test_events_merged_and_paired() {
        let mut records = contiguous(ROUTE, 2, 0);
        records[0].events_json = Some(r#"[{"type":"engage","offset_millis":1000}]"#.to_string());
        records[1].events_json = Some(r#"[{"type":"disengage","offset_millis":5000}]"#.to_string());
        let routes = build_routes(&records, 0);

        let events = &routes[0].events;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].engaged_until(), Some(SEGMENT_LENGTH + 5000));
    }

    #[test]
    fn test_malformed_events_not_fatal() {
        let mut records = contiguous(ROUTE, 2, 0);
        records[0].events_json = Some("[{".to_string());
        let routes = build_routes(&records, 0);

        assert_eq!(routes.len(), 1);
        assert!(routes[0].events.is_empty());
    }

    #[test]
    fn test_driver_camera_flags_or_reduced() {
        let mut records = contiguous(ROUTE, 2, 0);
        records[0].proc_dcamera = -1;
        records[1].proc_dcamera = 10;
        records[0].proc_camera = PROCESSED;
        let routes = build_routes(&records, 0);

        assert!(routes[0].has_driver_camera);
        assert!(!routes[0].has_driver_camera_stream);
        assert_eq!(routes[0].driver_camera_stream_seg_count, 0);
    }

    #[test]
    fn test_current_segment_lookup() {
        let mut records = contiguous(ROUTE, 3, 0);
        records.extend(contiguous(OTHER, 2, 600_000));
        let routes = build_routes(&records, 0);

        let view = current_segment(&routes, 125_000.0).unwrap();
        assert_eq!(view.route_id(), ROUTE);
        assert_eq!(view.segment, 2);
        assert_eq!(view.start_offset(), 120_000);

        assert!(current_segment(&routes, 180_000.0).is_none());
        assert!(current_segment(&routes, 400_000.0).is_none());
        assert!(current_segment(&routes, 720_000.0).is_none());
        assert!(current_segment(&routes, -1.0).is_none());
    }

    #[test]
    fn test_next_segment_lookup() {
        let mut records = contiguous(ROUTE, 3, 0);
        records.extend(contiguous(OTHER, 2, 600_000));
        let routes = build_routes(&records, 0);

        let next = next_segment(&routes, 10_000.0).unwrap();
        assert_eq!(next.route_id(), ROUTE);
        assert_eq!(next.segment, 1);

        // in the gap: minute 0 of the following route
        let next = next_segment(&routes, 400_000.0).unwrap();
        assert_eq!(next.route_id(), OTHER);
        assert_eq!(next.segment, 0);
        assert_eq!(next.start_offset(), 600_000);

        // last minute of a route rolls over to the following route
        let next = next_segment(&routes, 150_000.0).unwrap();
        assert_eq!(next.route_id(), OTHER);

        assert!(next_segment(&routes, 700_000.0).is_none());
    }
}
