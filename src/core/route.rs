use crate::core::{Event, SEGMENT_LENGTH};
use serde::Serialize;

/// `[start, end]` in milliseconds relative to the start of a route
pub type OffsetRange = (i64, i64);

/// GPS coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GpsPoint {
    pub lat: f64,
    pub lng: f64,
}

impl From<(f64, f64)> for GpsPoint {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self { lat, lng }
    }
}

/// A contiguous drive made of one or more one-minute segments
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    /// Canonical route name, `<dongle>|<route date>`
    pub id: String,

    /// Base URL shared by the route's segments
    pub url: String,

    /// Start of segment 0 relative to the window start, in milliseconds
    pub offset: i64,

    /// Milliseconds from `offset` to the end of the last segment
    pub duration: i64,

    pub segment_count: u32,

    /// Wall-clock start of the first available segment
    pub start_time: i64,

    pub start_coord: Option<GpsPoint>,
    pub end_coord: Option<GpsPoint>,

    pub has_video: bool,
    pub has_driver_camera: bool,
    pub has_driver_camera_stream: bool,
    pub hpgps: bool,
    pub device_type: Option<i64>,

    /// Sorted events with engage/disengage pairs folded together
    pub events: Vec<Event>,

    /// Sub-ranges of the route where the road camera stream exists
    pub video_available_between_offsets: Vec<OffsetRange>,

    /// Lead-in before video becomes available, when the log starts first
    pub video_start_offset: Option<i64>,

    pub distance_miles: f64,
    pub camera_stream_seg_count: u32,
    pub driver_camera_stream_seg_count: u32,
}

impl Route {
    /// End of the route relative to the window start
    pub fn end(&self) -> i64 {
        self.offset + self.duration
    }

    /// Check whether a window offset falls inside `[offset, offset + duration)`
    pub fn contains(&self, offset: f64) -> bool {
        self.offset as f64 <= offset && offset < self.end() as f64
    }

    /// Check whether video is available at a route-relative offset
    pub fn has_camera_at_offset(&self, route_offset: i64) -> bool {
        self.video_available_between_offsets
            .iter()
            .any(|&(start, end)| route_offset >= start && route_offset <= end)
    }

    /// Minute `segment` of this route
    pub fn segment_view(&self, segment: u32) -> SegmentView<'_> {
        SegmentView { route: self, segment }
    }
}

/// One minute of a route, as looked up by offset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentView<'a> {
    pub route: &'a Route,
    pub segment: u32,
}

impl<'a> SegmentView<'a> {
    pub fn route_id(&self) -> &'a str {
        &self.route.id
    }

    pub fn url(&self) -> &'a str {
        &self.route.url
    }

    /// Start of the containing route relative to the window start
    pub fn route_offset(&self) -> i64 {
        self.route.offset
    }

    /// Start of this minute relative to the window start
    pub fn start_offset(&self) -> i64 {
        self.route.offset + self.segment as i64 * SEGMENT_LENGTH
    }
}
