use crate::core::event::PLANNED_DISENGAGEMENT;
use crate::core::{Event, SEGMENT_LENGTH, PROCESSED};
use serde_json::Value;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Per-minute segment metadata as reported by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRecord {
    /// `<dongle>|<route date>--<segment number>`
    pub canonical_name: String,

    /// `<dongle>|<route date>`
    pub canonical_route_name: String,

    /// Base URL of the uploaded segment, absent until uploaded
    #[serde(default)]
    pub url: Option<String>,

    pub start_time_utc_millis: f64,
    pub end_time_utc_millis: f64,

    #[serde(default)]
    pub start_lat: Option<f64>,
    #[serde(default)]
    pub start_lng: Option<f64>,
    #[serde(default)]
    pub end_lat: Option<f64>,
    #[serde(default)]
    pub end_lng: Option<f64>,

    /// Processing status of the road camera stream
    #[serde(default = "unprocessed")]
    pub proc_camera: i32,

    /// Processing status of the driver camera stream, negative when there is none
    #[serde(default = "unprocessed")]
    pub proc_dcamera: i32,

    #[serde(default = "unprocessed")]
    pub proc_log: i32,

    #[serde(default = "unprocessed")]
    pub proc_qlog: i32,

    /// JSON encoded event list
    #[serde(default)]
    pub events_json: Option<String>,

    /// Distance traveled in miles
    #[serde(default)]
    pub length: f64,

    #[serde(default)]
    pub devicetype: Option<i64>,

    #[serde(default)]
    pub hpgps: bool,
}

fn unprocessed() -> i32 {
    -1
}

impl SegmentRecord {
    /// Segment number within its route, parsed from the canonical name
    pub fn segment_number(&self) -> u32 {
        self.canonical_name
            .rsplit("--")
            .next()
            .and_then(|n| n.parse().ok())
            .unwrap_or(0)
    }

    /// Start of this segment relative to `window_start`
    pub fn offset(&self, window_start: i64) -> i64 {
        self.start_time_utc_millis.round() as i64 - window_start
    }

    pub fn duration(&self) -> i64 {
        (self.end_time_utc_millis - self.start_time_utc_millis).round() as i64
    }

    pub fn has_video(&self) -> bool {
        self.proc_camera == PROCESSED
    }

    pub fn has_driver_camera(&self) -> bool {
        self.proc_dcamera >= 0
    }

    pub fn has_driver_camera_stream(&self) -> bool {
        self.proc_dcamera == PROCESSED
    }

    /// Either the full log or the quick log has been processed
    pub fn has_processed_log(&self) -> bool {
        self.proc_log == PROCESSED || self.proc_qlog == PROCESSED
    }

    /// Uploaded and processed far enough to take part in a route
    pub fn is_usable(&self) -> bool {
        self.url.as_deref().is_some_and(|url| !url.is_empty()) && self.has_processed_log()
    }

    pub fn start_coord(&self) -> Option<(f64, f64)> {
        Some((self.start_lat?, self.start_lng?))
    }

    pub fn end_coord(&self) -> Option<(f64, f64)> {
        Some((self.end_lat?, self.end_lng?))
    }

    /// Decode `events_json`, tagging each event with its segment and wall-clock time.
    ///
    /// Malformed JSON yields no events.
    pub fn events(&self) -> Vec<Event> {
        let Some(raw) = self.events_json.as_deref() else {
            return Vec::new();
        };

        let events = match serde_json::from_str::<Option<Vec<Event>>>(raw) {
            Ok(events) => events.unwrap_or_default(),
            Err(e) => {
                warn!("Malformed events for segment {}: {}", self.canonical_name, e);
                return Vec::new();
            }
        };

        let segment_start = self.segment_number() as i64 * SEGMENT_LENGTH;
        let mut events: Vec<Event> = events
            .into_iter()
            .map(|mut event| {
                event.timestamp = Some(self.start_time_utc_millis.round() as i64 + event.offset_millis);
                event.canonical_segment_name = Some(self.canonical_name.clone());
                if event.route_offset_millis.is_none() {
                    event.route_offset_millis = Some(segment_start + event.offset_millis);
                }
                event
            })
            .collect();

        // (offset, text) of every take-control alert in this segment
        let alerts: Vec<(i64, Option<String>)> = events
            .iter()
            .filter(|e| e.takes_control())
            .map(|e| {
                let text = e.data.get("alertText2").and_then(Value::as_str).map(str::to_string);
                (e.offset_millis, text)
            })
            .collect();

        for event in events.iter_mut().filter(|e| e.is_planned()) {
            let nearest = alerts
                .iter()
                .min_by_key(|(offset, _)| (offset - event.offset_millis).abs());
            let reason = match nearest {
                Some((_, Some(text))) => text.clone(),
                Some((_, None)) => PLANNED_DISENGAGEMENT.to_string(),
                None => {
                    warn!(
                        "No alert for planned disengagement at {}ms in {}",
                        event.offset_millis, self.canonical_name
                    );
                    PLANNED_DISENGAGEMENT.to_string()
                }
            };
            event.annotate_planned(reason);
        }

        events
    }
}
