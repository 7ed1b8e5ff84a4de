use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const ENGAGE: &str = "engage";
pub const DISENGAGE: &str = "disengage";
pub const ALERT: &str = "alert";

/// Reason given to a planned disengagement with no matching alert
pub const PLANNED_DISENGAGEMENT: &str = "Planned disengagement";

/// Note attached to an event, shown alongside it on the timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub start_time_utc_millis: i64,
    pub end_time_utc_millis: i64,
    pub offset_millis: i64,
    pub offset_nanos_part: i64,
    pub canonical_segment_name: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub reason: String,
}

/// A drive event reported inside a segment's `events_json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event type (`engage`, `disengage`, `alert`, ...)
    #[serde(rename = "type")]
    pub kind: String,

    /// Offset from the start of the segment
    #[serde(default)]
    pub offset_millis: i64,

    #[serde(default)]
    pub offset_nanos: i64,

    /// Offset from the start of the route. Filled in from the segment
    /// number when the backend leaves it out.
    #[serde(default)]
    pub route_offset_millis: Option<i64>,

    #[serde(default)]
    pub route_offset_nanos: i64,

    /// Free-form payload
    #[serde(default)]
    pub data: Value,

    /// Wall-clock time of the event, UTC epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,

    /// Segment this event was reported in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_segment_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<Annotation>,
}

impl Event {
    /// Disengagement the driver planned, flagged by the device
    pub fn is_planned(&self) -> bool {
        self.data.get("is_planned").and_then(Value::as_bool).unwrap_or(false)
    }

    /// Alert asking the driver to take over
    pub fn takes_control(&self) -> bool {
        self.kind == ALERT
            && self
                .data
                .get("should_take_control")
                .is_some_and(|v| v.as_bool().unwrap_or(!v.is_null()))
    }

    /// Attach the planned-disengagement annotation with `reason`
    pub fn annotate_planned(&mut self, reason: String) {
        let timestamp = self.timestamp.unwrap_or(self.offset_millis);
        let id = format!("planned_disengage_{}", timestamp);
        self.annotation = Some(Annotation {
            start_time_utc_millis: timestamp,
            end_time_utc_millis: timestamp,
            offset_millis: self.offset_millis,
            offset_nanos_part: self.offset_nanos,
            canonical_segment_name: self.canonical_segment_name.clone(),
            kind: self.kind.clone(),
            reason,
        });
        self.id = Some(id);
    }

    pub fn is_engage(&self) -> bool {
        self.kind == ENGAGE
    }

    pub fn is_disengage(&self) -> bool {
        self.kind == DISENGAGE
    }

    /// Sort key: route offset millis, then nanos
    pub fn route_offset(&self) -> (i64, i64) {
        (self.route_offset_millis.unwrap_or(self.offset_millis), self.route_offset_nanos)
    }

    /// End of an engaged interval, set on `engage` events paired with a `disengage`
    pub fn engaged_until(&self) -> Option<i64> {
        self.data.get("end_route_offset_millis").and_then(Value::as_i64)
    }

    /// Copy the end of an engaged interval from the matching `disengage`
    fn close_with(&mut self, disengage: &Event) {
        let mut fields = match std::mem::take(&mut self.data) {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        fields.insert("end_offset_nanos".into(), disengage.offset_nanos.into());
        fields.insert("end_offset_millis".into(), disengage.offset_millis.into());
        fields.insert("end_route_offset_nanos".into(), disengage.route_offset_nanos.into());
        fields.insert("end_route_offset_millis".into(), disengage.route_offset().0.into());
        self.data = Value::Object(fields);

        // a planned disengagement keeps its annotation on the merged interval
        if self.annotation.is_none() && disengage.annotation.is_some() {
            self.annotation = disengage.annotation.clone();
            self.id = disengage.id.clone();
        }
    }
}

/// Sort a route's events and fold `engage`/`disengage` pairs into engaged intervals.
///
/// Each `disengage` closes the most recent open `engage` and is absorbed into it.
/// A `disengage` with no open `engage` is kept as-is.
pub fn pair_engagements(mut events: Vec<Event>) -> Vec<Event> {
    events.sort_by_key(Event::route_offset);

    let mut paired: Vec<Event> = Vec::with_capacity(events.len());
    let mut open_engage: Option<usize> = None;

    for event in events {
        if event.is_engage() {
            open_engage = Some(paired.len());
            paired.push(event);
        } else if event.is_disengage() {
            match open_engage.take() {
                Some(idx) => paired[idx].close_with(&event),
                None => paired.push(event),
            }
        } else {
            paired.push(event);
        }
    }

    paired
}

#[cfg(test)]
impl Event {
    /// Event at `route_offset_millis` in segment 0, where segment and route offsets agree
    pub(crate) fn new(kind: &str, route_offset_millis: i64) -> Self {
        Self {
            kind: kind.to_string(),
            offset_millis: route_offset_millis,
            offset_nanos: 0,
            route_offset_millis: Some(route_offset_millis),
            route_offset_nanos: 0,
            data: Value::Null,
            timestamp: None,
            canonical_segment_name: None,
            id: None,
            annotation: None,
        }
    }
}
