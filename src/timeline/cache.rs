use crate::core::{Route, SegmentRecord, TimeWindow};
use crate::timeline::build_routes;

/// Routes built from the last segment metadata fetch, with the request that produced them
#[derive(Debug, Clone)]
pub struct SegmentCache {
    dongle_id: String,
    window: TimeWindow,
    routes: Vec<Route>,
}

impl SegmentCache {
    /// Build routes for `window` from freshly fetched records
    pub fn from_records(dongle_id: &str, window: TimeWindow, records: &[SegmentRecord]) -> Self {
        Self {
            dongle_id: dongle_id.to_string(),
            window,
            routes: build_routes(records, window.start),
        }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }

    pub fn dongle_id(&self) -> &str {
        &self.dongle_id
    }

    /// Check whether this fetch answers a request for `window` on `dongle_id`.
    ///
    /// Offsets are relative to the fetched window start, so the start must match exactly.
    pub fn covers(&self, dongle_id: &str, window: &TimeWindow) -> bool {
        self.dongle_id == dongle_id && self.window.start == window.start && self.window.covers(window)
    }
}
