use anyhow::{Context, Result};
use crate::core::{SegmentRecord, TimeWindow};
use crate::error::TimelineError;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Segment metadata as served by the backend: wrapped or a bare list
#[derive(Deserialize)]
#[serde(untagged)]
enum MetadataPayload {
    Wrapped { segments: Vec<SegmentRecord> },
    Bare(Vec<SegmentRecord>),
}

/// Decode a segment metadata response body
pub fn parse_metadata(data: &[u8]) -> std::result::Result<Vec<SegmentRecord>, TimelineError> {
    let payload: MetadataPayload = serde_json::from_slice(data)?;
    let records = match payload {
        MetadataPayload::Wrapped { segments } => segments,
        MetadataPayload::Bare(segments) => segments,
    };
    Ok(records)
}

/// Load segment metadata from a JSON file
pub fn load_metadata(path: &str) -> Result<Vec<SegmentRecord>> {
    let data = std::fs::read(Path::new(path))
        .with_context(|| format!("Failed to read segment metadata from {}", path))?;
    let records = parse_metadata(&data)
        .with_context(|| format!("Failed to parse segment metadata in {}", path))?;

    debug!("Loaded {} segment records from {}", records.len(), path);
    Ok(records)
}

/// Smallest window holding every record, `None` when there are none
pub fn window_for(records: &[SegmentRecord]) -> Option<TimeWindow> {
    let start = records
        .iter()
        .map(|r| r.start_time_utc_millis.round() as i64)
        .min()?;
    let end = records
        .iter()
        .map(|r| r.end_time_utc_millis.round() as i64)
        .max()?;
    Some(TimeWindow::new(start, end))
}
