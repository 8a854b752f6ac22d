use chrono::{DateTime, FixedOffset};

use crate::ArchiveError;

pub type Timestamp = DateTime<FixedOffset>;

/// Parse `frame` as a JSON object and read `field` as an RFC 3339 time.
pub fn parse_timestamp_field(frame: &[u8], field: &str, index: usize) -> Result<Timestamp, ArchiveError> {
    let err = |reason: String| ArchiveError::Timestamp { index, reason };

    let value: serde_json::Value =
        serde_json::from_slice(frame).map_err(|e| err(format!("frame is not JSON: {e}")))?;
    let raw = value
        .get(field)
        .ok_or_else(|| err(format!("missing field '{field}'")))?
        .as_str()
        .ok_or_else(|| err(format!("field '{field}' is not a string")))?;
    DateTime::parse_from_rfc3339(raw).map_err(|e| err(format!("invalid time '{raw}': {e}")))
}
