use serde::{Deserialize, Serialize};

/// a single observation from one sensor
///
/// the timestamp is opaque text and is only ever compared lexicographically,
/// so callers are expected to send a sortable format such as ISO-8601
/// (e.g. "2024-01-02T10:00:00Z"). no calendar parsing happens anywhere.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Reading {
    /// sortable timestamp text, no whitespace
    pub timestamp: String,

    /// observed value, stored as-is (no range or finiteness check)
    pub value: f64,
}

impl Reading {
    pub fn new(timestamp: impl Into<String>, value: f64) -> Self {
        Self {
            timestamp: timestamp.into(),
            value,
        }
    }
}

/// readings for one sensor, as posted by a node or returned to a client
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ReadingBatch {
    /// target sensor; also names the log file on disk
    pub sensor_id: u32,

    /// readings in submission order (writes) or timestamp order (reads)
    #[serde(default)]
    pub readings: Vec<Reading>,
}

impl ReadingBatch {
    pub fn new(sensor_id: u32, readings: Vec<Reading>) -> Self {
        Self { sensor_id, readings }
    }

    /// a batch with no readings, what a never-written sensor reads as
    pub fn empty(sensor_id: u32) -> Self {
        Self::new(sensor_id, Vec::new())
    }
}
