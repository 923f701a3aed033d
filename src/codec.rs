//! ==============================================================================
//! codec.rs - one reading per line of text
//! ==============================================================================
//!
//! purpose:
//!     defines the on-disk record format shared by every sensor log:
//!
//!         <timestamp> <value>\n
//!
//!     one reading per line, a single space between the fields. the value is
//!     written in rust's shortest round-trip float form ("5", "3.25", "inf").
//!     older files written with other float spellings ("+Inf", "1e+21") still
//!     decode.
//!
//! relationships:
//!     - used by: store.rs (formats appended lines, parses scanned lines)
//!     - used by: server.rs (rejects timestamps that would break the format)
//!
//! ordering:
//!     readings sort by timestamp text, byte-wise. ties keep file order.
//!
//! ==============================================================================

use std::cmp::Ordering;

use serde::Deserialize;

use crate::domain::Reading;
use crate::error::{MalformedLine, ValidationError};

/// render a reading as one log line, without the trailing newline
///
/// the timestamp must not contain whitespace; see [`validate`].
pub fn encode(reading: &Reading) -> String {
    format!("{} {}", reading.timestamp, reading.value)
}

/// parse one log line (without its newline)
///
/// the timestamp is everything before the first space, the value is the
/// next space-delimited field. anything after that field is ignored.
pub fn decode(line: &str) -> Result<Reading, MalformedLine> {
    let (timestamp, rest) = line.split_once(' ').ok_or_else(|| MalformedLine::MissingValue {
        line: line.to_string(),
    })?;

    let field = rest.split(' ').next().unwrap_or_default();
    let value = field
        .parse::<f64>()
        .map_err(|source| MalformedLine::InvalidValue {
            value: field.to_string(),
            source,
        })?;

    Ok(Reading::new(timestamp, value))
}

/// what to do with a line that [`decode`] rejects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedLinePolicy {
    /// keep the line with a value of 0.0 (legacy behaviour)
    #[default]
    Zero,
    /// leave the line out of the result
    Skip,
}

impl MalformedLinePolicy {
    /// the reading to keep for a malformed line, if any
    pub fn recover(self, line: &str) -> Option<Reading> {
        match self {
            MalformedLinePolicy::Zero => {
                let timestamp = line.split_once(' ').map(|(ts, _)| ts).unwrap_or(line);
                Some(Reading::new(timestamp, 0.0))
            }
            MalformedLinePolicy::Skip => None,
        }
    }
}

/// check that every reading can be written as a single well-formed line
pub fn validate(readings: &[Reading]) -> Result<(), ValidationError> {
    for (index, reading) in readings.iter().enumerate() {
        if reading.timestamp.is_empty() {
            return Err(ValidationError::EmptyTimestamp { index });
        }
        if reading.timestamp.chars().any(char::is_whitespace) {
            return Err(ValidationError::WhitespaceInTimestamp {
                index,
                timestamp: reading.timestamp.clone(),
            });
        }
    }
    Ok(())
}

/// total order used for reads: timestamp text only
pub fn by_timestamp(a: &Reading, b: &Reading) -> Ordering {
    a.timestamp.cmp(&b.timestamp)
}

/// sort readings by timestamp, keeping file order for equal timestamps
pub fn sort_readings(readings: &mut [Reading]) {
    // slice::sort_by is stable
    readings.sort_by(by_timestamp);
}
