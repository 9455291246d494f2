//! ==============================================================================
//! dataset.rs - tabular sensor log loader
//! ==============================================================================
//!
//! purpose:
//!     turns the exported sensor log (csv with a header row) into typed
//!     Readings. columns are selected by name, so identifier columns such as
//!     `_id` or `greenhouseId` and anything else unexpected are dropped.
//!
//! row policy:
//!     - unparsable timestamp -> row skipped, counted as bad_timestamps
//!     - missing / non-numeric / non-finite sensor value -> row skipped,
//!       counted as malformed
//!     neither is fatal here; training decides what an empty result means.
//!
//! relationships:
//!     - used by: training.rs, main.rs (align subcommand)
//!     - produces: domain::Reading
//!
//! ==============================================================================

use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};

use crate::domain::{AlignedRow, Reading};
use crate::error::{DatasetError, ReadingError};
use crate::features::FEATURE_NAMES;

const REQUIRED_COLUMNS: [&str; 5] = [
    "timestamp",
    "temperature",
    "humidity_air",
    "humidity_soil",
    "light",
];

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

const NAIVE_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// readings that survived parsing plus what was thrown away
#[derive(Debug, Default)]
pub struct LoadedReadings {
    pub readings: Vec<Reading>,
    pub rows_read: usize,
    pub bad_timestamps: usize,
    pub malformed: usize,
}

/// column positions resolved from the header row
struct Columns {
    timestamp: usize,
    temperature: usize,
    humidity_air: usize,
    humidity_soil: usize,
    light: usize,
}

impl Columns {
    fn resolve(header: &[String]) -> Result<Self, DatasetError> {
        let find = |name: &'static str| {
            header
                .iter()
                .position(|h| h.trim() == name)
                .ok_or(DatasetError::MissingColumn(name))
        };
        Ok(Self {
            timestamp: find(REQUIRED_COLUMNS[0])?,
            temperature: find(REQUIRED_COLUMNS[1])?,
            humidity_air: find(REQUIRED_COLUMNS[2])?,
            humidity_soil: find(REQUIRED_COLUMNS[3])?,
            light: find(REQUIRED_COLUMNS[4])?,
        })
    }
}

pub fn load_readings(path: &Path) -> Result<LoadedReadings, DatasetError> {
    let text = std::fs::read_to_string(path).map_err(|source| DatasetError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let loaded = parse_readings(&text)?;
    tracing::info!(
        path = %path.display(),
        rows = loaded.rows_read,
        kept = loaded.readings.len(),
        bad_timestamps = loaded.bad_timestamps,
        malformed = loaded.malformed,
        "loaded sensor log"
    );
    Ok(loaded)
}

/// parse csv text; only a missing header or a missing required column is an error
pub fn parse_readings(text: &str) -> Result<LoadedReadings, DatasetError> {
    // spreadsheet exports often lead with a utf-8 byte order mark
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut lines = text.lines();
    let header = parse_csv_line(lines.next().ok_or(DatasetError::Empty)?);
    let columns = Columns::resolve(&header)?;

    let mut loaded = LoadedReadings::default();
    for (line_no, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        loaded.rows_read += 1;
        match parse_record(&parse_csv_line(line), &columns) {
            Ok(reading) => loaded.readings.push(reading),
            Err(e) => {
                // header is line 1
                tracing::debug!(line = line_no + 2, error = %e, "skipping row");
                match e {
                    ReadingError::BadTimestamp { .. } => loaded.bad_timestamps += 1,
                    ReadingError::Malformed { .. } => loaded.malformed += 1,
                }
            }
        }
    }
    Ok(loaded)
}

fn parse_record(values: &[String], columns: &Columns) -> Result<Reading, ReadingError> {
    let cell = |idx: usize| values.get(idx).map(|s| s.trim()).unwrap_or("");

    let raw_ts = cell(columns.timestamp);
    let timestamp = parse_timestamp(raw_ts).ok_or_else(|| ReadingError::BadTimestamp {
        value: raw_ts.to_string(),
    })?;

    Ok(Reading {
        timestamp,
        temperature: parse_number("temperature", cell(columns.temperature))?,
        humidity_air: parse_number("humidity_air", cell(columns.humidity_air))?,
        humidity_soil: parse_number("humidity_soil", cell(columns.humidity_soil))?,
        light: parse_number("light", cell(columns.light))?,
    })
}

fn parse_number(field: &'static str, raw: &str) -> Result<f64, ReadingError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ReadingError::Malformed {
            field,
            value: raw.to_string(),
        })
}

/// accept the usual date-time spellings; naive values are taken as utc
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts);
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(ts) = DateTime::parse_from_str(raw, fmt) {
            return Some(ts);
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ts.and_utc().fixed_offset());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc().fixed_offset())
}

/// split one csv line, honouring double quotes and "" escapes
fn parse_csv_line(line: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(ch);
            }
        } else if ch == '"' {
            in_quotes = true;
        } else if ch == ',' {
            result.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    result.push(current);
    result
}

/// name of the label column for a given horizon, e.g. `temp_future_5m`
pub fn target_column(horizon_minutes: i64) -> String {
    format!("temp_future_{horizon_minutes}m")
}

/// render aligned rows as csv: timestamp, the six features, then the target
pub fn render_aligned(rows: &[AlignedRow], horizon_minutes: i64) -> String {
    let mut out = String::from("timestamp");
    for name in FEATURE_NAMES {
        out.push(',');
        out.push_str(name);
    }
    out.push(',');
    out.push_str(&target_column(horizon_minutes));
    out.push('\n');

    for row in rows {
        let f = &row.features;
        // writing into a String cannot fail
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{},{}",
            row.timestamp.to_rfc3339(),
            f.temperature,
            f.humidity_air,
            f.humidity_soil,
            f.light,
            f.hour,
            f.minute_of_day,
            row.target
        );
    }
    out
}

pub fn write_aligned(
    path: &Path,
    rows: &[AlignedRow],
    horizon_minutes: i64,
) -> Result<(), DatasetError> {
    std::fs::write(path, render_aligned(rows, horizon_minutes)).map_err(|source| {
        DatasetError::Write {
            path: path.to_path_buf(),
            source,
        }
    })
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    const HEADER: &str = "_id,greenhouseId,temperature,humidity_soil,humidity_air,light,ph,timestamp";

    #[test]
    fn selects_columns_by_name_and_drops_identifiers() {
        let text = format!(
            "{HEADER}\nabc,gh1,20.5,30,60,800,6.5,2024-05-01T10:00:00.000Z\n"
        );
        let loaded = parse_readings(&text).unwrap();
        assert_eq!(loaded.rows_read, 1);
        let r = &loaded.readings[0];
        assert_eq!(r.temperature, 20.5);
        assert_eq!(r.humidity_soil, 30.0);
        assert_eq!(r.humidity_air, 60.0);
        assert_eq!(r.light, 800.0);
        assert_eq!(r.timestamp.hour(), 10);
    }

    #[test]
    fn bad_rows_are_counted_not_fatal() {
        let text = format!(
            "{HEADER}\n\
             a,g,20,30,60,800,6.5,2024-05-01 10:00:00\n\
             b,g,20,30,60,800,6.5,not a date\n\
             c,g,,30,60,800,6.5,2024-05-01 10:05:00\n\
             d,g,20,wet,60,800,6.5,2024-05-01 10:10:00\n\
             e,g,NaN,30,60,800,6.5,2024-05-01 10:15:00\n\
             \n"
        );
        let loaded = parse_readings(&text).unwrap();
        assert_eq!(loaded.rows_read, 5);
        assert_eq!(loaded.readings.len(), 1);
        assert_eq!(loaded.bad_timestamps, 1);
        assert_eq!(loaded.malformed, 3);
    }

    #[test]
    fn byte_order_mark_before_first_column_is_ignored() {
        let text = "\u{feff}timestamp,temperature,humidity_air,humidity_soil,light\n\
                    2024-05-01 10:00:00,20.5,60,30,800\n";
        let loaded = parse_readings(text).unwrap();
        assert_eq!(loaded.readings.len(), 1);
        assert_eq!(loaded.readings[0].temperature, 20.5);
    }

    #[test]
    fn missing_required_column_is_an_error() {
        let err = parse_readings("timestamp,temperature,humidity_air,light\n").unwrap_err();
        assert!(matches!(err, DatasetError::MissingColumn("humidity_soil")));
        assert!(matches!(parse_readings(""), Err(DatasetError::Empty)));
    }

    #[test]
    fn timestamp_spellings() {
        let utc = parse_timestamp("2024-05-01T10:00:00Z").unwrap();
        assert_eq!(parse_timestamp("2024-05-01 10:00:00").unwrap(), utc);
        assert_eq!(parse_timestamp("2024-05-01T10:00:00.000").unwrap(), utc);
        assert_eq!(parse_timestamp("2024-05-01 10:00").unwrap(), utc);
        assert_eq!(parse_timestamp("2024-05-01T12:00:00+02:00").unwrap(), utc);
        assert_eq!(
            parse_timestamp("2024-05-01").unwrap(),
            parse_timestamp("2024-05-01T00:00:00Z").unwrap()
        );
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn quoted_cells_are_unwrapped() {
        assert_eq!(
            parse_csv_line(r#"a,"b,c","say ""hi""",d"#),
            vec!["a", "b,c", r#"say "hi""#, "d"]
        );
    }

    #[test]
    fn aligned_csv_has_named_target_column() {
        let rendered = render_aligned(&[], 5);
        assert_eq!(
            rendered.trim_end(),
            "timestamp,temperature,humidity_air,humidity_soil,light,hour,minute_of_day,temp_future_5m"
        );
    }
}
