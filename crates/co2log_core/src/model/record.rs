//! Intensity record model and row codec.
//!
//! # Responsibility
//! - Define the canonical observation `(region, intensity, timestamp_ms)`.
//! - Serialize one record to exactly one comma-delimited row.
//! - Parse persisted rows back for read-only inspection.
//!
//! # Invariants
//! - Serialized form is `region,intensity,timestamp_ms\n`, no header, no quoting.
//! - Integral intensities keep one decimal digit (`82.0`).

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Field separator of the persisted row format.
pub const FIELD_SEPARATOR: char = ',';
/// Row terminator of the persisted row format.
pub const ROW_TERMINATOR: char = '\n';

/// One carbon-intensity observation.
///
/// Fields are private so a record cannot change after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct IntensityRecord {
    region: String,
    intensity: f64,
    timestamp_ms: i64,
}

impl IntensityRecord {
    pub fn new(region: impl Into<String>, intensity: f64, timestamp_ms: i64) -> Self {
        Self {
            region: region.into(),
            intensity,
            timestamp_ms,
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Average grid intensity in gCO2e/kWh.
    pub fn intensity(&self) -> f64 {
        self.intensity
    }

    /// Unix epoch milliseconds captured from the injected clock.
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    /// Serializes this record as one newline-terminated row.
    pub fn to_row(&self) -> String {
        format!(
            "{}{FIELD_SEPARATOR}{}{FIELD_SEPARATOR}{}{ROW_TERMINATOR}",
            self.region,
            format_intensity(self.intensity),
            self.timestamp_ms
        )
    }
}

impl Display for IntensityRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{FIELD_SEPARATOR}{}{FIELD_SEPARATOR}{}",
            self.region,
            format_intensity(self.intensity),
            self.timestamp_ms
        )
    }
}

/// Formats an intensity value for the row format.
///
/// Integral values keep a trailing `.0`; everything else uses the shortest
/// decimal form that round-trips.
pub fn format_intensity(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// Parses one row (with or without its trailing newline).
pub fn parse_row(line: &str) -> Result<IntensityRecord, RecordParseError> {
    let line = line.strip_suffix(ROW_TERMINATOR).unwrap_or(line);
    let line = line.strip_suffix('\r').unwrap_or(line);
    let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
    if fields.len() != 3 {
        return Err(RecordParseError::FieldCount {
            line: line.to_string(),
            found: fields.len(),
        });
    }

    let region = fields[0].trim();
    if region.is_empty() {
        return Err(RecordParseError::EmptyRegion);
    }
    let intensity = fields[1]
        .trim()
        .parse::<f64>()
        .map_err(|_| RecordParseError::InvalidIntensity(fields[1].to_string()))?;
    let timestamp_ms = fields[2]
        .trim()
        .parse::<i64>()
        .map_err(|_| RecordParseError::InvalidTimestamp(fields[2].to_string()))?;

    Ok(IntensityRecord::new(region, intensity, timestamp_ms))
}

/// Parses every row of an artifact in commit order.
///
/// Rows are 1-indexed in errors. Blank lines are rejected except for the
/// empty remainder after the final terminator.
pub fn parse_rows(content: &str) -> Result<Vec<IntensityRecord>, RecordParseError> {
    let mut records = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let record = parse_row(line).map_err(|err| RecordParseError::AtRow {
            row: index + 1,
            source: Box::new(err),
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Row parse errors for persisted artifacts.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordParseError {
    FieldCount { line: String, found: usize },
    EmptyRegion,
    InvalidIntensity(String),
    InvalidTimestamp(String),
    AtRow {
        row: usize,
        source: Box<RecordParseError>,
    },
}

impl Display for RecordParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FieldCount { line, found } => {
                write!(f, "expected 3 fields, found {found}: `{line}`")
            }
            Self::EmptyRegion => write!(f, "region field must not be empty"),
            Self::InvalidIntensity(value) => write!(f, "intensity is not a number: {value}"),
            Self::InvalidTimestamp(value) => {
                write!(f, "timestamp is not an integer: {value}")
            }
            Self::AtRow { row, source } => write!(f, "row {row}: {source}"),
        }
    }
}

impl Error for RecordParseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::AtRow { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{format_intensity, parse_row, parse_rows, IntensityRecord, RecordParseError};

    #[test]
    fn serializes_integral_intensity_with_one_decimal() {
        let record = IntensityRecord::new("FIN", 82.0, 1_700_000_000_000);
        assert_eq!(record.to_row(), "FIN,82.0,1700000000000\n");
    }

    #[test]
    fn serializes_fractional_intensity_in_shortest_form() {
        assert_eq!(format_intensity(475.12), "475.12");
        assert_eq!(format_intensity(0.5), "0.5");
    }

    #[test]
    fn display_omits_row_terminator() {
        let record = IntensityRecord::new("WORLD", 475.0, 7);
        assert_eq!(record.to_string(), "WORLD,475.0,7");
    }

    #[test]
    fn parses_serialized_row() {
        let record = parse_row("FIN,82.0,1700000000000\n").expect("row should parse");
        assert_eq!(record.region(), "FIN");
        assert_eq!(record.intensity(), 82.0);
        assert_eq!(record.timestamp_ms(), 1_700_000_000_000);
    }

    #[test]
    fn rejects_row_with_wrong_field_count() {
        let err = parse_row("FIN,82.0").expect_err("two fields must fail");
        assert!(matches!(err, RecordParseError::FieldCount { found: 2, .. }));
    }

    #[test]
    fn rejects_non_numeric_fields() {
        assert_eq!(
            parse_row("FIN,high,1").unwrap_err(),
            RecordParseError::InvalidIntensity("high".to_string())
        );
        assert_eq!(
            parse_row("FIN,82.0,soon").unwrap_err(),
            RecordParseError::InvalidTimestamp("soon".to_string())
        );
        assert_eq!(parse_row(",82.0,1").unwrap_err(), RecordParseError::EmptyRegion);
    }

    #[test]
    fn parse_rows_keeps_commit_order_and_reports_row_number() {
        let rows = parse_rows("FIN,82.0,1\nFIN,82.0,2\n").expect("rows should parse");
        let timestamps: Vec<i64> = rows.iter().map(IntensityRecord::timestamp_ms).collect();
        assert_eq!(timestamps, vec![1, 2]);

        let err = parse_rows("FIN,82.0,1\nbroken\n").expect_err("second row is broken");
        assert!(matches!(err, RecordParseError::AtRow { row: 2, .. }));
    }
}
