//! Intensity table implementations.
//!
//! The built-in table is a subset of the annual country averages that
//! `@tgwf/co2` publishes as `averageIntensity.data` (Ember yearly electricity
//! data, 2022 reporting year), rounded to whole gCO2e/kWh. It covers
//! the larger grids only. Any other code set, including the complete
//! `average-intensities` export, can be loaded as a JSON object of
//! `{"<region>": <intensity>}` with [`load_intensity_table`].

use super::IntensityLookup;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Region code of the global average row.
pub const WORLD_REGION: &str = "WORLD";

/// Built-in snapshot of annual average grid intensities in gCO2e/kWh.
///
/// Keys are ISO 3166-1 alpha-3 codes plus the `WORLD` and `EU` aggregates.
/// Sorted by key so lookups can binary search.
const AVERAGE_INTENSITIES: &[(&str, f64)] = &[
    ("ARG", 344.0),
    ("AUS", 549.0),
    ("AUT", 158.0),
    ("BEL", 167.0),
    ("BGR", 399.0),
    ("BRA", 98.0),
    ("CAN", 128.0),
    ("CHE", 46.0),
    ("CHL", 291.0),
    ("CHN", 582.0),
    ("COL", 259.0),
    ("CZE", 450.0),
    ("DEU", 381.0),
    ("DNK", 151.0),
    ("EGY", 470.0),
    ("ESP", 174.0),
    ("EST", 416.0),
    ("EU", 244.0),
    ("FIN", 82.0),
    ("FRA", 85.0),
    ("GBR", 257.0),
    ("GRC", 348.0),
    ("HRV", 206.0),
    ("HUN", 204.0),
    ("IDN", 676.0),
    ("IND", 713.0),
    ("IRL", 346.0),
    ("ISL", 28.0),
    ("ISR", 566.0),
    ("ITA", 372.0),
    ("JPN", 485.0),
    ("KEN", 72.0),
    ("KOR", 436.0),
    ("LTU", 161.0),
    ("LUX", 105.0),
    ("LVA", 123.0),
    ("MAR", 630.0),
    ("MEX", 423.0),
    ("MYS", 605.0),
    ("NGA", 523.0),
    ("NLD", 386.0),
    ("NOR", 29.0),
    ("NZL", 112.0),
    ("PAK", 440.0),
    ("PER", 261.0),
    ("PHL", 610.0),
    ("POL", 635.0),
    ("PRT", 165.0),
    ("ROU", 240.0),
    ("RUS", 441.0),
    ("SAU", 557.0),
    ("SGP", 470.0),
    ("SVK", 116.0),
    ("SVN", 231.0),
    ("SWE", 45.0),
    ("THA", 549.0),
    ("TUR", 413.0),
    ("UKR", 259.0),
    ("USA", 368.0),
    ("VNM", 475.0),
    (WORLD_REGION, 475.0),
    ("ZAF", 709.0),
];

/// Built-in average-intensity lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct AverageIntensityTable;

impl AverageIntensityTable {
    pub fn new() -> Self {
        Self
    }
}

impl IntensityLookup for AverageIntensityTable {
    fn resolve_intensity(&self, region: &str) -> Option<f64> {
        AVERAGE_INTENSITIES
            .binary_search_by(|(key, _)| (*key).cmp(region))
            .ok()
            .map(|index| AVERAGE_INTENSITIES[index].1)
    }

    fn regions(&self) -> Vec<String> {
        AVERAGE_INTENSITIES
            .iter()
            .map(|(key, _)| (*key).to_string())
            .collect()
    }

    fn source_name(&self) -> &str {
        "built-in average intensity table"
    }
}

/// Map-backed lookup for caller-supplied data.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct StaticIntensityTable {
    entries: BTreeMap<String, f64>,
}

impl StaticIntensityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, region: impl Into<String>, intensity: f64) -> Self {
        self.insert(region, intensity);
        self
    }

    pub fn insert(&mut self, region: impl Into<String>, intensity: f64) {
        self.entries.insert(region.into(), intensity);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for StaticIntensityTable {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (region, intensity) in iter {
            table.insert(region, intensity);
        }
        table
    }
}

impl IntensityLookup for StaticIntensityTable {
    fn resolve_intensity(&self, region: &str) -> Option<f64> {
        self.entries.get(region).copied()
    }

    fn regions(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    fn source_name(&self) -> &str {
        "static intensity table"
    }
}

impl StaticIntensityTable {
    /// Parses a JSON object mapping region codes to intensities.
    ///
    /// Rejects empty tables, empty keys and negative or non-finite values.
    pub fn from_json_str(json: &str) -> Result<Self, IntensityTableError> {
        let table: Self =
            serde_json::from_str(json).map_err(|err| IntensityTableError::Parse(err.to_string()))?;
        if table.is_empty() {
            return Err(IntensityTableError::Empty);
        }
        for (region, value) in &table.entries {
            if region.trim().is_empty() {
                return Err(IntensityTableError::EmptyRegion);
            }
            if !value.is_finite() || *value < 0.0 {
                return Err(IntensityTableError::InvalidIntensity {
                    region: region.clone(),
                    value: *value,
                });
            }
        }
        Ok(table)
    }
}

/// Reads an intensity table from a JSON file.
pub fn load_intensity_table(
    path: impl AsRef<Path>,
) -> Result<StaticIntensityTable, IntensityTableError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|err| IntensityTableError::Io {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    StaticIntensityTable::from_json_str(&raw)
}

/// Intensity table loading errors.
#[derive(Debug, Clone, PartialEq)]
pub enum IntensityTableError {
    Io { path: PathBuf, reason: String },
    Parse(String),
    Empty,
    EmptyRegion,
    InvalidIntensity { region: String, value: f64 },
}

impl Display for IntensityTableError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, reason } => write!(
                f,
                "failed to read intensity table `{}`: {reason}",
                path.display()
            ),
            Self::Parse(reason) => write!(f, "invalid intensity table: {reason}"),
            Self::Empty => write!(f, "intensity table must not be empty"),
            Self::EmptyRegion => write!(f, "intensity table contains an empty region code"),
            Self::InvalidIntensity { region, value } => {
                write!(f, "intensity for {region} must be a non-negative number, got {value}")
            }
        }
    }
}

impl Error for IntensityTableError {}

#[cfg(test)]
mod tests {
    use super::{
        load_intensity_table, AverageIntensityTable, IntensityTableError, StaticIntensityTable,
        AVERAGE_INTENSITIES, WORLD_REGION,
    };
    use crate::intensity::IntensityLookup;

    #[test]
    fn builtin_table_is_sorted_and_unique() {
        for pair in AVERAGE_INTENSITIES.windows(2) {
            assert!(pair[0].0 < pair[1].0, "{} must sort before {}", pair[0].0, pair[1].0);
        }
    }

    #[test]
    fn builtin_table_resolves_world_and_countries() {
        let table = AverageIntensityTable::new();
        assert_eq!(table.resolve_intensity(WORLD_REGION), Some(475.0));
        assert_eq!(table.resolve_intensity("FIN"), Some(82.0));
        assert!(table.regions().iter().all(|region| table.contains_region(region)));
    }

    #[test]
    fn builtin_table_is_case_sensitive() {
        let table = AverageIntensityTable::new();
        assert_eq!(table.resolve_intensity("fin"), None);
        assert_eq!(table.resolve_intensity("ATLANTIS"), None);
    }

    #[test]
    fn static_table_collects_entries() {
        let table: StaticIntensityTable = [("FIN", 82.0), ("WORLD", 475.0)].into_iter().collect();
        assert_eq!(table.len(), 2);
        assert_eq!(table.regions(), vec!["FIN".to_string(), "WORLD".to_string()]);
        assert_eq!(table.resolve_intensity("FIN"), Some(82.0));
        assert!(!table.contains_region("SWE"));
    }

    #[test]
    fn static_table_parses_json_object() {
        let table =
            StaticIntensityTable::from_json_str(r#"{"ALB": 24.0, "DZA": 634.0, "AGO": 174.0}"#)
                .expect("table should parse");
        assert_eq!(table.len(), 3);
        assert_eq!(table.resolve_intensity("DZA"), Some(634.0));
    }

    #[test]
    fn static_table_rejects_invalid_json_tables() {
        assert_eq!(
            StaticIntensityTable::from_json_str("{}").unwrap_err(),
            IntensityTableError::Empty
        );
        assert!(matches!(
            StaticIntensityTable::from_json_str(r#"{"ALB": -1.0}"#).unwrap_err(),
            IntensityTableError::InvalidIntensity { .. }
        ));
        assert!(matches!(
            StaticIntensityTable::from_json_str(r#"{"ALB": "low"}"#).unwrap_err(),
            IntensityTableError::Parse(_)
        ));
        assert_eq!(
            StaticIntensityTable::from_json_str(r#"{" ": 1.0}"#).unwrap_err(),
            IntensityTableError::EmptyRegion
        );
    }

    #[test]
    fn load_intensity_table_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_intensity_table(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, IntensityTableError::Io { .. }));
    }
}
