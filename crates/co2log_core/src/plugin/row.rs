//! Row producer shared by both sink strategies.

use crate::clock::Clock;
use crate::config::ConfigError;
use crate::intensity::IntensityLookup;
use crate::model::record::IntensityRecord;
use log::warn;

/// Builds timestamped intensity records for one configured region.
#[derive(Debug, Clone)]
pub struct RowProducer<L> {
    region: String,
    validated_intensity: f64,
    lookup: L,
}

impl<L: IntensityLookup> RowProducer<L> {
    /// Creates a producer, failing fast when `region` is unknown to `lookup`.
    pub fn new(region: impl Into<String>, lookup: L) -> Result<Self, ConfigError> {
        let region = region.into();
        let Some(validated_intensity) = lookup.resolve_intensity(&region) else {
            return Err(ConfigError::UnknownRegion {
                region,
                source_name: lookup.source_name().to_string(),
            });
        };
        Ok(Self {
            region,
            validated_intensity,
            lookup,
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    /// Looks up the current intensity and stamps it with `clock`.
    pub fn produce_row(&self, clock: &dyn Clock) -> IntensityRecord {
        let intensity = match self.lookup.resolve_intensity(&self.region) {
            Some(value) => value,
            None => {
                // Lookups are read-only; reaching this means the collaborator broke its contract.
                warn!(
                    "event=intensity_lookup module=plugin status=fallback region={} intensity={}",
                    self.region, self.validated_intensity
                );
                self.validated_intensity
            }
        };
        IntensityRecord::new(self.region.clone(), intensity, clock.now_ms())
    }
}
