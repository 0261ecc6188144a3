//! Region intensity lookup contracts.
//!
//! # Responsibility
//! - Define the read-only lookup collaborator consulted by config validation
//!   and by the row producer.
//! - Ship a built-in average-intensity snapshot plus a map-backed table.
//!
//! # Invariants
//! - Lookups are exact and case-sensitive; no fuzzy matching or fallbacks.
//! - A lookup never mutates; repeated calls for one key return one value.

pub mod table;

pub use table::{
    load_intensity_table, AverageIntensityTable, IntensityTableError, StaticIntensityTable,
};

/// Read-only mapping from a region code to a carbon intensity (gCO2e/kWh).
pub trait IntensityLookup {
    /// Returns the intensity for `region`, or `None` when the key is unknown.
    fn resolve_intensity(&self, region: &str) -> Option<f64>;

    /// Returns every known region code in ascending order.
    fn regions(&self) -> Vec<String>;

    /// Short label used in diagnostics.
    fn source_name(&self) -> &str {
        "intensity lookup"
    }

    fn contains_region(&self, region: &str) -> bool {
        self.resolve_intensity(region).is_some()
    }
}

impl<T: IntensityLookup + ?Sized> IntensityLookup for &T {
    fn resolve_intensity(&self, region: &str) -> Option<f64> {
        (**self).resolve_intensity(region)
    }

    fn regions(&self) -> Vec<String> {
        (**self).regions()
    }

    fn source_name(&self) -> &str {
        (**self).source_name()
    }
}

impl<T: IntensityLookup + ?Sized> IntensityLookup for Box<T> {
    fn resolve_intensity(&self, region: &str) -> Option<f64> {
        (**self).resolve_intensity(region)
    }

    fn regions(&self) -> Vec<String> {
        (**self).regions()
    }

    fn source_name(&self) -> &str {
        (**self).source_name()
    }
}

impl<T: IntensityLookup + ?Sized> IntensityLookup for std::sync::Arc<T> {
    fn resolve_intensity(&self, region: &str) -> Option<f64> {
        (**self).resolve_intensity(region)
    }

    fn regions(&self) -> Vec<String> {
        (**self).regions()
    }

    fn source_name(&self) -> &str {
        (**self).source_name()
    }
}
