//! Plugin facade wiring configuration, row producer and sink coordinator.

use crate::build::{StagedOutputs, StagingError};
use crate::clock::Clock;
use crate::config::{ConfigError, PluginConfig, PluginOptions};
use crate::fs::OutputFileSystem;
use crate::intensity::IntensityLookup;
use crate::model::record::IntensityRecord;
use crate::plugin::row::RowProducer;
use crate::plugin::sink::{AppendOutcome, SinkCoordinator, SinkStrategy, StageOutcome};
use log::debug;
use std::path::Path;

/// Stable hook name used for registration and log events.
pub const PLUGIN_NAME: &str = "co2log";

/// Records one carbon-intensity row per build.
///
/// One instance may serve many builds; it holds no per-build state.
#[derive(Debug, Clone)]
pub struct Co2Plugin<L> {
    config: PluginConfig,
    producer: RowProducer<L>,
    sink: SinkCoordinator,
}

impl<L: IntensityLookup> Co2Plugin<L> {
    /// Validates `options` against `lookup` and builds the plugin.
    pub fn new(options: PluginOptions, lookup: L) -> Result<Self, ConfigError> {
        let config = PluginConfig::from_options(options, &lookup)?;
        Self::from_config(config, lookup)
    }

    /// Builds the plugin from an already validated config.
    ///
    /// The region is checked again because `lookup` may differ from the one
    /// the config was validated with.
    pub fn from_config(config: PluginConfig, lookup: L) -> Result<Self, ConfigError> {
        let producer = RowProducer::new(config.region(), lookup)?;
        let sink = SinkCoordinator::new(
            config.output_file(),
            config.encoding(),
            SinkStrategy::from_emit_fresh_flag(config.emit_fresh_artifact_per_build()),
        );
        Ok(Self {
            config,
            producer,
            sink,
        })
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn strategy(&self) -> SinkStrategy {
        self.sink.strategy()
    }

    pub fn sink(&self) -> &SinkCoordinator {
        &self.sink
    }

    pub fn produce_row(&self, clock: &dyn Clock) -> IntensityRecord {
        self.producer.produce_row(clock)
    }

    /// Pre-finalize hook: stages this build's row when the fresh-artifact
    /// strategy is active.
    pub fn pre_finalize(
        &self,
        staged: &mut StagedOutputs,
        clock: &dyn Clock,
    ) -> Result<StageOutcome, StagingError> {
        if self.strategy() != SinkStrategy::FreshArtifactPerBuild {
            debug!("event=pre_finalize module=plugin status=skip reason=persisted_append_strategy");
            return Ok(StageOutcome::Skipped);
        }
        let record = self.produce_row(clock);
        self.sink.stage_row(staged, &record.to_row())
    }

    /// Post-finalize hook: appends this build's row to the persisted file
    /// when the persisted-append strategy is active.
    ///
    /// `done` is invoked exactly once, including on skip and failure paths.
    pub fn post_finalize<F>(
        &self,
        fs: &dyn OutputFileSystem,
        output_dir: &Path,
        clock: &dyn Clock,
        done: F,
    ) where
        F: FnOnce(AppendOutcome),
    {
        if self.strategy() != SinkStrategy::PersistedAppend {
            debug!("event=post_finalize module=plugin status=skip reason=fresh_artifact_strategy");
            done(AppendOutcome::Skipped);
            return;
        }
        let record = self.produce_row(clock);
        self.sink.append_row(fs, output_dir, &record.to_row(), done);
    }
}

#[cfg(test)]
mod tests {
    use super::Co2Plugin;
    use crate::build::StagedOutputs;
    use crate::clock::ManualClock;
    use crate::config::{ConfigError, PluginOptions};
    use crate::fs::MemoryFileSystem;
    use crate::intensity::StaticIntensityTable;
    use crate::plugin::sink::{AppendOutcome, SinkStrategy, StageOutcome};
    use std::path::Path;

    fn table() -> StaticIntensityTable {
        StaticIntensityTable::new()
            .with("WORLD", 475.0)
            .with("FIN", 82.0)
    }

    fn options(region: &str, emit_fresh: bool) -> PluginOptions {
        PluginOptions {
            region: Some(region.to_string()),
            emit_one_new_file: Some(emit_fresh),
            ..PluginOptions::default()
        }
    }

    #[test]
    fn strategy_follows_emit_flag() {
        let fresh = Co2Plugin::new(options("FIN", true), table()).unwrap();
        let persisted = Co2Plugin::new(options("FIN", false), table()).unwrap();
        assert_eq!(fresh.strategy(), SinkStrategy::FreshArtifactPerBuild);
        assert_eq!(persisted.strategy(), SinkStrategy::PersistedAppend);
    }

    #[test]
    fn construction_fails_for_unknown_region() {
        let err = Co2Plugin::new(options("ATLANTIS", false), table()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownRegion { .. }));
    }

    #[test]
    fn inactive_hooks_do_nothing() {
        let fresh = Co2Plugin::new(options("FIN", true), table()).unwrap();
        let persisted = Co2Plugin::new(options("FIN", false), table()).unwrap();
        let clock = ManualClock::new(1);
        let fs = MemoryFileSystem::new();

        let mut staged = StagedOutputs::new();
        assert_eq!(
            persisted.pre_finalize(&mut staged, &clock).unwrap(),
            StageOutcome::Skipped
        );
        assert!(staged.is_empty());

        let mut signals = 0;
        fresh.post_finalize(&fs, Path::new("/out"), &clock, |outcome| {
            signals += 1;
            assert_eq!(outcome, AppendOutcome::Skipped);
        });
        assert_eq!(signals, 1);
        assert_eq!(fs.write_count(), 0);
    }
}
