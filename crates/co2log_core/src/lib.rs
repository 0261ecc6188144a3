//! Core library for co2log.
//! Records one estimated carbon-intensity row per build, either as a freshly
//! staged artifact or appended to a persisted log.

pub mod build;
pub mod clock;
pub mod config;
pub mod encoding;
pub mod fs;
pub mod intensity;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod plugin;

pub use build::{Artifact, StagedOutputs, StagingError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{load_options_file, ConfigError, PluginConfig, PluginOptions};
pub use encoding::{EncodingError, TextEncoding};
pub use fs::{LocalFileSystem, MemoryFileSystem, OutputFileSystem, PersistenceError};
pub use intensity::{
    load_intensity_table, AverageIntensityTable, IntensityLookup, IntensityTableError,
    StaticIntensityTable,
};
pub use logging::{default_log_level, init_logging, init_stderr_logging, logging_status};
pub use model::record::{parse_row, parse_rows, IntensityRecord, RecordParseError};
pub use pipeline::{
    BuildContext, BuildHook, BuildPipeline, BuildReport, Completion, HookOutcome, HookPhase,
    HookReport, PipelineError,
};
pub use plugin::{
    AppendOutcome, Co2Plugin, RowProducer, SinkCoordinator, SinkStrategy, StageOutcome,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
