//! Plugin options schema and validated configuration.
//!
//! # Responsibility
//! - Deserialize user options with a fixed schema (unknown fields rejected).
//! - Apply defaults and validate once, at plugin construction.
//!
//! # Invariants
//! - A `PluginConfig` is only obtainable through validation and is never
//!   mutated afterwards.
//! - The configured region always resolves in the lookup used to validate it.

use crate::encoding::{EncodingError, TextEncoding, DEFAULT_ENCODING_LABEL};
use crate::intensity::table::WORLD_REGION;
use crate::intensity::IntensityLookup;
use log::info;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Default artifact name.
pub const DEFAULT_OUTPUT_FILE: &str = "emissions-intensity-data.csv";
/// Default region code.
pub const DEFAULT_REGION: &str = WORLD_REGION;

/// Raw plugin options as supplied by the user.
///
/// Every field is optional; missing fields take defaults during validation.
/// The `outputName`/`region`/`emitFreshArtifactPerBuild` spellings are
/// accepted as aliases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginOptions {
    #[serde(default, rename = "outputFile", alias = "outputName")]
    pub output_file: Option<String>,
    /// Region code, e.g. `FIN`. Must exist in the intensity lookup.
    #[serde(default, rename = "country", alias = "region")]
    pub region: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
    /// Stage a fresh single-row artifact per build instead of appending to
    /// the persisted file after the build.
    #[serde(
        default,
        rename = "emitOneNewFile",
        alias = "emitFreshArtifactPerBuild"
    )]
    pub emit_one_new_file: Option<bool>,
}

impl PluginOptions {
    /// Parses options from a JSON object.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Overlays `other` on top of `self`; fields set in `other` win.
    pub fn merged_with(self, other: PluginOptions) -> PluginOptions {
        PluginOptions {
            output_file: other.output_file.or(self.output_file),
            region: other.region.or(self.region),
            encoding: other.encoding.or(self.encoding),
            emit_one_new_file: other.emit_one_new_file.or(self.emit_one_new_file),
        }
    }
}

/// Reads plugin options from a JSON file.
pub fn load_options_file(path: impl AsRef<Path>) -> Result<PluginOptions, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    PluginOptions::from_json_str(&raw)
}

/// Validated, immutable plugin configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginConfig {
    output_file: String,
    region: String,
    encoding: TextEncoding,
    emit_fresh_artifact_per_build: bool,
}

impl PluginConfig {
    /// Applies defaults and validates `options` against `lookup`.
    ///
    /// # Errors
    /// - Empty or path-like `outputFile`.
    /// - Unsupported `encoding` label.
    /// - `country` not present in `lookup`.
    pub fn from_options(
        options: PluginOptions,
        lookup: &dyn IntensityLookup,
    ) -> Result<Self, ConfigError> {
        let output_file = options
            .output_file
            .unwrap_or_else(|| DEFAULT_OUTPUT_FILE.to_string());
        validate_output_file(&output_file)?;

        let region = options
            .region
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        if !lookup.contains_region(&region) {
            return Err(ConfigError::UnknownRegion {
                region,
                source_name: lookup.source_name().to_string(),
            });
        }

        let encoding_label = options
            .encoding
            .unwrap_or_else(|| DEFAULT_ENCODING_LABEL.to_string());
        let encoding = TextEncoding::from_label(&encoding_label).map_err(ConfigError::Encoding)?;

        let config = Self {
            output_file,
            region,
            encoding,
            emit_fresh_artifact_per_build: options.emit_one_new_file.unwrap_or(false),
        };
        info!(
            "event=config_validated module=config status=ok output_file={} region={} encoding={} emit_fresh={}",
            config.output_file, config.region, config.encoding, config.emit_fresh_artifact_per_build
        );
        Ok(config)
    }

    /// Parses and validates a JSON options object in one step.
    pub fn from_json_str(json: &str, lookup: &dyn IntensityLookup) -> Result<Self, ConfigError> {
        Self::from_options(PluginOptions::from_json_str(json)?, lookup)
    }

    /// Configuration with every default applied.
    pub fn with_defaults(lookup: &dyn IntensityLookup) -> Result<Self, ConfigError> {
        Self::from_options(PluginOptions::default(), lookup)
    }

    pub fn output_file(&self) -> &str {
        &self.output_file
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    pub fn emit_fresh_artifact_per_build(&self) -> bool {
        self.emit_fresh_artifact_per_build
    }
}

fn validate_output_file(value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::EmptyOutputFile);
    }
    // Artifacts live directly under the output directory.
    if value.contains('/') || value.contains('\\') || value == "." || value == ".." {
        return Err(ConfigError::InvalidOutputFile(value.to_string()));
    }
    Ok(())
}

/// Configuration errors. Always fatal for plugin construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Parse(String),
    Io { path: PathBuf, reason: String },
    EmptyOutputFile,
    InvalidOutputFile(String),
    Encoding(EncodingError),
    UnknownRegion { region: String, source_name: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(reason) => write!(f, "invalid plugin options: {reason}"),
            Self::Io { path, reason } => {
                write!(f, "failed to read options file `{}`: {reason}", path.display())
            }
            Self::EmptyOutputFile => write!(f, "options.outputFile must not be empty"),
            Self::InvalidOutputFile(value) => write!(
                f,
                "options.outputFile must be a plain file name, got `{value}`"
            ),
            Self::Encoding(err) => write!(f, "options.encoding is invalid: {err}"),
            Self::UnknownRegion {
                region,
                source_name,
            } => write!(
                f,
                "invalid country: {region}; it must be a key of the {source_name}"
            ),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Encoding(err) => Some(err),
            _ => None,
        }
    }
}
