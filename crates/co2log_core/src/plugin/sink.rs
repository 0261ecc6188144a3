//! Sink coordinator: commits one row per build to one artifact.
//!
//! # Responsibility
//! - Fresh-artifact strategy: stage the row in the build's in-memory outputs.
//! - Persisted-append strategy: read-modify-write the file under the output
//!   directory after the build's own outputs were flushed.
//!
//! # Invariants
//! - Committed content is always previous content followed by the new row.
//! - The append completion callback runs exactly once on every path.
//! - Exists-check, read and write are separate steps. Two builds appending
//!   to one path at the same time can lose a row (last writer wins); no
//!   locking is attempted.

use crate::build::{StagedOutputs, StagingError};
use crate::encoding::TextEncoding;
use crate::fs::{OutputFileSystem, PersistenceError};
use log::{error, info};
use std::path::{Path, PathBuf};

/// Mutually exclusive commit strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkStrategy {
    /// Stage a row artifact at the pre-finalize hook.
    FreshArtifactPerBuild,
    /// Append to the persisted file at the post-finalize hook.
    PersistedAppend,
}

impl SinkStrategy {
    pub fn from_emit_fresh_flag(emit_fresh_artifact_per_build: bool) -> Self {
        if emit_fresh_artifact_per_build {
            Self::FreshArtifactPerBuild
        } else {
            Self::PersistedAppend
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FreshArtifactPerBuild => "fresh_artifact",
            Self::PersistedAppend => "persisted_append",
        }
    }
}

/// Result of the pre-finalize staging step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// Strategy is persisted-append; nothing staged.
    Skipped,
    /// New artifact staged with a single row.
    Emitted,
    /// Row appended to an artifact staged earlier in the same build.
    Appended { rows: usize },
}

/// Result of the post-finalize append, delivered through the completion callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Strategy is fresh-artifact; the filesystem was not touched.
    Skipped,
    Created { path: PathBuf },
    Appended { path: PathBuf, prior_rows: usize },
    /// Existing file could not be read; this build's row was dropped.
    ReadFailed(PersistenceError),
    /// Write failed; this build's row was dropped.
    WriteFailed(PersistenceError),
}

impl AppendOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Created { .. } | Self::Appended { .. })
    }
}

/// Steps of the persisted-append cycle.
enum AppendStep {
    CheckExists,
    Read,
    Write {
        content: String,
        prior_rows: Option<usize>,
    },
    Done(AppendOutcome),
}

/// Commits rows according to one fixed strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkCoordinator {
    output_file: String,
    encoding: TextEncoding,
    strategy: SinkStrategy,
}

impl SinkCoordinator {
    pub fn new(output_file: impl Into<String>, encoding: TextEncoding, strategy: SinkStrategy) -> Self {
        Self {
            output_file: output_file.into(),
            encoding,
            strategy,
        }
    }

    pub fn strategy(&self) -> SinkStrategy {
        self.strategy
    }

    pub fn output_file(&self) -> &str {
        &self.output_file
    }

    /// `output_dir/output_file`.
    pub fn target_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(&self.output_file)
    }

    /// Stages `row` in the build's outputs (fresh-artifact strategy).
    ///
    /// A second call in the same build appends to the artifact staged by the
    /// first instead of replacing it.
    pub fn stage_row(
        &self,
        staged: &mut StagedOutputs,
        row: &str,
    ) -> Result<StageOutcome, StagingError> {
        if self.strategy != SinkStrategy::FreshArtifactPerBuild {
            return Ok(StageOutcome::Skipped);
        }

        let existing = staged
            .get(&self.output_file)
            .map(|artifact| artifact.content().to_string());
        match existing {
            Some(existing) => {
                info!(
                    "event=row_stage module=sink status=ok mode=update asset={} note=hook_invoked_repeatedly",
                    self.output_file
                );
                let content = existing + row;
                let rows = content.matches('\n').count();
                staged.update_asset(&self.output_file, content)?;
                Ok(StageOutcome::Appended { rows })
            }
            None => {
                staged.emit_asset(&self.output_file, row)?;
                info!(
                    "event=row_stage module=sink status=ok mode=emit asset={}",
                    self.output_file
                );
                Ok(StageOutcome::Emitted)
            }
        }
    }

    /// Appends `row` to the persisted file (persisted-append strategy).
    ///
    /// `done` receives the outcome exactly once. Filesystem failures are
    /// logged and reported through `done`, never propagated.
    pub fn append_row<F>(&self, fs: &dyn OutputFileSystem, output_dir: &Path, row: &str, done: F)
    where
        F: FnOnce(AppendOutcome),
    {
        if self.strategy != SinkStrategy::PersistedAppend {
            done(AppendOutcome::Skipped);
            return;
        }

        let path = self.target_path(output_dir);
        let mut step = AppendStep::CheckExists;
        let outcome = loop {
            step = match step {
                AppendStep::CheckExists => {
                    if fs.exists(&path) {
                        AppendStep::Read
                    } else {
                        AppendStep::Write {
                            content: row.to_string(),
                            prior_rows: None,
                        }
                    }
                }
                AppendStep::Read => match fs.read_file(&path, self.encoding) {
                    Ok(existing) => AppendStep::Write {
                        prior_rows: Some(existing.matches('\n').count()),
                        content: existing + row,
                    },
                    Err(err) => {
                        error!(
                            "event=row_append module=sink status=error stage=read path={} error={}",
                            path.display(),
                            err
                        );
                        AppendStep::Done(AppendOutcome::ReadFailed(err))
                    }
                },
                AppendStep::Write {
                    content,
                    prior_rows,
                } => match fs.write_file(&path, &content, self.encoding) {
                    Ok(()) => match prior_rows {
                        Some(prior_rows) => {
                            info!(
                                "event=row_append module=sink status=ok mode=append path={} prior_rows={}",
                                path.display(),
                                prior_rows
                            );
                            AppendStep::Done(AppendOutcome::Appended {
                                path: path.clone(),
                                prior_rows,
                            })
                        }
                        None => {
                            info!(
                                "event=row_append module=sink status=ok mode=create path={}",
                                path.display()
                            );
                            AppendStep::Done(AppendOutcome::Created { path: path.clone() })
                        }
                    },
                    Err(err) => {
                        error!(
                            "event=row_append module=sink status=error stage=write path={} error={}",
                            path.display(),
                            err
                        );
                        AppendStep::Done(AppendOutcome::WriteFailed(err))
                    }
                },
                AppendStep::Done(outcome) => break outcome,
            };
        };
        done(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::{AppendOutcome, SinkCoordinator, SinkStrategy, StageOutcome};
    use crate::build::StagedOutputs;
    use crate::encoding::TextEncoding;
    use crate::fs::{MemoryFileSystem, PersistenceError};
    use std::path::Path;

    fn coordinator(strategy: SinkStrategy) -> SinkCoordinator {
        SinkCoordinator::new("data.csv", TextEncoding::Utf8, strategy)
    }

    fn append(
        sink: &SinkCoordinator,
        fs: &MemoryFileSystem,
        row: &str,
    ) -> (AppendOutcome, usize) {
        let mut outcomes = Vec::new();
        sink.append_row(fs, Path::new("/out"), row, |outcome| outcomes.push(outcome));
        let calls = outcomes.len();
        (outcomes.remove(0), calls)
    }

    #[test]
    fn stage_row_accumulates_within_one_build() {
        let sink = coordinator(SinkStrategy::FreshArtifactPerBuild);
        let mut staged = StagedOutputs::new();

        assert_eq!(sink.stage_row(&mut staged, "a\n").unwrap(), StageOutcome::Emitted);
        assert_eq!(
            sink.stage_row(&mut staged, "b\n").unwrap(),
            StageOutcome::Appended { rows: 2 }
        );
        assert_eq!(staged.get("data.csv").unwrap().content(), "a\nb\n");
    }

    #[test]
    fn stage_row_is_skipped_for_persisted_strategy() {
        let sink = coordinator(SinkStrategy::PersistedAppend);
        let mut staged = StagedOutputs::new();
        assert_eq!(sink.stage_row(&mut staged, "a\n").unwrap(), StageOutcome::Skipped);
        assert!(staged.is_empty());
    }

    #[test]
    fn append_row_creates_then_appends() {
        let sink = coordinator(SinkStrategy::PersistedAppend);
        let fs = MemoryFileSystem::new();
        let path = Path::new("/out/data.csv");

        let (outcome, calls) = append(&sink, &fs, "a\n");
        assert_eq!(calls, 1);
        assert_eq!(outcome, AppendOutcome::Created { path: path.to_path_buf() });

        let (outcome, calls) = append(&sink, &fs, "b\n");
        assert_eq!(calls, 1);
        assert_eq!(
            outcome,
            AppendOutcome::Appended {
                path: path.to_path_buf(),
                prior_rows: 1
            }
        );
        assert_eq!(fs.text(path).unwrap(), "a\nb\n");
    }

    #[test]
    fn read_failure_drops_row_and_signals_once() {
        let sink = coordinator(SinkStrategy::PersistedAppend);
        let fs = MemoryFileSystem::new();
        let path = Path::new("/out/data.csv");
        fs.insert_text(path, "a\n");
        fs.fail_reads_for(path);

        let (outcome, calls) = append(&sink, &fs, "b\n");
        assert_eq!(calls, 1);
        assert!(matches!(outcome, AppendOutcome::ReadFailed(PersistenceError::Read { .. })));
        assert!(!outcome.is_committed());
        assert_eq!(fs.text(path).unwrap(), "a\n");
        assert_eq!(fs.write_count(), 0);
    }

    #[test]
    fn write_failure_signals_once() {
        let sink = coordinator(SinkStrategy::PersistedAppend);
        let fs = MemoryFileSystem::new();
        fs.fail_writes_for("/out/data.csv");

        let (outcome, calls) = append(&sink, &fs, "a\n");
        assert_eq!(calls, 1);
        assert!(matches!(outcome, AppendOutcome::WriteFailed(_)));
        assert!(fs.bytes(Path::new("/out/data.csv")).is_none());
    }

    #[test]
    fn append_row_is_skipped_for_fresh_strategy() {
        let sink = coordinator(SinkStrategy::FreshArtifactPerBuild);
        let fs = MemoryFileSystem::new();
        let (outcome, calls) = append(&sink, &fs, "a\n");
        assert_eq!(calls, 1);
        assert_eq!(outcome, AppendOutcome::Skipped);
        assert_eq!(fs.write_count(), 0);
    }
}
