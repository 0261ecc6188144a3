//! Minimal in-process build driver.
//!
//! # Responsibility
//! - Register build hooks and dispatch the pre-finalize and post-finalize
//!   phases of one build.
//! - Flush staged outputs to the output directory between the two phases.
//!
//! # Invariants
//! - Hook names are unique within one pipeline.
//! - A post-finalize hook must signal completion before the next hook runs;
//!   a hook that returns without signalling fails the build.
//! - Hook-level persistence failures are reported, not escalated.

use crate::build::{StagedOutputs, StagingError};
use crate::clock::Clock;
use crate::encoding::TextEncoding;
use crate::fs::{OutputFileSystem, PersistenceError};
use crate::intensity::IntensityLookup;
use crate::plugin::{AppendOutcome, Co2Plugin, StageOutcome, PLUGIN_NAME};
use log::{error, info};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Instant;
use uuid::Uuid;

/// Read-only view of the running build handed to hooks.
pub struct BuildContext<'a> {
    pub build_id: Uuid,
    pub output_dir: &'a Path,
    pub fs: &'a dyn OutputFileSystem,
    pub clock: &'a dyn Clock,
}

/// Outcome reported by one hook for one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    Skipped,
    Staged(StageOutcome),
    Persisted(AppendOutcome),
}

/// Completion signal for the post-finalize phase.
pub type Completion<'a> = Box<dyn FnOnce(HookOutcome) + 'a>;

/// Build lifecycle hook.
pub trait BuildHook {
    fn name(&self) -> &str;

    /// Runs before staged outputs are flushed.
    fn pre_finalize(
        &self,
        _ctx: &BuildContext<'_>,
        _staged: &mut StagedOutputs,
    ) -> Result<HookOutcome, StagingError> {
        Ok(HookOutcome::Skipped)
    }

    /// Runs after staged outputs are flushed. Must call `done` exactly once.
    fn post_finalize(&self, _ctx: &BuildContext<'_>, done: Completion<'_>) {
        done(HookOutcome::Skipped);
    }
}

impl<L: IntensityLookup> BuildHook for Co2Plugin<L> {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn pre_finalize(
        &self,
        ctx: &BuildContext<'_>,
        staged: &mut StagedOutputs,
    ) -> Result<HookOutcome, StagingError> {
        match Co2Plugin::pre_finalize(self, staged, ctx.clock)? {
            StageOutcome::Skipped => Ok(HookOutcome::Skipped),
            outcome => Ok(HookOutcome::Staged(outcome)),
        }
    }

    fn post_finalize(&self, ctx: &BuildContext<'_>, done: Completion<'_>) {
        Co2Plugin::post_finalize(self, ctx.fs, ctx.output_dir, ctx.clock, |outcome| {
            match outcome {
                AppendOutcome::Skipped => done(HookOutcome::Skipped),
                outcome => done(HookOutcome::Persisted(outcome)),
            }
        });
    }
}

/// Which lifecycle phase produced a hook report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    PreFinalize,
    PostFinalize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookReport {
    pub hook: String,
    pub phase: HookPhase,
    pub outcome: HookOutcome,
}

/// Summary of one completed build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub build_id: Uuid,
    pub flushed: Vec<PathBuf>,
    pub hooks: Vec<HookReport>,
}

impl BuildReport {
    /// Non-skipped outcomes reported by `hook`.
    pub fn outcomes_for(&self, hook: &str) -> Vec<&HookOutcome> {
        self.hooks
            .iter()
            .filter(|report| report.hook == hook && report.outcome != HookOutcome::Skipped)
            .map(|report| &report.outcome)
            .collect()
    }
}

/// Ordered hook registry plus the build output directory.
pub struct BuildPipeline {
    output_dir: PathBuf,
    hooks: Vec<Box<dyn BuildHook>>,
    names: BTreeSet<String>,
}

impl BuildPipeline {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            hooks: Vec::new(),
            names: BTreeSet::new(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Registers a hook; names must be unique.
    pub fn register(&mut self, hook: Box<dyn BuildHook>) -> Result<(), PipelineError> {
        let name = hook.name().trim().to_string();
        if name.is_empty() {
            return Err(PipelineError::EmptyHookName);
        }
        if !self.names.insert(name.clone()) {
            return Err(PipelineError::DuplicateHook(name));
        }
        self.hooks.push(hook);
        Ok(())
    }

    /// Runs one build: pre-finalize hooks, flush, post-finalize hooks.
    pub fn run_build(
        &self,
        fs: &dyn OutputFileSystem,
        clock: &dyn Clock,
    ) -> Result<BuildReport, PipelineError> {
        let started_at = Instant::now();
        let ctx = BuildContext {
            build_id: Uuid::new_v4(),
            output_dir: &self.output_dir,
            fs,
            clock,
        };
        info!(
            "event=build_run module=pipeline status=start build_id={} output_dir={} hooks={}",
            ctx.build_id,
            self.output_dir.display(),
            self.hooks.len()
        );

        let mut reports = Vec::new();
        let mut staged = StagedOutputs::new();
        for hook in &self.hooks {
            let outcome = hook
                .pre_finalize(&ctx, &mut staged)
                .map_err(|err| PipelineError::Staging {
                    hook: hook.name().to_string(),
                    source: err,
                })?;
            reports.push(HookReport {
                hook: hook.name().to_string(),
                phase: HookPhase::PreFinalize,
                outcome,
            });
        }

        let flushed = self.flush(&ctx, &staged)?;

        for hook in &self.hooks {
            let mut signalled: Option<HookOutcome> = None;
            hook.post_finalize(
                &ctx,
                Box::new(|outcome: HookOutcome| signalled = Some(outcome)),
            );
            let Some(outcome) = signalled else {
                error!(
                    "event=build_run module=pipeline status=error build_id={} hook={} error_code=completion_missing",
                    ctx.build_id,
                    hook.name()
                );
                return Err(PipelineError::CompletionNotSignalled(hook.name().to_string()));
            };
            reports.push(HookReport {
                hook: hook.name().to_string(),
                phase: HookPhase::PostFinalize,
                outcome,
            });
        }

        info!(
            "event=build_run module=pipeline status=ok build_id={} flushed={} duration_ms={}",
            ctx.build_id,
            flushed.len(),
            started_at.elapsed().as_millis()
        );
        Ok(BuildReport {
            build_id: ctx.build_id,
            flushed,
            hooks: reports,
        })
    }

    fn flush(
        &self,
        ctx: &BuildContext<'_>,
        staged: &StagedOutputs,
    ) -> Result<Vec<PathBuf>, PipelineError> {
        let mut flushed = Vec::with_capacity(staged.len());
        for artifact in staged.iter() {
            let path = self.output_dir.join(artifact.name());
            if let Err(err) = ctx
                .fs
                .write_file(&path, artifact.content(), TextEncoding::Utf8)
            {
                error!(
                    "event=build_flush module=pipeline status=error build_id={} path={} error={}",
                    ctx.build_id,
                    path.display(),
                    err
                );
                return Err(PipelineError::Flush(err));
            }
            flushed.push(path);
        }
        Ok(flushed)
    }
}

/// Build driver errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    EmptyHookName,
    DuplicateHook(String),
    Staging { hook: String, source: StagingError },
    Flush(PersistenceError),
    CompletionNotSignalled(String),
}

impl Display for PipelineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyHookName => write!(f, "hook name must not be empty"),
            Self::DuplicateHook(name) => write!(f, "hook already registered: {name}"),
            Self::Staging { hook, source } => write!(f, "hook `{hook}` failed to stage: {source}"),
            Self::Flush(err) => write!(f, "failed to flush staged outputs: {err}"),
            Self::CompletionNotSignalled(name) => {
                write!(f, "hook `{name}` returned without signalling completion")
            }
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Staging { source, .. } => Some(source),
            Self::Flush(err) => Some(err),
            _ => None,
        }
    }
}
