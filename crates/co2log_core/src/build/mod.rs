//! In-memory build outputs.
//!
//! Staged artifacts exist only for the duration of one build and are flushed
//! to disk by the pipeline after every pre-finalize hook has run.

pub mod staged;

pub use staged::{Artifact, StagedOutputs, StagingError};
