//! Output filesystem collaborator.
//!
//! # Responsibility
//! - Provide the `exists`/`read_file`/`write_file` primitives the persisted
//!   append strategy is built on.
//! - Apply the configured text encoding at the byte boundary.
//!
//! # Invariants
//! - `write_file` replaces the whole file; there is no append primitive and
//!   no locking, so concurrent read-modify-write cycles can lose rows.
//! - A failed `LocalFileSystem::write_file` leaves the previous file intact.
//! - Every failure is returned as a `PersistenceError`, never a panic.

use crate::encoding::TextEncoding;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tempfile::NamedTempFile;

/// Filesystem primitives used by the post-finalize hook.
pub trait OutputFileSystem {
    fn exists(&self, path: &Path) -> bool;
    fn read_file(&self, path: &Path, encoding: TextEncoding) -> Result<String, PersistenceError>;
    fn write_file(
        &self,
        path: &Path,
        content: &str,
        encoding: TextEncoding,
    ) -> Result<(), PersistenceError>;
}

impl<T: OutputFileSystem + ?Sized> OutputFileSystem for &T {
    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }

    fn read_file(&self, path: &Path, encoding: TextEncoding) -> Result<String, PersistenceError> {
        (**self).read_file(path, encoding)
    }

    fn write_file(
        &self,
        path: &Path,
        content: &str,
        encoding: TextEncoding,
    ) -> Result<(), PersistenceError> {
        (**self).write_file(path, content, encoding)
    }
}

/// `std::fs`-backed filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl OutputFileSystem for LocalFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_file(&self, path: &Path, encoding: TextEncoding) -> Result<String, PersistenceError> {
        let bytes = std::fs::read(path).map_err(|err| PersistenceError::read(path, err))?;
        encoding
            .decode(&bytes)
            .map_err(|err| PersistenceError::read(path, err))
    }

    fn write_file(
        &self,
        path: &Path,
        content: &str,
        encoding: TextEncoding,
    ) -> Result<(), PersistenceError> {
        let bytes = encoding
            .encode(content)
            .map_err(|err| PersistenceError::write(path, err))?;
        replace_file(path, |file| file.write_all(&bytes))
    }
}

/// Replaces `path` with whatever `fill` writes, without ever exposing a
/// partially written file.
///
/// Content goes to a temporary sibling first and is renamed over `path`
/// only after it was fully written and synced. On any failure the previous
/// file is left untouched and the temporary file is removed.
pub fn replace_file<F>(path: &Path, fill: F) -> Result<(), PersistenceError>
where
    F: FnOnce(&mut std::fs::File) -> std::io::Result<()>,
{
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|err| PersistenceError::write(path, err))?;

    let mut staged =
        NamedTempFile::new_in(parent).map_err(|err| PersistenceError::write(path, err))?;
    if let Ok(existing) = std::fs::metadata(path) {
        staged
            .as_file()
            .set_permissions(existing.permissions())
            .map_err(|err| PersistenceError::write(path, err))?;
    }
    fill(staged.as_file_mut()).map_err(|err| PersistenceError::write(path, err))?;
    staged
        .as_file()
        .sync_all()
        .map_err(|err| PersistenceError::write(path, err))?;
    staged
        .persist(path)
        .map_err(|err| PersistenceError::write(path, err.error))?;
    Ok(())
}

/// In-memory filesystem with injectable failures.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    files: BTreeMap<PathBuf, Vec<u8>>,
    failing_reads: BTreeSet<PathBuf>,
    failing_writes: BTreeSet<PathBuf>,
    writes: usize,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seeds a file with raw bytes.
    pub fn insert_bytes(&self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) {
        self.state().files.insert(path.into(), bytes.into());
    }

    /// Seeds a UTF-8 text file.
    pub fn insert_text(&self, path: impl Into<PathBuf>, content: &str) {
        self.insert_bytes(path, content.as_bytes().to_vec());
    }

    pub fn bytes(&self, path: &Path) -> Option<Vec<u8>> {
        self.state().files.get(path).cloned()
    }

    /// Returns file content decoded as UTF-8, lossily.
    pub fn text(&self, path: &Path) -> Option<String> {
        self.bytes(path)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Makes every subsequent read of `path` fail.
    pub fn fail_reads_for(&self, path: impl Into<PathBuf>) {
        self.state().failing_reads.insert(path.into());
    }

    /// Makes every subsequent write of `path` fail.
    pub fn fail_writes_for(&self, path: impl Into<PathBuf>) {
        self.state().failing_writes.insert(path.into());
    }

    /// Count of successful writes.
    pub fn write_count(&self) -> usize {
        self.state().writes
    }
}

impl OutputFileSystem for MemoryFileSystem {
    fn exists(&self, path: &Path) -> bool {
        self.state().files.contains_key(path)
    }

    fn read_file(&self, path: &Path, encoding: TextEncoding) -> Result<String, PersistenceError> {
        let state = self.state();
        if state.failing_reads.contains(path) {
            return Err(PersistenceError::read(path, "injected read failure"));
        }
        let bytes = state
            .files
            .get(path)
            .ok_or_else(|| PersistenceError::read(path, "no such file"))?;
        encoding
            .decode(bytes)
            .map_err(|err| PersistenceError::read(path, err))
    }

    fn write_file(
        &self,
        path: &Path,
        content: &str,
        encoding: TextEncoding,
    ) -> Result<(), PersistenceError> {
        let mut state = self.state();
        if state.failing_writes.contains(path) {
            return Err(PersistenceError::write(path, "injected write failure"));
        }
        let bytes = encoding
            .encode(content)
            .map_err(|err| PersistenceError::write(path, err))?;
        state.files.insert(path.to_path_buf(), bytes);
        state.writes += 1;
        Ok(())
    }
}

/// Filesystem failures during persisted append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    Read { path: PathBuf, reason: String },
    Write { path: PathBuf, reason: String },
}

impl PersistenceError {
    pub fn read(path: &Path, reason: impl Display) -> Self {
        Self::Read {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub fn write(path: &Path, reason: impl Display) -> Self {
        Self::Write {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Read { path, .. } | Self::Write { path, .. } => path,
        }
    }
}

impl Display for PersistenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, reason } => {
                write!(f, "failed to read `{}`: {reason}", path.display())
            }
            Self::Write { path, reason } => {
                write!(f, "failed to write `{}`: {reason}", path.display())
            }
        }
    }
}

impl Error for PersistenceError {}
