//! Staged-output mapping for one build.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Named text blob holding zero or more serialized rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    name: String,
    content: String,
}

impl Artifact {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Number of newline-terminated rows.
    pub fn row_count(&self) -> usize {
        self.content.matches('\n').count()
    }
}

/// Build-scoped mapping from asset name to staged artifact.
///
/// `emit_asset` only inserts and `update_asset` only replaces, so callers
/// must branch on `contains` first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedOutputs {
    assets: BTreeMap<String, Artifact>,
}

impl StagedOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.assets.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Artifact> {
        self.assets.get(name)
    }

    /// Stages a new artifact.
    pub fn emit_asset(
        &mut self,
        name: &str,
        content: impl Into<String>,
    ) -> Result<(), StagingError> {
        if self.assets.contains_key(name) {
            return Err(StagingError::AlreadyStaged(name.to_string()));
        }
        self.assets
            .insert(name.to_string(), Artifact::new(name, content));
        Ok(())
    }

    /// Replaces the content of an already staged artifact.
    pub fn update_asset(
        &mut self,
        name: &str,
        content: impl Into<String>,
    ) -> Result<(), StagingError> {
        match self.assets.get_mut(name) {
            Some(artifact) => {
                artifact.content = content.into();
                Ok(())
            }
            None => Err(StagingError::NotStaged(name.to_string())),
        }
    }

    /// Iterates staged artifacts in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.assets.values()
    }
}

/// Staged-output mapping errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagingError {
    AlreadyStaged(String),
    NotStaged(String),
}

impl Display for StagingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyStaged(name) => write!(f, "asset already staged: {name}"),
            Self::NotStaged(name) => write!(f, "asset is not staged: {name}"),
        }
    }
}

impl Error for StagingError {}

#[cfg(test)]
mod tests {
    use super::{StagedOutputs, StagingError};

    #[test]
    fn emit_then_update_replaces_content() {
        let mut staged = StagedOutputs::new();
        staged.emit_asset("data.csv", "a\n").expect("first emit");
        staged.update_asset("data.csv", "a\nb\n").expect("update");

        let artifact = staged.get("data.csv").expect("staged artifact");
        assert_eq!(artifact.content(), "a\nb\n");
        assert_eq!(artifact.row_count(), 2);
        assert_eq!(staged.len(), 1);
    }

    #[test]
    fn emit_rejects_existing_and_update_rejects_missing() {
        let mut staged = StagedOutputs::new();
        staged.emit_asset("data.csv", "a\n").expect("first emit");
        assert_eq!(
            staged.emit_asset("data.csv", "b\n").unwrap_err(),
            StagingError::AlreadyStaged("data.csv".to_string())
        );
        assert_eq!(
            staged.update_asset("other.csv", "b\n").unwrap_err(),
            StagingError::NotStaged("other.csv".to_string())
        );
    }
}
