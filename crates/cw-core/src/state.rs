//! Per-plugin severity state.
//!
//! The dispatcher records the last severity each check reported so the next
//! run can tell whether anything changed. The default store keeps one small
//! file per plugin under a state directory.

use crate::event::Severity;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from reading or writing severity state.
#[derive(Error, Debug)]
pub enum StateError {
    /// The state directory is missing or not writable.
    #[error("state directory {0}: no such directory, or unwritable")]
    Unusable(PathBuf),

    /// Plugin name cannot be used as a state file name.
    #[error("invalid plugin name for state file: {0:?}")]
    InvalidPlugin(String),

    /// Underlying filesystem failure.
    #[error("state file i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage for the last severity observed per plugin.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Verifies the store can be written to. Called before any delivery so a
    /// broken store aborts the dispatch instead of alerting with a wrong
    /// classification.
    async fn ensure_usable(&self) -> Result<(), StateError>;

    /// Returns the recorded state for a plugin, or `None` on first run.
    async fn read(&self, plugin: &str) -> Result<Option<String>, StateError>;

    /// Records the current severity for a plugin.
    async fn write(&self, plugin: &str, severity: &Severity) -> Result<(), StateError>;
}

/// File-per-plugin state store.
///
/// Concurrent runs of the same plugin are last-writer-wins; checks run once
/// per interval so overlap is a misconfiguration, and the damage is bounded
/// to one misclassified transition.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    /// Creates a store rooted at the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the state directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn state_file(&self, plugin: &str) -> Result<PathBuf, StateError> {
        // Plugin names come from argv[0] or a caller override; anything that
        // could escape the state directory is rejected outright.
        if plugin.is_empty()
            || plugin == "."
            || plugin == ".."
            || plugin.contains('/')
            || plugin.contains('\\')
        {
            return Err(StateError::InvalidPlugin(plugin.to_string()));
        }
        Ok(self.dir.join(plugin))
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn ensure_usable(&self) -> Result<(), StateError> {
        let meta = tokio::fs::metadata(&self.dir)
            .await
            .map_err(|_| StateError::Unusable(self.dir.clone()))?;
        if !meta.is_dir() {
            return Err(StateError::Unusable(self.dir.clone()));
        }

        // Writability can't be read off the metadata portably; probe with a
        // throwaway file instead.
        let probe = self.dir.join(".checkward-write-probe");
        match tokio::fs::write(&probe, b"").await {
            Ok(()) => {
                let _ = tokio::fs::remove_file(&probe).await;
                Ok(())
            }
            Err(_) => Err(StateError::Unusable(self.dir.clone())),
        }
    }

    async fn read(&self, plugin: &str) -> Result<Option<String>, StateError> {
        let path = self.state_file(plugin)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, plugin: &str, severity: &Severity) -> Result<(), StateError> {
        let path = self.state_file(plugin)?;
        tokio::fs::write(&path, severity.as_str()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_missing_state_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());

        let state = store.read("check_disk").await.unwrap();
        assert_eq!(state, None);
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());

        store.write("check_disk", &Severity::Warning).await.unwrap();
        let state = store.read("check_disk").await.unwrap();
        assert_eq!(state.as_deref(), Some("warning"));
    }

    #[tokio::test]
    async fn test_write_overwrites_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());

        store.write("check_disk", &Severity::Failure).await.unwrap();
        store.write("check_disk", &Severity::Ok).await.unwrap();

        let state = store.read("check_disk").await.unwrap();
        assert_eq!(state.as_deref(), Some("okay"));
    }

    #[tokio::test]
    async fn test_plugins_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());

        store.write("check_disk", &Severity::Failure).await.unwrap();
        store.write("check_mem", &Severity::Ok).await.unwrap();

        assert_eq!(
            store.read("check_disk").await.unwrap().as_deref(),
            Some("failure")
        );
        assert_eq!(
            store.read("check_mem").await.unwrap().as_deref(),
            Some("okay")
        );
    }

    #[tokio::test]
    async fn test_ensure_usable_on_writable_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        assert!(store.ensure_usable().await.is_ok());
    }

    #[tokio::test]
    async fn test_ensure_usable_missing_dir() {
        let store = FileStateStore::new("/nonexistent/checkward-state");
        let err = store.ensure_usable().await.unwrap_err();
        assert!(matches!(err, StateError::Unusable(_)));
    }

    #[tokio::test]
    async fn test_hostile_plugin_names_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());

        for name in ["../etc/passwd", "a/b", "", "..", "."] {
            let err = store.read(name).await.unwrap_err();
            assert!(matches!(err, StateError::InvalidPlugin(_)), "{:?}", name);
            let err = store.write(name, &Severity::Ok).await.unwrap_err();
            assert!(matches!(err, StateError::InvalidPlugin(_)), "{:?}", name);
        }
    }
}
