// src/state/fs_store.rs

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::engine::RunKey;
use crate::errors::StateError;
use crate::fs::{FileSystem, RealFileSystem};

use super::{StateKey, StateStore};

/// State store laying records out as files under a root directory:
/// `<root>/<run key>/<record file>`.
#[derive(Debug, Clone)]
pub struct FsStateStore<F: FileSystem = RealFileSystem> {
    root: PathBuf,
    fs: F,
}

impl FsStateStore<RealFileSystem> {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_fs(root, RealFileSystem)
    }
}

impl<F: FileSystem> FsStateStore<F> {
    pub fn with_fs(root: impl Into<PathBuf>, fs: F) -> Self {
        Self {
            root: root.into(),
            fs,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, key: &StateKey) -> PathBuf {
        self.root.join(key.relative_path())
    }

    /// Run keys that have at least one record, sorted (oldest first, since
    /// keys start with a timestamp).
    pub fn runs(&self) -> Result<Vec<RunKey>, StateError> {
        if !self.fs.exists(&self.root) {
            return Ok(Vec::new());
        }
        let runs = self
            .fs
            .read_dir(&self.root)?
            .into_iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(RunKey::from_raw))
            .collect();
        Ok(runs)
    }
}

// Filesystem calls block, so they run on the blocking pool and sibling
// subtasks keep making progress while a record is written.
#[async_trait]
impl<F: FileSystem + Clone + 'static> StateStore for FsStateStore<F> {
    async fn persist(&self, key: &StateKey, value: &Value) -> Result<(), StateError> {
        let path = self.path_of(key);
        let bytes = match value {
            Value::String(text) if key.record.is_text() => text.clone().into_bytes(),
            other => serde_json::to_vec_pretty(other)?,
        };

        let fs = self.fs.clone();
        let target = path.clone();
        tokio::task::spawn_blocking(move || fs.write(&target, &bytes))
            .await
            .map_err(anyhow::Error::from)??;

        debug!(path = %path.display(), "persisted state record");
        Ok(())
    }

    async fn load(&self, key: &StateKey) -> Result<Option<Value>, StateError> {
        let path = self.path_of(key);
        let fs = self.fs.clone();
        let contents = tokio::task::spawn_blocking(move || {
            if !fs.exists(&path) {
                return Ok(None);
            }
            fs.read_to_string(&path).map(Some)
        })
        .await
        .map_err(anyhow::Error::from)??;

        let Some(contents) = contents else {
            return Ok(None);
        };
        if key.record.is_text() {
            return Ok(Some(Value::String(contents)));
        }
        Ok(Some(serde_json::from_str(&contents)?))
    }
}
