//! Checkpoint records and stores.
//!
//! A checkpoint is written after every executed step. It holds the serialized state plus a cursor
//! naming the step that runs next (or [`Cursor::Terminal`]).

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "step", rename_all = "camelCase")]
pub enum Cursor {
    /// The named step runs on the next resume.
    At(String),
    Terminal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub thread_id: String,
    pub graph: String,
    /// Incremented on every write for this thread.
    pub version: u64,
    pub cursor: Cursor,
    /// Steps executed so far, in order.
    #[serde(default)]
    pub trail: Vec<String>,
    pub state: Value,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, StoreError>;

    /// Replace the checkpoint for `checkpoint.thread_id`.
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError>;
}

/// Process-local store. Checkpoints are lost when the process exits.
#[derive(Clone, Default)]
pub struct InMemoryCheckpointStore {
    inner: Arc<RwLock<HashMap<String, Checkpoint>>>,
}

impl InMemoryCheckpointStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, StoreError> {
        Ok(self.inner.read().get(thread_id).cloned())
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        self.inner
            .write()
            .insert(checkpoint.thread_id.clone(), checkpoint.clone());
        Ok(())
    }
}

/// One pretty-printed JSON file per thread under a directory.
#[derive(Debug, Clone)]
pub struct JsonDirCheckpointStore {
    dir: PathBuf,
}

impl JsonDirCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, thread_id: &str) -> PathBuf {
        let file: String = thread_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{file}.json"))
    }
}

#[async_trait]
impl CheckpointStore for JsonDirCheckpointStore {
    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, StoreError> {
        let path = self.path_for(thread_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let path = self.path_for(&checkpoint.thread_id);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(checkpoint)?;
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|source| StoreError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| StoreError::Io { path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn checkpoint(thread: &str, version: u64) -> Checkpoint {
        Checkpoint {
            thread_id: thread.to_string(),
            graph: "g".to_string(),
            version,
            cursor: Cursor::At("a".to_string()),
            trail: vec![],
            state: json!({"n": version}),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn in_memory_store_replaces_by_thread() {
        let store = InMemoryCheckpointStore::new();
        assert!(store.load("t").await.unwrap().is_none());

        store.save(&checkpoint("t", 0)).await.unwrap();
        store.save(&checkpoint("t", 1)).await.unwrap();
        let loaded = store.load("t").await.unwrap().unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.state, json!({"n": 1}));
    }

    #[tokio::test]
    async fn json_dir_store_round_trips_and_sanitizes_names() {
        let dir = tempdir().unwrap();
        let store = JsonDirCheckpointStore::new(dir.path().join("checkpoints"));
        assert!(store.load("run/1:discovery").await.unwrap().is_none());

        let mut cp = checkpoint("run/1:discovery", 3);
        cp.cursor = Cursor::Terminal;
        cp.trail = vec!["a".to_string(), "b".to_string()];
        store.save(&cp).await.unwrap();

        assert!(
            dir.path()
                .join("checkpoints")
                .join("run_1_discovery.json")
                .exists()
        );
        let loaded = store.load("run/1:discovery").await.unwrap().unwrap();
        assert_eq!(loaded.cursor, Cursor::Terminal);
        assert_eq!(loaded.trail, vec!["a", "b"]);
        assert_eq!(loaded.version, 3);
    }

    #[test]
    fn cursor_serializes_with_kind_tag() {
        let v = serde_json::to_value(Cursor::At("plan_work".to_string())).unwrap();
        assert_eq!(v, json!({"kind": "at", "step": "plan_work"}));
        let v = serde_json::to_value(Cursor::Terminal).unwrap();
        assert_eq!(v, json!({"kind": "terminal"}));
    }
}
