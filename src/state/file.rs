//! File-backed [`StateStore`].
//!
//! ## Layout
//! ```text
//! <root>/<alloc_id>/alloc.json
//! <root>/<alloc_id>/tasks/<task>.json
//! ```
//!
//! Every write goes to a `.tmp` sibling first and is renamed into place, so a
//! crash never leaves a half-written record behind.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use crate::error::StoreError;
use crate::model::{Allocation, TaskStateRecord};
use crate::state::StateStore;

const ALLOC_FILE: &str = "alloc.json";
const TASKS_DIR: &str = "tasks";

#[derive(Serialize, Deserialize)]
struct TaskFile {
    task: String,
    record: TaskStateRecord,
}

/// JSON file state store rooted at a directory.
#[derive(Clone, Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Opens (and creates, if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn alloc_dir(&self, alloc_id: &str) -> PathBuf {
        self.root.join(file_safe(alloc_id))
    }
}

/// Maps a name onto a single path component.
///
/// Percent-encoding keeps distinct names distinct (`a/b` and `a_b` never share
/// a file). `%` itself is always encoded, so the dot-only escapes below cannot
/// collide with an encoded name.
fn file_safe(name: &str) -> String {
    match name {
        "" => "%".to_string(),
        "." => "%2E".to_string(),
        ".." => "%2E%2E".to_string(),
        name => urlencoding::encode(name).into_owned(),
    }
}

async fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl StateStore for FileStore {
    async fn put_alloc(&self, alloc: &Allocation) -> Result<(), StoreError> {
        write_atomic(&self.alloc_dir(&alloc.id).join(ALLOC_FILE), alloc).await
    }

    async fn get_alloc(&self, alloc_id: &str) -> Result<Option<Allocation>, StoreError> {
        read_json(&self.alloc_dir(alloc_id).join(ALLOC_FILE)).await
    }

    async fn put_task_state(
        &self,
        alloc_id: &str,
        task: &str,
        record: &TaskStateRecord,
    ) -> Result<(), StoreError> {
        let path = self
            .alloc_dir(alloc_id)
            .join(TASKS_DIR)
            .join(format!("{}.json", file_safe(task)));
        let file = TaskFile {
            task: task.to_string(),
            record: record.clone(),
        };
        write_atomic(&path, &file).await
    }

    async fn get_task_states(
        &self,
        alloc_id: &str,
    ) -> Result<BTreeMap<String, TaskStateRecord>, StoreError> {
        let dir = self.alloc_dir(alloc_id).join(TASKS_DIR);
        let mut out = BTreeMap::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(file) = read_json::<TaskFile>(&path).await? {
                out.insert(file.task, file.record);
            }
        }
        Ok(out)
    }

    async fn delete_alloc(&self, alloc_id: &str) -> Result<(), StoreError> {
        match tokio::fs::remove_dir_all(self.alloc_dir(alloc_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
