use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

use crate::model::{Route, RouteServerAssignment, Server};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a valid JSON list: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Anything kept in a [`JsonStore`].
pub trait Record {
    fn id(&self) -> &str;
}

impl Record for Server {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for RouteServerAssignment {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for Route {
    fn id(&self) -> &str {
        &self.id
    }
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A JSON array of records in a single file.
///
/// Writers going through clones of one store are serialized, so a
/// read-modify-write never loses another handler's record. Separate stores
/// (or processes) on the same file are not coordinated and the last write
/// wins. Each write lands in a uniquely named temp file first and is renamed
/// over the target, so readers never see a partially written file.
#[derive(Debug)]
pub struct JsonStore<T> {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for JsonStore<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            write_lock: Arc::clone(&self.write_lock),
            _record: PhantomData,
        }
    }
}

impl<T> JsonStore<T>
where
    T: Record + Serialize + DeserializeOwned + Clone,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file (and its directory) as an empty list if missing.
    pub async fn ensure_file(&self) -> Result<(), StoreError> {
        if tokio::fs::try_exists(&self.path).await.map_err(|e| self.io(e))? {
            return Ok(());
        }
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(|e| self.io(e))?;
        }
        tokio::fs::write(&self.path, "[]").await.map_err(|e| self.io(e))?;
        info!("Created empty store {}", self.path.display());
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<T>, StoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io(e)),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    pub async fn get(&self, id: &str) -> Result<Option<T>, StoreError> {
        Ok(self.list().await?.into_iter().find(|r| r.id() == id))
    }

    /// Insert, or replace the record with the same id.
    pub async fn save(&self, record: T) -> Result<T, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.list().await?;
        match records.iter_mut().find(|r| r.id() == record.id()) {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
        self.write_all(&records).await?;
        Ok(record)
    }

    /// Apply `f` to the record with `id` and persist it.
    pub async fn update<F>(&self, id: &str, f: F) -> Result<Option<T>, StoreError>
    where
        F: FnOnce(&mut T),
    {
        let _guard = self.write_lock.lock().await;
        let mut records = self.list().await?;
        let Some(record) = records.iter_mut().find(|r| r.id() == id) else {
            return Ok(None);
        };
        f(record);
        let updated = record.clone();
        self.write_all(&records).await?;
        Ok(Some(updated))
    }

    /// Returns false when no record had that id.
    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.list().await?;
        let before = records.len();
        records.retain(|r| r.id() != id);
        if records.len() == before {
            return Ok(false);
        }
        self.write_all(&records).await?;
        Ok(true)
    }

    async fn write_all(&self, records: &[T]) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(records).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(|e| self.io(e))?;
        }
        let tmp = self.path.with_extension(format!("json.{}.tmp", new_id()));
        tokio::fs::write(&tmp, &content).await.map_err(|e| self.io(e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(self.io(e));
        }
        Ok(())
    }

    fn io(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ServerRef, StreamType};
    use tempfile::tempdir;

    fn assignment(id: &str, from: &str) -> RouteServerAssignment {
        RouteServerAssignment {
            id: id.to_string(),
            priority: 1,
            route_kind: StreamType::Hls,
            from: from.to_string(),
            to: format!("rtmp://10.0.0.5:1935{}", from),
            servers: vec![ServerRef {
                id: "s1".to_string(),
                display_name: "Origin 1".to_string(),
                ip_address: "10.0.0.5".to_string(),
                port: 22,
                origin_ip_with_port: "10.0.0.5:1935".to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn test_missing_file_lists_empty() {
        let dir = tempdir().unwrap();
        let store: JsonStore<RouteServerAssignment> = JsonStore::new(dir.path().join("none.json"));
        assert!(store.list().await.unwrap().is_empty());
        assert!(!store.delete("x").await.unwrap());
    }

    #[tokio::test]
    async fn test_ensure_file_creates_empty_list() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("route-servers.json");
        let store: JsonStore<RouteServerAssignment> = JsonStore::new(&path);

        store.ensure_file().await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");

        store.save(assignment("a1", "/live/x")).await.unwrap();
        store.ensure_file().await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_save_upserts_by_id() {
        let dir = tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("route-servers.json"));

        store.save(assignment("a1", "/live/x")).await.unwrap();
        store.save(assignment("a2", "/live/y")).await.unwrap();
        store.save(assignment("a1", "/live/z")).await.unwrap();

        let all: Vec<RouteServerAssignment> = store.list().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].from, "/live/z");
        assert_eq!(store.get("a2").await.unwrap().unwrap().from, "/live/y");
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .filter(|n| n != "route-servers.json")
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[tokio::test]
    async fn test_save_creates_missing_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("nested").join("route-servers.json");
        let store = JsonStore::new(&path);

        store.save(assignment("a1", "/live/x")).await.unwrap();
        assert!(path.exists());
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_saves_keep_every_record() {
        let dir = tempdir().unwrap();
        let store: JsonStore<RouteServerAssignment> = JsonStore::new(dir.path().join("route-servers.json"));

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..16 {
            let store = store.clone();
            tasks.spawn(async move { store.save(assignment(&format!("a{i}"), &format!("/live/{i}"))).await });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.unwrap().unwrap();
        }

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 16);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let dir = tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("route-servers.json"));
        store.save(assignment("a1", "/live/x")).await.unwrap();

        let updated = store.update("a1", |a| a.priority = 7).await.unwrap().unwrap();
        assert_eq!(updated.priority, 7);
        assert!(store.update("missing", |a| a.priority = 1).await.unwrap().is_none());

        assert!(store.delete("a1").await.unwrap());
        assert!(!store.delete("a1").await.unwrap());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("servers.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store: JsonStore<Server> = JsonStore::new(&path);

        let err = store.list().await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }
}
