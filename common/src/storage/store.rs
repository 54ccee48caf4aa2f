use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{path::Path as ObjPath, ObjectStore};

use crate::utils::config::{AppConfig, StorageKind};

pub type DynStore = Arc<dyn ObjectStore>;

/// Keyed byte store over an `object_store` backend.
#[derive(Clone)]
pub struct StorageManager {
    store: DynStore,
    backend_kind: StorageKind,
    local_base: Option<PathBuf>,
}

impl StorageManager {
    /// Create the backend selected by `cfg.storage`, creating the data dir for local storage.
    pub async fn new(cfg: &AppConfig) -> object_store::Result<Self> {
        let backend_kind = cfg.storage.clone();
        let (store, local_base) = create_storage_backend(cfg).await?;

        Ok(Self {
            store,
            backend_kind,
            local_base,
        })
    }

    /// Wrap an existing backend. Used by tests to inject stores directly.
    pub fn with_backend(store: DynStore, backend_kind: StorageKind) -> Self {
        Self {
            store,
            backend_kind,
            local_base: None,
        }
    }

    pub fn in_memory() -> Self {
        Self::with_backend(Arc::new(InMemory::new()), StorageKind::Memory)
    }

    pub fn backend_kind(&self) -> &StorageKind {
        &self.backend_kind
    }

    pub fn local_base_path(&self) -> Option<&Path> {
        self.local_base.as_deref()
    }

    /// Store bytes at `location`, replacing any previous object.
    pub async fn put(&self, location: &str, data: Bytes) -> object_store::Result<()> {
        let path = ObjPath::from(location);
        let payload = object_store::PutPayload::from_bytes(data);
        self.store.put(&path, payload).await.map(|_| ())
    }

    pub async fn get(&self, location: &str) -> object_store::Result<Bytes> {
        let path = ObjPath::from(location);
        let result = self.store.get(&path).await?;
        result.bytes().await
    }

    /// Like [`Self::get`] but maps a missing object to `None`.
    pub async fn get_opt(&self, location: &str) -> object_store::Result<Option<Bytes>> {
        match self.get(location).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn exists(&self, location: &str) -> object_store::Result<bool> {
        let path = ObjPath::from(location);
        self.store
            .head(&path)
            .await
            .map(|_| true)
            .or_else(|e| match e {
                object_store::Error::NotFound { .. } => Ok(false),
                _ => Err(e),
            })
    }
}

async fn create_storage_backend(
    cfg: &AppConfig,
) -> object_store::Result<(DynStore, Option<PathBuf>)> {
    match cfg.storage {
        StorageKind::Local => {
            let base = resolve_base_dir(cfg);
            if let Err(err) = tokio::fs::create_dir_all(&base).await {
                if err.kind() != ErrorKind::AlreadyExists {
                    return Err(object_store::Error::Generic {
                        store: "LocalFileSystem",
                        source: err.into(),
                    });
                }
            }
            let store = LocalFileSystem::new_with_prefix(base.clone())?;
            Ok((Arc::new(store), Some(base)))
        }
        StorageKind::Memory => Ok((Arc::new(InMemory::new()), None)),
    }
}

/// Resolve the absolute base directory used for local storage from config.
///
/// A relative `data_dir` is resolved against the current working directory.
pub fn resolve_base_dir(cfg: &AppConfig) -> PathBuf {
    let configured = PathBuf::from(&cfg.data_dir);
    if configured.is_absolute() {
        configured
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(configured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> AppConfig {
        AppConfig {
            storage: StorageKind::Memory,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn memory_backend_roundtrip_and_overwrite() {
        let storage = StorageManager::new(&memory_config())
            .await
            .expect("create storage manager");
        assert!(storage.local_base_path().is_none());

        let location = "ACME/metrics.json";
        storage
            .put(location, Bytes::from_static(b"first"))
            .await
            .expect("put first");
        storage
            .put(location, Bytes::from_static(b"second"))
            .await
            .expect("put second");

        let retrieved = storage.get(location).await.expect("get");
        assert_eq!(retrieved.as_ref(), b"second");
        assert!(storage.exists(location).await.expect("exists"));
    }

    #[tokio::test]
    async fn missing_objects_are_absent_not_errors() {
        let storage = StorageManager::in_memory();

        assert!(!storage.exists("nope/metrics.json").await.expect("exists"));
        assert!(storage
            .get_opt("nope/metrics.json")
            .await
            .expect("get_opt")
            .is_none());
        assert!(storage.get("nope/metrics.json").await.is_err());
    }

    #[tokio::test]
    async fn local_backend_persists_across_instances() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = AppConfig {
            storage: StorageKind::Local,
            data_dir: dir.path().to_string_lossy().into_owned(),
            ..Default::default()
        };

        let first = StorageManager::new(&cfg).await.expect("first manager");
        first
            .put("ACME/full_text.txt", Bytes::from_static(b"[Page 1]\nhello"))
            .await
            .expect("put");
        assert_eq!(first.local_base_path(), Some(dir.path()));

        let second = StorageManager::new(&cfg).await.expect("second manager");
        let text = second.get("ACME/full_text.txt").await.expect("get");
        assert_eq!(text.as_ref(), b"[Page 1]\nhello");
        assert!(dir.path().join("ACME").join("full_text.txt").exists());
    }
}
