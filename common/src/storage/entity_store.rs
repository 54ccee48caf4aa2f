use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::AppError,
    storage::{
        store::StorageManager,
        types::{EntityId, MetricsRecord},
    },
};

const METRICS_FILE: &str = "metrics.json";
const FULL_TEXT_FILE: &str = "full_text.txt";
const EVIDENCE_FILE: &str = "verification_evidence.csv";
const UPLOADS_DIR: &str = "uploads";
const FALLBACK_FILENAME: &str = "document.pdf";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Ready,
    Processing,
}

/// Typed views over the keyed store, one namespace per entity.
#[derive(Clone)]
pub struct EntityStore {
    storage: StorageManager,
}

impl EntityStore {
    pub fn new(storage: StorageManager) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    pub fn metrics_location(entity: &EntityId) -> String {
        format!("{entity}/{METRICS_FILE}")
    }

    pub fn full_text_location(entity: &EntityId) -> String {
        format!("{entity}/{FULL_TEXT_FILE}")
    }

    pub fn evidence_location(entity: &EntityId) -> String {
        format!("{entity}/{EVIDENCE_FILE}")
    }

    pub fn upload_location(entity: &EntityId, filename: &str) -> String {
        format!("{entity}/{UPLOADS_DIR}/{}", sanitize_filename(filename))
    }

    pub async fn put_metrics(
        &self,
        entity: &EntityId,
        record: &MetricsRecord,
    ) -> Result<(), AppError> {
        let payload = serde_json::to_vec_pretty(record)?;
        self.storage
            .put(&Self::metrics_location(entity), Bytes::from(payload))
            .await?;
        debug!(entity_id = %entity, verified = record.verified, "metrics record stored");
        Ok(())
    }

    pub async fn get_metrics(&self, entity: &EntityId) -> Result<Option<MetricsRecord>, AppError> {
        match self.storage.get_opt(&Self::metrics_location(entity)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn put_full_text(&self, entity: &EntityId, text: &str) -> Result<(), AppError> {
        self.storage
            .put(
                &Self::full_text_location(entity),
                Bytes::copy_from_slice(text.as_bytes()),
            )
            .await?;
        debug!(entity_id = %entity, chars = text.chars().count(), "full text stored");
        Ok(())
    }

    pub async fn get_full_text(&self, entity: &EntityId) -> Result<Option<String>, AppError> {
        Ok(self
            .storage
            .get_opt(&Self::full_text_location(entity))
            .await?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .filter(|text| !text.is_empty()))
    }

    /// Replaces the entity's evidence artifact and returns its location.
    pub async fn put_evidence(&self, entity: &EntityId, csv: Vec<u8>) -> Result<String, AppError> {
        let location = Self::evidence_location(entity);
        self.storage.put(&location, Bytes::from(csv)).await?;
        Ok(location)
    }

    pub async fn get_evidence(&self, entity: &EntityId) -> Result<Option<Bytes>, AppError> {
        Ok(self
            .storage
            .get_opt(&Self::evidence_location(entity))
            .await?)
    }

    /// Stores the original document and returns its location.
    pub async fn put_upload(
        &self,
        entity: &EntityId,
        filename: &str,
        data: Bytes,
    ) -> Result<String, AppError> {
        let location = Self::upload_location(entity, filename);
        self.storage.put(&location, data).await?;
        Ok(location)
    }

    pub async fn get_object(&self, location: &str) -> Result<Bytes, AppError> {
        self.storage.get(location).await.map_err(|err| match err {
            object_store::Error::NotFound { .. } => {
                AppError::NotFound(format!("no stored object at {location}"))
            }
            other => AppError::Storage(other),
        })
    }

    /// `Ready` once a metrics record has been persisted, otherwise `Processing`.
    pub async fn status(&self, entity: &EntityId) -> Result<ProcessingStatus, AppError> {
        let ready = self.storage.exists(&Self::metrics_location(entity)).await?;
        Ok(if ready {
            ProcessingStatus::Ready
        } else {
            ProcessingStatus::Processing
        })
    }
}

/// Keeps the last path component and replaces anything outside `[A-Za-z0-9._-]`.
pub fn sanitize_filename(raw: &str) -> String {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(raw: &str) -> EntityId {
        EntityId::parse(raw).expect("valid entity")
    }

    #[tokio::test]
    async fn status_tracks_metrics_presence() {
        let store = EntityStore::new(StorageManager::in_memory());
        let acme = entity("ACME");

        assert_eq!(
            store.status(&acme).await.expect("status"),
            ProcessingStatus::Processing
        );

        store
            .put_full_text(&acme, "[Page 1]\ntext")
            .await
            .expect("full text");
        assert_eq!(
            store.status(&acme).await.expect("status"),
            ProcessingStatus::Processing
        );

        store
            .put_metrics(&acme, &MetricsRecord::default())
            .await
            .expect("metrics");
        assert_eq!(
            store.status(&acme).await.expect("status"),
            ProcessingStatus::Ready
        );
    }

    #[tokio::test]
    async fn metrics_roundtrip_and_last_write_wins() {
        let store = EntityStore::new(StorageManager::in_memory());
        let acme = entity("acme");

        let first: MetricsRecord =
            serde_json::from_value(json!({"summary": "first"})).expect("record");
        let second: MetricsRecord =
            serde_json::from_value(json!({"summary": "second", "verified": true}))
                .expect("record");

        store.put_metrics(&acme, &first).await.expect("put first");
        store.put_metrics(&acme, &second).await.expect("put second");

        let loaded = store
            .get_metrics(&acme)
            .await
            .expect("get")
            .expect("record present");
        assert_eq!(loaded, second);
    }

    #[tokio::test]
    async fn missing_views_read_as_none() {
        let store = EntityStore::new(StorageManager::in_memory());
        let ghost = entity("GHOST");

        assert!(store.get_metrics(&ghost).await.expect("metrics").is_none());
        assert!(store.get_full_text(&ghost).await.expect("text").is_none());
        assert!(store.get_evidence(&ghost).await.expect("evidence").is_none());
        assert!(matches!(
            store.get_object("GHOST/uploads/x.pdf").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn uploads_live_under_entity_namespace() {
        let store = EntityStore::new(StorageManager::in_memory());
        let acme = entity("ACME");

        let location = store
            .put_upload(&acme, "../../Annual Report 2024.pdf", Bytes::from_static(b"%PDF"))
            .await
            .expect("upload");

        assert_eq!(location, "ACME/uploads/Annual_Report_2024.pdf");
        assert_eq!(
            store.get_object(&location).await.expect("get").as_ref(),
            b"%PDF"
        );
    }

    #[test]
    fn sanitizes_degenerate_filenames() {
        assert_eq!(sanitize_filename(""), "document.pdf");
        assert_eq!(sanitize_filename("..."), "document.pdf");
        assert_eq!(sanitize_filename("C:\\docs\\ar.pdf"), "ar.pdf");
    }
}
