use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::EntityId;

/// One queued document ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionJob {
    pub id: Uuid,
    pub entity_id: EntityId,
    /// Store location of the original upload.
    pub document_location: String,
    pub filename: String,
    pub submitted_at: DateTime<Utc>,
}

impl IngestionJob {
    pub fn new(entity_id: EntityId, document_location: String, filename: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_id,
            document_location,
            filename,
            submitted_at: Utc::now(),
        }
    }
}
