use std::sync::Arc;

use async_trait::async_trait;
use common::{
    error::AppError,
    storage::{
        entity_store::EntityStore,
        types::{EntityId, IngestionJob, MetricsRecord},
    },
    utils::llm::{ModelGateway, ModelSelector},
};

use crate::utils::document::{open_pdf, PageSource};

/// Side-effecting capabilities the ingestion stages depend on.
#[async_trait]
pub trait PipelineServices: Send + Sync {
    async fn open_document(&self, job: &IngestionJob) -> Result<Arc<dyn PageSource>, AppError>;

    async fn generate(&self, prompt: &str, model: ModelSelector) -> Result<String, AppError>;

    async fn store_full_text(&self, entity: &EntityId, text: &str) -> Result<(), AppError>;

    async fn store_metrics(&self, entity: &EntityId, record: &MetricsRecord)
        -> Result<(), AppError>;

    async fn store_evidence(&self, entity: &EntityId, csv: Vec<u8>) -> Result<String, AppError>;
}

pub struct DefaultPipelineServices {
    gateway: Arc<ModelGateway>,
    store: EntityStore,
}

impl DefaultPipelineServices {
    pub fn new(gateway: Arc<ModelGateway>, store: EntityStore) -> Self {
        Self { gateway, store }
    }
}

#[async_trait]
impl PipelineServices for DefaultPipelineServices {
    async fn open_document(&self, job: &IngestionJob) -> Result<Arc<dyn PageSource>, AppError> {
        let bytes = self.store.get_object(&job.document_location).await?;
        open_pdf(bytes).await
    }

    async fn generate(&self, prompt: &str, model: ModelSelector) -> Result<String, AppError> {
        self.gateway.generate(prompt, model).await
    }

    async fn store_full_text(&self, entity: &EntityId, text: &str) -> Result<(), AppError> {
        self.store.put_full_text(entity, text).await
    }

    async fn store_metrics(
        &self,
        entity: &EntityId,
        record: &MetricsRecord,
    ) -> Result<(), AppError> {
        self.store.put_metrics(entity, record).await
    }

    async fn store_evidence(&self, entity: &EntityId, csv: Vec<u8>) -> Result<String, AppError> {
        self.store.put_evidence(entity, csv).await
    }
}
