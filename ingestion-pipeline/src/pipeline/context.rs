use std::sync::Arc;

use common::{
    error::AppError,
    storage::types::{EntityId, IngestionJob, MetricsRecord},
};
use tracing::error;
use uuid::Uuid;

use crate::utils::{
    document::{PageSegment, PageSource},
    segmenter::Chunk,
};

use super::{config::IngestionConfig, services::PipelineServices};

pub struct PipelineContext<'a> {
    pub job: &'a IngestionJob,
    pub job_id: Uuid,
    pub entity_id: &'a EntityId,
    pub pipeline_config: &'a IngestionConfig,
    pub services: &'a dyn PipelineServices,
    pub document: Option<Arc<dyn PageSource>>,
    pub segments: Vec<PageSegment>,
    pub chunks: Vec<Chunk>,
    pub full_text: String,
    pub candidate: Option<MetricsRecord>,
    pub verified: Option<MetricsRecord>,
    pub metrics_persisted: bool,
    pub evidence_location: Option<String>,
}

/// What one ingestion run left behind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestionSummary {
    pub chunk_count: usize,
    /// Pages that yielded text.
    pub page_count: usize,
    pub full_text_chars: usize,
    pub metrics: Option<MetricsRecord>,
    pub metrics_persisted: bool,
    pub evidence_location: Option<String>,
}

impl<'a> PipelineContext<'a> {
    pub fn new(
        job: &'a IngestionJob,
        pipeline_config: &'a IngestionConfig,
        services: &'a dyn PipelineServices,
    ) -> Self {
        Self {
            job,
            job_id: job.id,
            entity_id: &job.entity_id,
            pipeline_config,
            services,
            document: None,
            segments: Vec::new(),
            chunks: Vec::new(),
            full_text: String::new(),
            candidate: None,
            verified: None,
            metrics_persisted: false,
            evidence_location: None,
        }
    }

    pub fn document(&self) -> Result<Arc<dyn PageSource>, AppError> {
        self.document
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| AppError::InternalError("document expected to be loaded".into()))
    }

    pub fn abort(&mut self, err: AppError) -> AppError {
        error!(
            job_id = %self.job_id,
            entity_id = %self.entity_id,
            error = %err,
            "ingestion pipeline aborted"
        );
        err
    }

    pub fn summary(self) -> IngestionSummary {
        IngestionSummary {
            chunk_count: self.chunks.len(),
            page_count: self.segments.len(),
            full_text_chars: self.full_text.chars().count(),
            metrics: self.verified.or(self.candidate),
            metrics_persisted: self.metrics_persisted,
            evidence_location: self.evidence_location,
        }
    }
}
