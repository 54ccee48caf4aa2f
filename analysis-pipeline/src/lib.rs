#![allow(clippy::missing_docs_in_private_items)]

pub mod answer;
pub mod config;
pub mod prompts;
pub mod report;

use std::sync::Arc;

use common::{
    error::AppError,
    storage::{entity_store::EntityStore, types::EntityId},
    utils::llm::ModelGateway,
};

pub use config::AnalysisTuning;
pub use report::ReportOutcome;

/// Question answering and report generation over stored filings.
#[derive(Clone)]
pub struct AnalysisPipeline {
    gateway: Arc<ModelGateway>,
    store: EntityStore,
    tuning: AnalysisTuning,
}

impl AnalysisPipeline {
    pub fn new(gateway: Arc<ModelGateway>, store: EntityStore) -> Self {
        Self::with_tuning(gateway, store, AnalysisTuning::default())
    }

    pub fn with_tuning(gateway: Arc<ModelGateway>, store: EntityStore, tuning: AnalysisTuning) -> Self {
        Self {
            gateway,
            store,
            tuning,
        }
    }

    pub async fn answer(&self, entity_id: &EntityId, question: &str) -> Result<String, AppError> {
        answer::answer_question(&self.gateway, &self.store, &self.tuning, entity_id, question).await
    }

    pub async fn produce_report(&self, context_text: &str) -> Result<ReportOutcome, AppError> {
        report::produce_report(&self.gateway, context_text).await
    }

    pub async fn produce_report_for_entity(
        &self,
        entity_id: &EntityId,
    ) -> Result<ReportOutcome, AppError> {
        report::produce_report_for_entity(&self.gateway, &self.store, &self.tuning, entity_id).await
    }
}
