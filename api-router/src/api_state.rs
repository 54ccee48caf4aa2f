use std::sync::Arc;

use analysis_pipeline::AnalysisPipeline;
use common::{
    storage::entity_store::EntityStore,
    utils::{config::AppConfig, llm::ModelGateway},
};
use ingestion_pipeline::{DocumentIntake, IngestionQueue};

#[derive(Clone)]
pub struct ApiState {
    pub config: AppConfig,
    pub store: EntityStore,
    pub intake: DocumentIntake,
    pub analysis: AnalysisPipeline,
}

impl ApiState {
    pub fn new(
        config: &AppConfig,
        gateway: Arc<ModelGateway>,
        store: EntityStore,
        queue: IngestionQueue,
    ) -> Self {
        Self {
            config: config.clone(),
            intake: DocumentIntake::new(Arc::clone(&gateway), store.clone(), queue),
            analysis: AnalysisPipeline::new(gateway, store.clone()),
            store,
        }
    }
}
