mod config;
mod context;
mod services;
mod stages;
mod state;

pub use config::{IngestionConfig, IngestionTuning};
pub use context::IngestionSummary;
#[allow(clippy::module_name_repetitions)]
pub use services::{DefaultPipelineServices, PipelineServices};

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use common::{
    error::AppError,
    storage::{entity_store::EntityStore, types::IngestionJob},
    utils::llm::ModelGateway,
};
use tracing::{debug, info, warn};

use self::{
    context::PipelineContext,
    stages::{chunk_document, collect_evidence, extract_metrics, load_document, verify_metrics},
    state::ready,
};

#[allow(clippy::module_name_repetitions)]
pub struct IngestionPipeline {
    pipeline_config: IngestionConfig,
    services: Arc<dyn PipelineServices>,
}

impl IngestionPipeline {
    pub fn new(gateway: Arc<ModelGateway>, store: EntityStore, pipeline_config: IngestionConfig) -> Self {
        let services = DefaultPipelineServices::new(gateway, store);
        Self::with_services(pipeline_config, Arc::new(services))
    }

    pub fn with_services(
        pipeline_config: IngestionConfig,
        services: Arc<dyn PipelineServices>,
    ) -> Self {
        Self {
            pipeline_config,
            services,
        }
    }

    pub fn config(&self) -> &IngestionConfig {
        &self.pipeline_config
    }

    /// Runs every stage for `job` and returns the number of chunks produced.
    ///
    /// Never fails: a run that cannot start is logged and reported as zero
    /// chunks, leaving the entity's status untouched.
    #[tracing::instrument(
        skip_all,
        fields(job_id = %job.id, entity_id = %job.entity_id, filename = %job.filename)
    )]
    pub async fn ingest(&self, job: &IngestionJob) -> usize {
        match self.process(job).await {
            Ok(summary) => {
                info!(
                    job_id = %job.id,
                    entity_id = %job.entity_id,
                    chunk_count = summary.chunk_count,
                    metrics_persisted = summary.metrics_persisted,
                    verified = summary.metrics.as_ref().is_some_and(|m| m.verified),
                    evidence = summary.evidence_location.is_some(),
                    "ingestion job finished"
                );
                summary.chunk_count
            }
            Err(err) => {
                warn!(
                    job_id = %job.id,
                    entity_id = %job.entity_id,
                    error = %err,
                    "ingestion job did not complete"
                );
                0
            }
        }
    }

    /// Like [`Self::ingest`] but returns everything the run produced.
    pub async fn process(&self, job: &IngestionJob) -> Result<IngestionSummary, AppError> {
        self.drive_pipeline(job).await.map_err(|err| {
            debug!(job_id = %job.id, error = %err, "ingestion pipeline failed");
            err
        })
    }

    fn duration_millis(duration: Duration) -> u64 {
        u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
    }

    async fn drive_pipeline(&self, job: &IngestionJob) -> Result<IngestionSummary, AppError> {
        let mut ctx = PipelineContext::new(job, &self.pipeline_config, self.services.as_ref());

        let machine = ready();

        let pipeline_started = Instant::now();

        let stage_start = Instant::now();
        let machine = load_document(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        let load_duration = stage_start.elapsed();

        let stage_start = Instant::now();
        let machine = chunk_document(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        let chunk_duration = stage_start.elapsed();

        let stage_start = Instant::now();
        let machine = extract_metrics(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        let extract_duration = stage_start.elapsed();

        let stage_start = Instant::now();
        let machine = verify_metrics(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        let verify_duration = stage_start.elapsed();

        let stage_start = Instant::now();
        let _machine = collect_evidence(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        let evidence_duration = stage_start.elapsed();

        info!(
            job_id = %ctx.job_id,
            entity_id = %ctx.entity_id,
            total_ms = Self::duration_millis(pipeline_started.elapsed()),
            load_ms = Self::duration_millis(load_duration),
            chunk_ms = Self::duration_millis(chunk_duration),
            extract_ms = Self::duration_millis(extract_duration),
            verify_ms = Self::duration_millis(verify_duration),
            evidence_ms = Self::duration_millis(evidence_duration),
            "ingestion pipeline finished"
        );

        Ok(ctx.summary())
    }
}
