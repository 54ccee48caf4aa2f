pub mod evidence;
pub mod extraction;
pub mod verification;

use std::sync::Arc;

use state_machines::core::GuardError;
use tracing::{debug, info, instrument, warn};

use common::error::AppError;

use crate::utils::{document, segmenter};

use super::{
    context::PipelineContext,
    state::{Chunked, Completed, Extracted, IngestionMachine, Loaded, Ready, Verified},
};

#[instrument(
    level = "trace",
    skip_all,
    fields(job_id = %ctx.job_id, entity_id = %ctx.entity_id)
)]
pub async fn load_document(
    machine: IngestionMachine<(), Ready>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), Loaded>, AppError> {
    let source = ctx.services.open_document(ctx.job).await?;
    let page_count = source.page_count();
    let segments = document::load(Arc::clone(&source), ctx.pipeline_config.tuning.max_pages).await?;

    info!(
        job_id = %ctx.job_id,
        entity_id = %ctx.entity_id,
        filename = %ctx.job.filename,
        page_count,
        pages_with_text = segments.len(),
        "document loaded"
    );

    ctx.document = Some(source);
    ctx.segments = segments;

    machine
        .load()
        .map_err(|(_, guard)| map_guard_error("load", &guard))
}

#[instrument(
    level = "trace",
    skip_all,
    fields(job_id = %ctx.job_id, entity_id = %ctx.entity_id)
)]
pub async fn chunk_document(
    machine: IngestionMachine<(), Loaded>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), Chunked>, AppError> {
    let tuning = &ctx.pipeline_config.tuning;
    ctx.chunks = segmenter::chunk(
        &ctx.segments,
        tuning.chunk_max_chars,
        tuning.chunk_overlap_chars,
    );

    debug!(
        job_id = %ctx.job_id,
        chunk_count = ctx.chunks.len(),
        "document chunked"
    );

    machine
        .chunk()
        .map_err(|(_, guard)| map_guard_error("chunk", &guard))
}

#[instrument(
    level = "trace",
    skip_all,
    fields(job_id = %ctx.job_id, entity_id = %ctx.entity_id)
)]
pub async fn extract_metrics(
    machine: IngestionMachine<(), Chunked>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), Extracted>, AppError> {
    let extraction = extraction::extract(
        ctx.services,
        &ctx.pipeline_config.tuning,
        &ctx.chunks,
        ctx.entity_id,
        &ctx.job.filename,
    )
    .await;

    if !extraction.full_text.trim().is_empty() {
        if let Err(err) = ctx
            .services
            .store_full_text(ctx.entity_id, &extraction.full_text)
            .await
        {
            warn!(job_id = %ctx.job_id, error = %err, "failed to store full text");
        }
    }

    ctx.full_text = extraction.full_text;
    ctx.candidate = extraction.record;

    machine
        .extract()
        .map_err(|(_, guard)| map_guard_error("extract", &guard))
}

#[instrument(
    level = "trace",
    skip_all,
    fields(job_id = %ctx.job_id, entity_id = %ctx.entity_id)
)]
pub async fn verify_metrics(
    machine: IngestionMachine<(), Extracted>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), Verified>, AppError> {
    if let Some(candidate) = ctx.candidate.as_ref() {
        let record = verification::review(
            ctx.services,
            &ctx.pipeline_config.tuning,
            candidate,
            &ctx.full_text,
            ctx.entity_id,
        )
        .await;

        match ctx.services.store_metrics(ctx.entity_id, &record).await {
            Ok(()) => ctx.metrics_persisted = true,
            Err(err) => warn!(job_id = %ctx.job_id, error = %err, "failed to store metrics"),
        }

        ctx.verified = Some(record);
    } else {
        debug!(job_id = %ctx.job_id, "no candidate metrics to verify");
    }

    machine
        .verify()
        .map_err(|(_, guard)| map_guard_error("verify", &guard))
}

#[instrument(
    level = "trace",
    skip_all,
    fields(job_id = %ctx.job_id, entity_id = %ctx.entity_id)
)]
pub async fn collect_evidence(
    machine: IngestionMachine<(), Verified>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), Completed>, AppError> {
    if let Some(record) = ctx.verified.as_ref() {
        let preview_chars = ctx.pipeline_config.tuning.evidence_preview_chars;
        match evidence::build_evidence(ctx.document()?, record, preview_chars).await {
            Ok(Some(csv)) => match ctx.services.store_evidence(ctx.entity_id, csv).await {
                Ok(location) => {
                    info!(job_id = %ctx.job_id, %location, "verification evidence stored");
                    ctx.evidence_location = Some(location);
                }
                Err(err) => warn!(job_id = %ctx.job_id, error = %err, "failed to store evidence"),
            },
            Ok(None) => debug!(job_id = %ctx.job_id, "no cited pages to collect evidence from"),
            Err(err) => warn!(job_id = %ctx.job_id, error = %err, "failed to build evidence"),
        }
    }

    machine
        .complete()
        .map_err(|(_, guard)| map_guard_error("complete", &guard))
}

fn map_guard_error(event: &str, guard: &GuardError) -> AppError {
    AppError::InternalError(format!(
        "invalid ingestion pipeline transition during {event}: {guard:?}"
    ))
}
