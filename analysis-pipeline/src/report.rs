use std::time::Instant;

use common::{
    error::AppError,
    storage::{entity_store::EntityStore, types::EntityId},
    utils::{
        llm::{ModelGateway, ModelSelector},
        text::truncate_chars,
    },
};
use json_extract::{object_or_empty, JsonObject};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use crate::{
    answer::load_context,
    config::AnalysisTuning,
    prompts::{
        analysis_prompt, contradiction_prompt, final_prompt, gap_prompt, review_prompt,
        NO_REPORT_CONTEXT,
    },
};

/// Every intermediate product of the report chain. Unparseable stages are
/// empty maps.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportOutcome {
    pub draft: String,
    pub reviewed_analysis: String,
    pub quality_scores: JsonObject,
    pub contradiction_report: JsonObject,
    pub gap_report: JsonObject,
    pub final_report: JsonObject,
}

// The reviewer may wrap its scores in a larger object.
fn quality_scores(review: &str) -> JsonObject {
    let parsed = object_or_empty(review);
    let nested = parsed
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("quality_scores"))
        .and_then(|(_, value)| value.as_object())
        .cloned();
    nested.unwrap_or(parsed)
}

fn agent_input(outcome: &ReportOutcome) -> String {
    json!({
        "reviewed_analysis": outcome.reviewed_analysis,
        "quality_scores": Value::Object(outcome.quality_scores.clone()),
        "contradiction_report": Value::Object(outcome.contradiction_report.clone()),
        "gap_report": Value::Object(outcome.gap_report.clone()),
    })
    .to_string()
}

async fn run_stage(
    gateway: &ModelGateway,
    stage: &'static str,
    prompt: &str,
) -> Result<String, AppError> {
    let started = Instant::now();
    let response = gateway.generate(prompt, ModelSelector::Primary).await?;
    debug!(
        stage,
        response_chars = response.chars().count(),
        elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        "report stage finished"
    );
    Ok(response)
}

/// Draft, review, contradiction check, gap check, then final synthesis.
///
/// Parse failures leave an empty map and the chain continues; gateway
/// errors abort it.
#[instrument(skip_all, fields(context_chars = context_text.len()))]
pub async fn produce_report(
    gateway: &ModelGateway,
    context_text: &str,
) -> Result<ReportOutcome, AppError> {
    let mut outcome = ReportOutcome {
        draft: run_stage(gateway, "draft", &analysis_prompt(context_text)).await?,
        ..ReportOutcome::default()
    };

    outcome.reviewed_analysis = run_stage(
        gateway,
        "review",
        &review_prompt(context_text, &outcome.draft),
    )
    .await?;
    outcome.quality_scores = quality_scores(&outcome.reviewed_analysis);

    let contradictions = run_stage(
        gateway,
        "contradiction",
        &contradiction_prompt(context_text, &outcome.reviewed_analysis),
    )
    .await?;
    outcome.contradiction_report = object_or_empty(&contradictions);

    let gaps = run_stage(
        gateway,
        "gap",
        &gap_prompt(context_text, &outcome.reviewed_analysis),
    )
    .await?;
    outcome.gap_report = object_or_empty(&gaps);

    let synthesis = run_stage(
        gateway,
        "final",
        &final_prompt(context_text, &agent_input(&outcome)),
    )
    .await?;
    outcome.final_report = object_or_empty(&synthesis);

    info!(
        quality_scores = outcome.quality_scores.len(),
        contradiction_report = !outcome.contradiction_report.is_empty(),
        gap_report = !outcome.gap_report.is_empty(),
        final_report = !outcome.final_report.is_empty(),
        "report produced"
    );

    Ok(outcome)
}

/// Runs [`produce_report`] over the entity's stored text, or over the
/// placeholder context when nothing is stored.
pub async fn produce_report_for_entity(
    gateway: &ModelGateway,
    store: &EntityStore,
    tuning: &AnalysisTuning,
    entity_id: &EntityId,
) -> Result<ReportOutcome, AppError> {
    let stored = load_context(store, entity_id).await;
    let context = stored.as_deref().unwrap_or(NO_REPORT_CONTEXT);
    info!(%entity_id, grounded = stored.is_some(), "producing report");

    produce_report(gateway, truncate_chars(context, tuning.report_context_chars)).await
}
