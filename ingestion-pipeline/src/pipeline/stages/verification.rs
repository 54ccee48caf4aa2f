use common::{
    storage::types::{EntityId, MetricsRecord},
    utils::{llm::ModelSelector, text::truncate_chars},
};
use tracing::{info, warn};

use crate::{
    pipeline::{config::IngestionTuning, services::PipelineServices},
    utils::llm_instructions::verification_prompt,
};

/// Audits `candidate` against the source text.
///
/// A parseable reply replaces the candidate and is marked verified; anything
/// else keeps the candidate with `verified = false`.
pub async fn review(
    services: &dyn PipelineServices,
    tuning: &IngestionTuning,
    candidate: &MetricsRecord,
    full_text: &str,
    entity_id: &EntityId,
) -> MetricsRecord {
    let unverified = || candidate.clone().with_verified(false);

    let record_json = match serde_json::to_string_pretty(candidate) {
        Ok(json) => json,
        Err(err) => {
            warn!(%entity_id, error = %err, "failed to serialize candidate metrics");
            return unverified();
        }
    };

    let prompt = verification_prompt(
        &record_json,
        truncate_chars(full_text, tuning.verification_source_chars),
    );

    let response = match services.generate(&prompt, ModelSelector::Primary).await {
        Ok(response) => response,
        Err(err) => {
            warn!(%entity_id, error = %err, "verification call failed, keeping unverified metrics");
            return unverified();
        }
    };

    match json_extract::parse_as::<MetricsRecord>(&response) {
        Some(corrected) => {
            info!(%entity_id, "metrics verified");
            corrected.with_verified(true)
        }
        None => {
            warn!(%entity_id, "verification response unparseable, keeping unverified metrics");
            unverified()
        }
    }
}
