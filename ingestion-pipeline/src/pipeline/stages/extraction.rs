use common::{
    storage::types::{EntityId, MetricsRecord},
    utils::{llm::ModelSelector, text::truncate_chars},
};
use tracing::{info, warn};

use crate::{
    pipeline::{config::IngestionTuning, services::PipelineServices},
    utils::{
        llm_instructions::metrics_extraction_prompt,
        segmenter::Chunk,
    },
};

/// Outcome of the extraction call. Either half may be empty independently.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub record: Option<MetricsRecord>,
    pub full_text: String,
}

pub fn full_text(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Asks the primary model for a metrics record over the whole document.
///
/// Gateway and parse failures degrade to `record: None`; they never discard
/// the full text.
pub async fn extract(
    services: &dyn PipelineServices,
    tuning: &IngestionTuning,
    chunks: &[Chunk],
    entity_id: &EntityId,
    filename: &str,
) -> Extraction {
    let full_text = full_text(chunks);
    if full_text.trim().is_empty() {
        warn!(%entity_id, "no text extracted, skipping metrics extraction");
        return Extraction {
            record: None,
            full_text,
        };
    }

    let prompt = metrics_extraction_prompt(
        filename,
        truncate_chars(&full_text, tuning.extraction_prompt_chars),
    );

    let response = match services.generate(&prompt, ModelSelector::Primary).await {
        Ok(response) => response,
        Err(err) => {
            warn!(%entity_id, error = %err, "metrics extraction call failed");
            return Extraction {
                record: None,
                full_text,
            };
        }
    };

    let record = json_extract::parse_as::<MetricsRecord>(&response)
        .map(|record| record.with_verified(false));

    match &record {
        Some(record) => info!(
            %entity_id,
            metrics = record.metrics().count(),
            "metrics extracted"
        ),
        None => warn!(
            %entity_id,
            response_chars = response.chars().count(),
            "metrics response did not contain a JSON object"
        ),
    }

    Extraction { record, full_text }
}
