use common::utils::config::AppConfig;

use crate::utils::identify::IdentificationLimits;

#[derive(Debug, Clone)]
pub struct IngestionTuning {
    pub max_pages: u32,
    pub chunk_max_chars: usize,
    pub chunk_overlap_chars: usize,
    pub extraction_prompt_chars: usize,
    pub verification_source_chars: usize,
    pub evidence_preview_chars: usize,
    pub identification: IdentificationLimits,
}

impl Default for IngestionTuning {
    fn default() -> Self {
        Self {
            max_pages: 250,
            // 1000 nominal tokens at ~4 chars each
            chunk_max_chars: 4_000,
            chunk_overlap_chars: 100,
            extraction_prompt_chars: 300_000,
            verification_source_chars: 50_000,
            evidence_preview_chars: 500,
            identification: IdentificationLimits::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestionConfig {
    pub tuning: IngestionTuning,
    pub queue_capacity: usize,
    pub concurrency: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            tuning: IngestionTuning::default(),
            queue_capacity: 32,
            concurrency: 2,
        }
    }
}

impl IngestionConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            tuning: IngestionTuning::default(),
            queue_capacity: config.ingestion_queue_capacity.max(1),
            concurrency: config.ingestion_concurrency.max(1),
        }
    }
}
