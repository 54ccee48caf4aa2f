use std::{future::Future, sync::Arc};

use common::{
    error::AppError,
    storage::types::EntityId,
    utils::{
        llm::{ModelGateway, ModelSelector},
        text::truncate_chars,
    },
};
use serde::Deserialize;
use tracing::{info, warn};

use super::{
    document::{self, PageSource},
    llm_instructions::identification_prompt,
};

#[derive(Debug, Clone)]
pub struct IdentificationLimits {
    pub preview_pages: u32,
    pub min_preview_chars: usize,
    pub prompt_chars: usize,
}

impl Default for IdentificationLimits {
    fn default() -> Self {
        Self {
            preview_pages: 5,
            min_preview_chars: 50,
            prompt_chars: 4_000,
        }
    }
}

#[derive(Deserialize)]
struct TickerResponse {
    #[serde(default)]
    ticker: String,
}

/// Resolves the entity for an upload, preferring a usable caller hint.
///
/// `open_document` is only awaited when the hint is absent or unusable.
pub async fn resolve_entity_id<F, Fut>(
    gateway: &ModelGateway,
    hint: Option<&str>,
    open_document: F,
    limits: &IdentificationLimits,
) -> Result<EntityId, AppError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Arc<dyn PageSource>, AppError>>,
{
    if let Some(entity) = hint.and_then(EntityId::from_hint) {
        info!(entity_id = %entity, "using caller-supplied company id");
        return Ok(entity);
    }

    let source = open_document().await.map_err(|err| {
        AppError::Validation(format!(
            "Could not read the document to identify the company and no company id was provided: {err}"
        ))
    })?;

    identify_from_document(gateway, source, limits)
        .await?
        .ok_or_else(|| {
            AppError::Validation(
                "Could not automatically identify the company and no company id was provided. \
                 Please ensure the PDF has text."
                    .into(),
            )
        })
}

/// Asks the fast model for the ticker named on the first pages of the document.
///
/// `Ok(None)` means the document gave nothing usable. Rate limits and backend
/// failures are returned as errors so callers can report them as such.
pub async fn identify_from_document(
    gateway: &ModelGateway,
    source: Arc<dyn PageSource>,
    limits: &IdentificationLimits,
) -> Result<Option<EntityId>, AppError> {
    let preview: String = document::load(source, limits.preview_pages)
        .await?
        .into_iter()
        .map(|segment| segment.text)
        .collect();

    if preview.chars().count() <= limits.min_preview_chars {
        warn!(preview_chars = preview.len(), "document preview too short to identify company");
        return Ok(None);
    }

    let prompt = identification_prompt(truncate_chars(&preview, limits.prompt_chars));
    // An unavailable backend is the caller's problem, not an unidentifiable document.
    let response = match gateway.generate(&prompt, ModelSelector::Fast).await {
        Ok(response) => response,
        Err(err) if err.is_backend_failure() => return Err(err),
        Err(err) => {
            warn!(error = %err, "company identification call failed");
            return Ok(None);
        }
    };

    let candidate = match json_extract::parse_as::<TickerResponse>(&response) {
        Some(parsed) => parsed.ticker,
        None => response
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .replace(".NS", "")
            .replace(".BO", "")
            .replace('.', ""),
    };

    let entity = EntityId::from_ticker(&candidate);
    match &entity {
        Some(entity) => info!(entity_id = %entity, "identified company from document"),
        None => warn!(candidate = %candidate, "model returned an invalid ticker"),
    }

    Ok(entity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::document::testing::InMemoryDocument;
    use common::utils::llm::{
        testing::{ScriptedBackend, ScriptedReply},
        GenerationBackend, ModelCatalog, RetryPolicy,
    };

    fn gateway(backend: Arc<ScriptedBackend>) -> ModelGateway {
        ModelGateway::new(
            backend,
            ModelCatalog {
                primary: "primary".into(),
                fast: "fast".into(),
            },
            RetryPolicy::default(),
        )
    }

    fn report_source() -> Arc<dyn PageSource> {
        Arc::new(InMemoryDocument::new([
            "Tata Motors Limited Integrated Annual Report 2023-24",
            "Chairman's message on a record year for commercial and passenger vehicles",
        ]))
    }

    #[tokio::test]
    async fn valid_hint_wins_without_reading_document() {
        let backend = Arc::new(ScriptedBackend::default());
        let gateway = gateway(Arc::clone(&backend));

        let entity = resolve_entity_id(
            &gateway,
            Some("infy"),
            || async { Err(AppError::Processing("must not be opened".into())) },
            &IdentificationLimits::default(),
        )
        .await
        .expect("hint accepted");

        assert_eq!(entity.as_str(), "INFY");
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn placeholder_hint_falls_back_to_classification() {
        let backend = Arc::new(ScriptedBackend::new([ScriptedReply::text(
            "```json\n{\"ticker\": \"tatamotors.ns\"}\n```",
        )]));
        let gateway = gateway(Arc::clone(&backend));

        let entity = resolve_entity_id(
            &gateway,
            Some("undefined"),
            || async { Ok(report_source()) },
            &IdentificationLimits::default(),
        )
        .await
        .expect("identified");

        assert_eq!(entity.as_str(), "TATAMOTORS");
        let calls = backend.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls.first().is_some_and(|c| c.model == "fast"
            && c.prompt.contains("Tata Motors Limited")));
    }

    #[tokio::test]
    async fn plain_text_reply_uses_first_token() {
        let backend = Arc::new(ScriptedBackend::new([ScriptedReply::text("RELIANCE.NS is the ticker")]));
        let entity = identify_from_document(
            &gateway(backend),
            report_source(),
            &IdentificationLimits::default(),
        )
        .await
        .expect("identify");

        assert_eq!(entity.map(String::from), Some("RELIANCE".to_string()));
    }

    #[tokio::test]
    async fn unusable_document_and_no_hint_is_a_validation_error() {
        let backend = Arc::new(ScriptedBackend::default());
        let gateway = gateway(Arc::clone(&backend));
        let short: Arc<dyn PageSource> = Arc::new(InMemoryDocument::new(["tiny"]));

        let err = resolve_entity_id(
            &gateway,
            None,
            move || async move { Ok(short) },
            &IdentificationLimits::default(),
        )
        .await
        .expect_err("nothing usable");

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn invalid_ticker_is_rejected() {
        let backend = Arc::new(ScriptedBackend::new([ScriptedReply::text("{\"ticker\": \"M&M\"}")]));
        let result = resolve_entity_id(
            &gateway(backend),
            Some(""),
            || async { Ok(report_source()) },
            &IdentificationLimits::default(),
        )
        .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn rate_limited_backend_is_not_an_identification_miss() {
        let backend = Arc::new(ScriptedBackend::new([
            ScriptedReply::RateLimited,
            ScriptedReply::RateLimited,
        ]));
        let gateway = ModelGateway::new(
            Arc::clone(&backend) as Arc<dyn GenerationBackend>,
            ModelCatalog {
                primary: "primary".into(),
                fast: "fast".into(),
            },
            RetryPolicy {
                base_delay: std::time::Duration::from_millis(1),
                max_attempts: 2,
            },
        );

        let err = resolve_entity_id(
            &gateway,
            None,
            || async { Ok(report_source()) },
            &IdentificationLimits::default(),
        )
        .await
        .expect_err("backend unavailable");

        assert!(matches!(err, AppError::RateLimited(_)));
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn failing_backend_surfaces_generation_error() {
        let backend = Arc::new(ScriptedBackend::new([ScriptedReply::Fail(
            "upstream 500".into(),
        )]));

        let result = identify_from_document(
            &gateway(backend),
            report_source(),
            &IdentificationLimits::default(),
        )
        .await;

        assert!(matches!(result, Err(AppError::Generation(_))));
    }
}
