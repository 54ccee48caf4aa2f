use common::{
    error::AppError,
    storage::{entity_store::EntityStore, types::EntityId},
    utils::{
        llm::{ModelGateway, ModelSelector},
        text::truncate_chars,
    },
};
use tracing::{info, instrument, warn};

use crate::{
    config::AnalysisTuning,
    prompts::{answer_prompt, polish_prompt, NO_REPORT_CONTEXT, NO_REPORT_NOTICE, REVIEW_SKIPPED_NOTE},
};

/// Stored full text for `entity_id`, or `None` when nothing usable is stored.
pub async fn load_context(store: &EntityStore, entity_id: &EntityId) -> Option<String> {
    match store.get_full_text(entity_id).await {
        Ok(text) => text,
        Err(err) => {
            warn!(%entity_id, error = %err, "failed to read full text, answering without it");
            None
        }
    }
}

/// Answers `question` from the entity's stored filing text.
///
/// Only a failed draft call is an error. A failed polish pass returns the
/// draft with [`REVIEW_SKIPPED_NOTE`] appended.
#[instrument(skip_all, fields(entity_id = %entity_id, question_chars = question.len()))]
pub async fn answer_question(
    gateway: &ModelGateway,
    store: &EntityStore,
    tuning: &AnalysisTuning,
    entity_id: &EntityId,
    question: &str,
) -> Result<String, AppError> {
    let stored = load_context(store, entity_id).await;
    let grounded = stored.is_some();
    let context = stored.as_deref().unwrap_or(NO_REPORT_CONTEXT);
    info!(
        %entity_id,
        grounded,
        context_chars = context.chars().count(),
        "answering question"
    );

    let draft_prompt = answer_prompt(question, truncate_chars(context, tuning.answer_context_chars));
    let draft = gateway.generate(&draft_prompt, ModelSelector::Primary).await?;

    let answer = match gateway
        .generate(&polish_prompt(question, &draft), ModelSelector::Primary)
        .await
    {
        Ok(polished) => polished,
        Err(err) => {
            warn!(%entity_id, error = %err, "answer polish failed, returning draft");
            format!("{draft}{REVIEW_SKIPPED_NOTE}")
        }
    };

    if grounded {
        Ok(answer)
    } else {
        Ok(format!("{NO_REPORT_NOTICE}\n\n{answer}"))
    }
}
