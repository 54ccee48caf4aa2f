use std::{sync::Arc, time::Duration};

use async_openai::{
    config::OpenAIConfig,
    types::{ChatCompletionRequestUserMessage, CreateChatCompletionRequestArgs},
    Client,
};
use async_trait::async_trait;
use tokio_retry::RetryIf;
use tracing::{debug, warn};

use crate::{
    error::AppError,
    utils::{config::AppConfig, embedding::EmbeddingProvider},
};

/// Which configured model a call should run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSelector {
    /// Extraction, verification and analysis calls.
    Primary,
    /// Cheap classification calls.
    Fast,
}

#[derive(Debug, Clone)]
pub struct ModelCatalog {
    pub primary: String,
    pub fast: String,
}

impl ModelCatalog {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            primary: config.generation_model.clone(),
            fast: config.fast_model.clone(),
        }
    }

    pub fn resolve(&self, selector: ModelSelector) -> &str {
        match selector {
            ModelSelector::Primary => &self.primary,
            ModelSelector::Fast => &self.fast,
        }
    }
}

/// A single, non-retrying call to a text generation backend.
///
/// Implementations report upstream resource exhaustion as [`AppError::RateLimited`]
/// and every other failure as [`AppError::Generation`].
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn complete(&self, prompt: &str, model: &str) -> Result<String, AppError>;
}

pub struct OpenAiBackend {
    client: Arc<Client<OpenAIConfig>>,
}

impl OpenAiBackend {
    pub fn new(client: Arc<Client<OpenAIConfig>>) -> Self {
        Self { client }
    }

    /// Builds a client whose internal backoff gives up after the first attempt, so the
    /// gateway's retry policy is the only one in effect.
    pub fn from_config(config: &AppConfig) -> Self {
        let client = Client::with_config(
            OpenAIConfig::new()
                .with_api_key(&config.openai_api_key)
                .with_api_base(&config.openai_base_url),
        )
        .with_backoff(
            backoff::ExponentialBackoffBuilder::new()
                .with_max_elapsed_time(Some(Duration::ZERO))
                .build(),
        );

        Self::new(Arc::new(client))
    }

    pub fn client(&self) -> Arc<Client<OpenAIConfig>> {
        Arc::clone(&self.client)
    }
}

#[async_trait]
impl GenerationBackend for OpenAiBackend {
    async fn complete(&self, prompt: &str, model: &str) -> Result<String, AppError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages([ChatCompletionRequestUserMessage::from(prompt.to_owned()).into()])
            .build()
            .map_err(|err| AppError::Generation(format!("invalid completion request: {err}")))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|err| classify_backend_error(err.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AppError::Generation("No content found in LLM response".into()))
    }
}

/// Maps an upstream failure message onto the gateway taxonomy.
pub fn classify_backend_error(message: String) -> AppError {
    if is_rate_limit_message(&message) {
        AppError::RateLimited(message)
    } else {
        AppError::Generation(message)
    }
}

fn is_rate_limit_message(message: &str) -> bool {
    let lowered = message.to_ascii_lowercase();
    lowered.contains("429")
        || lowered.contains("resource exhausted")
        || lowered.contains("resource_exhausted")
        || lowered.contains("rate limit")
        || lowered.contains("rate_limit")
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    /// Total attempts including the first call.
    pub max_attempts: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            max_attempts: 4,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.gateway_base_delay_ms),
            max_attempts: config.gateway_max_attempts.max(1),
        }
    }

    /// Delays slept between attempts: base, 2*base, 4*base, ...
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        std::iter::successors(Some(self.base_delay), |delay| Some(delay.saturating_mul(2)))
            .take(self.max_attempts.saturating_sub(1))
    }
}

/// Uniform entry point to the generation backend. The only place where backoff lives.
#[derive(Clone)]
pub struct ModelGateway {
    backend: Arc<dyn GenerationBackend>,
    models: ModelCatalog,
    retry: RetryPolicy,
    embedder: Option<Arc<EmbeddingProvider>>,
}

impl ModelGateway {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        models: ModelCatalog,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            backend,
            models,
            retry,
            embedder: None,
        }
    }

    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    #[tracing::instrument(skip_all, fields(model = ?model, prompt_chars = prompt.len()))]
    pub async fn generate(&self, prompt: &str, model: ModelSelector) -> Result<String, AppError> {
        let model_name = self.models.resolve(model);
        let max_attempts = self.retry.max_attempts;
        let mut attempt = 0_usize;

        let result = RetryIf::spawn(
            self.retry.delays(),
            || self.backend.complete(prompt, model_name),
            |err: &AppError| {
                attempt = attempt.saturating_add(1);
                let retryable = matches!(err, AppError::RateLimited(_));
                if retryable && attempt < max_attempts {
                    warn!(
                        attempt,
                        max_attempts,
                        model = model_name,
                        "generation backend rate limited; backing off"
                    );
                }
                retryable
            },
        )
        .await;

        match &result {
            Ok(text) => debug!(model = model_name, response_chars = text.len(), "generation completed"),
            Err(err) => warn!(model = model_name, error = %err, "generation failed"),
        }

        result
    }

    /// Single-shot embedding; failures are not retried.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError> {
        let embedder = self
            .embedder
            .as_ref()
            .ok_or_else(|| AppError::Embedding("no embedding backend configured".into()))?;

        embedder
            .embed(text)
            .await
            .map_err(|err| AppError::Embedding(err.to_string()))
    }
}

/// Scripted backends for tests in this and dependent crates.
#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::{async_trait, AppError, GenerationBackend};

    #[derive(Debug, Clone)]
    pub enum ScriptedReply {
        Text(String),
        RateLimited,
        Fail(String),
    }

    impl ScriptedReply {
        pub fn text(value: impl Into<String>) -> Self {
            Self::Text(value.into())
        }
    }

    #[derive(Debug, Clone)]
    pub struct RecordedCall {
        pub prompt: String,
        pub model: String,
    }

    /// Replays queued replies in order; an exhausted script fails with a generation error.
    #[derive(Default)]
    pub struct ScriptedBackend {
        replies: Mutex<VecDeque<ScriptedReply>>,
        calls: Mutex<Vec<RecordedCall>>,
    }

    impl ScriptedBackend {
        pub fn new(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().map(|calls| calls.len()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl GenerationBackend for ScriptedBackend {
        async fn complete(&self, prompt: &str, model: &str) -> Result<String, AppError> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(RecordedCall {
                    prompt: prompt.to_owned(),
                    model: model.to_owned(),
                });
            }

            let next = self
                .replies
                .lock()
                .ok()
                .and_then(|mut replies| replies.pop_front());

            match next {
                Some(ScriptedReply::Text(text)) => Ok(text),
                Some(ScriptedReply::RateLimited) => Err(AppError::RateLimited(
                    "429 Resource exhausted".to_string(),
                )),
                Some(ScriptedReply::Fail(message)) => Err(AppError::Generation(message)),
                None => Err(AppError::Generation("scripted backend exhausted".into())),
            }
        }
    }
}
