//! Backend selection, and the bridge to edgequake-llm providers.
//!
//! [`resolve_generator`] runs once when a [`crate::Scraper`] is built and
//! picks the model backend, most specific first:
//!
//! 1. **Pre-built provider** (`config.provider`) used as-is.
//! 2. **Named provider** (`config.provider_name`, other than `"gemini"`)
//!    created through [`ProviderFactory::create_llm_provider`], which reads
//!    that provider's own key variable (`OPENAI_API_KEY`, ...).
//! 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`,
//!    both non-empty.
//! 4. **Built-in Gemini client**, keyed by `config.api_key` or
//!    `GEMINI_API_KEY`. A missing key fails here, before any page is rendered.

use crate::config::{ScrapeConfig, DEFAULT_PROVIDER_MODEL, GEMINI_API_KEY_VAR};
use crate::error::{ExtractionError, ScrapeError};
use crate::pipeline::extract::{Generation, TextGenerator};
use crate::pipeline::gemini::GeminiClient;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, LlmError, ProviderFactory};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Adapts an edgequake-llm chat provider to [`TextGenerator`].
pub struct ProviderGenerator {
    provider: Arc<dyn LLMProvider>,
    label: String,
    options: CompletionOptions,
    timeout: Duration,
}

impl ProviderGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>, config: &ScrapeConfig) -> Self {
        Self {
            provider,
            label: label.into(),
            options: build_options(config),
            timeout: Duration::from_secs(config.api_timeout_secs),
        }
    }
}

#[async_trait]
impl TextGenerator for ProviderGenerator {
    fn name(&self) -> String {
        self.label.clone()
    }

    async fn generate(
        &self,
        system_instruction: &str,
        prompt: &str,
    ) -> Result<Generation, ExtractionError> {
        let messages = vec![
            ChatMessage::system(system_instruction),
            ChatMessage::user(prompt),
        ];
        let call = self.provider.chat(&messages, Some(&self.options));
        let response = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                return Err(classify_provider_error(
                    &self.label,
                    e,
                    self.timeout.as_secs(),
                ))
            }
            Err(_) => {
                return Err(ExtractionError::Timeout {
                    provider: self.label.clone(),
                    secs: self.timeout.as_secs(),
                })
            }
        };

        Ok(Generation {
            text: response.content,
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
        })
    }
}

fn build_options(config: &ScrapeConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        ..Default::default()
    }
}

/// Map an edgequake-llm error onto the extraction error taxonomy.
pub(crate) fn classify_provider_error(
    provider: &str,
    error: LlmError,
    timeout_secs: u64,
) -> ExtractionError {
    let provider = provider.to_string();
    match error {
        LlmError::AuthError(detail) => ExtractionError::Auth { provider, detail },
        LlmError::RateLimited(detail) => ExtractionError::RateLimited { provider, detail },
        LlmError::NetworkError(detail) => ExtractionError::Network { provider, detail },
        LlmError::Timeout => ExtractionError::Timeout {
            provider,
            secs: timeout_secs,
        },
        LlmError::SerializationError(e) => ExtractionError::InvalidResponse {
            provider,
            detail: e.to_string(),
        },
        LlmError::ApiError(message)
        | LlmError::ProviderError(message)
        | LlmError::Unknown(message) => classify_message(provider, message, timeout_secs),
        other => ExtractionError::Api {
            provider,
            status: None,
            message: other.to_string(),
        },
    }
}

/// Keyword fallback for errors that only carry text. Matches whole words,
/// so "4013 tokens" is not a 401.
fn classify_message(provider: String, message: String, timeout_secs: u64) -> ExtractionError {
    let lower = message.to_ascii_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let has = |phrases: &[&str]| {
        phrases.iter().any(|phrase| {
            let needle: Vec<&str> = phrase.split(' ').collect();
            words.windows(needle.len()).any(|w| w == needle.as_slice())
        })
    };

    if has(&["401", "403", "unauthorized", "forbidden", "invalid api key", "api key not valid", "authentication"]) {
        ExtractionError::Auth {
            provider,
            detail: message,
        }
    } else if has(&["429", "rate limit", "ratelimit", "quota", "too many requests"]) {
        ExtractionError::RateLimited {
            provider,
            detail: message,
        }
    } else if has(&["timed out", "timeout"]) {
        ExtractionError::Timeout {
            provider,
            secs: timeout_secs,
        }
    } else if has(&["connection refused", "connection reset", "dns", "network"]) {
        ExtractionError::Network {
            provider,
            detail: message,
        }
    } else {
        ExtractionError::Api {
            provider,
            status: None,
            message,
        }
    }
}

fn create_provider(name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, ScrapeError> {
    ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        ScrapeError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the extraction backend for `config`.
pub fn resolve_generator(config: &ScrapeConfig) -> Result<Arc<dyn TextGenerator>, ScrapeError> {
    // 1) Caller-supplied provider
    if let Some(ref provider) = config.provider {
        let label = config.model.clone().unwrap_or_else(|| "custom".to_string());
        debug!("Using caller-supplied provider ({})", label);
        return Ok(Arc::new(ProviderGenerator::new(
            Arc::clone(provider),
            label,
            config,
        )));
    }

    // 2) Named provider, unless it names the built-in client
    if !config.uses_builtin_gemini() {
        if let Some(ref name) = config.provider_name {
            let model = config.model.as_deref().unwrap_or(DEFAULT_PROVIDER_MODEL);
            info!("Using provider {}/{}", name, model);
            let provider = create_provider(name, model)?;
            return Ok(Arc::new(ProviderGenerator::new(
                provider,
                format!("{name}/{model}"),
                config,
            )));
        }
    }

    // 3) Environment pair
    if config.provider_name.is_none() {
        if let (Ok(prov), Ok(model)) = (
            std::env::var("EDGEQUAKE_LLM_PROVIDER"),
            std::env::var("EDGEQUAKE_MODEL"),
        ) {
            if !prov.is_empty() && !model.is_empty() && !prov.eq_ignore_ascii_case("gemini") {
                info!("Using provider {}/{} from environment", prov, model);
                let provider = create_provider(&prov, &model)?;
                return Ok(Arc::new(ProviderGenerator::new(
                    provider,
                    format!("{prov}/{model}"),
                    config,
                )));
            }
        }
    }

    // 4) Built-in Gemini
    let api_key = resolve_gemini_key(config)?;
    let client = GeminiClient::from_config(config, api_key);
    info!("Using gemini/{}", client.model());
    Ok(Arc::new(client))
}

/// Explicit key first, then the environment. Empty values count as missing.
pub fn resolve_gemini_key(config: &ScrapeConfig) -> Result<String, ScrapeError> {
    config
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .or_else(|| {
            std::env::var(GEMINI_API_KEY_VAR)
                .ok()
                .filter(|k| !k.trim().is_empty())
        })
        .ok_or_else(|| ScrapeError::MissingCredential {
            var: GEMINI_API_KEY_VAR.to_string(),
        })
}
