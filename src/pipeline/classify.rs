//! Classification: raw biography text → [`StructuredProfile`] via an LLM.
//!
//! The request carries two messages: the classification instruction with
//! the JSON schema appended (system) and the extracted text (user). The reply is parsed by [`crate::pipeline::postprocess`].
//!
//! ## Credentials
//!
//! The provider's API key is looked up when a document is classified, not
//! when the classifier is built. A missing key therefore fails only the
//! files that reach classification, each with
//! [`PipelineError::MissingCredential`], before any network call is made.
//!
//! No retry is attempted: any failure is terminal for that file.

use crate::config::BioCraftConfig;
use crate::error::PipelineError;
use crate::pipeline::postprocess::parse_profile_response;
use crate::profile::StructuredProfile;
use crate::prompts::{build_system_prompt, SYSTEM_INSTRUCTION};
use crate::schema::response_schema;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Turns raw biography text into a profile.
#[async_trait]
pub trait ProfileClassifier: Send + Sync {
    async fn classify(&self, raw_text: &str) -> Result<StructuredProfile, PipelineError>;
}

/// Classifier backed by an `edgequake-llm` provider.
pub struct LlmClassifier {
    config: BioCraftConfig,
    system_prompt: String,
}

impl LlmClassifier {
    pub fn new(config: BioCraftConfig) -> Self {
        let instruction = config
            .system_prompt
            .as_deref()
            .unwrap_or(SYSTEM_INSTRUCTION);
        let system_prompt = build_system_prompt(instruction, &response_schema());
        Self {
            config,
            system_prompt,
        }
    }

    /// The provider for this call: the pre-built one, or a named one whose
    /// credential is present in the environment.
    fn resolve_provider(&self) -> Result<Arc<dyn LLMProvider>, PipelineError> {
        if let Some(ref provider) = self.config.provider {
            return Ok(Arc::clone(provider));
        }

        let name = self.config.provider_name.as_str();
        if let Some(env_var) = credential_env_var(name) {
            let present = std::env::var(env_var)
                .map(|v| !v.trim().is_empty())
                .unwrap_or(false);
            if !present {
                return Err(PipelineError::MissingCredential {
                    provider: name.to_string(),
                    env_var: env_var.to_string(),
                });
            }
        }

        ProviderFactory::create_llm_provider(name, &self.config.model).map_err(|e| {
            PipelineError::ProviderNotConfigured {
                provider: name.to_string(),
                hint: format!("{e}"),
            }
        })
    }
}

impl std::fmt::Debug for LlmClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClassifier")
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl ProfileClassifier for LlmClassifier {
    async fn classify(&self, raw_text: &str) -> Result<StructuredProfile, PipelineError> {
        let provider = self.resolve_provider()?;
        let messages = vec![
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user(raw_text),
        ];
        let options = build_options(&self.config);
        let secs = self.config.api_timeout_secs;

        let start = Instant::now();
        let response = tokio::time::timeout(
            Duration::from_secs(secs),
            provider.chat(&messages, Some(&options)),
        )
        .await
        .map_err(|_| PipelineError::Timeout { secs })?
        .map_err(|e| PipelineError::ServiceError {
            detail: format!("{e}"),
        })?;

        debug!(
            "Classified {} chars: {} input tokens, {} output tokens, {:?}",
            raw_text.chars().count(),
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        parse_profile_response(&response.content)
    }
}

/// Environment variable holding the API key of a hosted provider.
///
/// `None` for local providers and for names this crate does not know, which
/// are left to the provider factory to validate.
pub fn credential_env_var(provider_name: &str) -> Option<&'static str> {
    match provider_name {
        "gemini" | "google" => Some("GEMINI_API_KEY"),
        "openai" => Some("OPENAI_API_KEY"),
        "anthropic" => Some("ANTHROPIC_API_KEY"),
        "mistral" => Some("MISTRAL_API_KEY"),
        "xai" => Some("XAI_API_KEY"),
        "openrouter" => Some("OPENROUTER_API_KEY"),
        _ => None,
    }
}

/// Build `CompletionOptions` from the config.
fn build_options(config: &BioCraftConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}
