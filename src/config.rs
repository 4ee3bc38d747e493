//! Configuration types for biography classification.
//!
//! Everything the pipeline needs beyond the documents themselves lives in
//! [`BioCraftConfig`], built via [`BioCraftConfigBuilder`]. The config is
//! shared read-only by every pipeline task, so it is cheap to clone.

use crate::error::BioCraftError;
use crate::progress::{NoopObserver, PipelineObserver};
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Configuration for the classification pipeline.
///
/// Built via [`BioCraftConfig::builder()`] or using
/// [`BioCraftConfig::default()`].
///
/// # Example
/// ```rust
/// use biocraft::BioCraftConfig;
///
/// let config = BioCraftConfig::builder()
///     .provider_name("openai")
///     .model("gpt-4.1-mini")
///     .api_timeout_secs(60)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct BioCraftConfig {
    /// LLM model identifier. Default: `gemini-2.5-flash`.
    pub model: String,

    /// LLM provider name (e.g. "gemini", "openai", "anthropic", "ollama").
    /// Default: `gemini`.
    pub provider_name: String,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`
    /// and skips the credential check.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Classification should copy text, not paraphrase it.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per document. Default: 8192.
    ///
    /// The response repeats the whole biography, so this must be larger
    /// than the longest expected input.
    pub max_tokens: usize,

    /// Per-classification timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Custom classification instruction. If None, uses
    /// [`crate::prompts::SYSTEM_INSTRUCTION`].
    pub system_prompt: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Receives per-file pipeline events. Default: no-op.
    pub observer: Arc<dyn PipelineObserver>,
}

impl Default for BioCraftConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            provider_name: "gemini".to_string(),
            provider: None,
            temperature: 0.1,
            max_tokens: 8192,
            api_timeout_secs: 120,
            system_prompt: None,
            download_timeout_secs: 120,
            observer: Arc::new(NoopObserver),
        }
    }
}

impl fmt::Debug for BioCraftConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BioCraftConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("system_prompt", &self.system_prompt.as_ref().map(|p| p.len()))
            .field("download_timeout_secs", &self.download_timeout_secs)
            .finish()
    }
}

impl BioCraftConfig {
    /// Create a new builder for `BioCraftConfig`.
    pub fn builder() -> BioCraftConfigBuilder {
        BioCraftConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`BioCraftConfig`].
pub struct BioCraftConfigBuilder {
    config: BioCraftConfig,
}

impl fmt::Debug for BioCraftConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BioCraftConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl BioCraftConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into().to_ascii_lowercase();
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.config.observer = observer;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BioCraftConfig, BioCraftError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(BioCraftError::InvalidConfig("Model name must not be empty".into()));
        }
        if c.provider.is_none() && c.provider_name.trim().is_empty() {
            return Err(BioCraftError::InvalidConfig(
                "Provider name must not be empty".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(BioCraftError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(BioCraftError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if matches!(&c.system_prompt, Some(p) if p.trim().is_empty()) {
            return Err(BioCraftError::InvalidConfig(
                "System prompt override must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = BioCraftConfig::default();
        assert_eq!(c.model, "gemini-2.5-flash");
        assert_eq!(c.provider_name, "gemini");
        assert_eq!(c.temperature, 0.1);
        assert_eq!(c.max_tokens, 8192);
        assert_eq!(c.api_timeout_secs, 120);
        assert!(c.provider.is_none());
        assert!(c.system_prompt.is_none());
    }

    #[test]
    fn builder_clamps_temperature_and_lowercases_provider() {
        let c = BioCraftConfig::builder()
            .temperature(9.0)
            .provider_name("OpenAI")
            .build()
            .unwrap();
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.provider_name, "openai");
    }

    #[test]
    fn builder_rejects_invalid_values() {
        assert!(BioCraftConfig::builder().model(" ").build().is_err());
        assert!(BioCraftConfig::builder().max_tokens(0).build().is_err());
        assert!(BioCraftConfig::builder().api_timeout_secs(0).build().is_err());
        assert!(BioCraftConfig::builder().system_prompt("\n").build().is_err());
    }

    #[test]
    fn debug_hides_prompt_text() {
        let c = BioCraftConfig::builder()
            .system_prompt("secret instruction")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("secret instruction"));
        assert!(dbg.contains("gemini-2.5-flash"));
    }
}
