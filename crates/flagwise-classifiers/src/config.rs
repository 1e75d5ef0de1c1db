//! Configuration for providers, cross-validation and phrase tables

use crate::patterns::PatternEntry;
use flagwise_core::{ClassificationMode, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Placeholder value shipped in sample env files; treated as no credential
pub const PLACEHOLDER_API_KEY: &str = "your-api-key-here";

/// Top-level orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Mode used when the caller does not pick one
    #[serde(default)]
    pub mode: ClassificationMode,

    /// Attach a [`flagwise_core::ClassificationTrace`] to every result
    #[serde(default)]
    pub debug: bool,

    /// Simulated latency awaited before every local-tier verdict
    #[serde(default)]
    pub local_fallback_delay_ms: u64,

    /// Enhanced-mode cross-validation thresholds
    #[serde(default)]
    pub validation: ValidationPolicy,

    /// Remote providers
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,

    /// Phrase table overrides
    #[serde(default)]
    pub patterns: PatternConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            mode: ClassificationMode::default(),
            debug: false,
            local_fallback_delay_ms: 0,
            validation: ValidationPolicy::default(),
            providers: default_providers(),
            patterns: PatternConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Load from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::config(format!("invalid config: {}", e)))
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Resolve every provider's credential from the process environment
    pub fn resolve_from_env(&mut self) {
        self.resolve_credentials(|key| std::env::var(key).ok());
    }

    /// Resolve every provider's credential through `lookup`
    pub fn resolve_credentials(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for provider in &mut self.providers {
            provider.resolve_credential(&lookup);
        }
    }

    /// Simulated local latency as a duration
    pub fn local_fallback_delay(&self) -> Duration {
        Duration::from_millis(self.local_fallback_delay_ms)
    }
}

/// Thresholds for enhanced-mode cross-validation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationPolicy {
    /// Local red severity (0-5) at which a remote green verdict is discarded
    #[serde(default = "default_red_severity_threshold")]
    pub red_severity_threshold: u8,

    /// Local green confidence at which a remote red verdict is discarded
    #[serde(default = "default_green_confidence_threshold")]
    pub green_confidence_threshold: f64,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            red_severity_threshold: default_red_severity_threshold(),
            green_confidence_threshold: default_green_confidence_threshold(),
        }
    }
}

/// Optional replacements for the built-in phrase tables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternConfig {
    /// Heuristic red phrases
    #[serde(default)]
    pub red: Option<Vec<PatternEntry>>,

    /// Heuristic green phrases
    #[serde(default)]
    pub green: Option<Vec<PatternEntry>>,

    /// Safety override keywords
    #[serde(default)]
    pub safety: Option<Vec<PatternEntry>>,
}

/// Wire format spoken by a provider endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApiFlavor {
    /// Google Generative Language `generateContent`
    Gemini,
    /// OpenAI-compatible chat completions (Groq, Together, Perplexity, OpenAI)
    #[default]
    OpenaiChat,
}

/// A provider credential; never printed
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// The secret value
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Static configuration for one remote provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider name, used as the provider tag
    pub name: String,

    /// Wire format
    #[serde(default)]
    pub api: ApiFlavor,

    /// Endpoint URL
    pub endpoint: String,

    /// Model identifier (chat flavours)
    #[serde(default)]
    pub model: Option<String>,

    /// Environment variable holding the credential
    pub api_key_env: String,

    /// Lower runs first
    #[serde(default)]
    pub priority: u32,

    /// Retries after the first attempt
    #[serde(default)]
    pub max_retries: u32,

    /// Delay before the first retry, doubled for each further one
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Answer length cap (chat flavours)
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Resolved credential
    #[serde(skip)]
    pub credential: Option<Credential>,
}

impl ProviderConfig {
    /// Create a provider config with default retry and request settings
    pub fn new(
        name: impl Into<String>,
        api: ApiFlavor,
        endpoint: impl Into<String>,
        api_key_env: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            api,
            endpoint: endpoint.into(),
            model: None,
            api_key_env: api_key_env.into(),
            priority: 0,
            max_retries: 0,
            backoff_base_ms: default_backoff_base_ms(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            credential: None,
        }
    }

    fn with_model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    fn with_budget(mut self, priority: u32, max_retries: u32) -> Self {
        self.priority = priority;
        self.max_retries = max_retries;
        self
    }

    /// Look up the credential; empty and placeholder values count as absent
    pub fn resolve_credential(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        self.credential = lookup(&self.api_key_env)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty() && v != PLACEHOLDER_API_KEY)
            .map(Credential);
    }

    /// Whether a credential is configured
    pub fn enabled(&self) -> bool {
        self.credential.is_some()
    }

    /// Backoff base as a duration
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    /// Request timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Built-in provider chain: gemini (3 retries), groq (2), together, perplexity
pub fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig::new(
            "gemini",
            ApiFlavor::Gemini,
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro:generateContent",
            "GEMINI_API_KEY",
        )
        .with_budget(1, 3),
        ProviderConfig::new(
            "groq",
            ApiFlavor::OpenaiChat,
            "https://api.groq.com/openai/v1/chat/completions",
            "GROQ_API_KEY",
        )
        .with_model("llama3-8b-8192")
        .with_budget(2, 2),
        ProviderConfig::new(
            "together",
            ApiFlavor::OpenaiChat,
            "https://api.together.xyz/v1/chat/completions",
            "TOGETHER_API_KEY",
        )
        .with_model("meta-llama/Llama-2-7b-chat-hf")
        .with_budget(3, 0),
        ProviderConfig::new(
            "perplexity",
            ApiFlavor::OpenaiChat,
            "https://api.perplexity.ai/chat/completions",
            "PERPLEXITY_API_KEY",
        )
        .with_model("llama-3.1-sonar-small-128k-chat")
        .with_budget(4, 0),
    ]
}

fn default_red_severity_threshold() -> u8 {
    4
}

fn default_green_confidence_threshold() -> f64 {
    0.8
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    500
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.mode, ClassificationMode::RemoteOnly);
        assert_eq!(config.validation.red_severity_threshold, 4);
        assert_eq!(config.validation.green_confidence_threshold, 0.8);

        let names: Vec<_> = config.providers.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["gemini", "groq", "together", "perplexity"]);
        assert_eq!(config.providers[0].max_retries, 3);
        assert_eq!(config.providers[1].max_retries, 2);
        assert!(config.providers.iter().all(|p| !p.enabled()));
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
mode: enhanced
debug: true
validation:
  red_severity_threshold: 3
providers:
  - name: primary
    api: gemini
    endpoint: http://localhost:9000/generate
    api_key_env: PRIMARY_KEY
    priority: 1
    max_retries: 3
    backoff_base_ms: 50
  - name: backup
    endpoint: http://localhost:9001/v1/chat/completions
    model: tiny
    api_key_env: BACKUP_KEY
    priority: 2
    max_retries: 2
patterns:
  safety:
    - phrase: shoved
      category: violence
      severity: 5
"#;
        let config = OrchestratorConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.mode, ClassificationMode::RemoteWithLocalValidation);
        assert!(config.debug);
        assert_eq!(config.validation.red_severity_threshold, 3);
        assert_eq!(config.validation.green_confidence_threshold, 0.8);
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[0].api, ApiFlavor::Gemini);
        assert_eq!(config.providers[1].api, ApiFlavor::OpenaiChat);
        assert_eq!(config.providers[0].backoff_base(), Duration::from_millis(50));
        assert_eq!(config.providers[1].backoff_base_ms, 1000);
        assert!(config.patterns.red.is_none());
        assert_eq!(config.patterns.safety.as_ref().unwrap()[0].phrase, "shoved");
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let err = OrchestratorConfig::from_yaml("mode: sideways").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "mode: local-only").unwrap();
        let config = OrchestratorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.mode, ClassificationMode::LocalOnly);
        assert_eq!(config.providers.len(), 4);
    }

    #[test]
    fn test_credential_resolution() {
        let mut config = OrchestratorConfig::default();
        config.resolve_credentials(|key| match key {
            "GEMINI_API_KEY" => Some("your-api-key-here".to_string()),
            "GROQ_API_KEY" => Some("gsk_live".to_string()),
            "TOGETHER_API_KEY" => Some("   ".to_string()),
            _ => None,
        });

        let enabled: Vec<_> = config
            .providers
            .iter()
            .filter(|p| p.enabled())
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(enabled, vec!["groq"]);
        assert_eq!(format!("{:?}", config.providers[1].credential), "Some(Credential(***))");
    }
}
