//! Remote provider client (remote tier)
//!
//! One generic client serves every hosted model. Vendor differences live in
//! the [`ProviderTransport`] strategy object; the client owns the retry loop,
//! response validation and provider tagging.

use crate::classifier::{Classifier, ClassifierTier};
use crate::retry::{is_transient, RetryPolicy, TransientRecognizer};
use async_trait::async_trait;
use flagwise_core::{Classification, Error, Flag, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Task name sent with every classification request
pub const CLASSIFY_TASK: &str = "classify-relationship-entry";

/// Confidence assumed when a provider omits it
pub const DEFAULT_REMOTE_CONFIDENCE: f64 = 0.8;

/// Abstract request sent to a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyRequest {
    /// Always [`CLASSIFY_TASK`]
    pub task: String,

    /// Entry text to classify
    pub text: String,
}

impl ClassifyRequest {
    /// Create a classification request for `text`
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            task: CLASSIFY_TASK.to_string(),
            text: text.into(),
        }
    }
}

/// Network capability behind a provider
///
/// Implementations return the model's raw textual answer and map failures
/// into the error taxonomy: [`Error::Transient`] for rate-limit, timeout and
/// 5xx-class signals, [`Error::Protocol`] for malformed envelopes and
/// [`Error::Permanent`] for everything else.
#[async_trait]
pub trait ProviderTransport: Send + Sync {
    /// Issue one request
    async fn send(&self, request: &ClassifyRequest) -> Result<String>;
}

/// Shape a provider answer must decode into
#[derive(Debug, Clone, Deserialize)]
struct RemoteVerdict {
    flag: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    suggestions: Vec<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

fn json_object_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("valid JSON object pattern"))
}

/// Parse a provider answer into a classification tagged with `provider`
///
/// Models often wrap the JSON in prose or code fences, so the outermost
/// `{...}` span is extracted first.
pub fn parse_verdict(provider: &str, raw: &str) -> Result<Classification> {
    let json = json_object_pattern()
        .find(raw)
        .ok_or_else(|| Error::protocol(format!("no JSON object in {} response", provider)))?;

    let verdict: RemoteVerdict = serde_json::from_str(json.as_str())
        .map_err(|e| Error::protocol(format!("invalid {} response: {}", provider, e)))?;

    let flag: Flag = verdict.flag.parse()?;
    let title = verdict.title.trim();
    let message = verdict.message.trim();
    if title.is_empty() || message.is_empty() {
        return Err(Error::protocol(format!(
            "{} response is missing title or message",
            provider
        )));
    }

    let suggestions: Vec<String> = verdict
        .suggestions
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if suggestions.is_empty() {
        return Err(Error::protocol(format!(
            "{} response has no suggestions",
            provider
        )));
    }

    Ok(Classification::new(
        flag,
        title,
        message,
        suggestions,
        normalize_confidence(verdict.confidence),
        provider,
    ))
}

/// Default missing or non-finite confidence, clamp to [0, 1]
///
/// Whole numbers in 2..=100 are read as percentages; anything else above 1
/// is overconfidence and clamps to 1.
pub fn normalize_confidence(confidence: Option<f64>) -> f64 {
    match confidence {
        Some(c) if c.is_finite() => {
            let c = if (2.0..=100.0).contains(&c) && c.fract() == 0.0 {
                c / 100.0
            } else {
                c
            };
            c.clamp(0.0, 1.0)
        }
        _ => DEFAULT_REMOTE_CONFIDENCE,
    }
}

/// Client for one remote provider
pub struct RemoteProviderClient {
    name: String,
    priority: u32,
    policy: RetryPolicy,
    transport: Option<Arc<dyn ProviderTransport>>,
    recognizer: TransientRecognizer,
}

impl RemoteProviderClient {
    /// Create an enabled client over `transport` with the default retry policy
    pub fn new(name: impl Into<String>, transport: Arc<dyn ProviderTransport>) -> Self {
        Self {
            name: name.into(),
            priority: 0,
            policy: RetryPolicy::default(),
            transport: Some(transport),
            recognizer: is_transient,
        }
    }

    /// Create a client whose credential is not configured
    pub fn disabled(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: 0,
            policy: RetryPolicy::none(),
            transport: None,
            recognizer: is_transient,
        }
    }

    /// Set the retry budget
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the priority (lower runs first)
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Replace the transient-error recognizer
    pub fn with_recognizer(mut self, recognizer: TransientRecognizer) -> Self {
        self.recognizer = recognizer;
        self
    }

    /// Provider priority (lower runs first)
    pub fn priority(&self) -> u32 {
        self.priority
    }

    /// Whether the provider has a usable credential
    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    /// The provider's retry budget
    pub fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Send one request and validate the answer
    async fn attempt(
        &self,
        transport: &dyn ProviderTransport,
        request: &ClassifyRequest,
    ) -> Result<Classification> {
        let raw = transport.send(request).await?;
        debug!(provider = %self.name, response_len = raw.len(), "Raw provider response");
        parse_verdict(&self.name, &raw)
    }
}

#[async_trait]
impl Classifier for RemoteProviderClient {
    async fn classify(&self, text: &str) -> Result<Classification> {
        let transport = self
            .transport
            .as_deref()
            .ok_or_else(|| Error::config(format!("{} API key not configured", self.name)))?;

        let request = ClassifyRequest::new(text);
        let max_attempts = self.policy.max_attempts();
        let mut attempt: u32 = 0;

        loop {
            let start = Instant::now();
            info!(
                provider = %self.name,
                attempt = attempt + 1,
                max_attempts = max_attempts,
                "Attempting provider request"
            );

            match self.attempt(transport, &request).await {
                Ok(classification) => {
                    metrics::counter!(
                        "flagwise_provider_attempts_total",
                        "provider" => self.name.clone(),
                        "outcome" => "ok"
                    )
                    .increment(1);
                    info!(
                        provider = %self.name,
                        attempt = attempt + 1,
                        flag = %classification.flag,
                        latency_us = start.elapsed().as_micros() as u64,
                        "Provider classification succeeded"
                    );
                    return Ok(classification);
                }
                Err(e) => {
                    metrics::counter!(
                        "flagwise_provider_attempts_total",
                        "provider" => self.name.clone(),
                        "outcome" => e.kind()
                    )
                    .increment(1);

                    let retryable = (self.recognizer)(&e);
                    warn!(
                        provider = %self.name,
                        attempt = attempt + 1,
                        error = %e,
                        retryable = retryable,
                        "Provider attempt failed"
                    );

                    if !retryable || attempt >= self.policy.max_retries {
                        if retryable {
                            warn!(
                                provider = %self.name,
                                attempts = attempt + 1,
                                "Retry budget exhausted"
                            );
                        }
                        return Err(e);
                    }

                    let delay = self.policy.delay_for(attempt);
                    info!(
                        provider = %self.name,
                        backoff_ms = delay.as_millis() as u64,
                        "Backing off before retry"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn tier(&self) -> ClassifierTier {
        ClassifierTier::Remote
    }
}

impl std::fmt::Debug for RemoteProviderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteProviderClient")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("policy", &self.policy)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct ScriptedTransport {
        calls: AtomicU32,
        reply: fn(u32) -> Result<String>,
    }

    #[async_trait]
    impl ProviderTransport for ScriptedTransport {
        async fn send(&self, request: &ClassifyRequest) -> Result<String> {
            assert_eq!(request.task, CLASSIFY_TASK);
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            (self.reply)(n)
        }
    }

    fn scripted(reply: fn(u32) -> Result<String>) -> Arc<ScriptedTransport> {
        Arc::new(ScriptedTransport {
            calls: AtomicU32::new(0),
            reply,
        })
    }

    const GREEN_JSON: &str = r#"{"flag":"green","title":"Green Flag","message":"Loving words","suggestions":["Say it back"],"confidence":0.9}"#;

    #[test]
    fn test_parse_wrapped_json() {
        let raw = format!("Here is my analysis:\n```json\n{}\n```", GREEN_JSON);
        let c = parse_verdict("gemini", &raw).unwrap();
        assert_eq!(c.flag, Flag::Green);
        assert_eq!(c.provider, "gemini");
        assert_eq!(c.confidence, 0.9);
        assert_eq!(c.suggestions, vec!["Say it back".to_string()]);
    }

    #[test]
    fn test_parse_rejects_incomplete_responses() {
        assert!(matches!(
            parse_verdict("groq", "I cannot help with that"),
            Err(Error::Protocol(_))
        ));
        assert!(matches!(
            parse_verdict("groq", r#"{"flag":"purple","title":"t","message":"m","suggestions":["s"]}"#),
            Err(Error::Protocol(_))
        ));
        assert!(matches!(
            parse_verdict("groq", r#"{"flag":"red","title":"","message":"m","suggestions":["s"]}"#),
            Err(Error::Protocol(_))
        ));
        assert!(matches!(
            parse_verdict("groq", r#"{"flag":"red","title":"t","message":"m","suggestions":[]}"#),
            Err(Error::Protocol(_))
        ));
        assert!(matches!(
            parse_verdict("groq", r#"{"title":"t","message":"m","suggestions":["s"]}"#),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_confidence_normalization() {
        assert_eq!(normalize_confidence(None), DEFAULT_REMOTE_CONFIDENCE);
        assert_eq!(normalize_confidence(Some(f64::NAN)), DEFAULT_REMOTE_CONFIDENCE);
        assert_eq!(normalize_confidence(Some(85.0)), 0.85);
        assert_eq!(normalize_confidence(Some(-0.2)), 0.0);
        assert_eq!(normalize_confidence(Some(250.0)), 1.0);
        assert_eq!(normalize_confidence(Some(0.42)), 0.42);
        assert_eq!(normalize_confidence(Some(1.0)), 1.0);
        assert_eq!(normalize_confidence(Some(1.05)), 1.0);
        assert_eq!(normalize_confidence(Some(1.5)), 1.0);
        assert_eq!(normalize_confidence(Some(85.5)), 1.0);
    }

    #[test]
    fn test_slight_overconfidence_clamps_to_certain() {
        let raw = r#"{"flag":"green","title":"t","message":"m","suggestions":["s"],"confidence":1.05}"#;
        let c = parse_verdict("gemini", raw).unwrap();
        assert_eq!(c.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_disabled_client_fails_without_requests() {
        let client = RemoteProviderClient::disabled("gemini");
        assert!(!client.is_enabled());
        let err = client.classify("anything").await.unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_then_success() {
        let transport = scripted(|n| {
            if n < 2 {
                Err(Error::transient("Temporary error: 503"))
            } else {
                Ok(GREEN_JSON.to_string())
            }
        });
        let client = RemoteProviderClient::new("gemini", transport.clone())
            .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(1000)));

        let started = tokio::time::Instant::now();
        let c = client.classify("She said she loved me").await.unwrap();
        assert_eq!(c.provider, "gemini");
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        // 1000ms + 2000ms of backoff
        assert!(started.elapsed() >= Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_protocol_error_is_not_retried() {
        let transport = scripted(|_| Ok("not json at all".to_string()));
        let client = RemoteProviderClient::new("groq", transport.clone())
            .with_retry_policy(RetryPolicy::new(2, Duration::from_millis(10)));

        let err = client.classify("text").await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_recognizer() {
        let transport = scripted(|_| Err(Error::permanent("HTTP 418")));
        let client = RemoteProviderClient::new("together", transport.clone())
            .with_retry_policy(RetryPolicy::new(1, Duration::from_millis(10)))
            .with_recognizer(|_| true);

        assert!(client.classify("text").await.is_err());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }
}
