//! Classification orchestrator
//!
//! The single entry point callers use. Per call it walks a small state
//! machine:
//!
//! ```text
//! local-only:                    local ─────────────────────────────┐
//! remote-only:                   provider 1 → provider 2 → … → local ├→ safety override → done
//! remote-with-local-validation:  (providers ∥ local) → cross-check ──┘
//! ```
//!
//! Provider failures of any kind advance to the next tier and never reach the
//! caller. The safety override runs on every path.

use crate::classifier::Classifier;
use crate::config::{OrchestratorConfig, ValidationPolicy};
use crate::heuristic::{HeuristicAssessment, KeywordHeuristicClassifier};
use crate::patterns::{default_green_patterns, default_red_patterns, default_safety_keywords};
use crate::remote::RemoteProviderClient;
use crate::retry::RetryPolicy;
use crate::safety::SafetyOverride;
use crate::transport::HttpTransport;
use flagwise_core::{
    provider, Classification, ClassificationMode, ClassificationTrace, Entry, Error, Flag,
    ProviderAttempt, Result,
};
use futures::FutureExt;
use serde::Serialize;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Sample entry used to probe a provider
pub const PROBE_TEXT: &str = "My partner said they love me for the first time today";

/// One remote tier
struct ProviderSlot {
    classifier: Arc<dyn Classifier>,
    priority: u32,
    enabled: bool,
}

/// Role of a provider in the fallback chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProviderRole {
    /// First tier
    Primary,
    /// Second tier, meant to fail fast
    FastBackup,
    /// Any later tier
    AdditionalBackup,
}

impl ProviderRole {
    fn for_rank(rank: usize) -> Self {
        match rank {
            0 => Self::Primary,
            1 => Self::FastBackup,
            _ => Self::AdditionalBackup,
        }
    }
}

impl fmt::Display for ProviderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Primary => "Primary",
            Self::FastBackup => "Fast Backup",
            Self::AdditionalBackup => "Additional Backup",
        })
    }
}

/// Summary of one configured provider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderInfo {
    /// Provider tag
    pub name: String,
    /// Configured priority, lower runs first
    pub priority: u32,
    /// Whether a credential was resolved
    pub enabled: bool,
    /// Position in the fallback chain
    pub role: ProviderRole,
}

/// Which tiers are usable right now
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderStatus {
    /// First-ranked provider, if it has a credential
    pub primary: Option<String>,
    /// Second-ranked provider, if it has a credential
    pub backup: Option<String>,
    /// Enabled providers across every tier
    pub total_enabled: usize,
    /// Enabled providers among the primary and backup tiers
    pub recommended: usize,
}

/// Result of probing a single provider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderProbe {
    /// Name that was probed
    pub provider: String,
    /// Whether the sample entry was classified
    pub success: bool,
    /// Chain position; absent for unknown providers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<ProviderRole>,
    /// Round trip including retries, on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    /// Failure reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of enhanced-mode cross-validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossValidation {
    /// Remote verdict trusted
    KeptRemote,
    /// Severe local red replaced a remote green
    LocalRedOverRemoteGreen,
    /// Confident local green replaced a remote red
    LocalGreenOverRemoteRed,
}

impl CrossValidation {
    /// Stable label used in traces
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeptRemote => "kept-remote",
            Self::LocalRedOverRemoteGreen => "local-red-over-remote-green",
            Self::LocalGreenOverRemoteRed => "local-green-over-remote-red",
        }
    }
}

/// Decide between a remote verdict and the local assessment of the same text
pub fn cross_validate(
    remote: &Classification,
    local: &HeuristicAssessment,
    policy: &ValidationPolicy,
) -> CrossValidation {
    let local_flag = local.classification.flag;
    if local_flag == Flag::Red
        && local.severity >= policy.red_severity_threshold
        && remote.flag == Flag::Green
    {
        CrossValidation::LocalRedOverRemoteGreen
    } else if local_flag == Flag::Green
        && local.classification.confidence >= policy.green_confidence_threshold
        && remote.flag == Flag::Red
    {
        CrossValidation::LocalGreenOverRemoteRed
    } else {
        CrossValidation::KeptRemote
    }
}

/// Sequences remote providers, the local heuristic and the safety override
pub struct ClassificationOrchestrator {
    providers: Vec<ProviderSlot>,
    heuristic: KeywordHeuristicClassifier,
    safety: SafetyOverride,
    validation: ValidationPolicy,
    default_mode: ClassificationMode,
    debug: bool,
    local_delay: Duration,
}

impl ClassificationOrchestrator {
    /// Start building an orchestrator
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// Build the full chain from configuration with HTTP transports
    ///
    /// Credentials must already be resolved; providers without one are kept
    /// as disabled tiers.
    pub fn from_config(config: &OrchestratorConfig) -> Result<Self> {
        let mut builder = Self::builder()
            .mode(config.mode)
            .debug(config.debug)
            .validation(config.validation)
            .local_fallback_delay(config.local_fallback_delay())
            .heuristic(KeywordHeuristicClassifier::with_patterns(
                config.patterns.red.clone().unwrap_or_else(default_red_patterns),
                config.patterns.green.clone().unwrap_or_else(default_green_patterns),
            )?)
            .safety(SafetyOverride::with_keywords(
                config.patterns.safety.clone().unwrap_or_else(default_safety_keywords),
            )?);

        for p in &config.providers {
            let client = if p.enabled() {
                RemoteProviderClient::new(p.name.clone(), Arc::new(HttpTransport::from_config(p)?))
            } else {
                RemoteProviderClient::disabled(p.name.clone())
            };
            builder = builder.provider(
                client
                    .with_retry_policy(RetryPolicy::new(p.max_retries, p.backoff_base()))
                    .with_priority(p.priority),
            );
        }

        let orchestrator = builder.build()?;
        info!(
            providers = orchestrator.providers.len(),
            enabled = orchestrator.available_providers().len(),
            mode = %orchestrator.default_mode,
            "Classification orchestrator initialized"
        );
        Ok(orchestrator)
    }

    /// Classify with the configured default mode
    pub async fn classify_with_default_mode(&self, text: &str) -> Classification {
        self.classify(text, self.default_mode).await
    }

    /// Classify a journal entry's text
    pub async fn classify_entry(&self, entry: &Entry, mode: ClassificationMode) -> Classification {
        debug!(entry_id = %entry.id, "Classifying journal entry");
        self.classify(&entry.text, mode).await
    }

    /// Classify `text`; always yields a valid classification
    pub async fn classify(&self, text: &str, mode: ClassificationMode) -> Classification {
        let start = Instant::now();
        let mut trace = ClassificationTrace {
            mode,
            ..Default::default()
        };

        let outcome = AssertUnwindSafe(self.run(text, mode, &mut trace))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(Error::internal("classification pipeline panicked")))
            .and_then(|chosen| {
                let checked = self.safety.apply(chosen, text);
                checked.validate().map(|_| checked)
            });

        let mut result = match outcome {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Classification pipeline failed, using emergency local verdict");
                let fallback = self
                    .heuristic
                    .classify_text(text)
                    .with_provider(provider::EMERGENCY_LOCAL);
                self.safety.apply(fallback, text)
            }
        };

        metrics::counter!(
            "flagwise_classifications_total",
            "mode" => mode.as_str(),
            "flag" => result.flag.as_str()
        )
        .increment(1);
        info!(
            mode = %mode,
            flag = %result.flag,
            provider = %result.provider,
            latency_us = start.elapsed().as_micros() as u64,
            "Classification complete"
        );

        if self.debug {
            trace.safety_override_applied = result.provider == provider::SAFETY_OVERRIDE;
            trace.latency_us = start.elapsed().as_micros() as u64;
            result.trace = Some(trace);
        } else {
            result.trace = None;
        }
        result
    }

    async fn run(
        &self,
        text: &str,
        mode: ClassificationMode,
        trace: &mut ClassificationTrace,
    ) -> Result<Classification> {
        match mode {
            ClassificationMode::LocalOnly => self.local_verdict(text, provider::LOCAL).await,

            ClassificationMode::RemoteOnly => {
                match self.remote_chain(text, &mut trace.attempts).await {
                    Some(remote) => Ok(remote),
                    None => self.fallback(text).await,
                }
            }

            ClassificationMode::RemoteWithLocalValidation => {
                let (remote, local) = futures::join!(
                    self.remote_chain(text, &mut trace.attempts),
                    async { self.heuristic.assess(text) }
                );

                let Some(remote) = remote else {
                    trace.validation = Some("remote-unavailable".to_string());
                    return self.fallback(text).await;
                };

                let decision = cross_validate(&remote, &local, &self.validation);
                trace.validation = Some(decision.as_str().to_string());
                if decision != CrossValidation::KeptRemote {
                    warn!(
                        remote_provider = %remote.provider,
                        remote_flag = %remote.flag,
                        local_flag = %local.classification.flag,
                        severity = local.severity,
                        decision = decision.as_str(),
                        "Local validation replaced remote verdict"
                    );
                }

                Ok(match decision {
                    CrossValidation::KeptRemote => {
                        let tag = provider::validated(&remote.provider);
                        remote.with_provider(tag)
                    }
                    CrossValidation::LocalRedOverRemoteGreen => local
                        .classification
                        .with_provider(provider::local_override(&remote.provider)),
                    CrossValidation::LocalGreenOverRemoteRed => local
                        .classification
                        .with_provider(provider::safety_override(&remote.provider)),
                })
            }
        }
    }

    async fn fallback(&self, text: &str) -> Result<Classification> {
        warn!("All remote providers failed, falling back to local analysis");
        self.local_verdict(text, provider::LOCAL_FALLBACK).await
    }

    async fn local_verdict(&self, text: &str, tag: &str) -> Result<Classification> {
        if !self.local_delay.is_zero() {
            tokio::time::sleep(self.local_delay).await;
        }
        let verdict = self.heuristic.classify(text).await?;
        Ok(verdict.with_provider(tag))
    }

    /// Try each remote tier in priority order; `None` when all fail
    async fn remote_chain(
        &self,
        text: &str,
        attempts: &mut Vec<ProviderAttempt>,
    ) -> Option<Classification> {
        for slot in &self.providers {
            let name = slot.classifier.name();
            let start = Instant::now();
            match slot.classifier.classify(text).await {
                Ok(result) => {
                    attempts.push(ProviderAttempt {
                        provider: name.to_string(),
                        outcome: "ok".to_string(),
                        error: None,
                        latency_us: start.elapsed().as_micros() as u64,
                    });
                    info!(provider = name, "Remote tier succeeded");
                    return Some(result.with_provider(name));
                }
                Err(e) => {
                    if slot.enabled {
                        warn!(provider = name, error = %e, "Remote tier failed, advancing");
                    } else {
                        debug!(provider = name, "Remote tier not configured, skipping");
                    }
                    attempts.push(ProviderAttempt {
                        provider: name.to_string(),
                        outcome: e.kind().to_string(),
                        error: Some(e.to_string()),
                        latency_us: start.elapsed().as_micros() as u64,
                    });
                }
            }
        }
        None
    }

    /// Every configured provider in priority order
    pub fn providers(&self) -> Vec<ProviderInfo> {
        self.providers
            .iter()
            .enumerate()
            .map(|(rank, slot)| ProviderInfo {
                name: slot.classifier.name().to_string(),
                priority: slot.priority,
                enabled: slot.enabled,
                role: ProviderRole::for_rank(rank),
            })
            .collect()
    }

    /// Enabled providers in priority order
    pub fn available_providers(&self) -> Vec<ProviderInfo> {
        self.providers().into_iter().filter(|p| p.enabled).collect()
    }

    /// Which tiers are usable right now
    pub fn provider_status(&self) -> ProviderStatus {
        let all = self.providers();
        let enabled_at = |rank: usize| {
            all.get(rank)
                .filter(|p| p.enabled)
                .map(|p| p.name.clone())
        };
        let primary = enabled_at(0);
        let backup = enabled_at(1);
        ProviderStatus {
            recommended: primary.iter().count() + backup.iter().count(),
            primary,
            backup,
            total_enabled: all.iter().filter(|p| p.enabled).count(),
        }
    }

    /// Probe a single provider with [`PROBE_TEXT`], retries included
    pub async fn test_provider(&self, name: &str) -> ProviderProbe {
        let Some((rank, slot)) = self
            .providers
            .iter()
            .enumerate()
            .find(|(_, slot)| slot.classifier.name() == name)
        else {
            return ProviderProbe {
                provider: name.to_string(),
                success: false,
                role: None,
                latency_ms: None,
                error: Some(format!("Unknown provider: {}", name)),
            };
        };

        let start = Instant::now();
        let outcome = slot.classifier.classify(PROBE_TEXT).await;
        let latency_ms = start.elapsed().as_millis() as u64;
        match outcome {
            Ok(_) => ProviderProbe {
                provider: name.to_string(),
                success: true,
                role: Some(ProviderRole::for_rank(rank)),
                latency_ms: Some(latency_ms),
                error: None,
            },
            Err(e) => ProviderProbe {
                provider: name.to_string(),
                success: false,
                role: Some(ProviderRole::for_rank(rank)),
                latency_ms: None,
                error: Some(e.to_string()),
            },
        }
    }

    /// Mode used by [`Self::classify_with_default_mode`]
    pub fn default_mode(&self) -> ClassificationMode {
        self.default_mode
    }
}

/// Builder for [`ClassificationOrchestrator`]
pub struct OrchestratorBuilder {
    providers: Vec<ProviderSlot>,
    heuristic: Option<KeywordHeuristicClassifier>,
    safety: Option<SafetyOverride>,
    validation: ValidationPolicy,
    mode: ClassificationMode,
    debug: bool,
    local_delay: Duration,
}

impl OrchestratorBuilder {
    /// Create a builder with no providers and default policies
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            heuristic: None,
            safety: None,
            validation: ValidationPolicy::default(),
            mode: ClassificationMode::default(),
            debug: false,
            local_delay: Duration::ZERO,
        }
    }

    /// Add a remote provider client
    pub fn provider(mut self, client: RemoteProviderClient) -> Self {
        let priority = client.priority();
        let enabled = client.is_enabled();
        self.providers.push(ProviderSlot {
            classifier: Arc::new(client),
            priority,
            enabled,
        });
        self
    }

    /// Add any classifier as an always-enabled remote tier
    pub fn remote_classifier(mut self, classifier: Arc<dyn Classifier>, priority: u32) -> Self {
        self.providers.push(ProviderSlot {
            classifier,
            priority,
            enabled: true,
        });
        self
    }

    /// Replace the local heuristic
    pub fn heuristic(mut self, heuristic: KeywordHeuristicClassifier) -> Self {
        self.heuristic = Some(heuristic);
        self
    }

    /// Replace the safety override
    pub fn safety(mut self, safety: SafetyOverride) -> Self {
        self.safety = Some(safety);
        self
    }

    /// Set cross-validation thresholds
    pub fn validation(mut self, validation: ValidationPolicy) -> Self {
        self.validation = validation;
        self
    }

    /// Set the default mode
    pub fn mode(mut self, mode: ClassificationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Attach debug traces to results
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Simulated latency before local-tier verdicts
    pub fn local_fallback_delay(mut self, delay: Duration) -> Self {
        self.local_delay = delay;
        self
    }

    /// Build the orchestrator; providers are ordered by ascending priority
    ///
    /// Fails when a local-tier classifier was registered as a remote tier.
    pub fn build(mut self) -> Result<ClassificationOrchestrator> {
        if let Some(slot) = self
            .providers
            .iter()
            .find(|slot| !slot.classifier.tier().is_remote())
        {
            return Err(Error::config(format!(
                "{} is a local classifier and cannot be used as a remote tier",
                slot.classifier.name()
            )));
        }
        self.providers.sort_by_key(|slot| slot.priority);

        let heuristic = match self.heuristic {
            Some(h) => h,
            None => KeywordHeuristicClassifier::new()?,
        };
        let safety = match self.safety {
            Some(s) => s,
            None => SafetyOverride::new()?,
        };

        Ok(ClassificationOrchestrator {
            providers: self.providers,
            heuristic,
            safety,
            validation: self.validation,
            default_mode: self.mode,
            debug: self.debug,
            local_delay: self.local_delay,
        })
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assessment(flag: Flag, severity: u8) -> HeuristicAssessment {
        let heuristic = KeywordHeuristicClassifier::new().unwrap();
        let text = match flag {
            Flag::Red => "he hit me",
            Flag::Green => "she hugged me",
            Flag::Neutral => "we ate lunch",
        };
        let mut a = heuristic.assess(text);
        a.severity = severity;
        a
    }

    fn remote(flag: Flag) -> Classification {
        Classification::new(flag, "t", "m", vec!["s".to_string()], 0.9, "gemini")
    }

    #[test]
    fn test_cross_validate_red_override_respects_threshold() {
        let policy = ValidationPolicy::default();
        assert_eq!(
            cross_validate(&remote(Flag::Green), &assessment(Flag::Red, 5), &policy),
            CrossValidation::LocalRedOverRemoteGreen
        );
        assert_eq!(
            cross_validate(&remote(Flag::Green), &assessment(Flag::Red, 3), &policy),
            CrossValidation::KeptRemote
        );
        assert_eq!(
            cross_validate(&remote(Flag::Neutral), &assessment(Flag::Red, 5), &policy),
            CrossValidation::KeptRemote
        );
    }

    #[test]
    fn test_cross_validate_green_override_respects_threshold() {
        let policy = ValidationPolicy::default();
        assert_eq!(
            cross_validate(&remote(Flag::Red), &assessment(Flag::Green, 0), &policy),
            CrossValidation::LocalGreenOverRemoteRed
        );

        let strict = ValidationPolicy {
            green_confidence_threshold: 0.9,
            ..ValidationPolicy::default()
        };
        assert_eq!(
            cross_validate(&remote(Flag::Red), &assessment(Flag::Green, 0), &strict),
            CrossValidation::KeptRemote
        );
    }

    #[tokio::test]
    async fn test_local_only_without_providers() {
        let orchestrator = ClassificationOrchestrator::builder().build().unwrap();
        let result = orchestrator
            .classify("We watched a movie together", ClassificationMode::LocalOnly)
            .await;
        assert_eq!(result.flag, Flag::Neutral);
        assert_eq!(result.provider, "local");
        assert!(result.trace.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_fallback_delay_is_awaited() {
        let orchestrator = ClassificationOrchestrator::builder()
            .local_fallback_delay(Duration::from_millis(2000))
            .build()
            .unwrap();
        let started = tokio::time::Instant::now();
        let result = orchestrator
            .classify("Thank you for the flowers", ClassificationMode::RemoteOnly)
            .await;
        assert_eq!(result.provider, "local-fallback");
        assert!(started.elapsed() >= Duration::from_millis(2000));
    }

    #[test]
    fn test_local_classifier_rejected_as_remote_tier() {
        let local: Arc<dyn Classifier> = Arc::new(KeywordHeuristicClassifier::new().unwrap());
        let err = match ClassificationOrchestrator::builder()
            .remote_classifier(local, 1)
            .build()
        {
            Ok(_) => panic!("local classifier accepted as remote tier"),
            Err(e) => e,
        };
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("local"));
    }

    #[test]
    fn test_roles() {
        assert_eq!(ProviderRole::for_rank(0).to_string(), "Primary");
        assert_eq!(ProviderRole::for_rank(1).to_string(), "Fast Backup");
        assert_eq!(ProviderRole::for_rank(7).to_string(), "Additional Backup");
    }

    #[test]
    fn test_from_default_config_has_disabled_chain() {
        let orchestrator =
            ClassificationOrchestrator::from_config(&OrchestratorConfig::default()).unwrap();
        assert_eq!(orchestrator.providers().len(), 4);
        assert!(orchestrator.available_providers().is_empty());
        let status = orchestrator.provider_status();
        assert_eq!(status.primary, None);
        assert_eq!(status.total_enabled, 0);
    }
}
