//! Core types for flagwise

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Three-way verdict for a journal entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flag {
    /// Loving, supportive, healthy behavior
    Green,
    /// Harmful, controlling or dangerous behavior
    Red,
    /// Ordinary, everyday interaction
    Neutral,
}

impl Flag {
    /// Get the lowercase label used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Red => "red",
            Self::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Flag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "green" => Ok(Self::Green),
            "red" => Ok(Self::Red),
            "neutral" => Ok(Self::Neutral),
            other => Err(Error::protocol(format!("unknown flag '{}'", other))),
        }
    }
}

/// How the orchestrator should reach a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassificationMode {
    /// Remote providers in priority order, local heuristic on total failure
    #[default]
    RemoteOnly,
    /// Remote providers cross-checked against the local heuristic
    #[serde(alias = "enhanced")]
    RemoteWithLocalValidation,
    /// Local heuristic only
    LocalOnly,
}

impl ClassificationMode {
    /// Get the kebab-case name of this mode
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RemoteOnly => "remote-only",
            Self::RemoteWithLocalValidation => "remote-with-local-validation",
            Self::LocalOnly => "local-only",
        }
    }
}

impl fmt::Display for ClassificationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassificationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote-only" | "remote" => Ok(Self::RemoteOnly),
            "remote-with-local-validation" | "enhanced" => Ok(Self::RemoteWithLocalValidation),
            "local-only" | "local" => Ok(Self::LocalOnly),
            other => Err(Error::config(format!("unknown classification mode '{}'", other))),
        }
    }
}

/// Identifiers written to [`Classification::provider`]
pub mod provider {
    /// Local heuristic chosen by the caller
    pub const LOCAL: &str = "local";

    /// Local heuristic used because every remote tier failed
    pub const LOCAL_FALLBACK: &str = "local-fallback";

    /// Final violence-keyword check replaced the verdict
    pub const SAFETY_OVERRIDE: &str = "safety-override";

    /// Defensive catch-all after an internal orchestration failure
    pub const EMERGENCY_LOCAL: &str = "emergency-local";

    /// Remote verdict kept after local cross-validation
    pub fn validated(remote: &str) -> String {
        format!("{}-validated", remote)
    }

    /// Local red verdict replaced a remote green one
    pub fn local_override(remote: &str) -> String {
        format!("local-override-{}", remote)
    }

    /// Local green verdict replaced a remote red one
    pub fn safety_override(remote: &str) -> String {
        format!("safety-override-{}", remote)
    }
}

/// A journal entry as owned by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Unique entry identifier
    pub id: Uuid,

    /// Free-text body written by the user
    pub text: String,

    /// When the entry was written
    pub created_at: DateTime<Utc>,
}

impl Entry {
    /// Create a new entry stamped with a fresh id and the current time
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

/// Final verdict for a journal entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Primary verdict
    pub flag: Flag,

    /// Short human-readable label
    pub title: String,

    /// Explanation of the verdict
    pub message: String,

    /// Ordered follow-up suggestions (never empty)
    pub suggestions: Vec<String>,

    /// Confidence score (0.0-1.0)
    pub confidence: f64,

    /// Component that produced or last overrode the verdict
    pub provider: String,

    /// Structured debug metadata, present only in debug mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<ClassificationTrace>,
}

impl Classification {
    /// Create a new classification without trace metadata
    pub fn new(
        flag: Flag,
        title: impl Into<String>,
        message: impl Into<String>,
        suggestions: Vec<String>,
        confidence: f64,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            flag,
            title: title.into(),
            message: message.into(),
            suggestions,
            confidence,
            provider: provider.into(),
            trace: None,
        }
    }

    /// Replace the provider tag
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    /// Check the structural invariants every returned classification holds
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(Error::internal(format!(
                "confidence {} outside [0, 1]",
                self.confidence
            )));
        }
        if self.suggestions.is_empty() {
            return Err(Error::internal("classification has no suggestions"));
        }
        if self.provider.is_empty() {
            return Err(Error::internal("classification has no provider"));
        }
        Ok(())
    }
}

/// Debug metadata describing how a verdict was reached
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassificationTrace {
    /// Mode the call ran in
    pub mode: ClassificationMode,

    /// Every remote tier that was tried, in order
    pub attempts: Vec<ProviderAttempt>,

    /// Outcome of enhanced-mode cross-validation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<String>,

    /// Whether the final violence-keyword check replaced the verdict
    pub safety_override_applied: bool,

    /// Total orchestration time in microseconds
    pub latency_us: u64,
}

/// Outcome of one remote tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderAttempt {
    /// Provider name
    pub provider: String,

    /// `"ok"` or the error kind that ended the tier
    pub outcome: String,

    /// Error text when the tier failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Elapsed time for the tier, retries included
    pub latency_us: u64,
}
