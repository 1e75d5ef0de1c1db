//! Flagwise Classifiers
//!
//! Layered classification of relationship journal entries.
//!
//! Tiers, tried in order:
//! - Remote providers (hosted language models), each with its own retry budget
//! - Local keyword heuristic, which needs no network and cannot fail
//! - Safety override, applied unconditionally to whatever the tiers produced
//!
//! [`ClassificationOrchestrator`] is the single entry point and always yields
//! a valid [`flagwise_core::Classification`].

pub mod classifier;
pub mod config;
pub mod heuristic;
pub mod orchestrator;
pub mod patterns;
pub mod prompt;
pub mod remote;
pub mod retry;
pub mod safety;
pub mod transport;

pub use classifier::{Classifier, ClassifierTier};
pub use config::{ApiFlavor, OrchestratorConfig, PatternConfig, ProviderConfig, ValidationPolicy};
pub use heuristic::{HeuristicAssessment, KeywordHeuristicClassifier};
pub use orchestrator::{
    cross_validate, ClassificationOrchestrator, CrossValidation, OrchestratorBuilder,
    ProviderInfo, ProviderProbe, ProviderRole, ProviderStatus,
};
pub use patterns::{PatternEntry, PatternSet};
pub use remote::{ClassifyRequest, ProviderTransport, RemoteProviderClient};
pub use retry::{backoff_delay, is_transient, RetryPolicy};
pub use safety::SafetyOverride;
pub use transport::HttpTransport;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classifier::Classifier;
    pub use crate::config::OrchestratorConfig;
    pub use crate::heuristic::KeywordHeuristicClassifier;
    pub use crate::orchestrator::ClassificationOrchestrator;
    pub use crate::remote::{ClassifyRequest, ProviderTransport, RemoteProviderClient};
    pub use crate::retry::RetryPolicy;
    pub use crate::safety::SafetyOverride;
}
