//! Classifier trait and common types

use async_trait::async_trait;
use flagwise_core::{Classification, Result};

/// Trait for every component that can turn entry text into a verdict
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify the given text
    async fn classify(&self, text: &str) -> Result<Classification>;

    /// Get the classifier name, used as the provider tag on success
    fn name(&self) -> &str;

    /// Get the tier (where the classifier runs)
    fn tier(&self) -> ClassifierTier;
}

/// Where a classifier runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierTier {
    /// In-process, deterministic, cannot fail
    Local,
    /// Network call to a hosted model
    Remote,
}

impl ClassifierTier {
    /// Whether this tier suspends on network I/O
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote)
    }
}
