//! Final violence-keyword check
//!
//! Runs after every other tier. It only ever turns a green verdict red: a red
//! verdict is never softened and a neutral verdict is never escalated.

use crate::patterns::{default_safety_keywords, PatternEntry, PatternSet};
use flagwise_core::{provider, Classification, Flag, Result};
use tracing::warn;

/// Forces a green verdict to red when the text names explicit violence
#[derive(Debug)]
pub struct SafetyOverride {
    keywords: PatternSet,
}

impl SafetyOverride {
    /// Create an override with the built-in keyword set
    pub fn new() -> Result<Self> {
        Self::with_keywords(default_safety_keywords())
    }

    /// Create an override with a custom keyword set
    pub fn with_keywords(keywords: Vec<PatternEntry>) -> Result<Self> {
        Ok(Self {
            keywords: PatternSet::new(keywords)?,
        })
    }

    /// Whether `raw_text` contains a violence keyword
    pub fn triggers(&self, raw_text: &str) -> bool {
        self.keywords.is_match(raw_text)
    }

    /// Return `classification` unchanged, or a critical red verdict if it was
    /// green and the text contains a violence keyword
    pub fn apply(&self, classification: Classification, raw_text: &str) -> Classification {
        if classification.flag != Flag::Green || !self.triggers(raw_text) {
            return classification;
        }

        warn!(
            overridden_provider = %classification.provider,
            "Safety override: green verdict on text describing violence"
        );
        metrics::counter!("flagwise_safety_overrides_total").increment(1);

        Classification {
            flag: Flag::Red,
            title: "Critical Safety Override".to_string(),
            message: "This entry describes physical violence. Violence is never acceptable \
                      in a relationship, whatever else happened."
                .to_string(),
            suggestions: vec![
                "If you are in immediate danger, call 911 or your local emergency number"
                    .to_string(),
                "National Domestic Violence Hotline: 1-800-799-7233".to_string(),
                "Text START to 88788 to reach the hotline by text".to_string(),
                "Talk to someone you trust about what happened".to_string(),
            ],
            confidence: 1.0,
            provider: provider::SAFETY_OVERRIDE.to_string(),
            trace: classification.trace,
        }
    }
}
