//! Keyword heuristic classifier (local tier)
//!
//! Deterministic fallback that needs no network access. Red always takes
//! precedence over green: a single red phrase is enough to flag the entry,
//! no matter how many green phrases also occur.

use crate::classifier::{Classifier, ClassifierTier};
use crate::patterns::{default_green_patterns, default_red_patterns, PatternEntry, PatternSet};
use flagwise_core::{provider, Classification, Flag, Result};

/// Confidence attached to a local red verdict
pub const RED_CONFIDENCE: f64 = 1.0;
/// Confidence attached to a local green verdict
pub const GREEN_CONFIDENCE: f64 = 0.85;
/// Confidence attached to a local neutral verdict
pub const NEUTRAL_CONFIDENCE: f64 = 0.7;

/// Heuristic verdict plus the internals used for cross-validation
#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicAssessment {
    /// The verdict, tagged `local`
    pub classification: Classification,

    /// Highest severity (0-5) among matched red phrases, 0 when none matched
    pub severity: u8,

    /// Matched red phrases, in table order
    pub red_matches: Vec<String>,

    /// Matched green phrases, in table order
    pub green_matches: Vec<String>,
}

/// Local keyword-matching classifier
#[derive(Debug)]
pub struct KeywordHeuristicClassifier {
    name: String,
    red: PatternSet,
    green: PatternSet,
}

impl KeywordHeuristicClassifier {
    /// Create a classifier with the built-in phrase tables
    pub fn new() -> Result<Self> {
        Self::with_patterns(default_red_patterns(), default_green_patterns())
    }

    /// Create a classifier with custom phrase tables
    pub fn with_patterns(red: Vec<PatternEntry>, green: Vec<PatternEntry>) -> Result<Self> {
        Ok(Self {
            name: provider::LOCAL.to_string(),
            red: PatternSet::new(red)?,
            green: PatternSet::new(green)?,
        })
    }

    /// Classify and expose severity and matched phrases
    pub fn assess(&self, text: &str) -> HeuristicAssessment {
        let red_hits = self.red.matches(text);
        let green_hits = self.green.matches(text);

        let severity = red_hits.iter().map(|e| e.severity).max().unwrap_or(0);
        let flag = if !red_hits.is_empty() {
            Flag::Red
        } else if !green_hits.is_empty() {
            Flag::Green
        } else {
            Flag::Neutral
        };

        HeuristicAssessment {
            classification: template(flag),
            severity,
            red_matches: red_hits.iter().map(|e| e.phrase.clone()).collect(),
            green_matches: green_hits.iter().map(|e| e.phrase.clone()).collect(),
        }
    }

    /// Classify without the cross-validation internals
    pub fn classify_text(&self, text: &str) -> Classification {
        self.assess(text).classification
    }
}

fn template(flag: Flag) -> Classification {
    match flag {
        Flag::Red => Classification::new(
            Flag::Red,
            "Red Flag Detected",
            "This behavior shows concerning patterns that may indicate an unhealthy dynamic.",
            vec![
                "Consider talking to a trusted friend or counselor".to_string(),
                "Document these incidents".to_string(),
                "Remember that healthy relationships involve mutual respect".to_string(),
                "National Domestic Violence Hotline: 1-800-799-7233".to_string(),
            ],
            RED_CONFIDENCE,
            provider::LOCAL,
        ),
        Flag::Green => Classification::new(
            Flag::Green,
            "Green Flag",
            "This shows positive relationship behaviors and healthy communication.",
            vec![
                "Acknowledge and appreciate these positive moments".to_string(),
                "Continue building on this healthy foundation".to_string(),
                "Express gratitude to your partner".to_string(),
            ],
            GREEN_CONFIDENCE,
            provider::LOCAL,
        ),
        Flag::Neutral => Classification::new(
            Flag::Neutral,
            "Neutral",
            "This seems like a normal relationship interaction.",
            vec![
                "Continue observing patterns".to_string(),
                "Practice open communication".to_string(),
            ],
            NEUTRAL_CONFIDENCE,
            provider::LOCAL,
        ),
    }
}

#[async_trait::async_trait]
impl Classifier for KeywordHeuristicClassifier {
    async fn classify(&self, text: &str) -> Result<Classification> {
        Ok(self.classify_text(text))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn tier(&self) -> ClassifierTier {
        ClassifierTier::Local
    }
}
