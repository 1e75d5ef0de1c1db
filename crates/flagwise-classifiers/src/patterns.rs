//! Phrase tables matched with Aho-Corasick
//!
//! Every table is an ordered list of lower-case phrases. A phrase matches when
//! it occurs anywhere in the lower-cased entry text, so short stems such as
//! `"isolat"` or `"apologi"` cover their inflections. Matches inside longer
//! words ("hit" in "white") are accepted as false positives.

use aho_corasick::AhoCorasick;
use flagwise_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// A single phrase with the category it signals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternEntry {
    /// Phrase to look for (matched case-insensitively)
    pub phrase: String,

    /// Category label, e.g. `physical_violence`
    pub category: String,

    /// Danger estimate 0-5 (only meaningful for red tables)
    #[serde(default)]
    pub severity: u8,
}

impl PatternEntry {
    /// Create a new pattern entry
    pub fn new(phrase: impl Into<String>, category: impl Into<String>, severity: u8) -> Self {
        Self {
            phrase: phrase.into(),
            category: category.into(),
            severity: severity.min(MAX_SEVERITY),
        }
    }
}

/// Highest severity a pattern can carry
pub const MAX_SEVERITY: u8 = 5;

/// Compiled, ordered phrase table
pub struct PatternSet {
    matcher: AhoCorasick,
    entries: Vec<PatternEntry>,
}

impl PatternSet {
    /// Compile a phrase table
    pub fn new(entries: Vec<PatternEntry>) -> Result<Self> {
        let entries: Vec<PatternEntry> = entries
            .into_iter()
            .map(|mut entry| {
                entry.phrase = entry.phrase.trim().to_lowercase();
                entry.severity = entry.severity.min(MAX_SEVERITY);
                entry
            })
            .collect();

        if let Some(entry) = entries.iter().find(|e| e.phrase.is_empty()) {
            return Err(Error::config(format!(
                "empty phrase in pattern category '{}'",
                entry.category
            )));
        }

        let matcher = AhoCorasick::new(entries.iter().map(|e| e.phrase.as_str()))
            .map_err(|e| Error::config(format!("Failed to build pattern matcher: {}", e)))?;

        Ok(Self { matcher, entries })
    }

    /// Compile a table of plain phrases sharing one category
    pub fn from_phrases(category: &str, severity: u8, phrases: &[&str]) -> Result<Self> {
        Self::new(
            phrases
                .iter()
                .map(|p| PatternEntry::new(*p, category, severity))
                .collect(),
        )
    }

    /// All entries whose phrase occurs in `text`, in table order
    pub fn matches(&self, text: &str) -> Vec<&PatternEntry> {
        let lowered = text.to_lowercase();
        let mut hit = vec![false; self.entries.len()];
        for m in self.matcher.find_overlapping_iter(&lowered) {
            hit[m.pattern().as_usize()] = true;
        }

        self.entries
            .iter()
            .zip(hit)
            .filter_map(|(entry, matched)| matched.then_some(entry))
            .collect()
    }

    /// Whether any phrase occurs in `text`
    pub fn is_match(&self, text: &str) -> bool {
        self.matcher.is_match(&text.to_lowercase())
    }

    /// The table's entries
    pub fn entries(&self) -> &[PatternEntry] {
        &self.entries
    }

    /// Number of phrases in the table
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no phrases
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for PatternSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternSet")
            .field("entries", &self.entries.len())
            .finish()
    }
}

fn category(out: &mut Vec<PatternEntry>, name: &str, severity: u8, phrases: &[&str]) {
    out.extend(phrases.iter().map(|p| PatternEntry::new(*p, name, severity)));
}

/// Built-in red phrases: violence, threats, control, verbal abuse, distrust
pub fn default_red_patterns() -> Vec<PatternEntry> {
    let mut out = Vec::new();
    category(
        &mut out,
        "physical_violence",
        5,
        &[
            "hit", "slap", "punch", "choke", "strangl", "kick", "shove", "pushed me", "threw",
            "grabbed my arm", "really hard", "hurt me", "beat me", "slam",
        ],
    );
    category(
        &mut out,
        "threats",
        5,
        &["threat", "kill me", "going to hurt", "scared for my life"],
    );
    category(
        &mut out,
        "control",
        4,
        &[
            "control", "check my phone", "isolat", "forbid", "won't let me", "not allowed to",
            "punish",
        ],
    );
    category(
        &mut out,
        "verbal_abuse",
        3,
        &[
            "yell", "scream", "stupid", "worthless", "called me names", "insult", "humiliat",
        ],
    );
    category(
        &mut out,
        "distrust",
        2,
        &[
            "silent treatment", "ignor", "jealous", "accus", "doesn't trust", "lie", "lying",
            "lied", "cheat",
        ],
    );
    out
}

/// Built-in green phrases: love, support, communication, gratitude
pub fn default_green_patterns() -> Vec<PatternEntry> {
    let mut out = Vec::new();
    category(
        &mut out,
        "affection",
        0,
        &["love", "hug", "kiss", "cuddl", "affection", "quality time", "date"],
    );
    category(
        &mut out,
        "support",
        0,
        &["support", "encourag", "help", "proud", "celebrat", "listen"],
    );
    category(
        &mut out,
        "communication",
        0,
        &[
            "apologi", "communicat", "discuss", "compromi", "understand", "respect", "boundar",
            "space",
        ],
    );
    category(&mut out, "gratitude", 0, &["grateful", "thank", "appreciat"]);
    out
}

/// Built-in safety override keywords, stricter than the red table
pub fn default_safety_keywords() -> Vec<PatternEntry> {
    [
        "hit", "slapped", "punched", "threw", "choked", "kicked", "strangled", "beat me",
    ]
    .iter()
    .map(|p| PatternEntry::new(*p, "violence", MAX_SEVERITY))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_are_case_insensitive_and_ordered() {
        let set = PatternSet::new(vec![
            PatternEntry::new("lied", "distrust", 2),
            PatternEntry::new("lie", "distrust", 2),
            PatternEntry::new("Yell", "verbal_abuse", 3),
        ])
        .unwrap();

        let matched: Vec<_> = set
            .matches("He LIED and then yelled")
            .into_iter()
            .map(|e| e.phrase.as_str())
            .collect();
        assert_eq!(matched, vec!["lied", "lie", "yell"]);
    }

    #[test]
    fn test_no_match() {
        let set = PatternSet::from_phrases("violence", 5, &["hit", "slapped"]).unwrap();
        assert!(set.matches("We watched a movie together").is_empty());
        assert!(!set.is_match("We watched a movie together"));
        assert!(set.is_match("She SLAPPED the table"));
    }

    #[test]
    fn test_empty_phrase_is_rejected() {
        let err = PatternSet::new(vec![PatternEntry::new("  ", "broken", 1)]).unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_severity_is_capped() {
        let set = PatternSet::new(vec![PatternEntry {
            phrase: "hit".to_string(),
            category: "physical_violence".to_string(),
            severity: 9,
        }])
        .unwrap();
        assert_eq!(set.entries()[0].severity, MAX_SEVERITY);
    }

    #[test]
    fn test_safety_keywords_are_a_separate_table() {
        let red = default_red_patterns();
        let safety = default_safety_keywords();
        assert!(safety.len() < red.len());
        assert!(safety.iter().any(|e| e.phrase == "choked"));
        assert!(!red.iter().any(|e| e.phrase == "choked"));
    }
}
