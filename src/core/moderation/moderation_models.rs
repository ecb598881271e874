// Moderation domain models - the uniform result every check returns.
//
// These are pure domain types with no HTTP or provider dependencies.
// The http layer serializes them straight into response bodies.

use serde::{Serialize, Serializer};

/// Which stage of the pipeline produced a result.
///
/// The display labels are part of the API contract: clients and stored
/// feedback records see them verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationProvider {
    /// Input rejected before any check ran (empty text)
    Validation,
    /// The local rule filter
    RuleFilter,
    /// Rules passed and no AI classifier is configured
    RuleBasedOnly,
    /// The Gemini classifier
    Gemini,
    /// The Gemini call failed and the pipeline failed open
    GeminiFailureFallback,
    /// Every configured check passed
    AllChecksPassed,
}

impl ModerationProvider {
    pub fn label(&self) -> &'static str {
        match self {
            ModerationProvider::Validation => "validation",
            ModerationProvider::RuleFilter => "Rule-based Filter",
            ModerationProvider::RuleBasedOnly => "Rule-based only",
            ModerationProvider::Gemini => "Google Gemini",
            ModerationProvider::GeminiFailureFallback => "Gemini Failure Fallback",
            ModerationProvider::AllChecksPassed => "All Checks Passed",
        }
    }
}

impl std::fmt::Display for ModerationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for ModerationProvider {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Per-check breakdown reported by the rule filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDetails {
    /// Text contains a blocklisted term
    pub bad_words: bool,
    /// One of the pattern heuristics matched
    pub suspicious: bool,
    /// Text is over the length cap
    pub too_long: bool,
    /// One character repeated 9+ times
    pub spam: bool,
}

impl RuleDetails {
    pub fn any(&self) -> bool {
        self.bad_words || self.suspicious || self.too_long || self.spam
    }
}

/// Result of running text through a moderation check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModerationResult {
    /// Whether the text should be blocked
    pub flagged: bool,
    /// Which check produced this verdict
    pub provider: ModerationProvider,
    /// Human-readable reason
    pub reason: String,
    /// Rule filter breakdown (only present on rule filter results)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<RuleDetails>,
}

impl ModerationResult {
    /// Create a "not flagged" result
    pub fn clean(provider: ModerationProvider, reason: impl Into<String>) -> Self {
        Self {
            flagged: false,
            provider,
            reason: reason.into(),
            details: None,
        }
    }

    /// Create a flagged result
    pub fn flagged(provider: ModerationProvider, reason: impl Into<String>) -> Self {
        Self {
            flagged: true,
            provider,
            reason: reason.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: RuleDetails) -> Self {
        self.details = Some(details);
        self
    }

    /// True when the pipeline refused to look at the input at all.
    pub fn is_empty_input(&self) -> bool {
        self.provider == ModerationProvider::Validation
    }
}
