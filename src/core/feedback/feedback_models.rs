// Feedback domain models.
//
// `NewFeedback` is what a visitor submits, `Feedback` is what gets stored
// once the text has passed moderation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::moderation::ModerationResult;

/// Longest display name we accept.
pub const MAX_NAME_CHARS: usize = 100;

/// A feedback submission as received from a visitor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewFeedback {
    /// Optional display name
    #[serde(default)]
    pub name: Option<String>,
    /// Optional contact address
    #[serde(default)]
    pub email: Option<String>,
    /// The feedback text itself
    pub message: String,
    /// Optional 1-5 star rating
    #[serde(default)]
    pub rating: Option<u8>,
}

/// A stored, accepted feedback entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feedback {
    pub id: i64,
    pub name: Option<String>,
    pub email: Option<String>,
    pub message: String,
    pub rating: Option<u8>,
    /// Label of the moderation stage that cleared this entry
    pub moderation_provider: String,
    pub created_at: DateTime<Utc>,
}

/// What happened to a submission.
#[derive(Debug, Clone)]
pub enum SubmissionOutcome {
    /// Stored. `notified` is false when the notification email could not be sent.
    Accepted {
        feedback: Feedback,
        moderation: ModerationResult,
        notified: bool,
    },
    /// Blocked by moderation; nothing was stored.
    Rejected { moderation: ModerationResult },
}
