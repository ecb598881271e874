// Feedback service - the submission flow.
//
// validate -> moderate -> persist -> notify
//
// Moderation and notification are both best-effort towards the visitor:
// a flaky classifier fails open inside the pipeline, and a failed email
// is reported back as `notified: false` instead of losing the feedback.

use super::feedback_models::{Feedback, NewFeedback, SubmissionOutcome, MAX_NAME_CHARS};
use crate::core::moderation::{ModerationClassifier, ModerationPipeline, ModerationResult};
use crate::core::notifications::{Mailer, NotificationService};
use async_trait::async_trait;
use thiserror::Error;

pub const DEFAULT_LIST_LIMIT: u32 = 20;
pub const MAX_LIST_LIMIT: u32 = 100;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("Invalid feedback: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Trait for persisting accepted feedback.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Store a new entry and return it with its assigned id and timestamp.
    async fn insert(
        &self,
        feedback: &NewFeedback,
        moderation_provider: &str,
    ) -> Result<Feedback, FeedbackError>;

    async fn get(&self, id: i64) -> Result<Option<Feedback>, FeedbackError>;

    /// Newest first.
    async fn list_recent(&self, limit: u32) -> Result<Vec<Feedback>, FeedbackError>;
}

#[async_trait]
impl FeedbackStore for Box<dyn FeedbackStore> {
    async fn insert(
        &self,
        feedback: &NewFeedback,
        moderation_provider: &str,
    ) -> Result<Feedback, FeedbackError> {
        (**self).insert(feedback, moderation_provider).await
    }

    async fn get(&self, id: i64) -> Result<Option<Feedback>, FeedbackError> {
        (**self).get(id).await
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<Feedback>, FeedbackError> {
        (**self).list_recent(limit).await
    }
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct FeedbackService<S: FeedbackStore, C: ModerationClassifier, M: Mailer> {
    store: S,
    moderation: ModerationPipeline<C>,
    /// `None` when email is not configured
    notifications: Option<NotificationService<M>>,
}

impl<S: FeedbackStore, C: ModerationClassifier, M: Mailer> FeedbackService<S, C, M> {
    pub fn new(
        store: S,
        moderation: ModerationPipeline<C>,
        notifications: Option<NotificationService<M>>,
    ) -> Self {
        Self {
            store,
            moderation,
            notifications,
        }
    }

    /// Run a submission through the full flow.
    pub async fn submit(&self, input: NewFeedback) -> Result<SubmissionOutcome, FeedbackError> {
        // Moderation sees the message as it arrived; only the trimmed copy is stored
        let raw_message = input.message.clone();
        let input = normalize(input);
        validate(&input)?;

        let moderation = self.moderation.moderate(&raw_message).await;
        if moderation.is_empty_input() {
            return Err(FeedbackError::Validation("Message is required".to_string()));
        }
        if moderation.flagged {
            tracing::info!(
                provider = %moderation.provider,
                reason = %moderation.reason,
                "Feedback rejected by moderation"
            );
            return Ok(SubmissionOutcome::Rejected { moderation });
        }

        let feedback = self
            .store
            .insert(&input, moderation.provider.label())
            .await?;
        tracing::info!(
            feedback_id = feedback.id,
            provider = %moderation.provider,
            "Feedback accepted"
        );

        let notified = match &self.notifications {
            Some(notifications) => match notifications.notify_new_feedback(&feedback).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(
                        feedback_id = feedback.id,
                        "Failed to send feedback notification: {}",
                        e
                    );
                    false
                }
            },
            None => false,
        };

        Ok(SubmissionOutcome::Accepted {
            feedback,
            moderation,
            notified,
        })
    }

    /// Moderate text without storing anything.
    pub async fn preview(&self, text: &str) -> ModerationResult {
        self.moderation.moderate(text).await
    }

    pub async fn get(&self, id: i64) -> Result<Option<Feedback>, FeedbackError> {
        self.store.get(id).await
    }

    pub async fn list_recent(&self, limit: Option<u32>) -> Result<Vec<Feedback>, FeedbackError> {
        let limit = limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT);
        self.store.list_recent(limit).await
    }
}

/// Trim every field and drop optional ones that end up empty.
fn normalize(input: NewFeedback) -> NewFeedback {
    fn non_empty(value: Option<String>) -> Option<String> {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    NewFeedback {
        name: non_empty(input.name),
        email: non_empty(input.email),
        message: input.message.trim().to_string(),
        rating: input.rating,
    }
}

fn validate(input: &NewFeedback) -> Result<(), FeedbackError> {
    if let Some(rating) = input.rating {
        if !(1..=5).contains(&rating) {
            return Err(FeedbackError::Validation(
                "Rating must be between 1 and 5".to_string(),
            ));
        }
    }

    if let Some(email) = &input.email {
        if !email.contains('@') || email.chars().any(char::is_whitespace) {
            return Err(FeedbackError::Validation(
                "Email address is not valid".to_string(),
            ));
        }
    }

    if let Some(name) = &input.name {
        if name.chars().count() > MAX_NAME_CHARS {
            return Err(FeedbackError::Validation(format!(
                "Name must be at most {} characters",
                MAX_NAME_CHARS
            )));
        }
    }

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
