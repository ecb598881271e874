use std::sync::Arc;

use crate::core::feedback::{FeedbackService, FeedbackStore};
use crate::core::moderation::ModerationClassifier;
use crate::core::notifications::Mailer;

/// The feedback service with every port boxed, so main can pick
/// implementations at runtime.
pub type DynFeedbackService =
    FeedbackService<Box<dyn FeedbackStore>, Box<dyn ModerationClassifier>, Box<dyn Mailer>>;

/// Shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub feedback: Arc<DynFeedbackService>,
}

impl AppState {
    pub fn new(feedback: DynFeedbackService) -> Self {
        Self {
            feedback: Arc::new(feedback),
        }
    }
}
