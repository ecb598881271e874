// Moderation pipeline - core business logic for screening feedback text.
//
// Order of checks (fast to slow):
// 1. Input validation (empty text)
// 2. Local rule filter
// 3. Remote AI classifier, if one is configured
//
// Any failure on the AI side resolves to "not flagged". An upstream outage
// must never block feedback submission.

use super::moderation_models::{ModerationProvider, ModerationResult};
use super::rule_filter;
use async_trait::async_trait;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ClassifierError {
    /// Transport failure or non-2xx response from the classification API.
    #[error("Gemini Moderation Failed: Request failed with status code {}. {message}", display_status(.status))]
    Request { status: Option<u16>, message: String },
}

fn display_status(status: &Option<u16>) -> String {
    status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

// ============================================================================
// CLASSIFIER TRAIT (PORT)
// ============================================================================

/// A remote service that classifies text as flagged or clean.
///
/// Implementations make exactly one attempt per call. Malformed or empty
/// replies should already be converted to a clean result; only transport
/// level problems come back as `Err`.
#[async_trait]
pub trait ModerationClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<ModerationResult, ClassifierError>;
}

// Allows the composition root to pick a classifier at runtime.
#[async_trait]
impl ModerationClassifier for Box<dyn ModerationClassifier> {
    async fn classify(&self, text: &str) -> Result<ModerationResult, ClassifierError> {
        (**self).classify(text).await
    }
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// Runs the rule filter and then, if configured, the AI classifier.
pub struct ModerationPipeline<C: ModerationClassifier> {
    /// `None` means no API credential was configured: rules only.
    classifier: Option<C>,
}

impl<C: ModerationClassifier> ModerationPipeline<C> {
    pub fn new(classifier: Option<C>) -> Self {
        Self { classifier }
    }

    pub fn has_classifier(&self) -> bool {
        self.classifier.is_some()
    }

    /// Moderate a piece of text. First verdict wins; never fails.
    pub async fn moderate(&self, text: &str) -> ModerationResult {
        if text.trim().is_empty() {
            return ModerationResult::clean(ModerationProvider::Validation, "Empty text");
        }

        // Cheap local check first so obvious cases never cost a remote call
        let rule_result = rule_filter::evaluate(text);
        if rule_result.flagged {
            tracing::debug!(reason = %rule_result.reason, "Rule filter flagged text");
            return rule_result;
        }

        let Some(classifier) = &self.classifier else {
            return ModerationResult::clean(ModerationProvider::RuleBasedOnly, "Clean");
        };

        match classifier.classify(text).await {
            Ok(result) if result.flagged => {
                tracing::debug!(
                    provider = %result.provider,
                    reason = %result.reason,
                    "AI classifier flagged text"
                );
                return result;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Moderation provider failed (gemini): {}", e);
                return ModerationResult::clean(
                    ModerationProvider::GeminiFailureFallback,
                    "Clean (AI check failed)",
                );
            }
        }

        ModerationResult::clean(ModerationProvider::AllChecksPassed, "Clean")
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Copy)]
    enum Reply {
        Clean,
        Flagged,
        Fail,
    }

    /// Classifier stub that counts how often it is called.
    struct MockClassifier {
        reply: Reply,
        calls: Arc<AtomicUsize>,
    }

    impl MockClassifier {
        fn new(reply: Reply) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    reply,
                    calls: Arc::clone(&calls),
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl ModerationClassifier for MockClassifier {
        async fn classify(&self, _text: &str) -> Result<ModerationResult, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                Reply::Clean => Ok(ModerationResult::clean(ModerationProvider::Gemini, "Clean")),
                Reply::Flagged => Ok(ModerationResult::flagged(
                    ModerationProvider::Gemini,
                    "toxic",
                )),
                Reply::Fail => Err(ClassifierError::Request {
                    status: Some(503),
                    message: "service unavailable".to_string(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn test_empty_text_skips_every_check() {
        let (classifier, calls) = MockClassifier::new(Reply::Flagged);
        let pipeline = ModerationPipeline::new(Some(classifier));

        for text in ["", "   ", "\n\t "] {
            let result = pipeline.moderate(text).await;
            assert!(!result.flagged);
            assert_eq!(result.provider, ModerationProvider::Validation);
            assert_eq!(result.reason, "Empty text");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rule_flag_short_circuits_classifier() {
        let (classifier, calls) = MockClassifier::new(Reply::Clean);
        let pipeline = ModerationPipeline::new(Some(classifier));

        let result = pipeline.moderate("this is a scam").await;

        assert!(result.flagged);
        assert_eq!(result.provider, ModerationProvider::RuleFilter);
        assert!(result.details.unwrap().bad_words);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rules_only_without_classifier() {
        let pipeline: ModerationPipeline<MockClassifier> = ModerationPipeline::new(None);

        let result = pipeline.moderate("Lovely staff and quick delivery").await;

        assert!(!result.flagged);
        assert_eq!(result.provider, ModerationProvider::RuleBasedOnly);
        assert_eq!(result.reason, "Clean");
    }

    #[tokio::test]
    async fn test_classifier_flag_is_returned() {
        let (classifier, calls) = MockClassifier::new(Reply::Flagged);
        let pipeline = ModerationPipeline::new(Some(classifier));

        let result = pipeline.moderate("Lovely staff and quick delivery").await;

        assert!(result.flagged);
        assert_eq!(result.provider, ModerationProvider::Gemini);
        assert_eq!(result.reason, "toxic");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_classifier_failure_fails_open() {
        let (classifier, calls) = MockClassifier::new(Reply::Fail);
        let pipeline = ModerationPipeline::new(Some(classifier));

        let result = pipeline.moderate("Lovely staff and quick delivery").await;

        assert!(!result.flagged);
        assert_eq!(result.provider, ModerationProvider::GeminiFailureFallback);
        assert_eq!(result.reason, "Clean (AI check failed)");
        // single attempt, no retry
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_checks_passed() {
        let (classifier, _calls) = MockClassifier::new(Reply::Clean);
        let pipeline = ModerationPipeline::new(Some(classifier));

        let result = pipeline.moderate("Lovely staff and quick delivery").await;

        assert!(!result.flagged);
        assert_eq!(result.provider, ModerationProvider::AllChecksPassed);
        assert_eq!(result.reason, "Clean");
    }

    #[tokio::test]
    async fn test_boxed_classifier_delegates() {
        let (classifier, calls) = MockClassifier::new(Reply::Flagged);
        let boxed: Box<dyn ModerationClassifier> = Box::new(classifier);
        let pipeline = ModerationPipeline::new(Some(boxed));

        assert!(pipeline.moderate("Lovely staff").await.flagged);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_error_message_includes_status() {
        let with_status = ClassifierError::Request {
            status: Some(429),
            message: "quota exceeded".to_string(),
        };
        assert_eq!(
            with_status.to_string(),
            "Gemini Moderation Failed: Request failed with status code 429. quota exceeded"
        );

        let without_status = ClassifierError::Request {
            status: None,
            message: "timed out".to_string(),
        };
        assert!(without_status.to_string().contains("status code N/A."));
    }
}
