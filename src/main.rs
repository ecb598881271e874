// This is the entry point of the feedback backend.
//
// **Architecture Overview:**
// - `core/` = Business logic (moderation, feedback flow, notifications)
// - `infra/` = Implementations of core traits (SQLite, Gemini, SMTP)
// - `http/` = axum adapter (routes, handlers, server loop)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Start the HTTP server

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "http/http_layer.rs"]
mod http;
#[path = "infra/infra_layer.rs"]
mod infra;

mod config;

use crate::config::{AppConfig, EmailConfig, RunMode};
use crate::core::feedback::{FeedbackService, FeedbackStore};
use crate::core::moderation::{ModerationClassifier, ModerationPipeline};
use crate::core::notifications::{Mailer, NotificationService};
use crate::http::AppState;
use crate::infra::ai::GeminiModerationClient;
use crate::infra::email::SmtpMailer;
use crate::infra::feedback::SqliteFeedbackStore;

/// Build the SMTP notifier. A broken email setup only disables notifications.
fn notification_service(config: &EmailConfig) -> Option<NotificationService<Box<dyn Mailer>>> {
    match SmtpMailer::new(config) {
        Ok(mailer) => {
            let mailer: Box<dyn Mailer> = Box::new(mailer);
            Some(NotificationService::new(mailer, config.notify_to.clone()))
        }
        Err(e) => {
            tracing::error!("Email setup failed, notifications disabled: {}", e);
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let config = AppConfig::from_env()?;

    if config.mode == RunMode::Test {
        tracing::info!("APP_ENV=test, skipping database connection and server start");
        return Ok(());
    }

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // This is the "composition root" where we wire everything together.

    let store = SqliteFeedbackStore::connect(&config.database_url).await?;
    tracing::info!("Connected to feedback database at {}", config.database_url);
    let store: Box<dyn FeedbackStore> = Box::new(store);

    // Moderation: Gemini only when a key is configured
    let classifier: Option<Box<dyn ModerationClassifier>> =
        match config.moderation.gemini_api_key.clone() {
            Some(api_key) => {
                let client: Box<dyn ModerationClassifier> = Box::new(GeminiModerationClient::new(
                    api_key,
                    config.moderation.gemini_model.clone(),
                    config.moderation.gemini_base_url.clone(),
                    config.moderation.timeout,
                )?);
                tracing::info!(
                    model = %config.moderation.gemini_model,
                    timeout_ms = config.moderation.timeout.as_millis() as u64,
                    "Gemini moderation enabled"
                );
                Some(client)
            }
            None => None,
        };
    let moderation = ModerationPipeline::new(classifier);
    if !moderation.has_classifier() {
        tracing::info!("GEMINI_API_KEY not set, moderation is rule-based only");
    }

    // Email notifications
    let notifications: Option<NotificationService<Box<dyn Mailer>>> = match &config.email {
        Some(email_config) => match notification_service(email_config) {
            Some(service) => {
                // A failed check is logged, the server still starts
                service.verify_connection().await;
                Some(service)
            }
            None => None,
        },
        None => {
            tracing::info!("EMAIL_HOST not set, email notifications disabled");
            None
        }
    };

    let feedback_service = FeedbackService::new(store, moderation, notifications);
    let state = AppState::new(feedback_service);

    http::serve(state, config.port).await
}
