// Notification service - transactional email on top of a `Mailer` port.
//
// Delivery problems are loud: `send` hands every error back to the caller.
// The one exception is the startup connectivity check, which only logs.

use super::notification_models::EmailMessage;
use crate::core::feedback::Feedback;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Invalid email address: {0}")]
    Address(String),

    #[error("Failed to build email: {0}")]
    Message(String),

    #[error("SMTP error: {0}")]
    Transport(String),
}

/// Anything that can deliver an `EmailMessage`.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver one message. One attempt, errors propagate.
    async fn send(&self, email: EmailMessage) -> Result<(), EmailError>;

    /// Check that the transport is reachable and accepts our credentials.
    async fn verify_connection(&self) -> Result<(), EmailError>;
}

#[async_trait]
impl Mailer for Box<dyn Mailer> {
    async fn send(&self, email: EmailMessage) -> Result<(), EmailError> {
        (**self).send(email).await
    }

    async fn verify_connection(&self) -> Result<(), EmailError> {
        (**self).verify_connection().await
    }
}

pub struct NotificationService<M: Mailer> {
    mailer: M,
    /// Who receives "new feedback" notifications
    recipient: String,
}

impl<M: Mailer> NotificationService<M> {
    pub fn new(mailer: M, recipient: impl Into<String>) -> Self {
        Self {
            mailer,
            recipient: recipient.into(),
        }
    }

    /// Startup self-check. Logs the outcome and never fails, so a broken
    /// mail server cannot keep the service from accepting feedback.
    pub async fn verify_connection(&self) -> bool {
        match self.mailer.verify_connection().await {
            Ok(()) => {
                tracing::info!("SMTP connection verified: ready to send emails");
                true
            }
            Err(e) => {
                tracing::error!("SMTP connection failed: {}", e);
                false
            }
        }
    }

    pub async fn send(&self, email: EmailMessage) -> Result<(), EmailError> {
        tracing::debug!(to = %email.to, subject = %email.subject, "Sending email");
        self.mailer.send(email).await.map_err(|e| {
            tracing::error!("Error sending email: {}", e);
            e
        })
    }

    /// Tell the site owner about a newly accepted feedback entry.
    pub async fn notify_new_feedback(&self, feedback: &Feedback) -> Result<(), EmailError> {
        let email = compose_new_feedback(&self.recipient, feedback);
        self.send(email).await
    }
}

fn compose_new_feedback(to: &str, feedback: &Feedback) -> EmailMessage {
    let name = feedback.name.as_deref().unwrap_or("Anonymous");
    let contact = feedback.email.as_deref().unwrap_or("not provided");
    let rating = feedback
        .rating
        .map(|r| format!("{}/5", r))
        .unwrap_or_else(|| "none".to_string());
    let received = feedback.created_at.format("%Y-%m-%d %H:%M UTC");

    let text = format!(
        "New feedback #{id}\n\nFrom: {name}\nEmail: {contact}\nRating: {rating}\nReceived: {received}\n\n{message}\n",
        id = feedback.id,
        message = feedback.message,
    );

    let html = format!(
        "<h2>New feedback #{id}</h2>\
         <p><strong>From:</strong> {name}<br>\
         <strong>Email:</strong> {contact}<br>\
         <strong>Rating:</strong> {rating}<br>\
         <strong>Received:</strong> {received}</p>\
         <blockquote>{message}</blockquote>",
        id = feedback.id,
        name = escape_html(name),
        contact = escape_html(contact),
        message = escape_html(&feedback.message).replace('\n', "<br>"),
    );

    EmailMessage {
        to: to.to_string(),
        subject: format!("New feedback received (#{})", feedback.id),
        text,
        html: Some(html),
    }
}

/// Escape user content before it goes into an HTML body.
fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
