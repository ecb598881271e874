use serde::{Deserialize, Serialize};

/// An outgoing transactional email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    /// Plain-text body, always sent
    pub text: String,
    /// Optional HTML alternative
    pub html: Option<String>,
}
