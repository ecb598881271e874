// SMTP implementation of the `Mailer` port.
//
// `secure = true` means implicit TLS (usually port 465). Otherwise the
// connection starts in plaintext and upgrades with STARTTLS when the server
// offers it (usually port 587).

use crate::config::EmailConfig;
use crate::core::notifications::{EmailError, EmailMessage, Mailer};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

/// Display name used in the From header.
const SENDER_NAME: &str = "Trustboard";
const SMTP_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> Result<Self, EmailError> {
        tracing::debug!(
            host = %config.host,
            port = config.port,
            secure = config.secure,
            user = if config.user.is_empty() { "MISSING" } else { "***" },
            pass = if config.password.is_empty() { "MISSING" } else { "***" },
            "Configuring SMTP transport"
        );

        let tls_parameters = TlsParameters::new(config.host.clone())
            .map_err(|e| EmailError::Transport(e.to_string()))?;
        let tls = if config.secure {
            Tls::Wrapper(tls_parameters)
        } else {
            Tls::Opportunistic(tls_parameters)
        };

        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            .port(config.port)
            .tls(tls)
            .credentials(Credentials::new(
                config.user.clone(),
                config.password.clone(),
            ))
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        Ok(Self {
            transport,
            from: sender_mailbox(&config.user)?,
        })
    }

    fn build_message(&self, email: EmailMessage) -> Result<Message, EmailError> {
        build_message(&self.from, email)
    }
}

fn sender_mailbox(user: &str) -> Result<Mailbox, EmailError> {
    let address: Address = user
        .parse()
        .map_err(|e| EmailError::Address(format!("{}: {}", user, e)))?;
    Ok(Mailbox::new(Some(SENDER_NAME.to_string()), address))
}

fn build_message(from: &Mailbox, email: EmailMessage) -> Result<Message, EmailError> {
    let to: Mailbox = email
        .to
        .parse()
        .map_err(|e| EmailError::Address(format!("{}: {}", email.to, e)))?;

    let builder = Message::builder()
        .from(from.clone())
        .to(to)
        .subject(email.subject);

    let message = match email.html {
        Some(html) => builder.multipart(MultiPart::alternative_plain_html(email.text, html)),
        None => builder.header(ContentType::TEXT_PLAIN).body(email.text),
    };

    message.map_err(|e| EmailError::Message(e.to_string()))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: EmailMessage) -> Result<(), EmailError> {
        let message = self.build_message(email)?;
        let message_id = message
            .headers()
            .get_raw("Message-ID")
            .map(str::to_string)
            .unwrap_or_default();

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| EmailError::Transport(e.to_string()))?;

        tracing::info!(
            message_id = %message_id,
            code = %response.code(),
            "Email sent successfully"
        );
        Ok(())
    }

    async fn verify_connection(&self) -> Result<(), EmailError> {
        let connected = self
            .transport
            .test_connection()
            .await
            .map_err(|e| EmailError::Transport(e.to_string()))?;

        if connected {
            Ok(())
        } else {
            Err(EmailError::Transport(
                "server did not accept the connection".to_string(),
            ))
        }
    }
}
