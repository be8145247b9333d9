use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::SmtpConfig;

/// A magic link ready to be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagicLinkEmail {
    pub to_email: String,
    pub guest_name: String,
    pub link: String,
    pub expires_in_minutes: i64,
}

#[async_trait]
pub trait MagicLinkMailer: Send + Sync {
    async fn send_magic_link(&self, email: &MagicLinkEmail) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct SmtpMailer {
    mailer: SmtpTransport,
    from_email: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, AppError> {
        let creds = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().clone(),
        );

        let mailer = SmtpTransport::starttls_relay(&config.host)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!(e.to_string())))?
            .credentials(creds)
            .port(config.port)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!(host = %config.host, port = config.port, "SMTP mailer initialized");

        Ok(Self {
            mailer,
            from_email: config.from_email.clone(),
        })
    }
}

#[async_trait]
impl MagicLinkMailer for SmtpMailer {
    async fn send_magic_link(&self, email: &MagicLinkEmail) -> Result<(), AppError> {
        let message = Message::builder()
            .from(
                self.from_email
                    .parse()
                    .map_err(|e: lettre::address::AddressError| AppError::InternalError(e.into()))?,
            )
            .to(email
                .to_email
                .parse()
                .map_err(|e: lettre::address::AddressError| AppError::InternalError(e.into()))?)
            .subject("Your Wedding Portal Login Link")
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(plain_body(email)),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body(email)),
                    ),
            )
            .map_err(|e| AppError::InternalError(e.into()))?;

        // SmtpTransport is blocking
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&message))
            .await
            .map_err(|e| AppError::InternalError(e.into()))?;

        match result {
            Ok(_) => {
                tracing::info!(to = %email.to_email, "Magic link email sent");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, to = %email.to_email, "Failed to send magic link email");
                Err(AppError::EmailError(e.to_string()))
            }
        }
    }
}

fn plain_body(email: &MagicLinkEmail) -> String {
    format!(
        "Hi {},\n\nUse the link below to log in to your wedding portal:\n\n{}\n\n\
         This link will expire in {} minutes and can only be used once.\n\
         If you didn't request this link, you can safely ignore this email.",
        email.guest_name, email.link, email.expires_in_minutes
    )
}

fn html_body(email: &MagicLinkEmail) -> String {
    format!(
        r###"<html>
    <body style="font-family: Arial, sans-serif;">
        <h2>Welcome to Our Wedding Portal</h2>
        <p>Hi {name},</p>
        <p>Click the button below to log in to your personalized wedding portal:</p>
        <p>
            <a href="{link}" style="background-color: #059669; color: white; padding: 12px 24px; text-decoration: none; border-radius: 6px;">
                Log In to Wedding Portal
            </a>
        </p>
        <p style="color: #6b7280; font-size: 14px;">
            This link will expire in {minutes} minutes and can only be used once.
        </p>
        <p style="color: #9ca3af; font-size: 12px;">
            If the button doesn't work, copy and paste this link into your browser:<br>{link}
        </p>
    </body>
</html>
"###,
        name = ammonia::clean_text(&email.guest_name),
        link = email.link,
        minutes = email.expires_in_minutes
    )
}

/// Writes links to the log instead of sending mail. Used when SMTP is not
/// configured outside production.
#[derive(Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl MagicLinkMailer for LogMailer {
    async fn send_magic_link(&self, email: &MagicLinkEmail) -> Result<(), AppError> {
        tracing::info!(
            to = %email.to_email,
            link = %email.link,
            "SMTP not configured; magic link logged instead of sent"
        );
        Ok(())
    }
}

/// Records every link it is asked to send.
#[derive(Clone, Default)]
pub struct MockMailer {
    sent: Arc<Mutex<Vec<MagicLinkEmail>>>,
    fail: bool,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose deliveries always fail.
    pub fn failing() -> Self {
        Self {
            sent: Arc::default(),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<MagicLinkEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Token from the most recent link sent to `email`.
    pub fn last_token_for(&self, email: &str) -> Option<String> {
        let email = email.to_lowercase();
        self.sent()
            .into_iter()
            .rev()
            .find(|m| m.to_email == email)
            .and_then(|m| m.link.split("token=").nth(1).map(str::to_string))
    }
}

#[async_trait]
impl MagicLinkMailer for MockMailer {
    async fn send_magic_link(&self, email: &MagicLinkEmail) -> Result<(), AppError> {
        if self.fail {
            return Err(AppError::EmailError("mock delivery failure".to_string()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email.clone());
        }
        Ok(())
    }
}
