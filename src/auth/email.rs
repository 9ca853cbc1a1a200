//! # Email Delivery
//!
//! Verification and password-reset emails behind a `Mailer` trait.
//! The SMTP implementation carries bounded timeouts so a slow relay
//! cannot hang a registration request indefinitely; delivery failure
//! surfaces as a generic error.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

use super::errors::{AuthError, AuthResult};

/// Sends account emails
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification_email(
        &self,
        email: &str,
        name: &str,
        token: &str,
    ) -> AuthResult<()>;

    async fn send_password_reset_email(&self, email: &str, token: &str) -> AuthResult<()>;
}

/// SMTP configuration
#[derive(Debug, Clone, serde::Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// From address, e.g. `no-reply@civicwatch.example`
    pub from_address: String,
    pub from_name: String,
    /// Base URL embedded in links, e.g. `https://civicwatch.example`
    pub base_url: String,
    /// Connection/socket timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

/// SMTP mailer over rustls
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    base_url: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> AuthResult<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| AuthError::Email(format!("SMTP relay setup failed: {}", e)))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .timeout(Some(Duration::from_secs(config.timeout_secs)))
            .build();

        let from = format!("{} <{}>", config.from_name, config.from_address)
            .parse::<Mailbox>()
            .map_err(|e| AuthError::Email(format!("Invalid from address: {}", e)))?;

        Ok(Self {
            transport,
            from,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn send(&self, to: &str, subject: &str, body: String) -> AuthResult<()> {
        let to = to
            .parse::<Mailbox>()
            .map_err(|e| AuthError::Email(format!("Invalid recipient: {}", e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .body(body)
            .map_err(|e| AuthError::Email(format!("Failed to build message: {}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AuthError::Email(format!("SMTP send failed: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_verification_email(
        &self,
        email: &str,
        name: &str,
        token: &str,
    ) -> AuthResult<()> {
        let url = format!(
            "{}/api/users/verify-email?token={}",
            self.base_url,
            urlencoding::encode(token)
        );
        let body = format!(
            "Hello {},\n\n\
             Please verify your email address by opening the following link:\n\n\
             {}\n\n\
             This link will expire in 24 hours.\n\n\
             If you didn't create an account, please ignore this email.",
            name, url
        );
        self.send(email, "Verify your email address", body).await
    }

    async fn send_password_reset_email(&self, email: &str, token: &str) -> AuthResult<()> {
        let url = format!(
            "{}/reset-password?token={}",
            self.base_url,
            urlencoding::encode(token)
        );
        let body = format!(
            "You requested to reset your password. Open the following link to set a new one:\n\n\
             {}\n\n\
             This link will expire in 1 hour.\n\n\
             If you didn't request this, please ignore this email.",
            url
        );
        self.send(email, "Reset your password", body).await
    }
}

// ==================
// Mock Mailer
// ==================

/// A recorded outbound email
#[derive(Debug, Clone, PartialEq)]
pub enum SentEmail {
    Verification {
        email: String,
        name: String,
        token: String,
    },
    PasswordReset {
        email: String,
        token: String,
    },
}

/// Mailer that records messages instead of sending them
#[derive(Default)]
pub struct MockMailer {
    sent: std::sync::Mutex<Vec<SentEmail>>,
    /// When set, every send fails with a generic error
    pub fail: std::sync::atomic::AtomicBool,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_verification_token(&self) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|m| match m {
                SentEmail::Verification { token, .. } => Some(token.clone()),
                _ => None,
            })
    }

    pub fn last_reset_token(&self) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|m| match m {
                SentEmail::PasswordReset { token, .. } => Some(token.clone()),
                _ => None,
            })
    }

    fn check_failure(&self) -> AuthResult<()> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            Err(AuthError::Email("mock failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send_verification_email(
        &self,
        email: &str,
        name: &str,
        token: &str,
    ) -> AuthResult<()> {
        self.check_failure()?;
        self.sent.lock().unwrap().push(SentEmail::Verification {
            email: email.to_string(),
            name: name.to_string(),
            token: token.to_string(),
        });
        Ok(())
    }

    async fn send_password_reset_email(&self, email: &str, token: &str) -> AuthResult<()> {
        self.check_failure()?;
        self.sent.lock().unwrap().push(SentEmail::PasswordReset {
            email: email.to_string(),
            token: token.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_mailer_records_messages() {
        let mailer = MockMailer::new();
        mailer
            .send_verification_email("a@example.com", "Alice", "tok-1")
            .await
            .unwrap();
        mailer
            .send_password_reset_email("a@example.com", "tok-2")
            .await
            .unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(mailer.last_verification_token().unwrap(), "tok-1");
        assert_eq!(mailer.last_reset_token().unwrap(), "tok-2");
    }

    #[tokio::test]
    async fn test_mock_mailer_failure_mode() {
        let mailer = MockMailer::new();
        mailer.fail.store(true, std::sync::atomic::Ordering::SeqCst);

        let result = mailer
            .send_verification_email("a@example.com", "Alice", "tok")
            .await;
        assert!(matches!(result, Err(AuthError::Email(_))));
        assert!(mailer.sent().is_empty());
    }
}
