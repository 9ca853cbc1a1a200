//! # Registration & Account Recovery
//!
//! Account creation, email verification, and password reset. Outbound
//! tokens are random and sent to the user; only their SHA-256 hashes
//! are stored, each single-use with its own expiry. The forgot-password
//! operation answers identically whether or not the email exists.

use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::audit::{AuditLog, AuthEvent};
use super::crypto::{generate_token, hash_password, hash_token};
use super::email::Mailer;
use super::errors::{AuthError, AuthResult};
use super::user::{is_valid_email, normalize_email, Role, User, UserRepository};

const MAX_NAME_LEN: usize = 60;
const MIN_PASSWORD_LEN: usize = 8;

/// Token lifetimes
#[derive(Debug, Clone)]
pub struct RegistrationConfig {
    pub verification_token_hours: i64,
    pub reset_token_hours: i64,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            verification_token_hours: 24,
            reset_token_hours: 1,
        }
    }
}

/// Handles sign-up, email verification, and password reset
pub struct RegistrationService<U: UserRepository> {
    user_repo: Arc<U>,
    mailer: Option<Arc<dyn Mailer>>,
    config: RegistrationConfig,
    audit: Arc<AuditLog>,
}

impl<U: UserRepository> RegistrationService<U> {
    pub fn new(
        user_repo: Arc<U>,
        mailer: Option<Arc<dyn Mailer>>,
        config: RegistrationConfig,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            user_repo,
            mailer,
            config,
            audit,
        }
    }

    /// Register a new account and send a verification email
    pub async fn register(&self, email: &str, name: &str, password: &str) -> AuthResult<User> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(AuthError::Validation("Invalid email address".to_string()));
        }

        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::Validation("Name is required".to_string()));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(AuthError::Validation(format!(
                "Name must be at most {} characters",
                MAX_NAME_LEN
            )));
        }

        if password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let verification_token = generate_token();
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: email.clone(),
            name: name.to_string(),
            password_hash: hash_password(password)?,
            role: Role::User,
            email_verified: false,
            verification_token_hash: Some(hash_token(&verification_token)),
            verification_expires_at: Some(now + Duration::hours(self.config.verification_token_hours)),
            reset_token_hash: None,
            reset_expires_at: None,
            failed_logins: 0,
            locked_until: None,
            created_at: now,
            updated_at: now,
        };

        self.user_repo.create(&user)?;

        if let Some(mailer) = &self.mailer {
            mailer
                .send_verification_email(&user.email, &user.name, &verification_token)
                .await?;
        }

        self.audit.record(
            AuthEvent::UserRegistered,
            Some(user.id),
            Some(&user.email),
            None,
        );

        Ok(user)
    }

    /// Consume a verification token and mark the email verified
    pub fn verify_email(&self, token: &str) -> AuthResult<User> {
        let token_hash = hash_token(token);

        let mut user = self
            .user_repo
            .find_by_verification_token(&token_hash)?
            .ok_or_else(|| {
                AuthError::NotFound("Invalid or expired verification token".to_string())
            })?;

        let now = Utc::now();
        let expired = user
            .verification_expires_at
            .map_or(true, |expires| expires < now);
        if expired {
            return Err(AuthError::NotFound(
                "Invalid or expired verification token".to_string(),
            ));
        }

        user.email_verified = true;
        user.verification_token_hash = None;
        user.verification_expires_at = None;
        user.updated_at = now;
        self.user_repo.update(&user)?;

        self.audit.record(
            AuthEvent::EmailVerified,
            Some(user.id),
            Some(&user.email),
            None,
        );

        Ok(user)
    }

    /// Start a password reset.
    ///
    /// Always succeeds from the caller's point of view; whether the
    /// email exists is never revealed.
    pub async fn forgot_password(&self, email: &str) -> AuthResult<()> {
        let email = normalize_email(email);

        let Some(mut user) = self.user_repo.find_by_email(&email)? else {
            return Ok(());
        };

        // Federated-only accounts have no password to reset
        if user.password_hash.is_empty() {
            return Ok(());
        }

        let reset_token = generate_token();
        let now = Utc::now();
        user.reset_token_hash = Some(hash_token(&reset_token));
        user.reset_expires_at = Some(now + Duration::hours(self.config.reset_token_hours));
        user.updated_at = now;
        self.user_repo.update(&user)?;

        if let Some(mailer) = &self.mailer {
            mailer
                .send_password_reset_email(&user.email, &reset_token)
                .await?;
        }

        self.audit.record(
            AuthEvent::PasswordResetRequested,
            Some(user.id),
            Some(&user.email),
            None,
        );

        Ok(())
    }

    /// Consume a reset token and set a new password. Also clears any
    /// active lockout, since the password just proved account control.
    pub fn reset_password(&self, token: &str, new_password: &str) -> AuthResult<User> {
        if new_password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let token_hash = hash_token(token);

        let mut user = self
            .user_repo
            .find_by_reset_token(&token_hash)?
            .ok_or_else(|| AuthError::NotFound("Invalid or expired reset token".to_string()))?;

        let now = Utc::now();
        let expired = user.reset_expires_at.map_or(true, |expires| expires < now);
        if expired {
            return Err(AuthError::NotFound(
                "Invalid or expired reset token".to_string(),
            ));
        }

        user.password_hash = hash_password(new_password)?;
        user.reset_token_hash = None;
        user.reset_expires_at = None;
        user.failed_logins = 0;
        user.locked_until = None;
        user.updated_at = now;
        self.user_repo.update(&user)?;

        self.audit.record(
            AuthEvent::PasswordReset,
            Some(user.id),
            Some(&user.email),
            None,
        );

        Ok(user)
    }
}
