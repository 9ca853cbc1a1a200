//! # Session Issuer
//!
//! Turns a successful credential or federated sign-in into a signed
//! session token. Failed credential checks keep their reasons private:
//! unknown email and wrong password produce the same error, and the
//! password is always verified before the email-verification state is
//! revealed.

use chrono::{Duration, Utc};
use std::sync::Arc;

use super::audit::{AuditLog, AuthEvent};
use super::crypto::verify_password;
use super::errors::{AuthError, AuthResult};
use super::jwt::{JwtClaims, JwtManager};
use super::oauth::{OAuthRepository, OAuthService, OAuthUserInfo};
use super::user::{normalize_email, User, UserRepository};

/// Session policy
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Consecutive failures before the account locks
    pub max_failed_logins: u32,
    /// Lockout duration in minutes
    pub lockout_minutes: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_failed_logins: 5,
            lockout_minutes: 15,
        }
    }
}

/// A sign-in request
#[derive(Debug, Clone)]
pub enum SignInMethod {
    Credentials { email: String, password: String },
    Federated(OAuthUserInfo),
}

/// The result of a successful sign-in
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub token: String,
}

/// Issues sessions for credential and federated sign-ins
pub struct SessionService<U: UserRepository, O: OAuthRepository> {
    user_repo: Arc<U>,
    oauth: OAuthService<U, O>,
    jwt: JwtManager,
    config: SessionConfig,
    audit: Arc<AuditLog>,
}

impl<U: UserRepository, O: OAuthRepository> SessionService<U, O> {
    pub fn new(
        user_repo: Arc<U>,
        oauth: OAuthService<U, O>,
        jwt: JwtManager,
        config: SessionConfig,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            user_repo,
            oauth,
            jwt,
            config,
            audit,
        }
    }

    pub fn oauth(&self) -> &OAuthService<U, O> {
        &self.oauth
    }

    pub fn jwt(&self) -> &JwtManager {
        &self.jwt
    }

    /// Sign in and issue a session token
    pub fn sign_in(&self, method: SignInMethod) -> AuthResult<Session> {
        match method {
            SignInMethod::Credentials { email, password } => {
                self.sign_in_with_credentials(&email, &password)
            }
            SignInMethod::Federated(info) => self.sign_in_federated(info),
        }
    }

    /// Credential sign-in.
    ///
    /// Unknown email and wrong password are indistinguishable to the
    /// caller. The email-verification check runs only after the
    /// password has matched, so an unverified-email response never
    /// confirms a password guess.
    fn sign_in_with_credentials(&self, email: &str, password: &str) -> AuthResult<Session> {
        let email = normalize_email(email);

        let mut user = match self.user_repo.find_by_email(&email)? {
            Some(user) => user,
            None => {
                self.audit.record(
                    AuthEvent::SignInFailed,
                    None,
                    Some(&email),
                    Some("unknown email"),
                );
                return Err(AuthError::InvalidCredentials);
            }
        };

        let now = Utc::now();
        if user.is_locked(now) {
            self.audit.record(
                AuthEvent::SignInFailed,
                Some(user.id),
                Some(&email),
                Some("account locked"),
            );
            return Err(AuthError::AccountLocked);
        }

        // Federated-only accounts have no password to check against
        if user.password_hash.is_empty() || !verify_password(password, &user.password_hash)? {
            self.record_failure(&mut user)?;
            return Err(AuthError::InvalidCredentials);
        }

        if !user.email_verified {
            self.audit.record(
                AuthEvent::SignInFailed,
                Some(user.id),
                Some(&email),
                Some("email not verified"),
            );
            return Err(AuthError::EmailNotVerified);
        }

        // A successful sign-in clears the failure counter and any
        // expired lock
        if user.failed_logins > 0 || user.locked_until.is_some() {
            user.failed_logins = 0;
            user.locked_until = None;
            user.updated_at = now;
            self.user_repo.update(&user)?;
        }

        let token = self.jwt.issue(&user)?;
        self.audit
            .record(AuthEvent::UserSignedIn, Some(user.id), Some(&email), None);

        Ok(Session { user, token })
    }

    /// Federated sign-in via a provider callback
    fn sign_in_federated(&self, info: OAuthUserInfo) -> AuthResult<Session> {
        let provider = info.provider;
        let (user, is_new) = self.oauth.handle_oauth_user(info)?;

        self.audit.record(
            AuthEvent::OAuthLinked,
            Some(user.id),
            Some(&user.email),
            Some(&format!("provider={} new={}", provider, is_new)),
        );

        let token = self.jwt.issue(&user)?;
        self.audit.record(
            AuthEvent::UserSignedIn,
            Some(user.id),
            Some(&user.email),
            Some(&format!("provider={}", provider)),
        );

        Ok(Session { user, token })
    }

    /// Record a sign-out. Tokens are stateless, so this is an audit
    /// event; invalidation happens client-side by dropping the cookie.
    pub fn sign_out(&self, claims: &JwtClaims) {
        let user_id = claims.user_id().ok();
        self.audit.record(AuthEvent::UserSignedOut, user_id, None, None);
    }

    fn record_failure(&self, user: &mut User) -> AuthResult<()> {
        let now = Utc::now();
        user.failed_logins += 1;
        user.updated_at = now;

        if user.failed_logins >= self.config.max_failed_logins {
            user.locked_until = Some(now + Duration::minutes(self.config.lockout_minutes));
            user.failed_logins = 0;
            self.user_repo.update(user)?;
            self.audit.record(
                AuthEvent::AccountLocked,
                Some(user.id),
                Some(&user.email),
                None,
            );
        } else {
            self.user_repo.update(user)?;
            self.audit.record(
                AuthEvent::SignInFailed,
                Some(user.id),
                Some(&user.email),
                Some("wrong password"),
            );
        }

        Ok(())
    }
}
