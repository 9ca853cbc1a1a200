//! # Federated Sign-In (OAuth)
//!
//! OAuth 2.0 identity providers for federated sign-in. A provider that
//! supplies a verified email can auto-provision a local account, and
//! providers sharing the same email link to one local account. That
//! linking is a deliberate trust decision: an attacker controlling a
//! verified email at a provider gains access to an existing local
//! account with the same address.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use super::errors::{AuthError, AuthResult};
use super::user::{normalize_email, Role, User, UserRepository};

// ==================
// Provider Configuration
// ==================

/// Supported OAuth providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    GitHub,
}

impl std::fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OAuthProvider::Google => write!(f, "google"),
            OAuthProvider::GitHub => write!(f, "github"),
        }
    }
}

impl OAuthProvider {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "google" => Some(OAuthProvider::Google),
            "github" => Some(OAuthProvider::GitHub),
            _ => None,
        }
    }
}

/// Configuration for an OAuth provider
#[derive(Debug, Clone)]
pub struct OAuthProviderConfig {
    pub provider: OAuthProvider,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

impl OAuthProviderConfig {
    pub fn google(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            provider: OAuthProvider::Google,
            client_id,
            client_secret,
            redirect_uri,
            scopes: vec![
                "openid".to_string(),
                "email".to_string(),
                "profile".to_string(),
            ],
        }
    }

    pub fn github(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            provider: OAuthProvider::GitHub,
            client_id,
            client_secret,
            redirect_uri,
            scopes: vec!["user:email".to_string(), "read:user".to_string()],
        }
    }

    /// Authorization endpoint for the provider
    pub fn auth_url(&self) -> &'static str {
        match self.provider {
            OAuthProvider::Google => "https://accounts.google.com/o/oauth2/v2/auth",
            OAuthProvider::GitHub => "https://github.com/login/oauth/authorize",
        }
    }

    /// Token endpoint for the provider
    pub fn token_url(&self) -> &'static str {
        match self.provider {
            OAuthProvider::Google => "https://oauth2.googleapis.com/token",
            OAuthProvider::GitHub => "https://github.com/login/oauth/access_token",
        }
    }

    /// User info endpoint for the provider
    pub fn userinfo_url(&self) -> &'static str {
        match self.provider {
            OAuthProvider::Google => "https://www.googleapis.com/oauth2/v3/userinfo",
            OAuthProvider::GitHub => "https://api.github.com/user",
        }
    }
}

// ==================
// State (CSRF protection)
// ==================

/// OAuth state parameter for CSRF protection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthState {
    pub state: String,
    pub provider: OAuthProvider,
    pub redirect_to: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl OAuthState {
    pub fn new(provider: OAuthProvider, redirect_to: Option<String>) -> Self {
        Self {
            state: Uuid::new_v4().to_string(),
            provider,
            redirect_to,
            created_at: Utc::now(),
        }
    }

    pub fn is_expired(&self, max_age_seconds: i64) -> bool {
        let age = Utc::now().signed_duration_since(self.created_at);
        age.num_seconds() > max_age_seconds
    }
}

// ==================
// Normalized User Info
// ==================

/// Normalized user info from an OAuth provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthUserInfo {
    pub provider: OAuthProvider,
    pub provider_id: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: String,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubUserInfo {
    id: i64,
    email: Option<String>,
    name: Option<String>,
}

impl OAuthUserInfo {
    pub fn from_google(data: serde_json::Value) -> AuthResult<Self> {
        let info: GoogleUserInfo = serde_json::from_value(data)
            .map_err(|e| AuthError::OAuth(format!("Failed to parse Google user info: {}", e)))?;

        Ok(Self {
            provider: OAuthProvider::Google,
            provider_id: info.sub,
            email: info.email,
            email_verified: info.email_verified.unwrap_or(false),
            name: info.name,
        })
    }

    pub fn from_github(data: serde_json::Value) -> AuthResult<Self> {
        let info: GitHubUserInfo = serde_json::from_value(data)
            .map_err(|e| AuthError::OAuth(format!("Failed to parse GitHub user info: {}", e)))?;

        Ok(Self {
            provider: OAuthProvider::GitHub,
            provider_id: info.id.to_string(),
            email: info.email,
            email_verified: true, // GitHub only exposes verified primary emails
            name: info.name,
        })
    }
}

// ==================
// Linked Identities
// ==================

/// Linked OAuth identity for a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthIdentity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: OAuthProvider,
    pub provider_id: String,
    pub provider_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl OAuthIdentity {
    pub fn new(user_id: Uuid, info: &OAuthUserInfo) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            provider: info.provider,
            provider_id: info.provider_id.clone(),
            provider_email: info.email.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Repository for OAuth identities
pub trait OAuthRepository: Send + Sync {
    fn find_by_provider_id(
        &self,
        provider: OAuthProvider,
        provider_id: &str,
    ) -> AuthResult<Option<OAuthIdentity>>;

    fn find_by_user_id(&self, user_id: Uuid) -> AuthResult<Vec<OAuthIdentity>>;

    fn create(&self, identity: OAuthIdentity) -> AuthResult<OAuthIdentity>;

    fn delete(&self, identity_id: Uuid) -> AuthResult<()>;
}

/// In-memory OAuth identity repository
pub struct InMemoryOAuthRepository {
    identities: RwLock<Vec<OAuthIdentity>>,
}

impl InMemoryOAuthRepository {
    pub fn new() -> Self {
        Self {
            identities: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryOAuthRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl OAuthRepository for InMemoryOAuthRepository {
    fn find_by_provider_id(
        &self,
        provider: OAuthProvider,
        provider_id: &str,
    ) -> AuthResult<Option<OAuthIdentity>> {
        let identities = self.identities.read().unwrap();
        Ok(identities
            .iter()
            .find(|i| i.provider == provider && i.provider_id == provider_id)
            .cloned())
    }

    fn find_by_user_id(&self, user_id: Uuid) -> AuthResult<Vec<OAuthIdentity>> {
        let identities = self.identities.read().unwrap();
        Ok(identities
            .iter()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect())
    }

    fn create(&self, identity: OAuthIdentity) -> AuthResult<OAuthIdentity> {
        let mut identities = self.identities.write().unwrap();
        identities.push(identity.clone());
        Ok(identity)
    }

    fn delete(&self, identity_id: Uuid) -> AuthResult<()> {
        let mut identities = self.identities.write().unwrap();
        identities.retain(|i| i.id != identity_id);
        Ok(())
    }
}

// ==================
// Code Exchange
// ==================

/// Exchanges an authorization code for the provider's user info.
///
/// The HTTP round trips to the token and userinfo endpoints live
/// behind this trait so the core stays free of a web client.
#[async_trait]
pub trait CodeExchanger: Send + Sync {
    async fn fetch_user_info(
        &self,
        config: &OAuthProviderConfig,
        code: &str,
    ) -> AuthResult<serde_json::Value>;
}

// ==================
// OAuth Service
// ==================

/// OAuth authentication service
pub struct OAuthService<U: UserRepository, O: OAuthRepository> {
    providers: HashMap<OAuthProvider, OAuthProviderConfig>,
    user_repo: Arc<U>,
    oauth_repo: Arc<O>,
    state_store: RwLock<HashMap<String, OAuthState>>,
    state_max_age_seconds: i64,
}

impl<U: UserRepository, O: OAuthRepository> OAuthService<U, O> {
    pub fn new(user_repo: Arc<U>, oauth_repo: Arc<O>) -> Self {
        Self {
            providers: HashMap::new(),
            user_repo,
            oauth_repo,
            state_store: RwLock::new(HashMap::new()),
            state_max_age_seconds: 600,
        }
    }

    /// Register an OAuth provider
    pub fn register_provider(&mut self, config: OAuthProviderConfig) {
        self.providers.insert(config.provider, config);
    }

    pub fn get_provider_config(&self, provider: OAuthProvider) -> AuthResult<&OAuthProviderConfig> {
        self.providers
            .get(&provider)
            .ok_or_else(|| AuthError::OAuth(format!("Provider {} not configured", provider)))
    }

    /// Build the authorization URL and remember the state parameter
    pub fn get_authorization_url(
        &self,
        provider: OAuthProvider,
        redirect_to: Option<String>,
    ) -> AuthResult<(String, String)> {
        let config = self.get_provider_config(provider)?;

        let state = OAuthState::new(provider, redirect_to);
        let state_value = state.state.clone();

        {
            let mut states = self.state_store.write().unwrap();
            states.insert(state_value.clone(), state);
        }

        let params = [
            ("client_id", config.client_id.as_str()),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("response_type", "code"),
            ("state", &state_value),
            ("scope", &config.scopes.join(" ")),
        ];

        let url = format!(
            "{}?{}",
            config.auth_url(),
            params
                .iter()
                .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&")
        );

        Ok((url, state_value))
    }

    /// Validate and consume an OAuth state parameter
    pub fn validate_state(&self, state: &str) -> AuthResult<OAuthState> {
        let mut states = self.state_store.write().unwrap();

        let oauth_state = states
            .remove(state)
            .ok_or_else(|| AuthError::OAuth("Invalid or expired state".to_string()))?;

        if oauth_state.is_expired(self.state_max_age_seconds) {
            return Err(AuthError::OAuth("State expired".to_string()));
        }

        Ok(oauth_state)
    }

    /// Parse provider-specific user info into the normalized shape
    pub fn parse_user_info(
        &self,
        provider: OAuthProvider,
        data: serde_json::Value,
    ) -> AuthResult<OAuthUserInfo> {
        match provider {
            OAuthProvider::Google => OAuthUserInfo::from_google(data),
            OAuthProvider::GitHub => OAuthUserInfo::from_github(data),
        }
    }

    /// Resolve an OAuth callback to a local user.
    ///
    /// Order: an existing provider link wins; otherwise the provider's
    /// verified email links to an existing account with the same address
    /// or provisions a fresh one. Returns the user and whether it was
    /// newly created.
    pub fn handle_oauth_user(&self, info: OAuthUserInfo) -> AuthResult<(User, bool)> {
        if let Some(identity) = self
            .oauth_repo
            .find_by_provider_id(info.provider, &info.provider_id)?
        {
            let user = self
                .user_repo
                .find_by_id(identity.user_id)?
                .ok_or_else(|| AuthError::Internal("Dangling OAuth identity".to_string()))?;
            return Ok((user, false));
        }

        let email = info
            .email
            .as_deref()
            .ok_or_else(|| AuthError::OAuth("Email is required from OAuth provider".to_string()))?;

        if !info.email_verified {
            return Err(AuthError::OAuth(
                "Provider email is not verified".to_string(),
            ));
        }

        let email = normalize_email(email);

        let (mut user, is_new) = match self.user_repo.find_by_email(&email)? {
            Some(existing) => (existing, false),
            None => {
                let now = Utc::now();
                let new_user = User {
                    id: Uuid::new_v4(),
                    email: email.clone(),
                    name: info.name.clone().unwrap_or_else(|| email.clone()),
                    password_hash: String::new(), // No password for federated accounts
                    role: Role::User,
                    email_verified: true,
                    verification_token_hash: None,
                    verification_expires_at: None,
                    reset_token_hash: None,
                    reset_expires_at: None,
                    failed_logins: 0,
                    locked_until: None,
                    created_at: now,
                    updated_at: now,
                };
                self.user_repo.create(&new_user)?;
                (new_user, true)
            }
        };

        // The provider vouched for the address; a pending local
        // verification token becomes moot.
        if !user.email_verified {
            user.email_verified = true;
            user.verification_token_hash = None;
            user.verification_expires_at = None;
            user.updated_at = Utc::now();
            self.user_repo.update(&user)?;
        }

        let identity = OAuthIdentity::new(user.id, &info);
        self.oauth_repo.create(identity)?;

        Ok((user, is_new))
    }

    /// Linked identities for a user
    pub fn get_linked_providers(&self, user_id: Uuid) -> AuthResult<Vec<OAuthIdentity>> {
        self.oauth_repo.find_by_user_id(user_id)
    }
}

// ==================
// Tests
// ==================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::user::{test_user, InMemoryUserRepository};

    fn create_test_service() -> OAuthService<InMemoryUserRepository, InMemoryOAuthRepository> {
        let user_repo = Arc::new(InMemoryUserRepository::new());
        let oauth_repo = Arc::new(InMemoryOAuthRepository::new());
        let mut service = OAuthService::new(user_repo, oauth_repo);

        service.register_provider(OAuthProviderConfig::google(
            "google-client-id".to_string(),
            "google-secret".to_string(),
            "http://localhost/callback".to_string(),
        ));
        service.register_provider(OAuthProviderConfig::github(
            "github-client-id".to_string(),
            "github-secret".to_string(),
            "http://localhost/callback".to_string(),
        ));

        service
    }

    fn google_info(email: &str) -> OAuthUserInfo {
        OAuthUserInfo {
            provider: OAuthProvider::Google,
            provider_id: "123456789".to_string(),
            email: Some(email.to_string()),
            email_verified: true,
            name: Some("Test User".to_string()),
        }
    }

    #[test]
    fn test_get_authorization_url() {
        let service = create_test_service();

        let (url, state) = service
            .get_authorization_url(OAuthProvider::Google, None)
            .unwrap();

        assert!(url.contains("accounts.google.com"));
        assert!(url.contains("client_id=google-client-id"));
        assert!(url.contains(&format!("state={}", state)));
    }

    #[test]
    fn test_provider_endpoints() {
        let service = create_test_service();

        let google = service.get_provider_config(OAuthProvider::Google).unwrap();
        assert!(google.token_url().contains("googleapis.com"));
        assert!(google.userinfo_url().contains("googleapis.com"));

        let github = service.get_provider_config(OAuthProvider::GitHub).unwrap();
        assert!(github.token_url().contains("github.com"));
        assert!(github.userinfo_url().starts_with("https://api.github.com"));
    }

    #[test]
    fn test_state_is_single_use() {
        let service = create_test_service();

        let (_, state) = service
            .get_authorization_url(OAuthProvider::GitHub, Some("/reports".to_string()))
            .unwrap();

        let validated = service.validate_state(&state).unwrap();
        assert_eq!(validated.provider, OAuthProvider::GitHub);
        assert_eq!(validated.redirect_to, Some("/reports".to_string()));

        // Consumed on first use
        assert!(service.validate_state(&state).is_err());
    }

    #[test]
    fn test_parse_google_user_info() {
        let data = serde_json::json!({
            "sub": "123456789",
            "email": "user@gmail.com",
            "email_verified": true,
            "name": "Test User"
        });

        let info = OAuthUserInfo::from_google(data).unwrap();
        assert_eq!(info.provider, OAuthProvider::Google);
        assert_eq!(info.provider_id, "123456789");
        assert_eq!(info.email, Some("user@gmail.com".to_string()));
        assert!(info.email_verified);
    }

    #[test]
    fn test_parse_github_user_info() {
        let data = serde_json::json!({
            "id": 12345,
            "email": "user@github.example",
            "name": "GitHub User"
        });

        let info = OAuthUserInfo::from_github(data).unwrap();
        assert_eq!(info.provider, OAuthProvider::GitHub);
        assert_eq!(info.provider_id, "12345");
        assert!(info.email_verified);
    }

    #[test]
    fn test_first_sight_auto_provisions_verified_user() {
        let service = create_test_service();

        let (user, is_new) = service
            .handle_oauth_user(google_info("new@example.com"))
            .unwrap();

        assert!(is_new);
        assert!(user.email_verified);
        assert_eq!(user.role, Role::User);
        assert!(user.password_hash.is_empty());

        // Second sight resolves through the stored identity
        let (again, is_new) = service
            .handle_oauth_user(google_info("new@example.com"))
            .unwrap();
        assert!(!is_new);
        assert_eq!(again.id, user.id);
    }

    #[test]
    fn test_links_to_existing_account_by_email() {
        let user_repo = Arc::new(InMemoryUserRepository::new());
        let oauth_repo = Arc::new(InMemoryOAuthRepository::new());
        let existing = test_user("shared@example.com", Role::User, false);
        user_repo.create(&existing).unwrap();

        let service = OAuthService::new(user_repo.clone(), oauth_repo);

        let (user, is_new) = service
            .handle_oauth_user(google_info("Shared@Example.com"))
            .unwrap();

        assert!(!is_new);
        assert_eq!(user.id, existing.id);
        // Provider vouched for the email; local verification flips on
        assert!(user_repo
            .find_by_id(existing.id)
            .unwrap()
            .unwrap()
            .email_verified);
        assert_eq!(service.get_linked_providers(existing.id).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_or_unverified_provider_email_rejected() {
        let service = create_test_service();

        let mut info = google_info("x@example.com");
        info.email = None;
        assert!(service.handle_oauth_user(info).is_err());

        let mut info = google_info("x@example.com");
        info.email_verified = false;
        assert!(matches!(
            service.handle_oauth_user(info),
            Err(AuthError::OAuth(_))
        ));
    }

    #[test]
    fn test_provider_not_configured() {
        let user_repo = Arc::new(InMemoryUserRepository::new());
        let oauth_repo = Arc::new(InMemoryOAuthRepository::new());
        let service = OAuthService::new(user_repo, oauth_repo);

        let result = service.get_authorization_url(OAuthProvider::Google, None);
        assert!(result.is_err());
    }
}
