//! # User Records & Credential Store
//!
//! The user record table keyed by case-normalized email, behind a
//! repository trait so the storage backend stays swappable. The
//! in-memory implementation enforces email uniqueness inside its write
//! lock, so two concurrent registrations with the same email cannot
//! both succeed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use super::crypto::constant_time_eq;
use super::errors::{AuthError, AuthResult};

// ==================
// Roles
// ==================

/// User roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

// ==================
// User Record
// ==================

/// A user account
///
/// Verification and reset tokens are stored as SHA-256 hashes, each
/// single-use with its own expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Unique, lowercased email
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub email_verified: bool,
    #[serde(skip_serializing)]
    pub verification_token_hash: Option<String>,
    pub verification_expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub reset_token_hash: Option<String>,
    pub reset_expires_at: Option<DateTime<Utc>>,
    pub failed_logins: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether the account is currently locked out
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        matches!(self.locked_until, Some(until) if until > now)
    }
}

/// Normalize an email for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email shape validation
pub fn is_valid_email(email: &str) -> bool {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return false;
    }

    let local = parts[0];
    let domain = parts[1];

    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// User response shape with sensitive fields removed
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl UserResponse {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            email_verified: user.email_verified,
            created_at: user.created_at,
        }
    }
}

// ==================
// Repository Trait
// ==================

/// Repository for user accounts
pub trait UserRepository: Send + Sync {
    /// Find a user by email (caller passes a normalized email)
    fn find_by_email(&self, email: &str) -> AuthResult<Option<User>>;

    /// Find a user by id
    fn find_by_id(&self, id: Uuid) -> AuthResult<Option<User>>;

    /// Create a user. Fails with `Conflict` if the email is taken.
    /// Uniqueness check and insert happen under one lock.
    fn create(&self, user: &User) -> AuthResult<()>;

    /// Replace an existing user record
    fn update(&self, user: &User) -> AuthResult<()>;

    /// Find a user holding this verification token hash
    fn find_by_verification_token(&self, token_hash: &str) -> AuthResult<Option<User>>;

    /// Find a user holding this reset token hash
    fn find_by_reset_token(&self, token_hash: &str) -> AuthResult<Option<User>>;

    /// List all users
    fn list(&self) -> AuthResult<Vec<User>>;

    /// Delete a user by id
    fn delete(&self, id: Uuid) -> AuthResult<()>;
}

// ==================
// In-Memory Repository
// ==================

struct Inner {
    users: HashMap<Uuid, User>,
    by_email: HashMap<String, Uuid>,
}

/// In-memory user repository
pub struct InMemoryUserRepository {
    inner: RwLock<Inner>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                users: HashMap::new(),
                by_email: HashMap::new(),
            }),
        }
    }
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl UserRepository for InMemoryUserRepository {
    fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .by_email
            .get(&normalize_email(email))
            .and_then(|id| inner.users.get(id))
            .cloned())
    }

    fn find_by_id(&self, id: Uuid) -> AuthResult<Option<User>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.users.get(&id).cloned())
    }

    fn create(&self, user: &User) -> AuthResult<()> {
        let mut inner = self.inner.write().unwrap();
        let email = normalize_email(&user.email);
        if inner.by_email.contains_key(&email) {
            return Err(AuthError::Conflict);
        }
        inner.by_email.insert(email, user.id);
        inner.users.insert(user.id, user.clone());
        Ok(())
    }

    fn update(&self, user: &User) -> AuthResult<()> {
        let mut inner = self.inner.write().unwrap();
        if !inner.users.contains_key(&user.id) {
            return Err(AuthError::NotFound("User not found".to_string()));
        }
        inner.users.insert(user.id, user.clone());
        Ok(())
    }

    fn find_by_verification_token(&self, token_hash: &str) -> AuthResult<Option<User>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .users
            .values()
            .find(|u| {
                u.verification_token_hash
                    .as_deref()
                    .is_some_and(|h| constant_time_eq(h, token_hash))
            })
            .cloned())
    }

    fn find_by_reset_token(&self, token_hash: &str) -> AuthResult<Option<User>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .users
            .values()
            .find(|u| {
                u.reset_token_hash
                    .as_deref()
                    .is_some_and(|h| constant_time_eq(h, token_hash))
            })
            .cloned())
    }

    fn list(&self) -> AuthResult<Vec<User>> {
        let inner = self.inner.read().unwrap();
        let mut users: Vec<User> = inner.users.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    fn delete(&self, id: Uuid) -> AuthResult<()> {
        let mut inner = self.inner.write().unwrap();
        let user = inner
            .users
            .remove(&id)
            .ok_or_else(|| AuthError::NotFound("User not found".to_string()))?;
        inner.by_email.remove(&normalize_email(&user.email));
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_user(email: &str, role: Role, verified: bool) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        email: normalize_email(email),
        name: "Test User".to_string(),
        password_hash: String::new(),
        role,
        email_verified: verified,
        verification_token_hash: None,
        verification_expires_at: None,
        reset_token_hash: None,
        reset_expires_at: None,
        failed_logins: 0,
        locked_until: None,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("user.name@example.co.uk"));
        assert!(!is_valid_email("invalid"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("user@.com"));
    }

    #[test]
    fn test_create_and_lookup_is_case_normalized() {
        let repo = InMemoryUserRepository::new();
        repo.create(&test_user("Alice@Example.COM", Role::User, false))
            .unwrap();

        let found = repo.find_by_email("alice@example.com").unwrap().unwrap();
        assert_eq!(found.email, "alice@example.com");

        // Different casing resolves to the same account
        assert!(repo.find_by_email("ALICE@example.com").unwrap().is_some());
    }

    #[test]
    fn test_duplicate_email_conflicts() {
        let repo = InMemoryUserRepository::new();
        repo.create(&test_user("bob@example.com", Role::User, false))
            .unwrap();

        let result = repo.create(&test_user("BOB@example.com", Role::User, false));
        assert!(matches!(result, Err(AuthError::Conflict)));
    }

    #[test]
    fn test_concurrent_registration_single_winner() {
        let repo = Arc::new(InMemoryUserRepository::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let repo = repo.clone();
                std::thread::spawn(move || {
                    repo.create(&test_user("race@example.com", Role::User, false))
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let successes = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(AuthError::Conflict)))
            .count();

        assert_eq!(successes, 1);
        assert_eq!(conflicts, 7);
    }

    #[test]
    fn test_find_by_token_hashes() {
        let repo = InMemoryUserRepository::new();
        let mut user = test_user("carol@example.com", Role::User, false);
        user.verification_token_hash = Some("hash-a".to_string());
        user.reset_token_hash = Some("hash-b".to_string());
        repo.create(&user).unwrap();

        assert!(repo
            .find_by_verification_token("hash-a")
            .unwrap()
            .is_some());
        assert!(repo.find_by_verification_token("hash-b").unwrap().is_none());
        assert!(repo.find_by_reset_token("hash-b").unwrap().is_some());
    }

    #[test]
    fn test_delete_frees_email() {
        let repo = InMemoryUserRepository::new();
        let user = test_user("dave@example.com", Role::User, true);
        repo.create(&user).unwrap();

        repo.delete(user.id).unwrap();
        assert!(repo.find_by_email("dave@example.com").unwrap().is_none());
        // Email can be registered again
        assert!(repo
            .create(&test_user("dave@example.com", Role::User, false))
            .is_ok());
    }

    #[test]
    fn test_lockout_window() {
        let mut user = test_user("erin@example.com", Role::User, true);
        let now = Utc::now();
        assert!(!user.is_locked(now));

        user.locked_until = Some(now + chrono::Duration::minutes(15));
        assert!(user.is_locked(now));
        assert!(!user.is_locked(now + chrono::Duration::minutes(16)));
    }
}
