//! # Auth Audit Log
//!
//! Append-only, in-memory record of authentication events with a bounded
//! ring buffer. Entries are structured events, not domain state; nothing
//! here feeds back into authorization decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::RwLock;
use uuid::Uuid;

/// Auth event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthEvent {
    UserRegistered,
    EmailVerified,
    UserSignedIn,
    UserSignedOut,
    SignInFailed,
    AccountLocked,
    PasswordResetRequested,
    PasswordReset,
    OAuthLinked,
}

impl AuthEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthEvent::UserRegistered => "user_registered",
            AuthEvent::EmailVerified => "email_verified",
            AuthEvent::UserSignedIn => "user_signed_in",
            AuthEvent::UserSignedOut => "user_signed_out",
            AuthEvent::SignInFailed => "sign_in_failed",
            AuthEvent::AccountLocked => "account_locked",
            AuthEvent::PasswordResetRequested => "password_reset_requested",
            AuthEvent::PasswordReset => "password_reset",
            AuthEvent::OAuthLinked => "oauth_linked",
        }
    }
}

/// A single audit entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event: AuthEvent,
    pub user_id: Option<Uuid>,
    pub email: Option<String>,
    pub detail: Option<String>,
}

/// Bounded in-memory audit log
pub struct AuditLog {
    max_entries: usize,
    entries: RwLock<VecDeque<AuditEntry>>,
}

impl AuditLog {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries,
            entries: RwLock::new(VecDeque::new()),
        }
    }

    /// Record an event. Oldest entries are dropped past the cap.
    pub fn record(
        &self,
        event: AuthEvent,
        user_id: Option<Uuid>,
        email: Option<&str>,
        detail: Option<&str>,
    ) {
        tracing::info!(
            event = event.as_str(),
            user_id = user_id.map(|id| id.to_string()).as_deref(),
            email,
            detail,
            "auth event"
        );

        let entry = AuditEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
            user_id,
            email: email.map(|s| s.to_string()),
            detail: detail.map(|s| s.to_string()),
        };

        let mut entries = self.entries.write().unwrap();
        entries.push_back(entry);
        while entries.len() > self.max_entries {
            entries.pop_front();
        }
    }

    /// Most recent entries, newest first
    pub fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        let entries = self.entries.read().unwrap();
        entries.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(1000)
    }
}
