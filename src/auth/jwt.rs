//! # Session Token Codec
//!
//! Signed session tokens (HS256 via `jsonwebtoken`): sign-then-encode on
//! issue, verify-then-decode on parse. Any modification of the encoded
//! claims invalidates the signature. A bare reversible encoding is
//! deliberately not an option here.

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::crypto::generate_nonce;
use super::errors::{AuthError, AuthResult};
use super::user::{Role, User};

/// Clock-skew allowance for `iat`/`exp` checks, in seconds
const LEEWAY_SECS: u64 = 60;

/// Claims embedded in a session token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user id)
    pub sub: String,
    pub role: Role,
    pub email_verified: bool,
    /// Issued-at, unix seconds
    pub iat: i64,
    /// Expiry, unix seconds
    pub exp: i64,
    /// Unique token id
    pub jti: String,
    /// Random value hindering replay/prediction
    pub nonce: String,
}

impl JwtClaims {
    /// Subject parsed back to a user id
    pub fn user_id(&self) -> AuthResult<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::TokenMalformed)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Issues and verifies session tokens
#[derive(Clone)]
pub struct JwtManager {
    secret: String,
    max_age_secs: i64,
}

impl JwtManager {
    pub fn new(secret: String, max_age_secs: i64) -> Self {
        Self {
            secret,
            max_age_secs,
        }
    }

    pub fn max_age_secs(&self) -> i64 {
        self.max_age_secs
    }

    /// Issue a token for a user
    pub fn issue(&self, user: &User) -> AuthResult<String> {
        self.issue_at(user, Utc::now())
    }

    /// Issue a token with an explicit issue time
    pub fn issue_at(&self, user: &User, now: DateTime<Utc>) -> AuthResult<String> {
        // The issuer must never mint a token for an unverified account;
        // callers check this too, but the invariant lives here as well.
        if !user.email_verified {
            return Err(AuthError::EmailNotVerified);
        }

        let claims = JwtClaims {
            sub: user.id.to_string(),
            role: user.role,
            email_verified: user.email_verified,
            iat: now.timestamp(),
            exp: now.timestamp() + self.max_age_secs,
            jti: Uuid::new_v4().to_string(),
            nonce: generate_nonce(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AuthError::Internal(format!("Token encoding failed: {}", e)))
    }

    /// Verify a token and extract its claims
    pub fn parse(&self, token: &str) -> AuthResult<JwtClaims> {
        self.parse_at(token, Utc::now())
    }

    /// Verify with an explicit verification time for the `iat` check
    pub fn parse_at(&self, token: &str, now: DateTime<Utc>) -> AuthResult<JwtClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = LEEWAY_SECS;
        validation.validate_exp = true;

        let decoded = decode::<JwtClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            ErrorKind::InvalidSignature => AuthError::BadSignature,
            _ => AuthError::TokenMalformed,
        })?;

        let claims = decoded.claims;

        // Clock-skew check: a token issued in the future indicates clock
        // tampering and is rejected outright.
        if claims.iat > now.timestamp() + LEEWAY_SECS as i64 {
            return Err(AuthError::TokenIssuedInFuture);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::user::test_user;
    use chrono::Duration;

    fn manager() -> JwtManager {
        JwtManager::new("test-secret-key-0123456789abcdef".to_string(), 86400)
    }

    #[test]
    fn test_round_trip_preserves_claims() {
        let m = manager();
        let user = test_user("alice@example.com", Role::Admin, true);

        let token = m.issue(&user).unwrap();
        let claims = m.parse(&token).unwrap();

        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.user_id().unwrap(), user.id);
        assert_eq!(claims.role, Role::Admin);
        assert!(claims.email_verified);
        assert_eq!(claims.exp - claims.iat, 86400);
        assert!(!claims.jti.is_empty());
        assert!(!claims.nonce.is_empty());
    }

    #[test]
    fn test_unverified_user_never_gets_a_token() {
        let m = manager();
        let user = test_user("bob@example.com", Role::User, false);
        assert!(matches!(m.issue(&user), Err(AuthError::EmailNotVerified)));
    }

    #[test]
    fn test_reissue_produces_distinct_tokens() {
        let m = manager();
        let user = test_user("carol@example.com", Role::User, true);

        let t1 = m.issue(&user).unwrap();
        let t2 = m.issue(&user).unwrap();
        assert_ne!(t1, t2); // jti and nonce differ

        let c1 = m.parse(&t1).unwrap();
        let c2 = m.parse(&t2).unwrap();
        assert_ne!(c1.jti, c2.jti);
        assert_ne!(c1.nonce, c2.nonce);
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let m = manager();
        let user = test_user("dave@example.com", Role::User, true);
        let token = m.issue(&user).unwrap();

        // Flip one character in the payload segment
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);
        let mut payload: Vec<u8> = parts[1].bytes().collect();
        let mid = payload.len() / 2;
        payload[mid] = if payload[mid] == b'A' { b'B' } else { b'A' };
        let tampered = format!(
            "{}.{}.{}",
            parts[0],
            String::from_utf8(payload).unwrap(),
            parts[2]
        );

        let result = m.parse(&tampered);
        assert!(matches!(
            result,
            Err(AuthError::BadSignature) | Err(AuthError::TokenMalformed)
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let m1 = manager();
        let m2 = JwtManager::new("a-completely-different-secret!!".to_string(), 86400);
        let user = test_user("erin@example.com", Role::User, true);

        let token = m1.issue(&user).unwrap();
        assert!(matches!(m2.parse(&token), Err(AuthError::BadSignature)));
    }

    #[test]
    fn test_expired_token_rejected() {
        let m = manager();
        let user = test_user("frank@example.com", Role::User, true);

        let token = m.issue_at(&user, Utc::now() - Duration::days(2)).unwrap();
        assert!(matches!(m.parse(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn test_future_iat_rejected() {
        let m = manager();
        let user = test_user("grace@example.com", Role::User, true);

        let token = m.issue_at(&user, Utc::now() + Duration::hours(1)).unwrap();
        assert!(matches!(
            m.parse(&token),
            Err(AuthError::TokenIssuedInFuture)
        ));
    }

    #[test]
    fn test_garbage_token_malformed() {
        let m = manager();
        assert!(matches!(
            m.parse("not.a.token"),
            Err(AuthError::TokenMalformed)
        ));
        assert!(matches!(m.parse(""), Err(AuthError::TokenMalformed)));
    }
}
