//! # Route Guard Middleware
//!
//! Per-request gate in front of every route. It classifies the session
//! token, applies the route policy (admin areas, protected areas,
//! anonymous-only pages), rate-limits the credential sign-in endpoint,
//! and stamps security headers on every response that leaves the
//! server. Unexpected failures redirect to the error page rather than
//! letting the request through.

use std::net::IpAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Method, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

use crate::auth::api::SESSION_COOKIE;
use crate::auth::errors::AuthError;
use crate::auth::jwt::{JwtClaims, JwtManager};
use crate::auth::security::apply_security_headers;
use crate::http_server::AppState;

// ==================
// Route Policy
// ==================

/// Which paths require which session state
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    /// Prefixes reachable only by admins
    pub admin_prefixes: Vec<String>,
    /// Prefixes reachable only with a valid session
    pub protected_prefixes: Vec<String>,
    /// Pages that signed-in users are bounced away from
    pub anonymous_only: Vec<String>,
    /// The credential sign-in endpoint, which is rate limited
    pub credential_callback: String,
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self {
            admin_prefixes: vec!["/admin".to_string()],
            protected_prefixes: vec!["/reports/new".to_string(), "/profile".to_string()],
            anonymous_only: vec!["/login".to_string(), "/register".to_string()],
            credential_callback: "/api/auth/callback/credentials".to_string(),
        }
    }
}

impl RoutePolicy {
    fn matches_prefix(prefixes: &[String], path: &str) -> bool {
        prefixes.iter().any(|prefix| {
            path == prefix
                || (path.starts_with(prefix.as_str())
                    && path.as_bytes().get(prefix.len()) == Some(&b'/'))
        })
    }

    pub fn is_admin_path(&self, path: &str) -> bool {
        Self::matches_prefix(&self.admin_prefixes, path)
    }

    pub fn is_protected_path(&self, path: &str) -> bool {
        Self::matches_prefix(&self.protected_prefixes, path)
    }

    pub fn is_anonymous_only(&self, path: &str) -> bool {
        Self::matches_prefix(&self.anonymous_only, path)
    }
}

// ==================
// Token Classification
// ==================

/// What the guard concluded about the presented token
#[derive(Debug, Clone, PartialEq)]
pub enum TokenState {
    /// No token presented, or one that does not decode at all.
    /// A malformed token is treated the same as no token.
    Missing,
    Valid(JwtClaims),
    Expired,
    IssuedInFuture,
}

/// Classify the raw token (if any) against the signing key
pub fn classify_token(jwt: &JwtManager, raw: Option<&str>) -> TokenState {
    let Some(raw) = raw else {
        return TokenState::Missing;
    };

    match jwt.parse(raw) {
        Ok(claims) => TokenState::Valid(claims),
        Err(AuthError::TokenExpired) => TokenState::Expired,
        Err(AuthError::TokenIssuedInFuture) => TokenState::IssuedInFuture,
        Err(_) => TokenState::Missing,
    }
}

// ==================
// Guard Decision
// ==================

/// The guard's decision for a request
#[derive(Debug, Clone, PartialEq)]
pub enum GuardOutcome {
    /// Let the request through
    Next,
    RedirectLogin,
    RedirectHome,
    RedirectUnauthorized,
    RedirectError,
}

/// Decide what to do with a request, from the path and token state
/// alone. No storage lookups happen here; the claims carry everything
/// the decision needs.
pub fn evaluate(policy: &RoutePolicy, path: &str, token: &TokenState) -> GuardOutcome {
    match token {
        // A token issued in the future means a tampered clock or a
        // forged claim set; fail closed to the error page everywhere
        TokenState::IssuedInFuture => GuardOutcome::RedirectError,

        // A stale token forces a fresh sign-in even on public pages,
        // so the client drops it promptly. The sign-in pages
        // themselves are exempt (the redirect would loop), and API
        // paths fall back to no-session so handlers answer 401
        // instead of a page redirect.
        TokenState::Expired => {
            if policy.is_anonymous_only(path) || path.starts_with("/api/") {
                evaluate(policy, path, &TokenState::Missing)
            } else {
                GuardOutcome::RedirectLogin
            }
        }

        TokenState::Valid(claims) => {
            // A signed token whose subject is not a user id should not
            // exist; fail closed instead of guessing
            if claims.user_id().is_err() {
                return GuardOutcome::RedirectError;
            }
            if policy.is_admin_path(path) && !claims.is_admin() {
                return GuardOutcome::RedirectUnauthorized;
            }
            if policy.is_anonymous_only(path) {
                return GuardOutcome::RedirectHome;
            }
            GuardOutcome::Next
        }

        TokenState::Missing => {
            if policy.is_admin_path(path) || policy.is_protected_path(path) {
                return GuardOutcome::RedirectLogin;
            }
            GuardOutcome::Next
        }
    }
}

// ==================
// Request Plumbing
// ==================

/// Pull the session token from the cookie, falling back to a bearer
/// header for API clients
fn extract_token(request: &Request<Body>) -> Option<String> {
    if let Some(cookies) = request
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
    {
        for pair in cookies.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            if parts.next() == Some(SESSION_COOKIE) {
                if let Some(value) = parts.next() {
                    if !value.is_empty() {
                        return Some(value.to_string());
                    }
                }
            }
        }
    }

    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.to_string())
}

/// Client address for rate limiting. First entry of x-forwarded-for,
/// else the loopback placeholder.
fn client_addr(request: &Request<Body>) -> IpAddr {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(IpAddr::from([127, 0, 0, 1]))
}

// ==================
// Middleware
// ==================

/// The guard itself. Every response, including redirects and rate
/// limit rejections, leaves with security headers applied.
pub async fn route_guard(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    let mut response = guard_inner(&state, request, next).await;
    apply_security_headers(response.headers_mut(), &state.security);

    tracing::debug!(path = %path, status = %response.status(), "guarded request");
    response
}

async fn guard_inner(state: &Arc<AppState>, mut request: Request<Body>, next: Next) -> Response {
    let path = request.uri().path().to_string();

    // The credential sign-in endpoint is rate limited per client
    // address before anything else runs
    if request.method() == Method::POST && path == state.policy.credential_callback {
        let addr = client_addr(&request);
        if let Err(err) = state.rate_limiter.check(addr) {
            tracing::warn!(addr = %addr, "login rate limit tripped");
            return err.into_response();
        }
    }

    let raw = extract_token(&request);
    let token_state = classify_token(state.sessions.jwt(), raw.as_deref());

    match evaluate(&state.policy, &path, &token_state) {
        GuardOutcome::Next => {
            if let TokenState::Valid(claims) = token_state {
                request.extensions_mut().insert(claims);
            }
            next.run(request).await
        }
        GuardOutcome::RedirectLogin => Redirect::temporary("/login").into_response(),
        GuardOutcome::RedirectHome => Redirect::temporary("/").into_response(),
        GuardOutcome::RedirectUnauthorized => Redirect::temporary("/unauthorized").into_response(),
        GuardOutcome::RedirectError => Redirect::temporary("/error").into_response(),
    }
}
