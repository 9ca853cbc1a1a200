//! # Auth HTTP Routes
//!
//! Axum handlers for sign-in, sign-up, verification, and recovery.
//! Successful sign-ins set the session cookie; error bodies go through
//! the shared `AuthError` response mapping so no handler invents its
//! own failure shape.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header::{HeaderName, SET_COOKIE};
use axum::http::StatusCode;
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use super::errors::{AuthError, AuthResult};
use super::jwt::JwtClaims;
use super::oauth::OAuthProvider;
use super::session::SignInMethod;
use super::user::{UserRepository, UserResponse};
use crate::http_server::AppState;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "civicwatch_session";

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserResponse,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    #[serde(default)]
    pub redirect_to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: String,
    pub state: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// ==================
// Cookies
// ==================

fn session_cookie(state: &AppState, token: &str) -> String {
    let secure = if state.production { "; Secure" } else { "" };
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
        SESSION_COOKIE,
        token,
        state.sessions.jwt().max_age_secs(),
        secure
    )
}

fn clear_session_cookie(state: &AppState) -> String {
    let secure = if state.production { "; Secure" } else { "" };
    format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0{}",
        SESSION_COOKIE, secure
    )
}

// ==================
// Credential Sign-In
// ==================

/// POST /api/auth/callback/credentials
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> AuthResult<Response> {
    let session = state.sessions.sign_in(SignInMethod::Credentials {
        email: request.email,
        password: request.password,
    })?;

    let cookie = session_cookie(&state, &session.token);
    let body = Json(LoginResponse {
        user: UserResponse::from_user(&session.user),
        token: session.token,
    });

    Ok((AppendHeaders([(SET_COOKIE, cookie)]), body).into_response())
}

/// POST /api/auth/signout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    claims: Option<Extension<JwtClaims>>,
) -> Response {
    if let Some(Extension(claims)) = claims {
        state.sessions.sign_out(&claims);
    }

    let cookie = clear_session_cookie(&state);
    (
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(MessageResponse {
            message: "Signed out".to_string(),
        }),
    )
        .into_response()
}

// ==================
// Registration & Recovery
// ==================

/// POST /api/users
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> AuthResult<(StatusCode, Json<UserResponse>)> {
    let user = state
        .registration
        .register(&request.email, &request.name, &request.password)
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from_user(&user))))
}

/// GET /api/users/verify-email?token=...
pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TokenQuery>,
) -> AuthResult<Json<MessageResponse>> {
    state.registration.verify_email(&query.token)?;
    Ok(Json(MessageResponse {
        message: "Email verified. You can now sign in.".to_string(),
    }))
}

/// POST /api/auth/forgot-password
///
/// The response is the same whether or not the email exists.
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ForgotPasswordRequest>,
) -> AuthResult<Json<MessageResponse>> {
    state.registration.forgot_password(&request.email).await?;
    Ok(Json(MessageResponse {
        message: "If an account with that email exists, a reset link has been sent.".to_string(),
    }))
}

/// POST /api/auth/reset-password
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResetPasswordRequest>,
) -> AuthResult<Json<MessageResponse>> {
    state
        .registration
        .reset_password(&request.token, &request.password)?;
    Ok(Json(MessageResponse {
        message: "Password updated. You can now sign in.".to_string(),
    }))
}

// ==================
// Federated Sign-In
// ==================

/// GET /api/auth/signin/:provider
pub async fn oauth_authorize(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(query): Query<AuthorizeQuery>,
) -> AuthResult<Redirect> {
    let provider = OAuthProvider::from_str(&provider)
        .ok_or_else(|| AuthError::OAuth(format!("Unknown provider: {}", provider)))?;

    let (url, _state) = state
        .sessions
        .oauth()
        .get_authorization_url(provider, query.redirect_to)?;

    Ok(Redirect::temporary(&url))
}

/// GET /api/auth/callback/:provider
pub async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> AuthResult<Response> {
    let provider = OAuthProvider::from_str(&provider)
        .ok_or_else(|| AuthError::OAuth(format!("Unknown provider: {}", provider)))?;

    let oauth_state = state.sessions.oauth().validate_state(&query.state)?;
    if oauth_state.provider != provider {
        return Err(AuthError::OAuth("State does not match provider".to_string()));
    }

    let exchanger = state
        .exchanger
        .as_ref()
        .ok_or_else(|| AuthError::OAuth("Code exchange is not configured".to_string()))?;

    let config = state.sessions.oauth().get_provider_config(provider)?;
    let raw = exchanger.fetch_user_info(config, &query.code).await?;
    let info = state.sessions.oauth().parse_user_info(provider, raw)?;

    let session = state.sessions.sign_in(SignInMethod::Federated(info))?;
    let cookie = session_cookie(&state, &session.token);
    let target = oauth_state.redirect_to.unwrap_or_else(|| "/".to_string());

    Ok((
        AppendHeaders([
            (SET_COOKIE, cookie),
            (HeaderName::from_static("location"), target),
        ]),
        StatusCode::TEMPORARY_REDIRECT,
    )
        .into_response())
}

// ==================
// User Administration
// ==================

/// The guard only inserts claims for valid sessions, so a missing
/// extension means no session
fn require_claims(claims: Option<Extension<JwtClaims>>) -> AuthResult<JwtClaims> {
    claims
        .map(|Extension(c)| c)
        .ok_or(AuthError::Unauthenticated)
}

/// GET /api/users/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    claims: Option<Extension<JwtClaims>>,
) -> AuthResult<Json<UserResponse>> {
    let claims = require_claims(claims)?;
    let user = state
        .user_repo
        .find_by_id(claims.user_id()?)?
        .ok_or_else(|| AuthError::NotFound("User not found".to_string()))?;
    Ok(Json(UserResponse::from_user(&user)))
}

/// GET /api/users (admin only)
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    claims: Option<Extension<JwtClaims>>,
) -> AuthResult<Json<Vec<UserResponse>>> {
    if !require_claims(claims)?.is_admin() {
        return Err(AuthError::Forbidden);
    }

    let users = state.user_repo.list()?;
    Ok(Json(users.iter().map(UserResponse::from_user).collect()))
}
