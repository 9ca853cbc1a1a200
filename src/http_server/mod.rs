//! # HTTP Server
//!
//! Wires the auth and report services into one axum router. The route
//! guard runs in front of every route; request tracing and CORS sit
//! outside it so even guarded rejections are logged.

pub mod guard;

use std::sync::Arc;

use axum::routing::{get, patch, post};
use axum::{middleware, Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::api as auth_api;
use crate::auth::email::{Mailer, SmtpMailer};
use crate::auth::oauth::{
    CodeExchanger, InMemoryOAuthRepository, OAuthProviderConfig, OAuthService,
};
use crate::auth::rate_limit::{LoginRateLimiter, RateLimitConfig};
use crate::auth::registration::{RegistrationConfig, RegistrationService};
use crate::auth::security::SecurityConfig;
use crate::auth::session::{SessionConfig, SessionService};
use crate::auth::user::InMemoryUserRepository;
use crate::auth::{AuditLog, AuthError, AuthResult, JwtManager};
use crate::config::AppConfig;
use crate::reports::api as reports_api;
use crate::reports::InMemoryReportRepository;
use self::guard::{route_guard, RoutePolicy};

// ==================
// Shared State
// ==================

/// Everything the handlers and the guard need, shared by Arc
pub struct AppState {
    pub sessions: SessionService<InMemoryUserRepository, InMemoryOAuthRepository>,
    pub registration: RegistrationService<InMemoryUserRepository>,
    pub user_repo: Arc<InMemoryUserRepository>,
    pub reports: Arc<InMemoryReportRepository>,
    pub rate_limiter: Arc<LoginRateLimiter>,
    pub audit: Arc<AuditLog>,
    pub policy: RoutePolicy,
    pub security: SecurityConfig,
    pub exchanger: Option<Arc<dyn CodeExchanger>>,
    pub production: bool,
}

impl AppState {
    /// Assemble application state from configuration
    pub fn from_config(config: &AppConfig) -> AuthResult<Arc<Self>> {
        let user_repo = Arc::new(InMemoryUserRepository::new());
        let oauth_repo = Arc::new(InMemoryOAuthRepository::new());
        let reports = Arc::new(InMemoryReportRepository::new());
        let audit = Arc::new(AuditLog::default());

        let jwt = JwtManager::new(
            config.auth.jwt_secret.clone(),
            config.auth.token_max_age_secs,
        );

        let mut oauth = OAuthService::new(user_repo.clone(), oauth_repo);
        register_oauth_providers(&mut oauth, &config.server.public_url);

        let sessions = SessionService::new(
            user_repo.clone(),
            oauth,
            jwt,
            SessionConfig {
                max_failed_logins: config.auth.max_failed_logins,
                lockout_minutes: config.auth.lockout_minutes,
            },
            audit.clone(),
        );

        let mailer: Option<Arc<dyn Mailer>> = match &config.smtp {
            Some(smtp) => Some(Arc::new(SmtpMailer::new(smtp)?)),
            None => None,
        };

        let registration = RegistrationService::new(
            user_repo.clone(),
            mailer,
            RegistrationConfig::default(),
            audit.clone(),
        );

        let rate_limiter = Arc::new(LoginRateLimiter::new(RateLimitConfig {
            window: std::time::Duration::from_secs(config.auth.rate_limit_window_secs),
            max_attempts: config.auth.rate_limit_max_attempts,
            ..RateLimitConfig::default()
        }));

        Ok(Arc::new(Self {
            sessions,
            registration,
            user_repo,
            reports,
            rate_limiter,
            audit,
            policy: RoutePolicy::default(),
            security: SecurityConfig {
                production: config.server.production,
                ..SecurityConfig::default()
            },
            exchanger: None,
            production: config.server.production,
        }))
    }
}

/// OAuth credentials come from the environment, never the config file
fn register_oauth_providers(
    oauth: &mut OAuthService<InMemoryUserRepository, InMemoryOAuthRepository>,
    public_url: &str,
) {
    let base = public_url.trim_end_matches('/');

    if let (Ok(id), Ok(secret)) = (
        std::env::var("GOOGLE_CLIENT_ID"),
        std::env::var("GOOGLE_CLIENT_SECRET"),
    ) {
        oauth.register_provider(OAuthProviderConfig::google(
            id,
            secret,
            format!("{}/api/auth/callback/google", base),
        ));
    }

    if let (Ok(id), Ok(secret)) = (
        std::env::var("GITHUB_CLIENT_ID"),
        std::env::var("GITHUB_CLIENT_SECRET"),
    ) {
        oauth.register_provider(OAuthProviderConfig::github(
            id,
            secret,
            format!("{}/api/auth/callback/github", base),
        ));
    }
}

// ==================
// Router
// ==================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Build the full application router with the guard in front
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        // Auth
        .route("/api/auth/callback/credentials", post(auth_api::login))
        .route("/api/auth/signout", post(auth_api::logout))
        .route("/api/auth/forgot-password", post(auth_api::forgot_password))
        .route("/api/auth/reset-password", post(auth_api::reset_password))
        .route("/api/auth/signin/:provider", get(auth_api::oauth_authorize))
        .route("/api/auth/callback/:provider", get(auth_api::oauth_callback))
        // Users
        .route(
            "/api/users",
            post(auth_api::register).get(auth_api::list_users),
        )
        .route("/api/users/me", get(auth_api::me))
        .route("/api/users/verify-email", get(auth_api::verify_email))
        // Reports
        .route(
            "/api/reports",
            get(reports_api::list_reports).post(reports_api::create_report),
        )
        .route("/api/reports/mine", get(reports_api::list_my_reports))
        .route(
            "/api/reports/:id",
            get(reports_api::get_report).delete(reports_api::delete_report),
        )
        .route(
            "/api/reports/:id/status",
            patch(reports_api::update_report_status),
        )
        .layer(middleware::from_fn_with_state(state.clone(), route_guard))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ==================
// Server
// ==================

/// The HTTP server
pub struct HttpServer {
    config: AppConfig,
}

impl HttpServer {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Bind and serve until the process is stopped
    pub async fn start(&self) -> AuthResult<()> {
        let state = AppState::from_config(&self.config)?;
        let router = build_router(state.clone());

        // Idle limiter entries are swept in the background
        let limiter = state.rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
            loop {
                interval.tick().await;
                limiter.sweep();
            }
        });

        let addr = format!("{}:{}", self.config.server.host, self.config.server.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| AuthError::Internal(format!("Failed to bind {}: {}", addr, e)))?;

        tracing::info!(addr = %addr, "civicwatch listening");

        axum::serve(listener, router)
            .await
            .map_err(|e| AuthError::Internal(format!("Server error: {}", e)))
    }
}
