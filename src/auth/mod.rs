//! # CivicWatch Auth Module
//!
//! User accounts, credential and federated sign-in, session tokens,
//! login rate limiting, and the email flows around verification and
//! password reset.

pub mod api;
pub mod audit;
pub mod crypto;
pub mod email;
pub mod errors;
pub mod jwt;
pub mod oauth;
pub mod rate_limit;
pub mod registration;
pub mod security;
pub mod session;
pub mod user;

pub use audit::{AuditLog, AuthEvent};
pub use errors::{AuthError, AuthResult};
pub use jwt::{JwtClaims, JwtManager};
pub use oauth::{CodeExchanger, OAuthProvider, OAuthProviderConfig, OAuthService, OAuthUserInfo};
pub use rate_limit::{LoginRateLimiter, RateLimitConfig};
pub use registration::{RegistrationConfig, RegistrationService};
pub use security::SecurityConfig;
pub use session::{Session, SessionConfig, SessionService, SignInMethod};
pub use user::{Role, User, UserRepository};
