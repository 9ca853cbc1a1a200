//! # Response Security Headers
//!
//! Browser-facing security headers stamped onto every response by the
//! route guard. HSTS is emitted only in production so local HTTP
//! development keeps working.

use axum::http::header::{HeaderName, HeaderValue};
use axum::http::HeaderMap;

/// Security header policy
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Enables HSTS
    pub production: bool,
    pub csp: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            production: false,
            csp: "default-src 'self'; script-src 'self' 'unsafe-inline' 'unsafe-eval'; \
                  style-src 'self' 'unsafe-inline';"
                .to_string(),
        }
    }
}

/// Stamp security headers onto a response header map
pub fn apply_security_headers(headers: &mut HeaderMap, config: &SecurityConfig) {
    headers.insert(
        HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );
    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    if config.production {
        headers.insert(
            HeaderName::from_static("strict-transport-security"),
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }

    if let Ok(value) = HeaderValue::from_str(&config.csp) {
        headers.insert(HeaderName::from_static("content-security-policy"), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_headers_always_present() {
        let mut headers = HeaderMap::new();
        apply_security_headers(&mut headers, &SecurityConfig::default());

        assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
        assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
        assert_eq!(
            headers.get("referrer-policy").unwrap(),
            "strict-origin-when-cross-origin"
        );
        assert!(headers.get("content-security-policy").is_some());
    }

    #[test]
    fn test_hsts_only_in_production() {
        let mut headers = HeaderMap::new();
        apply_security_headers(&mut headers, &SecurityConfig::default());
        assert!(headers.get("strict-transport-security").is_none());

        let mut headers = HeaderMap::new();
        let config = SecurityConfig {
            production: true,
            ..SecurityConfig::default()
        };
        apply_security_headers(&mut headers, &config);
        assert_eq!(
            headers.get("strict-transport-security").unwrap(),
            "max-age=31536000; includeSubDomains"
        );
    }
}
