//! HTTP Basic Authentication for host routes

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, Request, Response, StatusCode},
    middleware::Next,
    response::IntoResponse,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use std::sync::Arc;

/// Authentication configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Username for host access (None = auth disabled)
    pub username: Option<String>,
    /// Password for host access
    pub password: Option<String>,
}

impl AuthConfig {
    /// Load auth config from environment variables
    /// HOST_USERNAME and HOST_PASSWORD must both be set to enable auth
    pub fn from_env() -> Self {
        let username = std::env::var("HOST_USERNAME")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let password = std::env::var("HOST_PASSWORD")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        if username.is_some() && password.is_some() {
            tracing::info!("Host authentication enabled");
            Self { username, password }
        } else {
            if username.is_some() || password.is_some() {
                tracing::warn!(
                    "HOST_USERNAME and HOST_PASSWORD must both be set to enable authentication"
                );
            }
            tracing::warn!("Host authentication DISABLED - anyone can run a quiz session!");
            Self::disabled()
        }
    }

    pub fn disabled() -> Self {
        Self {
            username: None,
            password: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    /// Validate credentials
    pub fn validate(&self, username: &str, password: &str) -> bool {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => {
                constant_time_eq(u.as_bytes(), username.as_bytes())
                    && constant_time_eq(p.as_bytes(), password.as_bytes())
            }
            _ => true,
        }
    }

    /// Check a request's `Authorization: Basic ...` header
    fn authorizes(&self, request: &Request<Body>) -> bool {
        let Some(credentials) = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Basic "))
        else {
            return false;
        };
        let Ok(decoded) = STANDARD.decode(credentials.trim()) else {
            return false;
        };
        let Ok(decoded) = String::from_utf8(decoded) else {
            return false;
        };
        decoded
            .split_once(':')
            .is_some_and(|(username, password)| self.validate(username, password))
    }
}

/// Constant-time byte comparison to prevent timing attacks
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

fn unauthorized(realm: &str) -> Response<Body> {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, format!("Basic realm=\"{}\"", realm))],
        "Unauthorized",
    )
        .into_response()
}

/// Middleware for HTTP Basic Authentication on host routes
pub async fn host_auth_middleware(
    State(auth_config): State<Arc<AuthConfig>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    if !auth_config.is_enabled() || auth_config.authorizes(&request) {
        return next.run(request).await;
    }
    unauthorized("LiveQuiz Host")
}

#[derive(Debug, Deserialize)]
struct RoleQuery {
    role: Option<String>,
}

/// Whether the connection asks to be the host, decoded exactly as the
/// WebSocket handler decodes it. An unreadable query counts as a host request.
fn requests_host_role(request: &Request<Body>) -> bool {
    match Query::<RoleQuery>::try_from_uri(request.uri()) {
        Ok(Query(query)) => query.role.as_deref() == Some("host"),
        Err(_) => true,
    }
}

/// Middleware to require HTTP Basic Auth for host WebSocket connections.
///
/// This prevents players from taking over a session by connecting with `role=host`.
pub async fn host_ws_auth_middleware(
    State(auth_config): State<Arc<AuthConfig>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let is_host_ws = request.uri().path() == "/ws" && requests_host_role(&request);

    if !is_host_ws {
        return next.run(request).await;
    }

    if !auth_config.is_enabled() {
        tracing::warn!(
            "Host WebSocket requested but host authentication is DISABLED; set HOST_USERNAME and HOST_PASSWORD to prevent host takeover"
        );
        return next.run(request).await;
    }

    if auth_config.authorizes(&request) {
        return next.run(request).await;
    }
    unauthorized("LiveQuiz Host (WebSocket)")
}
