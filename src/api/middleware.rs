//! API middleware and shared request plumbing
//!
//! Contains:
//! - Application state shared by all handlers
//! - The uniform response envelope and typed API errors
//! - Session token extraction (Authorization header, then cookie)

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::services::auth::{AuthError, AuthService};

/// Name of the httpOnly cookie carrying the session token.
pub const SESSION_COOKIE: &str = "exam_revise_session";

/// Name of the client-readable cookie carrying the user profile.
pub const USER_COOKIE: &str = "user";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub auth_config: Arc<AuthConfig>,
}

/// Success envelope: `{"success": true, ...data}`.
pub fn success_body(data: serde_json::Value) -> Json<serde_json::Value> {
    let mut body = serde_json::Map::new();
    body.insert("success".to_string(), serde_json::Value::Bool(true));
    if let serde_json::Value::Object(map) = data {
        body.extend(map);
    }
    Json(serde_json::Value::Object(body))
}

/// Error response for API errors, rendered as the failure envelope
/// `{"success": false, "error": message, "code": code, ...extra}`.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    /// Additional fields merged into the envelope (conflict payloads,
    /// validate-failure flags).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            extra: None,
        }
    }

    /// Merge additional fields into the envelope, keeping any already set.
    pub fn with_extra(mut self, extra: serde_json::Value) -> Self {
        match (&mut self.extra, extra) {
            (Some(serde_json::Value::Object(existing)), serde_json::Value::Object(new)) => {
                existing.extend(new);
            }
            (slot, value) => *slot = Some(value),
        }
        self
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.code.as_str() {
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "UNAUTHORIZED" | "TOKEN_EXPIRED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "SESSION_CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut body = serde_json::Map::new();
        body.insert("success".to_string(), serde_json::Value::Bool(false));
        body.insert(
            "error".to_string(),
            serde_json::Value::String(self.message),
        );
        body.insert("code".to_string(), serde_json::Value::String(self.code));
        if let Some(serde_json::Value::Object(extra)) = self.extra {
            body.extend(extra);
        }

        (status, Json(serde_json::Value::Object(body))).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Validation(msg) => ApiError::validation_error(msg),
            AuthError::Credentials => ApiError::unauthorized("Invalid email or password"),
            AuthError::TokenExpired => ApiError::new("TOKEN_EXPIRED", "Token has expired"),
            AuthError::Unauthorized => ApiError::unauthorized("Invalid or expired session"),
            AuthError::Blocked => ApiError::forbidden("This account has been blocked"),
            AuthError::Conflict(report) => {
                let sessions: Vec<crate::api::responses::SessionSummary> = report
                    .active_sessions
                    .iter()
                    .map(crate::api::responses::SessionSummary::from)
                    .collect();
                ApiError::new(
                    "SESSION_CONFLICT",
                    report
                        .message
                        .unwrap_or_else(|| "Active sessions exist on other devices".to_string()),
                )
                .with_extra(serde_json::json!({
                    "hasConflict": report.has_conflict,
                    "shouldPrompt": report.should_prompt,
                    "activeSessions": sessions,
                }))
            }
            AuthError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                ApiError::internal_error("An internal error occurred")
            }
        }
    }
}

/// Extract the session token from a request: `Authorization: Bearer` first,
/// then the session cookie.
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }

    if let Some(cookie_header) = headers.get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                let cookie = cookie.trim();
                if let Some(token) = cookie.strip_prefix(&format!("{}=", SESSION_COOKIE)) {
                    if !token.is_empty() {
                        return Some(token.to_string());
                    }
                }
            }
        }
    }

    None
}
