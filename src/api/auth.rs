//! Authentication API endpoints
//!
//! Handles HTTP requests for the session lifecycle:
//! - POST /login - Email/password login
//! - POST /logout - Session invalidation and cookie clearing
//! - POST /oauth-process - External-token login, registering on first sight
//! - GET /validate - Token + session validation
//! - POST /check-session - Pre-login conflict probe
//!
//! Cookie contract: a successful login sets the httpOnly session cookie plus
//! a client-readable `user` cookie carrying a URL-encoded JSON profile.
//! Logout past-dates both, unconditionally.

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::api::middleware::{
    extract_session_token, success_body, ApiError, AppState, SESSION_COOKIE, USER_COOKIE,
};
use crate::api::responses::{CurrentDevice, SessionSummary, UserProfile};
use crate::models::DeviceProfile;
use crate::services::auth::{LoginInput, OAuthInput, RegistrationHints};
use crate::services::device::{classify_user_agent, extract_client_ip, DeviceHints};

/// Request body for email/password login
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub callback_url: Option<String>,
    #[serde(default)]
    pub force_login: bool,
    #[serde(default)]
    pub device_info: Option<DeviceHints>,
}

/// Request body for logout
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    #[serde(default)]
    pub redirect_url: Option<String>,
}

/// Registration selections sent alongside a first-sight OAuth login
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationData {
    #[serde(default)]
    pub default_exam: Option<String>,
    #[serde(default)]
    pub default_subject: Option<String>,
    #[serde(default)]
    pub default_board: Option<String>,
    #[serde(default)]
    pub marketing_opt_in: bool,
}

/// Request body for OAuth login
#[derive(Debug, Deserialize)]
pub struct OAuthProcessRequest {
    pub access_token: String,
    // Accepted for interface compatibility; the bridge does not store it
    #[serde(default)]
    #[allow(dead_code)]
    pub refresh_token: Option<String>,
    #[serde(default, rename = "forceLogin")]
    pub force_login: bool,
    #[serde(default, rename = "deviceInfo")]
    pub device_info: Option<DeviceHints>,
    #[serde(default, rename = "registrationData")]
    pub registration_data: Option<RegistrationData>,
}

/// Request body for the check-session probe
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckSessionRequest {
    pub email: String,
    #[serde(default)]
    pub device_info: Option<DeviceHints>,
}

/// Derive the device profile for a request from its headers and any
/// client-supplied hints.
fn device_from_request(headers: &HeaderMap, hints: Option<DeviceHints>) -> DeviceProfile {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    let mut device = classify_user_agent(user_agent, &hints.unwrap_or_default());
    device.ip_address = extract_client_ip(headers);
    device
}

fn user_agent_string(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(String::from)
}

/// Build the Set-Cookie headers for a successful login: the httpOnly session
/// cookie and the client-readable profile cookie.
fn session_cookies(token: &str, profile: &UserProfile, max_age_secs: i64) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();

    let session_cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, max_age_secs
    );
    headers.append(
        header::SET_COOKIE,
        HeaderValue::from_str(&session_cookie)
            .map_err(|e| ApiError::internal_error(format!("Invalid cookie value: {}", e)))?,
    );

    let profile_json = serde_json::to_string(profile)
        .map_err(|e| ApiError::internal_error(format!("Failed to encode profile: {}", e)))?;
    let user_cookie = format!(
        "{}={}; Path=/; SameSite=Lax; Max-Age={}",
        USER_COOKIE,
        urlencoding::encode(&profile_json),
        max_age_secs
    );
    headers.append(
        header::SET_COOKIE,
        HeaderValue::from_str(&user_cookie)
            .map_err(|e| ApiError::internal_error(format!("Invalid cookie value: {}", e)))?,
    );

    Ok(headers)
}

/// Past-dated Set-Cookie headers clearing both login cookies.
fn clearing_cookies() -> HeaderMap {
    let mut headers = HeaderMap::new();
    for name in [SESSION_COOKIE, USER_COOKIE] {
        let cookie = format!(
            "{}=; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
            name
        );
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            headers.append(header::SET_COOKIE, value);
        }
    }
    headers
}

/// POST /login - Email/password login
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let device = device_from_request(&headers, body.device_info);
    let ip_address = device.ip_address.clone();

    let outcome = state
        .auth_service
        .login(LoginInput {
            email: body.email,
            password: body.password,
            force_login: body.force_login,
            device,
            ip_address,
            user_agent: user_agent_string(&headers),
        })
        .await?;

    let profile = UserProfile::from(&outcome.user);
    let max_age = state.auth_config.session_ttl_days * 24 * 60 * 60;
    let cookies = session_cookies(&outcome.token, &profile, max_age)?;

    let redirect_url = body
        .callback_url
        .unwrap_or_else(|| state.auth_config.default_redirect_url.clone());

    Ok((
        cookies,
        success_body(json!({
            "user": profile,
            "token": outcome.token,
            "redirectUrl": redirect_url,
            "message": "Login successful",
        })),
    ))
}

/// POST /logout - Invalidate the session and clear cookies
///
/// Always succeeds from the client's perspective; the cookies are cleared
/// even when no valid token was presented or invalidation failed.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<LogoutRequest>>,
) -> impl IntoResponse {
    if let Some(token) = extract_session_token(&headers) {
        state.auth_service.logout(&token).await;
    }

    let redirect_url = body
        .and_then(|Json(b)| b.redirect_url)
        .unwrap_or_else(|| "/".to_string());

    (
        clearing_cookies(),
        success_body(json!({
            "message": "Logged out",
            "redirectUrl": redirect_url,
        })),
    )
}

/// POST /oauth-process - Login with an externally-issued access token
pub async fn oauth_process(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<OAuthProcessRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let device = device_from_request(&headers, body.device_info);
    let ip_address = device.ip_address.clone();

    let registration = body
        .registration_data
        .map(|data| RegistrationHints {
            default_exam: data.default_exam,
            default_subject: data.default_subject,
            default_board: data.default_board,
            marketing_opt_in: data.marketing_opt_in,
        })
        .unwrap_or_default();

    let outcome = state
        .auth_service
        .oauth_login(OAuthInput {
            access_token: body.access_token,
            force_login: body.force_login,
            registration,
            device,
            ip_address,
            user_agent: user_agent_string(&headers),
        })
        .await?;

    let profile = UserProfile::from(&outcome.user);
    let max_age = state.auth_config.session_ttl_days * 24 * 60 * 60;
    let cookies = session_cookies(&outcome.token, &profile, max_age)?;

    Ok((
        cookies,
        success_body(json!({
            "user": profile,
            "token": outcome.token,
        })),
    ))
}

/// GET /validate - Check whether the presented token backs a live session
///
/// Expected failures (missing/invalid/expired token, dead session, deleted
/// user) answer 401 with `valid:false, requiresAuth:true`; a blocked account
/// answers 403 with the same flags.
pub async fn validate(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let requires_auth = json!({"valid": false, "requiresAuth": true});

    let token = extract_session_token(&headers).ok_or_else(|| {
        ApiError::unauthorized("No authentication token provided").with_extra(requires_auth.clone())
    })?;

    let outcome = state
        .auth_service
        .validate(&token)
        .await
        .map_err(|e| ApiError::from(e).with_extra(requires_auth))?;

    Ok(success_body(json!({
        "valid": true,
        "user": UserProfile::from(&outcome.user),
        "expiresAt": outcome.session.expires_at.to_rfc3339(),
        "expiresIn": outcome.expires_in_secs,
        "tokenIssued": outcome.session.created_at.to_rfc3339(),
    })))
}

/// POST /check-session - Pre-login conflict probe for an email
pub async fn check_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CheckSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let device = device_from_request(&headers, body.device_info);

    let report = state.auth_service.check_session(&body.email, &device).await?;

    let sessions: Vec<SessionSummary> =
        report.active_sessions.iter().map(SessionSummary::from).collect();

    Ok(success_body(json!({
        "hasConflict": report.has_conflict,
        "shouldPrompt": report.should_prompt,
        "message": report.message,
        "activeSessions": sessions,
        "currentDevice": CurrentDevice::from(&device),
    })))
}
