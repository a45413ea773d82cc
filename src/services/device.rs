//! Device fingerprinting
//!
//! Classifies a request's User-Agent into a coarse device profile (browser
//! family, operating system, mobile/desktop class) and resolves the client
//! IP from proxy headers. The classifier is intentionally coarse: it exists
//! to tell devices apart for conflict detection, not to identify versions.

use axum::http::HeaderMap;
use chrono::Utc;

use crate::models::{DeviceClass, DeviceProfile};

/// Optional device fields supplied by the client alongside the user agent.
/// Any hint present overrides the corresponding classified value.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceHints {
    pub browser: Option<String>,
    pub os: Option<String>,
    pub is_mobile: Option<bool>,
}

/// Classify a User-Agent string into a device profile.
///
/// Substring checks are ordered so that tokens embedded in other browsers'
/// user agents resolve correctly: Edge and Opera both advertise "Chrome",
/// Chrome advertises "Safari", and Android user agents contain "Linux".
pub fn classify_user_agent(user_agent: &str, hints: &DeviceHints) -> DeviceProfile {
    let browser = if user_agent.contains("Edg") {
        "Edge"
    } else if user_agent.contains("OPR") || user_agent.contains("Opera") {
        "Opera"
    } else if user_agent.contains("Chrome") {
        "Chrome"
    } else if user_agent.contains("Firefox") {
        "Firefox"
    } else if user_agent.contains("Safari") {
        "Safari"
    } else {
        "Unknown"
    };

    let os = if user_agent.contains("Windows") {
        "Windows"
    } else if user_agent.contains("Android") {
        "Android"
    } else if user_agent.contains("iPhone")
        || user_agent.contains("iPad")
        || user_agent.contains("iPod")
    {
        "iOS"
    } else if user_agent.contains("Mac OS X") || user_agent.contains("Macintosh") {
        "macOS"
    } else if user_agent.contains("Linux") {
        "Linux"
    } else {
        "Unknown"
    };

    let is_mobile = user_agent.contains("Mobile")
        || user_agent.contains("Android")
        || user_agent.contains("iPhone")
        || user_agent.contains("iPad")
        || user_agent.contains("iPod");

    let browser = hints.browser.clone().unwrap_or_else(|| browser.to_string());
    let os = hints.os.clone().unwrap_or_else(|| os.to_string());
    let is_mobile = hints.is_mobile.unwrap_or(is_mobile);

    DeviceProfile {
        browser,
        os,
        device_class: if is_mobile {
            DeviceClass::Mobile
        } else {
            DeviceClass::Desktop
        },
        is_mobile,
        captured_at: Utc::now(),
        ip_address: None,
    }
}

/// Resolve the client IP from proxy headers.
///
/// Prefers the first entry of `X-Forwarded-For` (the original client when
/// the proxy chain is trusted), then `X-Real-IP`. Returns `None` when
/// neither header is present or parseable.
pub fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(first) = value.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return Some(first.to_string());
                }
            }
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
