//! Shared API response types
//!
//! Response DTOs used across the auth endpoints. Session summaries never
//! include the session token; they exist so conflict prompts can describe
//! other devices without handing their credentials to the client.

use serde::{Deserialize, Serialize};

use crate::models::{Session, User};

/// User profile returned to the client and embedded in the `user` cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub display_name: Option<String>,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_exam: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_board: Option<String>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            role: user.role.to_string(),
            default_exam: user.default_exam.clone(),
            default_subject: user.default_subject.clone(),
            default_board: user.default_board.clone(),
        }
    }
}

/// Device-level view of an active session. Deliberately excludes the token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub browser: String,
    pub os: String,
    pub device_class: String,
    pub is_mobile: bool,
    pub login_method: String,
    pub created_at: String,
    pub last_activity: String,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            browser: session.browser.clone(),
            os: session.os.clone(),
            device_class: session.device_class.to_string(),
            is_mobile: session.is_mobile,
            login_method: session.login_method.to_string(),
            created_at: session.created_at.to_rfc3339(),
            last_activity: session.last_activity.to_rfc3339(),
        }
    }
}

/// Candidate device echoed back by `/check-session`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentDevice {
    pub browser: String,
    pub os: String,
    pub device_class: String,
    pub is_mobile: bool,
}

impl From<&crate::models::DeviceProfile> for CurrentDevice {
    fn from(device: &crate::models::DeviceProfile) -> Self {
        Self {
            browser: device.browser.clone(),
            os: device.os.clone(),
            device_class: device.device_class.to_string(),
            is_mobile: device.is_mobile,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeviceClass, LoginMethod, UserRole};
    use chrono::Utc;

    #[test]
    fn test_session_summary_excludes_token() {
        let session = Session {
            id: 1,
            user_id: 2,
            token: "secret-token".to_string(),
            browser: "Chrome".to_string(),
            os: "macOS".to_string(),
            device_class: DeviceClass::Desktop,
            is_mobile: false,
            ip_address: None,
            user_agent: None,
            login_method: LoginMethod::Email,
            is_active: true,
            created_at: Utc::now(),
            last_activity: Utc::now(),
            updated_at: Utc::now(),
            expires_at: Utc::now(),
        };

        let json = serde_json::to_string(&SessionSummary::from(&session)).unwrap();
        assert!(!json.contains("secret-token"));
        assert!(json.contains("\"browser\":\"Chrome\""));
        assert!(json.contains("\"deviceClass\":\"Desktop\""));
    }

    #[test]
    fn test_user_profile_camel_case() {
        let mut user = User::new(
            "student@example.com".to_string(),
            Some("hash".to_string()),
            UserRole::Student,
        );
        user.id = 7;
        user.display_name = Some("Student".to_string());
        user.default_exam = Some("GCSE".to_string());

        let json = serde_json::to_string(&UserProfile::from(&user)).unwrap();
        assert!(json.contains("\"displayName\":\"Student\""));
        assert!(json.contains("\"defaultExam\":\"GCSE\""));
        assert!(!json.contains("hash"));
    }
}
