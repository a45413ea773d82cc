//! Session model
//!
//! One authenticated device binding. The signed token doubles as the
//! session's primary lookup key; revoking the row invalidates the login
//! even while the token is still cryptographically valid.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::device::{DeviceClass, DeviceProfile};

/// How a session was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginMethod {
    /// Email + password login
    Email,
    /// OAuth identity-provider login
    Oauth,
}

impl fmt::Display for LoginMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginMethod::Email => write!(f, "email"),
            LoginMethod::Oauth => write!(f, "oauth"),
        }
    }
}

impl FromStr for LoginMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "email" => Ok(LoginMethod::Email),
            "oauth" => Ok(LoginMethod::Oauth),
            _ => Err(anyhow::anyhow!("Invalid login method: {}", s)),
        }
    }
}

/// Session entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier
    pub id: i64,
    /// Owning user
    pub user_id: i64,
    /// Signed session token (unique; the lookup key)
    pub token: String,
    /// Browser captured at login
    pub browser: String,
    /// OS captured at login
    pub os: String,
    /// Device class captured at login
    pub device_class: DeviceClass,
    /// Mobile flag captured at login
    pub is_mobile: bool,
    /// Client IP at login, if known
    pub ip_address: Option<String>,
    /// Raw user-agent string at login, if sent
    pub user_agent: Option<String>,
    /// How the session was established
    pub login_method: LoginMethod,
    /// Active flag; cleared on logout or forced invalidation
    pub is_active: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last successful validation
    pub last_activity: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
    /// created_at + session TTL
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Check if the session has passed its expiry instant.
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }

    /// Active for conflict/validation purposes: flagged active and not yet
    /// expired. Expiry is passive; rows are filtered, never swept eagerly.
    pub fn is_live(&self) -> bool {
        self.is_active && !self.is_expired()
    }

    /// Reconstruct the device profile stored on this row.
    pub fn device_profile(&self) -> DeviceProfile {
        DeviceProfile {
            browser: self.browser.clone(),
            os: self.os.clone(),
            device_class: self.device_class,
            is_mobile: self.is_mobile,
            captured_at: self.created_at,
            ip_address: self.ip_address.clone(),
        }
    }
}
