//! User model
//!
//! Identity record owned by the user store. Read-mostly from this service's
//! perspective: rows are written only to create OAuth-originated accounts or
//! to touch the update timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User entity.
///
/// A `None` password hash marks an OAuth-only account; such users can never
/// authenticate through the credential path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Email address (unique, compared case-insensitively)
    pub email: String,
    /// Argon2 password hash; None for OAuth-only accounts
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    /// Display name shown in the client
    pub display_name: Option<String>,
    /// Account role
    pub role: UserRole,
    /// Blocked accounts are refused on every authenticated surface
    pub is_blocked: bool,
    /// Default exam selection captured at registration
    pub default_exam: Option<String>,
    /// Default subject selection captured at registration
    pub default_subject: Option<String>,
    /// Default exam board selection captured at registration
    pub default_board: Option<String>,
    /// Marketing opt-in captured at registration
    pub marketing_opt_in: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user record; the id is assigned by the database.
    pub fn new(email: String, password_hash: Option<String>, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            email,
            password_hash,
            display_name: None,
            role,
            is_blocked: false,
            default_exam: None,
            default_subject: None,
            default_board: None,
            marketing_opt_in: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this account was created through the OAuth bridge and has no
    /// usable password.
    pub fn is_oauth_only(&self) -> bool {
        self.password_hash.is_none()
    }
}

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Student - standard account (default)
    #[default]
    Student,
    /// Tutor - teaching account
    Tutor,
    /// Admin - platform operator
    Admin,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Student => write!(f, "student"),
            UserRole::Tutor => write!(f, "tutor"),
            UserRole::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "student" => Ok(UserRole::Student),
            "tutor" => Ok(UserRole::Tutor),
            "admin" => Ok(UserRole::Admin),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}
