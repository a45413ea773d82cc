//! Cross-device conflict detection
//!
//! Before a login completes, the detector compares the candidate device
//! against the user's active sessions. A session on the same (browser, OS,
//! device class) triplet is not a conflict; any other active session is.
//! The check is advisory: it never mutates session state and a forced login
//! proceeds regardless of its outcome.

use anyhow::Result;
use std::sync::Arc;

use crate::db::repositories::SessionRepository;
use crate::models::{DeviceProfile, Session};

/// Outcome of a conflict check.
#[derive(Debug, Clone)]
pub struct ConflictReport {
    /// At least one active session exists on a different device.
    pub has_conflict: bool,
    /// Whether the client should show a confirmation prompt.
    /// Currently mirrors `has_conflict`.
    pub should_prompt: bool,
    /// Human-readable prompt text, present when a conflict exists.
    pub message: Option<String>,
    /// The user's currently-active sessions, most recent first.
    pub active_sessions: Vec<Session>,
}

impl ConflictReport {
    /// A report with no conflicting device.
    pub fn clear(active_sessions: Vec<Session>) -> Self {
        Self {
            has_conflict: false,
            should_prompt: false,
            message: None,
            active_sessions,
        }
    }
}

/// Detects logins that would coexist with sessions on other devices.
pub struct ConflictDetector {
    session_repo: Arc<dyn SessionRepository>,
}

impl ConflictDetector {
    pub fn new(session_repo: Arc<dyn SessionRepository>) -> Self {
        Self { session_repo }
    }

    /// Check a candidate device against the user's active sessions.
    pub async fn check(&self, user_id: i64, candidate: &DeviceProfile) -> Result<ConflictReport> {
        let active = self.session_repo.list_active(user_id).await?;

        let other_device_count = active
            .iter()
            .filter(|s| !candidate.same_device(&s.device_profile()))
            .count();

        if other_device_count == 0 {
            return Ok(ConflictReport::clear(active));
        }

        let message = format!(
            "You have {} active session(s) on other devices. \
             Logging in here will sign you out everywhere else.",
            other_device_count
        );

        Ok(ConflictReport {
            has_conflict: true,
            should_prompt: true,
            message: Some(message),
            active_sessions: active,
        })
    }
}
