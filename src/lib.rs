//! revise-auth - authentication and session-lifecycle service
//!
//! Verifies credentials, issues signed session tokens, tracks sessions
//! across devices, and detects cross-device login conflicts for the exam
//! revision platform.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
