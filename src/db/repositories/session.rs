//! Session repository
//!
//! The session store adapter. Sessions are keyed by their signed token;
//! "active" rows are exactly those with `is_active` set and an expiry in the
//! future. Expiry is passive: reads filter on it, nothing here sweeps rows
//! except the explicit `delete_expired` maintenance call.
//!
//! Provides:
//! - `SessionRepository` trait defining the adapter interface
//! - `SqlxSessionRepository` implementing it for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{DeviceClass, DeviceProfile, LoginMethod, Session};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Parameters for creating a session row.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: i64,
    pub token: String,
    pub device: DeviceProfile,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub login_method: LoginMethod,
    /// Session lifetime; expires_at = now + ttl
    pub ttl: Duration,
}

/// Session repository trait
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Create a new session row
    async fn create(&self, new: &NewSession) -> Result<Session>;

    /// Find the active, unexpired session for a token
    async fn find_active(&self, token: &str) -> Result<Option<Session>>;

    /// Deactivate the session for a token.
    /// Idempotent: unknown or already-inactive tokens are not an error.
    async fn invalidate(&self, token: &str) -> Result<()>;

    /// Deactivate every other active session for a user in one atomic
    /// filtered update. Returns the number of sessions deactivated.
    async fn invalidate_others(&self, user_id: i64, except_token: Option<&str>) -> Result<u64>;

    /// Update last_activity/updated_at for a token
    async fn touch(&self, token: &str) -> Result<()>;

    /// List active sessions for a user, most recently active first
    async fn list_active(&self, user_id: i64) -> Result<Vec<Session>>;

    /// Delete expired session rows (maintenance sweep).
    /// Returns the number of rows removed.
    async fn delete_expired(&self) -> Result<u64>;
}

/// SQLx-based session repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    /// Create a new SQLx session repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, new: &NewSession) -> Result<Session> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_session_sqlite(self.pool.as_sqlite().unwrap(), new).await,
            DatabaseDriver::Mysql => create_session_mysql(self.pool.as_mysql().unwrap(), new).await,
        }
    }

    async fn find_active(&self, token: &str) -> Result<Option<Session>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                find_active_sqlite(self.pool.as_sqlite().unwrap(), token).await
            }
            DatabaseDriver::Mysql => find_active_mysql(self.pool.as_mysql().unwrap(), token).await,
        }
    }

    async fn invalidate(&self, token: &str) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => invalidate_sqlite(self.pool.as_sqlite().unwrap(), token).await,
            DatabaseDriver::Mysql => invalidate_mysql(self.pool.as_mysql().unwrap(), token).await,
        }
    }

    async fn invalidate_others(&self, user_id: i64, except_token: Option<&str>) -> Result<u64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                invalidate_others_sqlite(self.pool.as_sqlite().unwrap(), user_id, except_token).await
            }
            DatabaseDriver::Mysql => {
                invalidate_others_mysql(self.pool.as_mysql().unwrap(), user_id, except_token).await
            }
        }
    }

    async fn touch(&self, token: &str) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => touch_sqlite(self.pool.as_sqlite().unwrap(), token).await,
            DatabaseDriver::Mysql => touch_mysql(self.pool.as_mysql().unwrap(), token).await,
        }
    }

    async fn list_active(&self, user_id: i64) -> Result<Vec<Session>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_active_sqlite(self.pool.as_sqlite().unwrap(), user_id).await
            }
            DatabaseDriver::Mysql => list_active_mysql(self.pool.as_mysql().unwrap(), user_id).await,
        }
    }

    async fn delete_expired(&self) -> Result<u64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_expired_sqlite(self.pool.as_sqlite().unwrap()).await,
            DatabaseDriver::Mysql => delete_expired_mysql(self.pool.as_mysql().unwrap()).await,
        }
    }
}

const SESSION_COLUMNS: &str = "id, user_id, token, browser, os, device_class, is_mobile, \
     ip_address, user_agent, login_method, is_active, created_at, last_activity, updated_at, \
     expires_at";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_session_sqlite(pool: &SqlitePool, new: &NewSession) -> Result<Session> {
    let now = Utc::now();
    let expires_at = now + new.ttl;

    let result = sqlx::query(
        r#"
        INSERT INTO sessions (user_id, token, browser, os, device_class, is_mobile,
                              ip_address, user_agent, login_method, is_active,
                              created_at, last_activity, updated_at, expires_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?, ?, ?)
        "#,
    )
    .bind(new.user_id)
    .bind(&new.token)
    .bind(&new.device.browser)
    .bind(&new.device.os)
    .bind(new.device.device_class.to_string())
    .bind(new.device.is_mobile)
    .bind(&new.ip_address)
    .bind(&new.user_agent)
    .bind(new.login_method.to_string())
    .bind(now)
    .bind(now)
    .bind(now)
    .bind(expires_at)
    .execute(pool)
    .await
    .context("Failed to create session")?;

    Ok(assemble_session(result.last_insert_rowid(), new, now, expires_at))
}

async fn find_active_sqlite(pool: &SqlitePool, token: &str) -> Result<Option<Session>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM sessions WHERE token = ? AND is_active = 1 AND expires_at > ?",
        SESSION_COLUMNS
    ))
    .bind(token)
    .bind(Utc::now())
    .fetch_optional(pool)
    .await
    .context("Failed to find active session")?;

    match row {
        Some(row) => Ok(Some(row_to_session_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn invalidate_sqlite(pool: &SqlitePool, token: &str) -> Result<()> {
    sqlx::query("UPDATE sessions SET is_active = 0, updated_at = ? WHERE token = ?")
        .bind(Utc::now())
        .bind(token)
        .execute(pool)
        .await
        .context("Failed to invalidate session")?;

    Ok(())
}

async fn invalidate_others_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    except_token: Option<&str>,
) -> Result<u64> {
    let now = Utc::now();

    // One filtered UPDATE so a session committed concurrently cannot be
    // missed by a read-then-write loop.
    let result = match except_token {
        Some(token) => {
            sqlx::query(
                "UPDATE sessions SET is_active = 0, updated_at = ? \
                 WHERE user_id = ? AND is_active = 1 AND expires_at > ? AND token != ?",
            )
            .bind(now)
            .bind(user_id)
            .bind(now)
            .bind(token)
            .execute(pool)
            .await
        }
        None => {
            sqlx::query(
                "UPDATE sessions SET is_active = 0, updated_at = ? \
                 WHERE user_id = ? AND is_active = 1 AND expires_at > ?",
            )
            .bind(now)
            .bind(user_id)
            .bind(now)
            .execute(pool)
            .await
        }
    }
    .context("Failed to invalidate other sessions")?;

    Ok(result.rows_affected())
}

async fn touch_sqlite(pool: &SqlitePool, token: &str) -> Result<()> {
    let now = Utc::now();
    sqlx::query("UPDATE sessions SET last_activity = ?, updated_at = ? WHERE token = ?")
        .bind(now)
        .bind(now)
        .bind(token)
        .execute(pool)
        .await
        .context("Failed to touch session")?;

    Ok(())
}

async fn list_active_sqlite(pool: &SqlitePool, user_id: i64) -> Result<Vec<Session>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM sessions \
         WHERE user_id = ? AND is_active = 1 AND expires_at > ? \
         ORDER BY last_activity DESC",
        SESSION_COLUMNS
    ))
    .bind(user_id)
    .bind(Utc::now())
    .fetch_all(pool)
    .await
    .context("Failed to list active sessions")?;

    rows.iter().map(row_to_session_sqlite).collect()
}

async fn delete_expired_sqlite(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
        .bind(Utc::now())
        .execute(pool)
        .await
        .context("Failed to delete expired sessions")?;

    Ok(result.rows_affected())
}

fn row_to_session_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Session> {
    let device_class: String = row.get("device_class");
    let login_method: String = row.get("login_method");

    Ok(Session {
        id: row.get("id"),
        user_id: row.get("user_id"),
        token: row.get("token"),
        browser: row.get("browser"),
        os: row.get("os"),
        device_class: DeviceClass::from_str(&device_class)?,
        is_mobile: row.get("is_mobile"),
        ip_address: row.get("ip_address"),
        user_agent: row.get("user_agent"),
        login_method: LoginMethod::from_str(&login_method)?,
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        last_activity: row.get("last_activity"),
        updated_at: row.get("updated_at"),
        expires_at: row.get("expires_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_session_mysql(pool: &MySqlPool, new: &NewSession) -> Result<Session> {
    let now = Utc::now();
    let expires_at = now + new.ttl;

    let result = sqlx::query(
        r#"
        INSERT INTO sessions (user_id, token, browser, os, device_class, is_mobile,
                              ip_address, user_agent, login_method, is_active,
                              created_at, last_activity, updated_at, expires_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?, ?, ?)
        "#,
    )
    .bind(new.user_id)
    .bind(&new.token)
    .bind(&new.device.browser)
    .bind(&new.device.os)
    .bind(new.device.device_class.to_string())
    .bind(new.device.is_mobile)
    .bind(&new.ip_address)
    .bind(&new.user_agent)
    .bind(new.login_method.to_string())
    .bind(now)
    .bind(now)
    .bind(now)
    .bind(expires_at)
    .execute(pool)
    .await
    .context("Failed to create session")?;

    Ok(assemble_session(result.last_insert_id() as i64, new, now, expires_at))
}

async fn find_active_mysql(pool: &MySqlPool, token: &str) -> Result<Option<Session>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM sessions WHERE token = ? AND is_active = 1 AND expires_at > ?",
        SESSION_COLUMNS
    ))
    .bind(token)
    .bind(Utc::now())
    .fetch_optional(pool)
    .await
    .context("Failed to find active session")?;

    match row {
        Some(row) => Ok(Some(row_to_session_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn invalidate_mysql(pool: &MySqlPool, token: &str) -> Result<()> {
    sqlx::query("UPDATE sessions SET is_active = 0, updated_at = ? WHERE token = ?")
        .bind(Utc::now())
        .bind(token)
        .execute(pool)
        .await
        .context("Failed to invalidate session")?;

    Ok(())
}

async fn invalidate_others_mysql(
    pool: &MySqlPool,
    user_id: i64,
    except_token: Option<&str>,
) -> Result<u64> {
    let now = Utc::now();

    let result = match except_token {
        Some(token) => {
            sqlx::query(
                "UPDATE sessions SET is_active = 0, updated_at = ? \
                 WHERE user_id = ? AND is_active = 1 AND expires_at > ? AND token != ?",
            )
            .bind(now)
            .bind(user_id)
            .bind(now)
            .bind(token)
            .execute(pool)
            .await
        }
        None => {
            sqlx::query(
                "UPDATE sessions SET is_active = 0, updated_at = ? \
                 WHERE user_id = ? AND is_active = 1 AND expires_at > ?",
            )
            .bind(now)
            .bind(user_id)
            .bind(now)
            .execute(pool)
            .await
        }
    }
    .context("Failed to invalidate other sessions")?;

    Ok(result.rows_affected())
}

async fn touch_mysql(pool: &MySqlPool, token: &str) -> Result<()> {
    let now = Utc::now();
    sqlx::query("UPDATE sessions SET last_activity = ?, updated_at = ? WHERE token = ?")
        .bind(now)
        .bind(now)
        .bind(token)
        .execute(pool)
        .await
        .context("Failed to touch session")?;

    Ok(())
}

async fn list_active_mysql(pool: &MySqlPool, user_id: i64) -> Result<Vec<Session>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM sessions \
         WHERE user_id = ? AND is_active = 1 AND expires_at > ? \
         ORDER BY last_activity DESC",
        SESSION_COLUMNS
    ))
    .bind(user_id)
    .bind(Utc::now())
    .fetch_all(pool)
    .await
    .context("Failed to list active sessions")?;

    rows.iter().map(row_to_session_mysql).collect()
}

async fn delete_expired_mysql(pool: &MySqlPool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
        .bind(Utc::now())
        .execute(pool)
        .await
        .context("Failed to delete expired sessions")?;

    Ok(result.rows_affected())
}

fn row_to_session_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Session> {
    let device_class: String = row.get("device_class");
    let login_method: String = row.get("login_method");
    let created_at: DateTime<Utc> = row.get("created_at");

    Ok(Session {
        id: row.get("id"),
        user_id: row.get("user_id"),
        token: row.get("token"),
        browser: row.get("browser"),
        os: row.get("os"),
        device_class: DeviceClass::from_str(&device_class)?,
        is_mobile: row.get("is_mobile"),
        ip_address: row.get("ip_address"),
        user_agent: row.get("user_agent"),
        login_method: LoginMethod::from_str(&login_method)?,
        is_active: row.get("is_active"),
        created_at,
        last_activity: row.get("last_activity"),
        updated_at: row.get("updated_at"),
        expires_at: row.get("expires_at"),
    })
}

// ============================================================================
// Shared helpers
// ============================================================================

fn assemble_session(
    id: i64,
    new: &NewSession,
    now: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Session {
    Session {
        id,
        user_id: new.user_id,
        token: new.token.clone(),
        browser: new.device.browser.clone(),
        os: new.device.os.clone(),
        device_class: new.device.device_class,
        is_mobile: new.device.is_mobile,
        ip_address: new.ip_address.clone(),
        user_agent: new.user_agent.clone(),
        login_method: new.login_method,
        is_active: true,
        created_at: now,
        last_activity: now,
        updated_at: now,
        expires_at,
    }
}
