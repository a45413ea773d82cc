//! Authentication orchestrator
//!
//! Drives the login, logout, validate, and check-session flows by composing
//! the credential check, conflict detector, token issuer, and session store.
//!
//! Ordering rules the flows preserve:
//! - The blocked-account check runs before the password check, so a blocked
//!   user learns they are blocked rather than guessing at credentials.
//! - A forced login invalidates the user's other sessions before the new
//!   session is created.
//! - Session-store state is authoritative for `validate`: a token that still
//!   verifies cryptographically is rejected once its session is invalidated.
//! - `touch` and `invalidate_others` are best-effort; their failures are
//!   logged and never fail the primary operation.

use anyhow::Result;
use std::sync::Arc;

use crate::db::repositories::session::NewSession;
use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{DeviceProfile, LoginMethod, Session, User, UserRole};
use crate::services::conflict::{ConflictDetector, ConflictReport};
use crate::services::oauth::{IdentityError, IdentityProvider};
use crate::services::password::verify_password;
use crate::services::token::{TokenError, TokenIssuer};

/// Error types for authentication flows.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Malformed or missing input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown email or wrong password. Deliberately indistinguishable.
    #[error("Invalid email or password")]
    Credentials,

    /// The presented token has expired.
    #[error("Token has expired")]
    TokenExpired,

    /// The token is invalid, or no live session backs it.
    #[error("Invalid or expired session")]
    Unauthorized,

    /// The account is blocked.
    #[error("This account has been blocked")]
    Blocked,

    /// Active sessions exist on other devices and the login was not forced.
    #[error("Active sessions exist on other devices")]
    Conflict(ConflictReport),

    /// Unexpected failure in a collaborator.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::Invalid => AuthError::Unauthorized,
            TokenError::Signing(e) => AuthError::Internal(anyhow::anyhow!(e)),
        }
    }
}

impl From<IdentityError> for AuthError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::Unauthorized => AuthError::Unauthorized,
            IdentityError::MissingEmail => {
                AuthError::Validation("Identity provider returned no email".to_string())
            }
            IdentityError::Provider(e) => AuthError::Internal(e),
        }
    }
}

/// Input to the password login flow.
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
    pub force_login: bool,
    pub device: DeviceProfile,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Registration selections captured when the OAuth bridge creates a user.
#[derive(Debug, Clone, Default)]
pub struct RegistrationHints {
    pub default_exam: Option<String>,
    pub default_subject: Option<String>,
    pub default_board: Option<String>,
    pub marketing_opt_in: bool,
}

/// Input to the OAuth login flow.
#[derive(Debug, Clone)]
pub struct OAuthInput {
    pub access_token: String,
    pub force_login: bool,
    pub registration: RegistrationHints,
    pub device: DeviceProfile,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// A completed login: the authenticated user, their new session, and the
/// signed token backing it.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub session: Session,
    pub token: String,
}

/// A successful validation: the live session, its user, and the remaining
/// lifetime in seconds.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub user: User,
    pub session: Session,
    pub expires_in_secs: i64,
}

/// The session orchestrator.
pub struct AuthService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    token_issuer: Arc<TokenIssuer>,
    conflict_detector: ConflictDetector,
    identity_provider: Arc<dyn IdentityProvider>,
}

impl AuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        token_issuer: Arc<TokenIssuer>,
        identity_provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        let conflict_detector = ConflictDetector::new(session_repo.clone());
        Self {
            user_repo,
            session_repo,
            token_issuer,
            conflict_detector,
            identity_provider,
        }
    }

    /// Password login.
    pub async fn login(&self, input: LoginInput) -> Result<LoginOutcome, AuthError> {
        let email = input.email.trim();
        if email.is_empty() || input.password.is_empty() {
            return Err(AuthError::Validation(
                "Email and password are required".to_string(),
            ));
        }

        let user = self
            .user_repo
            .get_by_email(email)
            .await?
            .ok_or(AuthError::Credentials)?;

        // Blocked check comes before the password check
        if user.is_blocked {
            return Err(AuthError::Blocked);
        }

        // OAuth-only accounts have no hash and can never pass this path
        let hash = user.password_hash.as_deref().ok_or(AuthError::Credentials)?;
        if !verify_password(&input.password, hash) {
            return Err(AuthError::Credentials);
        }

        self.establish_session(
            &user,
            &input.device,
            input.ip_address,
            input.user_agent,
            LoginMethod::Email,
            input.force_login,
            false,
        )
        .await
    }

    /// OAuth login: resolve the external token, find or create the local
    /// user, then run the same conflict-check and session pipeline.
    pub async fn oauth_login(&self, input: OAuthInput) -> Result<LoginOutcome, AuthError> {
        if input.access_token.trim().is_empty() {
            return Err(AuthError::Validation("Access token is required".to_string()));
        }

        let identity = self.identity_provider.resolve(&input.access_token).await?;

        let (user, is_new_user) = match self.user_repo.get_by_email(&identity.email).await? {
            Some(existing) => {
                if existing.is_blocked {
                    return Err(AuthError::Blocked);
                }
                (existing, false)
            }
            None => {
                let mut user =
                    User::new(identity.email.clone(), None, UserRole::Student);
                user.display_name = Some(identity.display_name());
                user.default_exam = input.registration.default_exam.clone();
                user.default_subject = input.registration.default_subject.clone();
                user.default_board = input.registration.default_board.clone();
                user.marketing_opt_in = input.registration.marketing_opt_in;

                let created = self.user_repo.create(&user).await?;
                tracing::info!(user_id = created.id, "Created user from OAuth identity");
                (created, true)
            }
        };

        // A fresh registration cannot conflict with itself
        self.establish_session(
            &user,
            &input.device,
            input.ip_address,
            input.user_agent,
            LoginMethod::Oauth,
            input.force_login,
            is_new_user,
        )
        .await
    }

    /// Invalidate the session behind a token. Best-effort: an unknown token
    /// or a store failure never surfaces to the caller, so the client-side
    /// effect of logout (cleared cookies) is unconditional.
    pub async fn logout(&self, token: &str) {
        if let Err(e) = self.session_repo.invalidate(token).await {
            tracing::warn!("Failed to invalidate session on logout: {:#}", e);
        }
    }

    /// Validate a presented token against the session store.
    ///
    /// The store is authoritative: a cryptographically valid token whose
    /// session was invalidated by logout or a forced login is rejected.
    pub async fn validate(&self, token: &str) -> Result<ValidationOutcome, AuthError> {
        self.token_issuer.verify(token)?;

        let session = self
            .session_repo
            .find_active(token)
            .await?
            .ok_or(AuthError::Unauthorized)?;

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await?
            .ok_or(AuthError::Unauthorized)?;
        if user.is_blocked {
            return Err(AuthError::Blocked);
        }

        if let Err(e) = self.session_repo.touch(token).await {
            tracing::warn!("Failed to touch session activity: {:#}", e);
        }

        let expires_in_secs = (session.expires_at - chrono::Utc::now())
            .num_seconds()
            .max(0);

        Ok(ValidationOutcome {
            user,
            session,
            expires_in_secs,
        })
    }

    /// Stateless conflict probe for an email, used by clients to pre-warn
    /// before attempting a login. An unknown email reports no conflict
    /// rather than leaking whether the account exists.
    pub async fn check_session(
        &self,
        email: &str,
        candidate: &DeviceProfile,
    ) -> Result<ConflictReport, AuthError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AuthError::Validation("Email is required".to_string()));
        }

        let user = match self.user_repo.get_by_email(email).await? {
            Some(user) => user,
            None => return Ok(ConflictReport::clear(Vec::new())),
        };
        if user.is_blocked {
            return Err(AuthError::Blocked);
        }

        Ok(self.conflict_detector.check(user.id, candidate).await?)
    }

    /// Delete expired session rows. Called from the periodic sweep task.
    pub async fn sweep_expired_sessions(&self) -> Result<u64> {
        self.session_repo.delete_expired().await
    }

    #[allow(clippy::too_many_arguments)]
    async fn establish_session(
        &self,
        user: &User,
        device: &DeviceProfile,
        ip_address: Option<String>,
        user_agent: Option<String>,
        login_method: LoginMethod,
        force_login: bool,
        skip_conflict_check: bool,
    ) -> Result<LoginOutcome, AuthError> {
        if force_login {
            // Best-effort by policy; the login itself still succeeds
            match self.session_repo.invalidate_others(user.id, None).await {
                Ok(count) if count > 0 => {
                    tracing::info!(user_id = user.id, count, "Forced login invalidated sessions");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("Failed to invalidate other sessions: {:#}", e);
                }
            }
        } else if !skip_conflict_check {
            let report = self.conflict_detector.check(user.id, device).await?;
            if report.has_conflict {
                return Err(AuthError::Conflict(report));
            }
        }

        let token = self.token_issuer.issue(user)?;

        let session = self
            .session_repo
            .create(&NewSession {
                user_id: user.id,
                token: token.clone(),
                device: device.clone(),
                ip_address,
                user_agent,
                login_method,
                ttl: self.token_issuer.ttl(),
            })
            .await?;

        tracing::info!(
            user_id = user.id,
            method = %login_method,
            browser = %session.browser,
            os = %session.os,
            "Session established"
        );

        Ok(LoginOutcome {
            user: user.clone(),
            session,
            token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::DeviceClass;
    use crate::services::oauth::ExternalIdentity;
    use crate::services::password::hash_password;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};

    /// Identity provider stub: "good-token" resolves, anything else is
    /// rejected the way a real provider rejects a bad bearer token.
    struct StubProvider {
        identity: ExternalIdentity,
    }

    #[async_trait]
    impl IdentityProvider for StubProvider {
        async fn resolve(&self, access_token: &str) -> Result<ExternalIdentity, IdentityError> {
            if access_token == "good-token" {
                Ok(self.identity.clone())
            } else {
                Err(IdentityError::Unauthorized)
            }
        }
    }

    fn stub_provider(email: &str, name: Option<&str>) -> Arc<dyn IdentityProvider> {
        Arc::new(StubProvider {
            identity: ExternalIdentity {
                email: email.to_string(),
                name: name.map(|n| n.to_string()),
                given_name: None,
            },
        })
    }

    async fn setup_with_pool(
        provider: Arc<dyn IdentityProvider>,
    ) -> (AuthService, Arc<dyn UserRepository>, crate::db::DynDatabasePool) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool.clone());
        let issuer = Arc::new(TokenIssuer::new("test-secret", Duration::days(7)));

        let service = AuthService::new(user_repo.clone(), session_repo, issuer, provider);
        (service, user_repo, pool)
    }

    async fn setup(provider: Arc<dyn IdentityProvider>) -> (AuthService, Arc<dyn UserRepository>) {
        let (service, user_repo, _pool) = setup_with_pool(provider).await;
        (service, user_repo)
    }

    async fn seed_user(repo: &Arc<dyn UserRepository>, email: &str, password: &str) -> User {
        let hash = hash_password(password).expect("Failed to hash");
        repo.create(&User::new(email.to_string(), Some(hash), UserRole::Student))
            .await
            .expect("Failed to seed user")
    }

    fn desktop() -> DeviceProfile {
        DeviceProfile {
            browser: "Chrome".to_string(),
            os: "macOS".to_string(),
            device_class: DeviceClass::Desktop,
            is_mobile: false,
            captured_at: Utc::now(),
            ip_address: None,
        }
    }

    fn mobile() -> DeviceProfile {
        DeviceProfile {
            browser: "Safari".to_string(),
            os: "iOS".to_string(),
            device_class: DeviceClass::Mobile,
            is_mobile: true,
            captured_at: Utc::now(),
            ip_address: None,
        }
    }

    fn login_input(email: &str, password: &str, device: DeviceProfile) -> LoginInput {
        LoginInput {
            email: email.to_string(),
            password: password.to_string(),
            force_login: false,
            device,
            ip_address: Some("203.0.113.1".to_string()),
            user_agent: Some("Mozilla/5.0".to_string()),
        }
    }

    #[tokio::test]
    async fn test_login_success_issues_verifiable_token() {
        let (service, users) = setup(stub_provider("x@example.com", None)).await;
        seed_user(&users, "student@example.com", "hunter2!").await;

        let outcome = service
            .login(login_input("student@example.com", "hunter2!", desktop()))
            .await
            .expect("Login should succeed");

        assert_eq!(outcome.user.email, "student@example.com");
        assert_eq!(outcome.session.token, outcome.token);
        assert!(outcome.session.is_active);
        assert_eq!(outcome.session.login_method, LoginMethod::Email);

        let validated = service.validate(&outcome.token).await.expect("Token should validate");
        assert_eq!(validated.user.id, outcome.user.id);
        assert!(validated.expires_in_secs > 0);
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let (service, users) = setup(stub_provider("x@example.com", None)).await;
        seed_user(&users, "student@example.com", "hunter2!").await;

        let result = service
            .login(login_input("student@example.com", "wrong", desktop()))
            .await;
        assert!(matches!(result, Err(AuthError::Credentials)));
    }

    #[tokio::test]
    async fn test_login_unknown_email() {
        let (service, _users) = setup(stub_provider("x@example.com", None)).await;
        let result = service
            .login(login_input("ghost@example.com", "whatever", desktop()))
            .await;
        assert!(matches!(result, Err(AuthError::Credentials)));
    }

    #[tokio::test]
    async fn test_login_empty_input_is_validation_error() {
        let (service, _users) = setup(stub_provider("x@example.com", None)).await;
        let result = service.login(login_input("", "", desktop())).await;
        assert!(matches!(result, Err(AuthError::Validation(_))));
    }

    #[tokio::test]
    async fn test_blocked_check_precedes_password_check() {
        let (service, users) = setup(stub_provider("x@example.com", None)).await;
        let hash = hash_password("hunter2!").expect("Failed to hash");
        let mut user = User::new(
            "blocked@example.com".to_string(),
            Some(hash),
            UserRole::Student,
        );
        user.is_blocked = true;
        users.create(&user).await.expect("Failed to seed");

        // Even the wrong password reports Blocked, not Credentials
        let result = service
            .login(login_input("blocked@example.com", "wrong", desktop()))
            .await;
        assert!(matches!(result, Err(AuthError::Blocked)));
    }

    #[tokio::test]
    async fn test_oauth_only_user_cannot_password_login() {
        let (service, users) = setup(stub_provider("x@example.com", None)).await;
        users
            .create(&User::new(
                "oauth@example.com".to_string(),
                None,
                UserRole::Student,
            ))
            .await
            .expect("Failed to seed");

        let result = service
            .login(login_input("oauth@example.com", "anything", desktop()))
            .await;
        assert!(matches!(result, Err(AuthError::Credentials)));
    }

    #[tokio::test]
    async fn test_conflict_prompt_then_forced_login() {
        let (service, users) = setup(stub_provider("x@example.com", None)).await;
        let user = seed_user(&users, "student@example.com", "hunter2!").await;

        // Device A logs in cleanly
        let first = service
            .login(login_input("student@example.com", "hunter2!", desktop()))
            .await
            .expect("First login should succeed");

        // Device B without force halts with a conflict carrying A's session
        let result = service
            .login(login_input("student@example.com", "hunter2!", mobile()))
            .await;
        let report = match result {
            Err(AuthError::Conflict(report)) => report,
            other => panic!("Expected Conflict, got {:?}", other.map(|o| o.token)),
        };
        assert!(report.should_prompt);
        assert_eq!(report.active_sessions.len(), 1);
        assert_eq!(report.active_sessions[0].token, first.token);

        // Retrying with force succeeds and leaves exactly one active session
        let mut forced = login_input("student@example.com", "hunter2!", mobile());
        forced.force_login = true;
        let second = service.login(forced).await.expect("Forced login should succeed");

        let check = service
            .check_session("student@example.com", &mobile())
            .await
            .expect("Check should succeed");
        assert_eq!(check.active_sessions.len(), 1);
        assert_eq!(check.active_sessions[0].token, second.token);
        assert_eq!(check.active_sessions[0].user_id, user.id);

        // The original token no longer validates
        assert!(matches!(
            service.validate(&first.token).await,
            Err(AuthError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_same_device_relogin_is_not_a_conflict() {
        let (service, users) = setup(stub_provider("x@example.com", None)).await;
        seed_user(&users, "student@example.com", "hunter2!").await;

        service
            .login(login_input("student@example.com", "hunter2!", desktop()))
            .await
            .expect("First login should succeed");

        let second = service
            .login(login_input("student@example.com", "hunter2!", desktop()))
            .await;
        assert!(second.is_ok(), "Same-device re-login must not conflict");
    }

    #[tokio::test]
    async fn test_validate_after_logout_rejects_live_token() {
        let (service, users) = setup(stub_provider("x@example.com", None)).await;
        seed_user(&users, "student@example.com", "hunter2!").await;

        let outcome = service
            .login(login_input("student@example.com", "hunter2!", desktop()))
            .await
            .expect("Login should succeed");

        service.logout(&outcome.token).await;

        // The token still verifies cryptographically, but the store says no
        assert!(matches!(
            service.validate(&outcome.token).await,
            Err(AuthError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_logout_with_unknown_token_is_silent() {
        let (service, _users) = setup(stub_provider("x@example.com", None)).await;
        // Must not panic or error
        service.logout("no-such-token").await;
    }

    #[tokio::test]
    async fn test_validate_garbage_token() {
        let (service, _users) = setup(stub_provider("x@example.com", None)).await;
        assert!(matches!(
            service.validate("not.a.jwt").await,
            Err(AuthError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_validate_blocked_user_reports_blocked() {
        let (service, users, pool) = setup_with_pool(stub_provider("x@example.com", None)).await;
        let user = seed_user(&users, "student@example.com", "hunter2!").await;

        let outcome = service
            .login(login_input("student@example.com", "hunter2!", desktop()))
            .await
            .expect("Login should succeed");

        // Block the account after the session exists
        sqlx::query("UPDATE users SET is_blocked = 1 WHERE id = ?")
            .bind(user.id)
            .execute(pool.as_sqlite().unwrap())
            .await
            .expect("Failed to block user");

        assert!(matches!(
            service.validate(&outcome.token).await,
            Err(AuthError::Blocked)
        ));
    }

    #[tokio::test]
    async fn test_oauth_login_creates_user_on_first_sight() {
        let provider = stub_provider("new.student@example.com", Some("New Student"));
        let (service, users) = setup(provider).await;

        let outcome = service
            .oauth_login(OAuthInput {
                access_token: "good-token".to_string(),
                force_login: false,
                registration: RegistrationHints {
                    default_exam: Some("GCSE".to_string()),
                    default_subject: Some("Biology".to_string()),
                    default_board: Some("AQA".to_string()),
                    marketing_opt_in: true,
                },
                device: desktop(),
                ip_address: None,
                user_agent: None,
            })
            .await
            .expect("OAuth login should succeed");

        assert_eq!(outcome.session.login_method, LoginMethod::Oauth);
        assert_eq!(outcome.user.display_name.as_deref(), Some("New Student"));
        assert!(outcome.user.is_oauth_only());
        assert_eq!(outcome.user.default_exam.as_deref(), Some("GCSE"));
        assert!(outcome.user.marketing_opt_in);

        let stored = users
            .get_by_email("new.student@example.com")
            .await
            .expect("Failed to query")
            .expect("User should exist");
        assert!(stored.password_hash.is_none());
    }

    #[tokio::test]
    async fn test_oauth_existing_user_hits_conflict_check() {
        let provider = stub_provider("student@example.com", None);
        let (service, users) = setup(provider).await;
        seed_user(&users, "student@example.com", "hunter2!").await;

        // Existing session on a different device
        service
            .login(login_input("student@example.com", "hunter2!", desktop()))
            .await
            .expect("Password login should succeed");

        let result = service
            .oauth_login(OAuthInput {
                access_token: "good-token".to_string(),
                force_login: false,
                registration: RegistrationHints::default(),
                device: mobile(),
                ip_address: None,
                user_agent: None,
            })
            .await;
        assert!(matches!(result, Err(AuthError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_oauth_blocked_user_is_forbidden() {
        let provider = stub_provider("blocked@example.com", None);
        let (service, users) = setup(provider).await;

        let mut user = User::new("blocked@example.com".to_string(), None, UserRole::Student);
        user.is_blocked = true;
        users.create(&user).await.expect("Failed to seed");

        let result = service
            .oauth_login(OAuthInput {
                access_token: "good-token".to_string(),
                force_login: false,
                registration: RegistrationHints::default(),
                device: desktop(),
                ip_address: None,
                user_agent: None,
            })
            .await;
        assert!(matches!(result, Err(AuthError::Blocked)));
    }

    #[tokio::test]
    async fn test_oauth_rejected_token() {
        let (service, _users) = setup(stub_provider("x@example.com", None)).await;
        let result = service
            .oauth_login(OAuthInput {
                access_token: "bad-token".to_string(),
                force_login: false,
                registration: RegistrationHints::default(),
                device: desktop(),
                ip_address: None,
                user_agent: None,
            })
            .await;
        assert!(matches!(result, Err(AuthError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_check_session_unknown_email_reports_no_conflict() {
        let (service, _users) = setup(stub_provider("x@example.com", None)).await;
        let report = service
            .check_session("ghost@example.com", &desktop())
            .await
            .expect("Check should succeed");
        assert!(!report.has_conflict);
        assert!(report.active_sessions.is_empty());
    }

    #[tokio::test]
    async fn test_check_session_blocked_email() {
        let (service, users) = setup(stub_provider("x@example.com", None)).await;
        let mut user = User::new("blocked@example.com".to_string(), None, UserRole::Student);
        user.is_blocked = true;
        users.create(&user).await.expect("Failed to seed");

        let result = service.check_session("blocked@example.com", &desktop()).await;
        assert!(matches!(result, Err(AuthError::Blocked)));
    }
}
