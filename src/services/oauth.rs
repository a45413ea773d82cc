//! OAuth identity bridge
//!
//! Resolves an externally-issued access token into a verified identity by
//! calling the provider's userinfo endpoint. The bridge only answers "who is
//! this token for"; turning that identity into a local user and session is
//! the orchestrator's job.

use async_trait::async_trait;
use serde::Deserialize;

/// A verified identity returned by the external provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ExternalIdentity {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
}

impl ExternalIdentity {
    /// Derive a display name from provider metadata, falling back to the
    /// local part of the email.
    pub fn display_name(&self) -> String {
        if let Some(name) = self.name.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.trim().to_string();
        }
        if let Some(given) = self.given_name.as_deref().filter(|n| !n.trim().is_empty()) {
            return given.trim().to_string();
        }
        self.email
            .split('@')
            .next()
            .unwrap_or(&self.email)
            .to_string()
    }
}

/// Errors from resolving an external access token.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The provider rejected the access token.
    #[error("Identity provider rejected the access token")]
    Unauthorized,

    /// The provider returned an identity without an email address.
    #[error("Identity provider returned no email address")]
    MissingEmail,

    /// The provider could not be reached or returned an unexpected response.
    #[error("Identity provider request failed: {0}")]
    Provider(#[from] anyhow::Error),
}

/// Exchanges an access token for a verified external identity.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve(&self, access_token: &str) -> Result<ExternalIdentity, IdentityError>;
}

/// Resolves tokens against an OIDC-style userinfo endpoint over HTTPS.
pub struct HttpIdentityProvider {
    client: reqwest::Client,
    userinfo_url: String,
}

impl HttpIdentityProvider {
    pub fn new(userinfo_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            userinfo_url: userinfo_url.into(),
        }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn resolve(&self, access_token: &str) -> Result<ExternalIdentity, IdentityError> {
        let response = self
            .client
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| IdentityError::Provider(anyhow::anyhow!(e)))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Err(IdentityError::Unauthorized);
        }

        if !response.status().is_success() {
            return Err(IdentityError::Provider(anyhow::anyhow!(
                "Userinfo endpoint returned {}",
                response.status()
            )));
        }

        let identity: ExternalIdentity = response
            .json()
            .await
            .map_err(|e| IdentityError::Provider(anyhow::anyhow!(e)))?;

        if identity.email.trim().is_empty() {
            return Err(IdentityError::MissingEmail);
        }

        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_prefers_full_name() {
        let identity = ExternalIdentity {
            email: "jamie@example.com".to_string(),
            name: Some("Jamie Smith".to_string()),
            given_name: Some("Jamie".to_string()),
        };
        assert_eq!(identity.display_name(), "Jamie Smith");
    }

    #[test]
    fn test_display_name_falls_back_to_given_name() {
        let identity = ExternalIdentity {
            email: "jamie@example.com".to_string(),
            name: Some("   ".to_string()),
            given_name: Some("Jamie".to_string()),
        };
        assert_eq!(identity.display_name(), "Jamie");
    }

    #[test]
    fn test_display_name_falls_back_to_email_local_part() {
        let identity = ExternalIdentity {
            email: "jamie.smith@example.com".to_string(),
            name: None,
            given_name: None,
        };
        assert_eq!(identity.display_name(), "jamie.smith");
    }

    #[test]
    fn test_identity_deserializes_from_userinfo_payload() {
        let identity: ExternalIdentity = serde_json::from_str(
            r#"{"email": "a@b.com", "name": "A B", "picture": "https://x/y.png"}"#,
        )
        .expect("Failed to deserialize");
        assert_eq!(identity.email, "a@b.com");
        assert_eq!(identity.name.as_deref(), Some("A B"));
        assert!(identity.given_name.is_none());
    }
}
