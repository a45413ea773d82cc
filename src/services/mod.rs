//! Services layer - Business logic
//!
//! This module contains the business logic for the authentication system.
//! Services are responsible for:
//! - Credential and token verification
//! - Device fingerprinting and cross-device conflict detection
//! - Orchestrating the login/logout/validate flows over the repositories

pub mod auth;
pub mod conflict;
pub mod device;
pub mod oauth;
pub mod password;
pub mod token;

pub use auth::{AuthError, AuthService, LoginInput, LoginOutcome, ValidationOutcome};
pub use conflict::{ConflictDetector, ConflictReport};
pub use device::{classify_user_agent, extract_client_ip, DeviceHints};
pub use oauth::{ExternalIdentity, HttpIdentityProvider, IdentityProvider};
pub use password::{hash_password, verify_password};
pub use token::{Claims, TokenError, TokenIssuer};
