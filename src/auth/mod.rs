//! Identity lookup
//!
//! The ledger only needs a stable user id per request. `Authenticator` is
//! the seam; `JwtAuthenticator` verifies HS256 bearer tokens whose `sub`
//! claim is that id.

pub mod jwt;

use crate::ledger::types::UserId;

pub use jwt::{Claims, JwtAuthenticator};

/// Caller identity injected into request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing credentials")]
    MissingCredentials,

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

/// Resolve a bearer token to a user
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;
}
