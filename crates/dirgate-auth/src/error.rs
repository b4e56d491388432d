//! Authentication error type.
//!
//! Only infrastructure failures surface here. A rejected bind is handled
//! inside the authenticator and mapped to a denial before it can reach
//! this type.

use dirgate_ldap::DirectoryError;
use thiserror::Error;

/// Errors raised during an authentication attempt.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The directory could not be reached or misbehaved.
    #[error("authentication failed against the directory: {0}")]
    Directory(#[from] DirectoryError),
}

impl AuthError {
    /// Checks whether the directory was unreachable, as opposed to any
    /// other fault. Health checks and callers that retry care about the
    /// difference between "down" and "wrong password".
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        match self {
            Self::Directory(err) => err.is_unavailable(),
        }
    }
}

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;
