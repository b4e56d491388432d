//! Directory error taxonomy.
//!
//! ## Security Note
//!
//! A rejected bind is an expected outcome and is kept distinct from
//! infrastructure failures, so callers can map it to a denial instead of
//! surfacing an error. Error messages never contain credentials.

use thiserror::Error;

/// Errors raised by the directory layer.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Invalid configuration.
    #[error("directory configuration error: {0}")]
    Configuration(String),

    /// The server rejected the bind credentials (LDAP result code 49).
    ///
    /// This is the "wrong username or password" outcome, not a fault.
    #[error("directory bind rejected")]
    Rejected,

    /// Connection, protocol, or timeout failure talking to the directory.
    #[error("directory unavailable: {0}")]
    Unavailable(String),

    /// A search result entry lacks an expected attribute.
    ///
    /// Treated by callers as "no match" for that entry, never fatal to the
    /// overall query.
    #[error("entry {dn} is missing attribute {attribute}")]
    MissingAttribute {
        /// Distinguished name of the offending entry.
        dn: String,
        /// The attribute that was expected.
        attribute: String,
    },
}

impl DirectoryError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates an unavailability error.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Checks whether this error is a credential rejection.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected)
    }

    /// Checks whether this error is an infrastructure failure.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// LDAP result code for invalidCredentials (RFC 4511).
const RC_INVALID_CREDENTIALS: u32 = 49;

impl From<ldap3::LdapError> for DirectoryError {
    fn from(err: ldap3::LdapError) -> Self {
        match err {
            ldap3::LdapError::LdapResult { ref result }
                if result.rc == RC_INVALID_CREDENTIALS =>
            {
                Self::Rejected
            }
            other => Self::Unavailable(other.to_string()),
        }
    }
}

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn ldap_result(rc: u32) -> ldap3::LdapError {
        ldap3::LdapError::LdapResult {
            result: ldap3::LdapResult {
                rc,
                matched: String::new(),
                text: String::new(),
                refs: vec![],
                ctrls: vec![],
            },
        }
    }

    #[test]
    fn invalid_credentials_maps_to_rejected() {
        let err = DirectoryError::from(ldap_result(49));
        assert!(err.is_rejected());
        assert!(!err.is_unavailable());
    }

    #[test]
    fn other_result_codes_map_to_unavailable() {
        // 52 = unavailable, 32 = noSuchObject
        assert!(DirectoryError::from(ldap_result(52)).is_unavailable());
        assert!(DirectoryError::from(ldap_result(32)).is_unavailable());
    }

    #[test]
    fn rejection_message_has_no_detail() {
        let msg = DirectoryError::Rejected.to_string();
        assert_eq!(msg, "directory bind rejected");
    }
}
