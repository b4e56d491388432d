//! Credentials and the authenticated principal.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A username/password pair supplied for one authentication attempt.
///
/// Never persisted and never logged; the `Debug` output redacts the
/// password.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Creates credentials for a single authentication attempt.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// The username as supplied by the caller, unsanitized.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The raw password, passed verbatim to the directory bind.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A successfully authenticated identity with its granted groups.
///
/// The group set is unordered, deduplicated, and a subset of the
/// configured allow-list whenever one is configured. Created only after a
/// successful bind and group search; not cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LdapUser {
    name: String,
    roles: HashSet<String>,
}

impl LdapUser {
    /// Creates a principal from a sanitized username and its granted groups.
    #[must_use]
    pub fn new(name: impl Into<String>, roles: HashSet<String>) -> Self {
        Self {
            name: name.into(),
            roles,
        }
    }

    /// The sanitized username.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The granted groups.
    #[must_use]
    pub fn roles(&self) -> &HashSet<String> {
        &self.roles
    }

    /// Checks whether a role was granted to this principal.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}
