//! Directory endpoint configuration.
//!
//! Configuration is immutable after construction and validated when built.
//! Search filters and distinguished names are always derived through the
//! methods on [`LdapConfig`], which sanitize every externally supplied
//! token before interpolation.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DirectoryError, DirectoryResult};

// ============================================================================
// Cache policy
// ============================================================================

/// Eviction and expiry policy for the group-membership cache.
///
/// The default caps the cache at zero entries, which disables caching:
/// operators opt in by raising the capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachePolicy {
    /// Maximum number of cached group entries.
    pub max_entries: u64,

    /// Time-to-live for a cached entry. `None` means entries only leave
    /// the cache through capacity eviction.
    pub time_to_live: Option<Duration>,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            max_entries: 0,
            time_to_live: None,
        }
    }
}

// ============================================================================
// Token sanitization
// ============================================================================

/// Strips a username or group name down to letters, digits, hyphen,
/// underscore, and period.
///
/// ## Security
///
/// Applied to every externally supplied token before it is embedded in a
/// search filter or distinguished name. A user supplying
/// `*)(objectClass=*` cannot widen or bypass a query.
#[must_use]
pub fn sanitize_token(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect()
}

// ============================================================================
// LDAP configuration
// ============================================================================

/// Connection and search parameters for the directory endpoint.
///
/// Loaded once at startup, never re-read afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LdapConfig {
    /// Directory server URI (`ldap://` or `ldaps://`).
    pub uri: String,

    /// Connection establishment timeout.
    pub connect_timeout: Duration,

    /// Per-operation read timeout.
    pub read_timeout: Duration,

    /// Base DN under which user entries live.
    pub user_filter: String,

    /// Base DN under which group entries live.
    pub group_filter: String,

    /// Attribute naming a user entry (forms the user RDN).
    pub user_name_attribute: String,

    /// Attribute naming a group entry.
    pub group_name_attribute: String,

    /// Multi-valued attribute linking a group to its member usernames.
    pub group_membership_attribute: String,

    /// Object class identifying group entries.
    pub group_class: String,

    /// Group names eligible to authorize access. Empty means unrestricted.
    pub restrict_to_groups: BTreeSet<String>,

    /// Policy for the group-membership cache.
    pub cache_policy: CachePolicy,
}

impl LdapConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> LdapConfigBuilder {
        LdapConfigBuilder::new()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> DirectoryResult<()> {
        let uri_lower = self.uri.to_lowercase();
        let host = uri_lower
            .strip_prefix("ldap://")
            .or_else(|| uri_lower.strip_prefix("ldaps://"))
            .ok_or_else(|| {
                DirectoryError::config("uri must use the ldap:// or ldaps:// scheme")
            })?;
        if host.is_empty() {
            return Err(DirectoryError::config("uri is missing a host"));
        }

        for (name, value) in [
            ("user_filter", &self.user_filter),
            ("group_filter", &self.group_filter),
            ("user_name_attribute", &self.user_name_attribute),
            ("group_name_attribute", &self.group_name_attribute),
            ("group_membership_attribute", &self.group_membership_attribute),
            ("group_class", &self.group_class),
        ] {
            if value.is_empty() {
                return Err(DirectoryError::config(format!("{name} cannot be empty")));
            }
        }

        if self.connect_timeout.is_zero() || self.read_timeout.is_zero() {
            return Err(DirectoryError::config("timeouts must be non-zero"));
        }

        Ok(())
    }

    /// Whether authorization is restricted to a configured group set.
    #[must_use]
    pub fn is_restricted(&self) -> bool {
        !self.restrict_to_groups.is_empty()
    }

    /// Builds the distinguished name for a user entry.
    ///
    /// The username is sanitized before it is placed in the RDN.
    #[must_use]
    pub fn user_dn(&self, username: &str) -> String {
        format!(
            "{}={},{}",
            self.user_name_attribute,
            sanitize_token(username),
            self.user_filter
        )
    }

    /// Filter matching every group the given user belongs to.
    #[must_use]
    pub fn groups_for_user_filter(&self, username: &str) -> String {
        format!(
            "(&({}={})(objectClass={}))",
            self.group_membership_attribute,
            sanitize_token(username),
            self.group_class
        )
    }

    /// Filter matching allow-listed groups the given user belongs to.
    ///
    /// ORs an equality clause per sanitized allow-list group name into the
    /// membership filter. Falls back to the unrestricted filter when no
    /// allow-list is configured.
    #[must_use]
    pub fn restricted_groups_filter(&self, username: &str) -> String {
        if self.restrict_to_groups.is_empty() {
            return self.groups_for_user_filter(username);
        }

        let clauses: String = self
            .restrict_to_groups
            .iter()
            .map(|g| format!("({}={})", self.group_name_attribute, sanitize_token(g)))
            .collect();

        format!(
            "(&(|{clauses})({}={})(objectClass={}))",
            self.group_membership_attribute,
            sanitize_token(username),
            self.group_class
        )
    }

    /// Filter matching a single group entry by name.
    #[must_use]
    pub fn group_members_filter(&self, group: &str) -> String {
        format!(
            "(&({}={})(objectClass={}))",
            self.group_name_attribute,
            sanitize_token(group),
            self.group_class
        )
    }
}

// ============================================================================
// Configuration builder
// ============================================================================

/// Builder for [`LdapConfig`].
///
/// Defaults mirror a conventional `ou=people` / `ou=groups` posixGroup
/// deployment with tight 500 ms timeouts and caching disabled.
#[derive(Debug)]
pub struct LdapConfigBuilder {
    uri: String,
    connect_timeout: Duration,
    read_timeout: Duration,
    user_filter: String,
    group_filter: String,
    user_name_attribute: String,
    group_name_attribute: String,
    group_membership_attribute: String,
    group_class: String,
    restrict_to_groups: BTreeSet<String>,
    cache_policy: CachePolicy,
}

impl Default for LdapConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LdapConfigBuilder {
    /// Creates a new builder with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            uri: "ldaps://www.example.com:636".to_string(),
            connect_timeout: Duration::from_millis(500),
            read_timeout: Duration::from_millis(500),
            user_filter: "ou=people,dc=example,dc=com".to_string(),
            group_filter: "ou=groups,dc=example,dc=com".to_string(),
            user_name_attribute: "cn".to_string(),
            group_name_attribute: "cn".to_string(),
            group_membership_attribute: "memberUid".to_string(),
            group_class: "posixGroup".to_string(),
            restrict_to_groups: BTreeSet::new(),
            cache_policy: CachePolicy::default(),
        }
    }

    /// Sets the directory server URI.
    #[must_use]
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the per-operation read timeout.
    #[must_use]
    pub const fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Sets the base DN for user entries.
    #[must_use]
    pub fn user_filter(mut self, dn: impl Into<String>) -> Self {
        self.user_filter = dn.into();
        self
    }

    /// Sets the base DN for group searches.
    #[must_use]
    pub fn group_filter(mut self, dn: impl Into<String>) -> Self {
        self.group_filter = dn.into();
        self
    }

    /// Sets the attribute naming a user entry.
    #[must_use]
    pub fn user_name_attribute(mut self, attr: impl Into<String>) -> Self {
        self.user_name_attribute = attr.into();
        self
    }

    /// Sets the attribute naming a group entry.
    #[must_use]
    pub fn group_name_attribute(mut self, attr: impl Into<String>) -> Self {
        self.group_name_attribute = attr.into();
        self
    }

    /// Sets the group-to-member linkage attribute.
    #[must_use]
    pub fn group_membership_attribute(mut self, attr: impl Into<String>) -> Self {
        self.group_membership_attribute = attr.into();
        self
    }

    /// Sets the object class identifying group entries.
    #[must_use]
    pub fn group_class(mut self, class: impl Into<String>) -> Self {
        self.group_class = class.into();
        self
    }

    /// Adds a group to the authorization allow-list.
    #[must_use]
    pub fn restrict_to_group(mut self, group: impl Into<String>) -> Self {
        self.restrict_to_groups.insert(group.into());
        self
    }

    /// Sets the group-membership cache policy.
    #[must_use]
    pub const fn cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> DirectoryResult<LdapConfig> {
        let config = LdapConfig {
            uri: self.uri,
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
            user_filter: self.user_filter,
            group_filter: self.group_filter,
            user_name_attribute: self.user_name_attribute,
            group_name_attribute: self.group_name_attribute,
            group_membership_attribute: self.group_membership_attribute,
            group_class: self.group_class,
            restrict_to_groups: self.restrict_to_groups,
            cache_policy: self.cache_policy,
        };
        config.validate()?;
        Ok(config)
    }
}
