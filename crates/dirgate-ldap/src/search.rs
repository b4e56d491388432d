//! Group-membership searches.
//!
//! Builds sanitized filters from the configuration, executes them, and
//! reduces the resulting entries to name sets. Entries missing an expected
//! attribute count as "no match" and are skipped, never fatal.

use std::collections::HashSet;
use std::sync::Arc;

use ldap3::SearchEntry;

use crate::config::LdapConfig;
use crate::connection::{DirectoryConn, DirectoryConnector};
use crate::error::{DirectoryError, DirectoryResult};

/// Reads a single-valued attribute off an entry.
fn require_attr<'a>(entry: &'a SearchEntry, attribute: &str) -> DirectoryResult<&'a str> {
    entry
        .attrs
        .get(attribute)
        .and_then(|values| values.first())
        .map(String::as_str)
        .ok_or_else(|| DirectoryError::MissingAttribute {
            dn: entry.dn.clone(),
            attribute: attribute.to_string(),
        })
}

/// Executes group queries against the directory.
#[derive(Debug, Clone)]
pub struct GroupDirectory {
    config: Arc<LdapConfig>,
    connector: DirectoryConnector,
}

impl GroupDirectory {
    /// Creates a query engine for the given endpoint.
    #[must_use]
    pub fn new(config: Arc<LdapConfig>) -> Self {
        let connector = DirectoryConnector::new(Arc::clone(&config));
        Self { config, connector }
    }

    /// Finds the groups the user belongs to, scoped to the caller's
    /// connection.
    ///
    /// When an allow-list is configured the search filter is already
    /// narrowed to it, and the result set is additionally retained against
    /// it, so the returned set is always a subset of the allow-list.
    pub async fn groups_for_user(
        &self,
        conn: &mut DirectoryConn,
        username: &str,
    ) -> DirectoryResult<HashSet<String>> {
        let filter = self.config.restricted_groups_filter(username);
        let entries = conn
            .search(
                &self.config.group_filter,
                &filter,
                &[self.config.group_name_attribute.as_str()],
            )
            .await?;

        Ok(self.collect_group_names(&entries))
    }

    /// Checks whether the user belongs to at least one allow-listed group.
    ///
    /// Cheaper than enumeration: only existence is tested. With no
    /// allow-list configured this is unconditionally true (no restriction).
    pub async fn user_in_restricted_group(
        &self,
        conn: &mut DirectoryConn,
        username: &str,
    ) -> DirectoryResult<bool> {
        if !self.config.is_restricted() {
            return Ok(true);
        }

        let filter = self.config.restricted_groups_filter(username);
        let entries = conn
            .search(
                &self.config.group_filter,
                &filter,
                &[self.config.group_name_attribute.as_str()],
            )
            .await?;

        Ok(!entries.is_empty())
    }

    /// Finds the member usernames of a group.
    ///
    /// Opens its own anonymous connection, independent of any user bind,
    /// and closes it on every path. The multi-valued membership attribute
    /// of every matching entry is flattened into one set.
    pub async fn members_of_group(&self, group: &str) -> DirectoryResult<HashSet<String>> {
        let filter = self.config.group_members_filter(group);

        let mut conn = self.connector.open_anonymous().await?;
        let outcome = conn
            .search(
                &self.config.group_filter,
                &filter,
                &[self.config.group_membership_attribute.as_str()],
            )
            .await;
        conn.close().await;

        Ok(self.collect_members(&outcome?))
    }

    /// Reduces group entries to their deduplicated names, retaining only
    /// allow-listed names when a restriction is configured.
    fn collect_group_names(&self, entries: &[SearchEntry]) -> HashSet<String> {
        let mut groups = HashSet::new();
        for entry in entries {
            match require_attr(entry, &self.config.group_name_attribute) {
                Ok(name) => {
                    groups.insert(name.to_string());
                }
                Err(err) => tracing::debug!("skipping group entry: {err}"),
            }
        }

        if self.config.is_restricted() {
            groups.retain(|g| self.config.restrict_to_groups.contains(g));
        }
        groups
    }

    /// Flattens the membership attribute of group entries into one set.
    fn collect_members(&self, entries: &[SearchEntry]) -> HashSet<String> {
        let mut members = HashSet::new();
        for entry in entries {
            match entry.attrs.get(&self.config.group_membership_attribute) {
                Some(values) => members.extend(values.iter().cloned()),
                None => tracing::debug!(
                    "skipping group entry: {}",
                    DirectoryError::MissingAttribute {
                        dn: entry.dn.clone(),
                        attribute: self.config.group_membership_attribute.clone(),
                    }
                ),
            }
        }
        members
    }
}
