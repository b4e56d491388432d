//! The directory authenticator.
//!
//! Both entry points share one sanitize-bind-search sequence and differ
//! only in the group query strategy: [`LdapAuthenticator::authenticate`]
//! enumerates the granted groups, [`LdapAuthenticator::authenticate_simple`]
//! only tests for the existence of an allow-listed membership. The
//! bind-and-query exchange sits behind the [`BindDirectory`] seam, like
//! the loader seam of the role cache, so the allow-list policy is
//! testable without a live server.
//!
//! ## Security
//!
//! - The username is sanitized before it is embedded in the bind DN.
//! - A rejected bind is logged at debug level, without the credential.
//! - The connection opened for an attempt is closed on every exit path,
//!   including group-search failures.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dirgate_ldap::{
    sanitize_token, DirectoryConn, DirectoryConnector, DirectoryResult, GroupDirectory,
    LdapConfig,
};

use crate::error::AuthResult;
use crate::principal::{Credentials, LdapUser};

/// One bind-and-query exchange against the directory.
///
/// `Ok(None)` from the bind methods means the server rejected the
/// credentials; errors are infrastructure faults.
#[async_trait]
pub trait BindDirectory: Send + Sync {
    /// Binds as `dn`, then enumerates the groups of `username` over the
    /// bound connection.
    async fn bind_and_enumerate(
        &self,
        dn: &str,
        password: &str,
        username: &str,
    ) -> DirectoryResult<Option<HashSet<String>>>;

    /// Binds as `dn`, then checks whether `username` belongs to at least
    /// one allow-listed group.
    async fn bind_and_check(
        &self,
        dn: &str,
        password: &str,
        username: &str,
    ) -> DirectoryResult<Option<bool>>;

    /// Opens and closes an anonymous connection.
    async fn probe(&self) -> DirectoryResult<()>;
}

/// The production exchange: a connector plus the group query engine.
#[derive(Debug, Clone)]
pub struct DirectoryBinder {
    connector: DirectoryConnector,
    groups: GroupDirectory,
}

impl DirectoryBinder {
    /// Creates a binder for the given endpoint.
    #[must_use]
    pub fn new(config: Arc<LdapConfig>) -> Self {
        Self {
            connector: DirectoryConnector::new(Arc::clone(&config)),
            groups: GroupDirectory::new(config),
        }
    }

    /// Returns the group query engine behind this binder.
    #[must_use]
    pub fn groups(&self) -> &GroupDirectory {
        &self.groups
    }

    /// Binds as the user; `None` means the credentials were rejected.
    async fn bind(&self, dn: &str, password: &str) -> DirectoryResult<Option<DirectoryConn>> {
        match self.connector.open_bound(dn, password).await {
            Ok(conn) => Ok(Some(conn)),
            Err(err) if err.is_rejected() => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl BindDirectory for DirectoryBinder {
    async fn bind_and_enumerate(
        &self,
        dn: &str,
        password: &str,
        username: &str,
    ) -> DirectoryResult<Option<HashSet<String>>> {
        let Some(mut conn) = self.bind(dn, password).await? else {
            return Ok(None);
        };
        let outcome = self.groups.groups_for_user(&mut conn, username).await;
        conn.close().await;
        Ok(Some(outcome?))
    }

    async fn bind_and_check(
        &self,
        dn: &str,
        password: &str,
        username: &str,
    ) -> DirectoryResult<Option<bool>> {
        let Some(mut conn) = self.bind(dn, password).await? else {
            return Ok(None);
        };
        let outcome = self.groups.user_in_restricted_group(&mut conn, username).await;
        conn.close().await;
        Ok(Some(outcome?))
    }

    async fn probe(&self) -> DirectoryResult<()> {
        let conn = self.connector.open_anonymous().await?;
        conn.close().await;
        Ok(())
    }
}

/// Authenticates credentials against the directory and applies the
/// allow-list policy.
#[derive(Debug, Clone)]
pub struct LdapAuthenticator<D = DirectoryBinder> {
    config: Arc<LdapConfig>,
    directory: D,
}

impl LdapAuthenticator {
    /// Creates an authenticator for the given endpoint configuration.
    #[must_use]
    pub fn new(config: LdapConfig) -> Self {
        let config = Arc::new(config);
        let directory = DirectoryBinder::new(Arc::clone(&config));
        Self { config, directory }
    }

    /// Returns the group query engine backing this authenticator.
    ///
    /// The role cache is built over the same engine so role lookups hit
    /// the same endpoint and attribute mapping.
    #[must_use]
    pub fn groups(&self) -> &GroupDirectory {
        self.directory.groups()
    }
}

impl<D: BindDirectory> LdapAuthenticator<D> {
    /// Creates an authenticator over a custom directory exchange.
    #[must_use]
    pub fn with_directory(config: LdapConfig, directory: D) -> Self {
        Self {
            config: Arc::new(config),
            directory,
        }
    }

    /// Returns the endpoint configuration.
    #[must_use]
    pub fn config(&self) -> &LdapConfig {
        &self.config
    }

    /// Full authentication: bind as the user, then enumerate the granted
    /// groups.
    ///
    /// Returns `Ok(Some(user))` with the granted group set on success,
    /// `Ok(None)` when the credentials are wrong or the user belongs to no
    /// allow-listed group, and `Err` only for infrastructure failures.
    /// With a restriction configured, the granted set is always a
    /// non-empty subset of the allow-list.
    pub async fn authenticate(&self, credentials: &Credentials) -> AuthResult<Option<LdapUser>> {
        let username = sanitize_token(credentials.username());
        let dn = self.config.user_dn(&username);

        let Some(mut groups) = self
            .directory
            .bind_and_enumerate(&dn, credentials.password(), &username)
            .await?
        else {
            tracing::debug!(username = %username, "failed to authenticate");
            return Ok(None);
        };

        if self.config.is_restricted() {
            groups.retain(|g| self.config.restrict_to_groups.contains(g));
            if groups.is_empty() {
                tracing::debug!(username = %username, "authenticated but not in any permitted group");
                return Ok(None);
            }
        }

        Ok(Some(LdapUser::new(username, groups)))
    }

    /// Simple authentication: bind as the user, then check allow-listed
    /// membership existence without enumerating groups.
    ///
    /// With no allow-list configured, a successful bind is sufficient.
    pub async fn authenticate_simple(&self, credentials: &Credentials) -> AuthResult<bool> {
        let username = sanitize_token(credentials.username());
        let dn = self.config.user_dn(&username);

        match self
            .directory
            .bind_and_check(&dn, credentials.password(), &username)
            .await?
        {
            None => {
                tracing::debug!(username = %username, "failed to authenticate");
                Ok(false)
            }
            Some(authorized) => {
                if !authorized {
                    tracing::debug!(username = %username, "authenticated but not in any permitted group");
                }
                Ok(authorized)
            }
        }
    }

    /// Attempts an anonymous connection open/close against the endpoint.
    ///
    /// Never errors: any failure means "cannot authenticate right now".
    pub async fn can_authenticate(&self) -> bool {
        match self.directory.probe().await {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!("directory endpoint not reachable: {err}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use dirgate_ldap::DirectoryError;

    /// Stands in for a directory with a fixed answer per attempt.
    struct StubDirectory {
        accept: bool,
        groups: HashSet<String>,
        in_restricted_group: bool,
    }

    impl StubDirectory {
        fn accepting(groups: &[&str]) -> Self {
            Self {
                accept: true,
                groups: groups.iter().map(ToString::to_string).collect(),
                in_restricted_group: !groups.is_empty(),
            }
        }

        fn rejecting() -> Self {
            Self {
                accept: false,
                groups: HashSet::new(),
                in_restricted_group: false,
            }
        }
    }

    #[async_trait]
    impl BindDirectory for StubDirectory {
        async fn bind_and_enumerate(
            &self,
            _dn: &str,
            _password: &str,
            _username: &str,
        ) -> DirectoryResult<Option<HashSet<String>>> {
            if self.accept {
                Ok(Some(self.groups.clone()))
            } else {
                Ok(None)
            }
        }

        async fn bind_and_check(
            &self,
            _dn: &str,
            _password: &str,
            _username: &str,
        ) -> DirectoryResult<Option<bool>> {
            if self.accept {
                Ok(Some(self.in_restricted_group))
            } else {
                Ok(None)
            }
        }

        async fn probe(&self) -> DirectoryResult<()> {
            if self.accept {
                Ok(())
            } else {
                Err(DirectoryError::unavailable("connection refused"))
            }
        }
    }

    fn restricted_config() -> LdapConfig {
        LdapConfig::builder()
            .uri("ldaps://ldap.example.com:636")
            .restrict_to_group("admins")
            .build()
            .unwrap()
    }

    fn open_config() -> LdapConfig {
        LdapConfig::builder()
            .uri("ldaps://ldap.example.com:636")
            .build()
            .unwrap()
    }

    fn unreachable_authenticator(restricted: bool) -> LdapAuthenticator {
        let mut builder = LdapConfig::builder()
            .uri("ldap://127.0.0.1:1")
            .connect_timeout(Duration::from_millis(200))
            .read_timeout(Duration::from_millis(200));
        if restricted {
            builder = builder.restrict_to_group("admins");
        }
        LdapAuthenticator::new(builder.build().unwrap())
    }

    #[tokio::test]
    async fn granted_groups_are_a_subset_of_the_allow_list() {
        // alice is in admins and users; only admins is allow-listed.
        let authenticator = LdapAuthenticator::with_directory(
            restricted_config(),
            StubDirectory::accepting(&["admins", "users"]),
        );
        let user = authenticator
            .authenticate(&Credentials::new("alice", "hunter2"))
            .await
            .unwrap()
            .expect("alice should authenticate");

        assert_eq!(user.name(), "alice");
        assert_eq!(user.roles(), &HashSet::from(["admins".to_string()]));
    }

    #[tokio::test]
    async fn bound_user_without_allow_listed_group_is_denied_not_errored() {
        // bob's password is correct but he is only in users.
        let authenticator = LdapAuthenticator::with_directory(
            restricted_config(),
            StubDirectory::accepting(&["users"]),
        );
        let outcome = authenticator
            .authenticate(&Credentials::new("bob", "hunter2"))
            .await
            .unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn rejected_credentials_are_a_denial_on_both_paths() {
        let authenticator =
            LdapAuthenticator::with_directory(restricted_config(), StubDirectory::rejecting());
        let creds = Credentials::new("alice", "wrong");

        assert!(authenticator.authenticate(&creds).await.unwrap().is_none());
        assert!(!authenticator.authenticate_simple(&creds).await.unwrap());
    }

    #[tokio::test]
    async fn empty_allow_list_authenticates_on_bind_alone() {
        let authenticator =
            LdapAuthenticator::with_directory(open_config(), StubDirectory::accepting(&[]));
        let user = authenticator
            .authenticate(&Credentials::new("alice", "hunter2"))
            .await
            .unwrap()
            .expect("no restriction configured");
        assert!(user.roles().is_empty());
    }

    #[tokio::test]
    async fn health_reflects_the_probe_outcome() {
        let healthy =
            LdapAuthenticator::with_directory(open_config(), StubDirectory::accepting(&[]));
        assert!(healthy.can_authenticate().await);

        let unhealthy =
            LdapAuthenticator::with_directory(open_config(), StubDirectory::rejecting());
        assert!(!unhealthy.can_authenticate().await);
    }

    #[tokio::test]
    async fn unreachable_directory_is_an_error_not_a_denial() {
        let authenticator = unreachable_authenticator(true);
        let creds = Credentials::new("alice", "hunter2");

        let err = authenticator.authenticate(&creds).await.unwrap_err();
        assert!(err.is_unavailable());

        let err = authenticator.authenticate_simple(&creds).await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn health_is_false_against_unreachable_endpoint_without_error() {
        let authenticator = unreachable_authenticator(false);
        assert!(!authenticator.can_authenticate().await);
    }

    #[test]
    fn bind_dn_uses_sanitized_username() {
        let authenticator = unreachable_authenticator(false);
        let dn = authenticator.config().user_dn("ali*)(ce");
        assert_eq!(dn, "cn=alice,ou=people,dc=example,dc=com");
    }
}
