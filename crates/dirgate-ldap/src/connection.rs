//! Directory connections.
//!
//! One connection per bind or search attempt, never pooled or shared.
//! Callers own the returned [`DirectoryConn`] and must call
//! [`DirectoryConn::close`] on every exit path once their operations
//! finish, including error paths.

use std::sync::Arc;
use std::time::Duration;

use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};

use crate::config::LdapConfig;
use crate::error::{DirectoryError, DirectoryResult};

/// Opens anonymous and bound connections to the configured endpoint.
#[derive(Debug, Clone)]
pub struct DirectoryConnector {
    config: Arc<LdapConfig>,
}

impl DirectoryConnector {
    /// Creates a connector for the given endpoint configuration.
    #[must_use]
    pub fn new(config: Arc<LdapConfig>) -> Self {
        Self { config }
    }

    /// Returns the endpoint configuration.
    #[must_use]
    pub fn config(&self) -> &LdapConfig {
        &self.config
    }

    /// Opens an anonymous connection.
    ///
    /// Used for health checks and group-membership discovery, which do not
    /// require an authenticated read in this threat model.
    pub async fn open_anonymous(&self) -> DirectoryResult<DirectoryConn> {
        let mut ldap = self.connect().await?;
        let outcome = ldap
            .with_timeout(self.config.read_timeout)
            .simple_bind("", "")
            .await
            .map_err(DirectoryError::from)
            .and_then(|res| {
                res.success()
                    .map_err(|e| DirectoryError::unavailable(format!("anonymous bind failed: {e}")))
            });

        match outcome {
            Ok(_) => Ok(DirectoryConn {
                ldap,
                read_timeout: self.config.read_timeout,
            }),
            Err(err) => {
                // The bind failed; release the transport before reporting.
                let _ = ldap.unbind().await;
                Err(err)
            }
        }
    }

    /// Opens a connection bound as the given principal.
    ///
    /// A rejected bind surfaces as [`DirectoryError::Rejected`]; any
    /// transport or protocol fault surfaces as
    /// [`DirectoryError::Unavailable`]. A single attempt is made, with no
    /// retries: authentication must not silently retry with stale
    /// credentials.
    ///
    /// ## Security
    ///
    /// The password is never logged. On success the connection carries the
    /// user's identity; it is closed after use, never reused.
    pub async fn open_bound(&self, dn: &str, password: &str) -> DirectoryResult<DirectoryConn> {
        let mut ldap = self.connect().await?;
        let outcome = ldap
            .with_timeout(self.config.read_timeout)
            .simple_bind(dn, password)
            .await
            .map_err(DirectoryError::from)
            .and_then(|res| res.success().map_err(DirectoryError::from));

        match outcome {
            Ok(_) => Ok(DirectoryConn {
                ldap,
                read_timeout: self.config.read_timeout,
            }),
            Err(err) => {
                // The bind failed; release the transport before reporting.
                let _ = ldap.unbind().await;
                Err(err)
            }
        }
    }

    /// Establishes the underlying transport, applying the connect timeout.
    async fn connect(&self) -> DirectoryResult<Ldap> {
        let settings = LdapConnSettings::new().set_conn_timeout(self.config.connect_timeout);

        let (conn, ldap) = LdapConnAsync::with_settings(settings, &self.config.uri)
            .await
            .map_err(DirectoryError::from)?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                tracing::warn!("directory connection driver error: {e}");
            }
        });

        Ok(ldap)
    }
}

/// A live connection, anonymous or bound.
///
/// Holds the read timeout so every operation issued through it is bounded.
#[derive(Debug)]
pub struct DirectoryConn {
    ldap: Ldap,
    read_timeout: Duration,
}

impl DirectoryConn {
    /// Runs a subtree search and returns the fully materialized entries.
    ///
    /// The result stream is exhausted before returning, so a partially
    /// failed search never leaves a dangling cursor.
    pub async fn search(
        &mut self,
        base: &str,
        filter: &str,
        attrs: &[&str],
    ) -> DirectoryResult<Vec<SearchEntry>> {
        let (entries, _result) = self
            .ldap
            .with_timeout(self.read_timeout)
            .search(base, Scope::Subtree, filter, attrs.to_vec())
            .await
            .map_err(DirectoryError::from)?
            .success()
            .map_err(DirectoryError::from)?;

        Ok(entries.into_iter().map(SearchEntry::construct).collect())
    }

    /// Unbinds and closes the connection.
    ///
    /// An unbind failure is ignored: the server is closing the transport
    /// either way.
    pub async fn close(mut self) {
        let _ = self.ldap.unbind().await;
    }
}
