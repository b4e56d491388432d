//! Directory health check.

use std::sync::Arc;

use crate::authenticator::LdapAuthenticator;

/// Reports whether the configured directory endpoint is reachable.
///
/// Healthy iff an anonymous connection can be opened and closed. Never
/// returns an error: an unreachable or misconfigured endpoint is simply
/// unhealthy.
#[derive(Debug, Clone)]
pub struct LdapHealthCheck {
    authenticator: Arc<LdapAuthenticator>,
}

impl LdapHealthCheck {
    /// Creates a health check over the given authenticator.
    #[must_use]
    pub fn new(authenticator: Arc<LdapAuthenticator>) -> Self {
        Self { authenticator }
    }

    /// Probes the endpoint.
    pub async fn check(&self) -> bool {
        self.authenticator.can_authenticate().await
    }
}
