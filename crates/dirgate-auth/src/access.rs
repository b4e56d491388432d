//! Declarative access rules.
//!
//! The framework-independent core of roles-allowed dispatch: a resource
//! carries an optional rule at the method position and an optional rule at
//! the class position, and the effective rule is resolved by precedence:
//!
//! 1. `DenyAll` on the method
//! 2. `RolesAllowed` on the method
//! 3. `PermitAll` on the method (no restriction)
//! 4. `RolesAllowed` on the class
//! 5. otherwise unrestricted
//!
//! `DenyAll` and `PermitAll` are not honored at the class position. How
//! rules are attached to handlers (annotations, route metadata) is the
//! host framework's concern.

use crate::principal::LdapUser;

/// A tagged access rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessRule {
    /// No caller is permitted.
    DenyAll,
    /// Only authenticated callers granted one of these roles are
    /// permitted.
    RolesAllowed(Vec<String>),
    /// Every caller is permitted.
    PermitAll,
}

impl AccessRule {
    /// Convenience constructor for a roles-allowed rule.
    #[must_use]
    pub fn roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::RolesAllowed(roles.into_iter().map(Into::into).collect())
    }

    /// Evaluates this rule against an (optionally authenticated) caller.
    #[must_use]
    pub fn permits(&self, user: Option<&LdapUser>) -> bool {
        match self {
            Self::DenyAll => false,
            Self::PermitAll => true,
            Self::RolesAllowed(roles) => match user {
                Some(user) => roles.iter().any(|role| user.has_role(role)),
                None => false,
            },
        }
    }
}

/// Access rules attached to one resource, method-then-class.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    /// Rule on the method position.
    pub method: Option<AccessRule>,
    /// Rule on the class position.
    pub class: Option<AccessRule>,
}

impl AccessPolicy {
    /// Resolves the effective rule; `None` means unrestricted.
    #[must_use]
    pub fn resolve(&self) -> Option<&AccessRule> {
        match &self.method {
            Some(rule @ AccessRule::DenyAll) => Some(rule),
            Some(rule @ AccessRule::RolesAllowed(_)) => Some(rule),
            Some(AccessRule::PermitAll) => None,
            None => match &self.class {
                Some(rule @ AccessRule::RolesAllowed(_)) => Some(rule),
                _ => None,
            },
        }
    }

    /// Resolves and evaluates in one step; unrestricted permits everyone.
    #[must_use]
    pub fn permits(&self, user: Option<&LdapUser>) -> bool {
        self.resolve().map_or(true, |rule| rule.permits(user))
    }
}
