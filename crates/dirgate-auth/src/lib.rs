//! # dirgate-auth
//!
//! Authentication and authorization policy on top of `dirgate-ldap`.
//!
//! The core flow: bind as the user to validate the password, discover
//! group memberships over the same connection, intersect them with the
//! configured allow-list, and hand the caller an [`LdapUser`] carrying the
//! granted groups. Role checks are served from a single-flight
//! group-membership cache instead of a fresh bind.
//!
//! ## Security
//!
//! - Wrong credentials are a denial, never an error; infrastructure
//!   failures are an error, never a silent denial.
//! - A degraded directory denies role-based authorization (cache entries
//!   fail safe to the empty member set).
//! - Passwords are never logged and never persisted.

#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(missing_docs)]

pub mod access;
pub mod authenticator;
pub mod error;
pub mod health;
pub mod principal;
pub mod roles;

pub use access::{AccessPolicy, AccessRule};
pub use authenticator::{BindDirectory, DirectoryBinder, LdapAuthenticator};
pub use error::{AuthError, AuthResult};
pub use health::LdapHealthCheck;
pub use principal::{Credentials, LdapUser};
pub use roles::{GroupLoader, GroupMembershipCache};
