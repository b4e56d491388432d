//! # dirgate-ldap
//!
//! Directory protocol layer for dirgate: configuration, connections,
//! and group-membership searches against an LDAP server using `ldap3`.
//!
//! ## Security
//!
//! - Every externally supplied token embedded in a search filter or
//!   distinguished name is sanitized first (see [`config::sanitize_token`]).
//! - Connections are opened once per operation and closed on every exit
//!   path; they are never pooled or shared across operations.
//! - Bind credentials are never logged.

#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(missing_docs)]

pub mod config;
pub mod connection;
pub mod error;
pub mod search;

pub use config::{sanitize_token, CachePolicy, LdapConfig, LdapConfigBuilder};
pub use connection::{DirectoryConn, DirectoryConnector};
pub use error::{DirectoryError, DirectoryResult};
pub use search::GroupDirectory;
