//! Configuration types for milter-alias.
//!
//! - [`ldap`]: directory connection, bind credentials and the two lookups
//! - [`socket`]: the milter socket specification

pub mod ldap;
pub mod socket;

use serde::{Deserialize, Serialize};

pub use self::{
    ldap::{Bind, LdapConfig, QueryDefinition},
    socket::{DEFAULT_SOCKET, Socket},
};
use crate::logging::LogLevel;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Unset means "use `LOG_LEVEL`, or warning".
    #[serde(default)]
    pub level: Option<LogLevel>,
}
