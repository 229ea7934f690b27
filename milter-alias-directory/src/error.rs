//! Errors raised while talking to the directory.

use std::{collections::TryReserveError, fmt};

use ldap3::LdapError;
use thiserror::Error;

/// What the directory (or the client library) said went wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdapStatus {
    /// The LDAP result code, when the server answered with one.
    pub code: Option<u32>,
    pub message: String,
}

impl LdapStatus {
    pub fn new(code: Option<u32>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<&LdapError> for LdapStatus {
    fn from(err: &LdapError) -> Self {
        match err {
            LdapError::LdapResult { result } => {
                let message = if result.text.is_empty() {
                    describe(result.rc).to_string()
                } else {
                    result.text.clone()
                };

                Self::new(Some(result.rc), message)
            }
            other => Self::new(None, other.to_string()),
        }
    }
}

impl fmt::Display for LdapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} ({code})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Short names for the result codes a mail filter is likely to meet.
const fn describe(code: u32) -> &'static str {
    match code {
        0 => "Success",
        1 => "Operations error",
        2 => "Protocol error",
        3 => "Time limit exceeded",
        4 => "Size limit exceeded",
        32 => "No such object",
        34 => "Invalid DN syntax",
        48 => "Inappropriate authentication",
        49 => "Invalid credentials",
        50 => "Insufficient access",
        51 => "Server is busy",
        52 => "Server is unavailable",
        53 => "Server is unwilling to perform",
        _ => "Unknown result code",
    }
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The directory could not be reached at all.
    #[error("Failed to connect to {url}: {status}")]
    Connect { url: String, status: LdapStatus },

    #[error("Bind as {dn} failed: {status}")]
    Bind { dn: String, status: LdapStatus },

    #[error("Search failed: {status}")]
    Search { status: LdapStatus },

    #[error("Unbind failed: {status}")]
    Unbind { status: LdapStatus },

    /// The client was used after [`crate::LdapDirectory::disconnect`].
    #[error("Not connected to the directory")]
    NotConnected,

    /// LDAP strings are UTF-8; a substituted base or filter was not.
    #[error("Query {field} is not valid UTF-8 after substitution")]
    Encoding { field: &'static str },

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(#[from] TryReserveError),
}

impl DirectoryError {
    /// The LDAP result code behind this error, if there is one.
    pub const fn code(&self) -> Option<u32> {
        match self {
            Self::Connect { status, .. }
            | Self::Bind { status, .. }
            | Self::Search { status }
            | Self::Unbind { status } => status.code,
            Self::NotConnected | Self::Encoding { .. } | Self::ResourceExhausted(_) => None,
        }
    }

    /// Returns `true` for failures of the local process rather than of the
    /// directory.
    pub const fn is_resource_exhaustion(&self) -> bool {
        matches!(self, Self::ResourceExhausted(_))
    }
}
