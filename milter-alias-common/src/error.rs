//! Error types shared by the milter-alias crates.

use std::{collections::TryReserveError, io, path::PathBuf};

use thiserror::Error;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required configuration value is missing or empty.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A configuration value is present but unusable.
    #[error("Invalid configuration for {field}: {reason}")]
    InvalidConfiguration { field: &'static str, reason: String },

    #[error("Invalid socket specification {0:?}, expected unix:/path, local:/path, /path or inet:port@host")]
    InvalidSocket(String),

    #[error("Invalid log level {0:?}, expected a syslog level name or a number between 0 and 7")]
    InvalidLogLevel(String),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

/// Errors that end a single mail transaction, but not the process.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Memory for the transaction's state could not be obtained.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(#[from] TryReserveError),
}

#[cfg(test)]
mod tests {
    use std::error::Error as StdError;

    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingField("ldap.host");
        assert_eq!(err.to_string(), "Missing required field: ldap.host");

        let err = ConfigError::InvalidConfiguration {
            field: "ldap.bind",
            reason: "a bind dn needs a password".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid configuration for ldap.bind: a bind dn needs a password"
        );
    }

    #[test]
    fn test_read_error_keeps_source() {
        let err = ConfigError::Read {
            path: PathBuf::from("/etc/milter-alias/milter-alias.config.ron"),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };

        assert!(err.source().is_some());
        assert_eq!(
            err.to_string(),
            "Failed to read /etc/milter-alias/milter-alias.config.ron: no such file"
        );
    }

    #[test]
    fn test_session_error_from_reserve() {
        let reserve = Vec::<u8>::new().try_reserve(usize::MAX);
        let Err(source) = reserve else {
            panic!("reserving usize::MAX bytes must fail");
        };

        let err = SessionError::from(source);
        assert!(err.to_string().starts_with("Resource exhausted"));
    }
}
