//! The daemon's configuration file.

use std::path::{Path, PathBuf};

use milter_alias_common::{
    config::{LdapConfig, LogConfig, Socket},
    error::ConfigError,
};
use serde::Deserialize;

use crate::cli::Cli;

pub const DEFAULT_PID_FILE: &str = "/run/milter-alias/milter-alias.pid";

#[allow(clippy::unnecessary_wraps)]
fn default_pid_file() -> Option<PathBuf> {
    Some(PathBuf::from(DEFAULT_PID_FILE))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub socket: Socket,

    /// `None` disables the PID file.
    #[serde(default = "default_pid_file", alias = "pid")]
    pub pid_file: Option<PathBuf>,

    #[serde(default)]
    pub log: LogConfig,

    pub ldap: LdapConfig,
}

impl Settings {
    /// Reads and parses the file at `path`. Nothing is validated yet.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&content).map_err(|reason| ConfigError::Parse {
            path: path.to_path_buf(),
            reason,
        })
    }

    fn parse(content: &str) -> Result<Self, String> {
        ron::from_str(content).map_err(|err| err.to_string())
    }

    /// Lets the command line win over the file.
    #[must_use]
    pub fn with_overrides(mut self, cli: &Cli) -> Self {
        if let Some(socket) = &cli.socket {
            self.socket = socket.clone();
        }

        if let Some(pid_file) = &cli.pid_file {
            self.pid_file = Some(pid_file.clone());
        }

        if let Some(level) = cli.log_level {
            self.log.level = Some(level);
        }

        self
    }

    /// # Errors
    ///
    /// The first problem found, see [`LdapConfig::validate`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self
            .pid_file
            .as_ref()
            .is_some_and(|path| path.as_os_str().is_empty())
        {
            return Err(ConfigError::InvalidConfiguration {
                field: "pid_file",
                reason: "must be a path, or None to disable".to_string(),
            });
        }

        self.ldap.validate()
    }
}
