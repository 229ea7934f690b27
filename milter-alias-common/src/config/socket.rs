//! Where the milter listens, written the way MTAs expect milter sockets to be
//! written.

use std::{fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_SOCKET: &str = "unix:/run/milter-alias/milter-alias.sock";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Socket {
    /// `unix:/path`, `local:/path` or just `/path`
    Unix(PathBuf),
    /// `inet:port@host`, or `inet6:port@host`
    Inet { host: String, port: u16 },
}

impl Default for Socket {
    fn default() -> Self {
        Self::Unix(PathBuf::from(
            DEFAULT_SOCKET.trim_start_matches("unix:"),
        ))
    }
}

impl FromStr for Socket {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidSocket(value.to_string());

        if value.starts_with('/') {
            return Ok(Self::Unix(PathBuf::from(value)));
        }

        let (scheme, rest) = value.split_once(':').ok_or_else(invalid)?;
        match scheme {
            "unix" | "local" if rest.starts_with('/') => Ok(Self::Unix(PathBuf::from(rest))),
            "inet" | "inet6" => {
                let (port, host) = rest.split_once('@').ok_or_else(invalid)?;
                let port = port.parse::<u16>().map_err(|_| invalid())?;
                let host = host.trim_start_matches('[').trim_end_matches(']');
                if port == 0 || host.is_empty() {
                    return Err(invalid());
                }

                Ok(Self::Inet {
                    host: host.to_string(),
                    port,
                })
            }
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Socket {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Socket> for String {
    fn from(value: Socket) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "unix:{}", path.display()),
            Self::Inet { host, port } if host.contains(':') => write!(f, "inet6:{port}@{host}"),
            Self::Inet { host, port } => write!(f, "inet:{port}@{host}"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_unix_forms() {
        for input in [
            "unix:/run/milter.sock",
            "local:/run/milter.sock",
            "/run/milter.sock",
        ] {
            assert_eq!(
                input.parse::<Socket>().unwrap(),
                Socket::Unix(PathBuf::from("/run/milter.sock")),
                "{input}"
            );
        }
    }

    #[test]
    fn test_inet_forms() {
        let socket = "inet:8890@127.0.0.1".parse::<Socket>().unwrap();
        assert_eq!(
            socket,
            Socket::Inet {
                host: "127.0.0.1".to_string(),
                port: 8890
            }
        );

        let socket = "inet6:8890@[::1]".parse::<Socket>().unwrap();
        assert_eq!(
            socket,
            Socket::Inet {
                host: "::1".to_string(),
                port: 8890
            }
        );
        assert_eq!(socket.to_string(), "inet6:8890@::1");
    }

    #[test]
    fn test_invalid_forms() {
        for input in [
            "",
            "milter.sock",
            "unix:relative.sock",
            "inet:8890",
            "inet:port@localhost",
            "inet:0@localhost",
            "inet:8890@",
            "tcp:8890@localhost",
        ] {
            assert!(input.parse::<Socket>().is_err(), "{input}");
        }
    }

    #[test]
    fn test_default_is_run_directory() {
        let socket = Socket::default();
        assert_eq!(socket.to_string(), DEFAULT_SOCKET);
        assert_eq!(
            socket,
            Socket::Unix(PathBuf::from("/run/milter-alias/milter-alias.sock"))
        );
    }

    #[test]
    fn test_display_round_trips() {
        for input in ["unix:/tmp/a.sock", "inet:25@mail.example.com"] {
            assert_eq!(input.parse::<Socket>().unwrap().to_string(), input);
        }
    }
}
