//! Directory connection and query settings.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One directory lookup: where to search, what to match, what to return.
///
/// `base` and `filter` may both contain the `%u`, `%d` and `%n` placeholders
/// understood by [`crate::template::substitute`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDefinition {
    pub base: String,
    #[serde(alias = "filter_template")]
    pub filter: String,
    #[serde(alias = "result")]
    pub result_attribute: String,
}

impl QueryDefinition {
    pub fn new(
        base: impl Into<String>,
        filter: impl Into<String>,
        result_attribute: impl Into<String>,
    ) -> Self {
        Self {
            base: base.into(),
            filter: filter.into(),
            result_attribute: result_attribute.into(),
        }
    }

    fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        if self.base.trim().is_empty() {
            return Err(ConfigError::InvalidConfiguration {
                field: name,
                reason: "base must not be empty".to_string(),
            });
        }

        if self.filter.trim().is_empty() {
            return Err(ConfigError::InvalidConfiguration {
                field: name,
                reason: "filter must not be empty".to_string(),
            });
        }

        if self.result_attribute.trim().is_empty() {
            return Err(ConfigError::InvalidConfiguration {
                field: name,
                reason: "result_attribute must not be empty".to_string(),
            });
        }

        Ok(())
    }
}

/// Credentials for a simple bind.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bind {
    pub dn: String,
    #[serde(alias = "passwd", alias = "pwd")]
    pub password: String,
}

impl fmt::Debug for Bind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bind")
            .field("dn", &self.dn)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything needed to talk to the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LdapConfig {
    /// An LDAP URL such as `ldap://localhost` or `ldaps://ldap.example.com:636`.
    pub host: String,

    /// Credentials for a simple bind; without them the bind is anonymous.
    #[serde(default)]
    pub bind: Option<Bind>,

    /// Give up connecting after this many seconds.
    ///
    /// Default: no limit
    #[serde(default)]
    pub connect_secs: Option<u64>,

    /// Give up on a single search after this many seconds.
    ///
    /// Default: no limit, the server's own limits apply
    #[serde(default)]
    pub search_secs: Option<u64>,

    /// Resolves a list address to the addresses of its members.
    #[serde(alias = "list_query")]
    pub mail_list_query: QueryDefinition,

    /// Resolves an authenticated account to the addresses it owns.
    #[serde(alias = "acct_query", alias = "account_query")]
    pub mail_account_query: QueryDefinition,
}

impl LdapConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_secs.map(Duration::from_secs)
    }

    pub fn search_timeout(&self) -> Option<Duration> {
        self.search_secs.map(Duration::from_secs)
    }

    /// Checks that every value the directory client relies on is present.
    ///
    /// # Errors
    ///
    /// Names the first field that is missing or unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::MissingField("ldap.host"));
        }

        if let Some(bind) = &self.bind {
            if bind.dn.trim().is_empty() {
                return Err(ConfigError::MissingField("ldap.bind.dn"));
            }
            if bind.password.is_empty() {
                return Err(ConfigError::InvalidConfiguration {
                    field: "ldap.bind",
                    reason: "a bind dn needs a password".to_string(),
                });
            }
        }

        if self.search_secs == Some(0) {
            return Err(ConfigError::InvalidConfiguration {
                field: "ldap.search_secs",
                reason: "must be at least one second, or left unset for no limit".to_string(),
            });
        }

        self.mail_list_query.validate("ldap.mail_list_query")?;
        self.mail_account_query.validate("ldap.mail_account_query")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn config() -> LdapConfig {
        LdapConfig {
            host: "ldap://localhost".to_string(),
            bind: None,
            connect_secs: None,
            search_secs: None,
            mail_list_query: QueryDefinition::new(
                "ou=lists,dc=example,dc=com",
                "(mail=%u)",
                "member",
            ),
            mail_account_query: QueryDefinition::new(
                "ou=people,dc=example,dc=com",
                "(uid=%u)",
                "mail",
            ),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_missing_host() {
        let mut config = config();
        config.host = String::new();

        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField("ldap.host"))
        ));
    }

    #[test]
    fn test_bind_without_password() {
        let mut config = config();
        config.bind = Some(Bind {
            dn: "cn=milter,dc=example,dc=com".to_string(),
            password: String::new(),
        });

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_result_attribute() {
        let mut config = config();
        config.mail_account_query.result_attribute = " ".to_string();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ldap.mail_account_query"));
    }

    #[test]
    fn test_bind_debug_redacts_password() {
        let bind = Bind {
            dn: "cn=milter".to_string(),
            password: "hunter2".to_string(),
        };

        let debug = format!("{bind:?}");
        assert!(debug.contains("cn=milter"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_timeouts() {
        let mut config = config();
        assert_eq!(config.search_timeout(), None);

        config.search_secs = Some(5);
        config.connect_secs = Some(2);
        assert_eq!(config.search_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.connect_timeout(), Some(Duration::from_secs(2)));

        config.search_secs = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_with_aliases() {
        let config: LdapConfig = ron::from_str(
            r#"(
                host: "ldap://ldap.example.com",
                bind: Some((dn: "cn=milter,dc=example,dc=com", passwd: "secret")),
                list_query: (base: "ou=lists,dc=%d", filter_template: "(mail=%u)", result: "member"),
                mail_account_query: (base: "dc=example,dc=com", filter: "(uid=%n)", result_attribute: "mail"),
            )"#,
        )
        .unwrap();

        assert_eq!(config.bind.unwrap().password, "secret");
        assert_eq!(config.mail_list_query.base, "ou=lists,dc=%d");
        assert_eq!(config.mail_list_query.result_attribute, "member");
        assert_eq!(config.mail_account_query.filter, "(uid=%n)");
        assert_eq!(config.search_secs, None);
    }
}
