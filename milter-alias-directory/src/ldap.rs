//! The LDAP client.
//!
//! One connection, bound once at startup and shared by every transaction.
//! The handle sits behind a mutex, so concurrent lookups are serialised.

use std::time::Duration;

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapResult, Scope, SearchEntry, SearchResult};
use milter_alias_common::{
    AddressSet,
    config::{Bind, LdapConfig},
    internal,
};
use milter_alias_tracing::traced;
use tokio::sync::Mutex;

use crate::{Directory, DirectoryError, LdapStatus};

/// A pre-sizing hint for result collection: most entries carry a handful of
/// addresses.
const VALUES_PER_ENTRY: usize = 3;

pub struct LdapDirectory {
    host: String,
    search_timeout: Option<Duration>,
    handle: Mutex<Option<Ldap>>,
}

impl LdapDirectory {
    /// Opens the connection and performs the simple bind.
    ///
    /// Without bind credentials in `config` the bind is anonymous.
    ///
    /// # Errors
    ///
    /// [`DirectoryError::Connect`] if the server cannot be reached,
    /// [`DirectoryError::Bind`] if it rejects the credentials.
    #[traced(instrument(level = tracing::Level::DEBUG, skip_all, fields(host = %config.host), err), timing(precision = "ms"))]
    pub async fn connect(config: &LdapConfig) -> Result<Self, DirectoryError> {
        let mut settings = LdapConnSettings::new();
        if let Some(timeout) = config.connect_timeout() {
            settings = settings.set_conn_timeout(timeout);
        }

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &config.host)
            .await
            .map_err(|err| DirectoryError::Connect {
                url: config.host.clone(),
                status: LdapStatus::from(&err),
            })?;

        ldap3::drive!(conn);

        let (dn, password) = config
            .bind
            .as_ref()
            .map_or(("", ""), |Bind { dn, password }| {
                (dn.as_str(), password.as_str())
            });

        ldap.simple_bind(dn, password)
            .await
            .and_then(LdapResult::success)
            .map_err(|err| DirectoryError::Bind {
                dn: if dn.is_empty() { "<anonymous>" } else { dn }.to_string(),
                status: LdapStatus::from(&err),
            })?;

        internal!(
            level = INFO,
            "Connected to {} as {}",
            config.host,
            if dn.is_empty() { "<anonymous>" } else { dn }
        );

        Ok(Self {
            host: config.host.clone(),
            search_timeout: config.search_timeout(),
            handle: Mutex::new(Some(ldap)),
        })
    }

    /// Runs a subtree search and collects every value of `attribute`.
    ///
    /// # Errors
    ///
    /// [`DirectoryError::Search`] if the server rejects the search,
    /// [`DirectoryError::NotConnected`] after [`Self::disconnect`].
    #[traced(instrument(level = tracing::Level::DEBUG, skip(self)), timing(precision = "ms"))]
    pub async fn search_subtree(
        &self,
        base: &str,
        filter: &str,
        attribute: &str,
    ) -> Result<AddressSet, DirectoryError> {
        let entries = {
            let mut handle = self.handle.lock().await;
            let ldap = handle.as_mut().ok_or(DirectoryError::NotConnected)?;

            if let Some(timeout) = self.search_timeout {
                ldap.with_timeout(timeout);
            }

            let (entries, _) = ldap
                .search(base, Scope::Subtree, filter, vec![attribute])
                .await
                .and_then(SearchResult::success)
                .map_err(|err| DirectoryError::Search {
                    status: LdapStatus::from(&err),
                })?;

            entries
        };

        internal!(level = DEBUG, "{} entries matched", entries.len());

        collect(entries.into_iter().map(SearchEntry::construct))
    }

    /// Unbinds and drops the connection. Calling it twice is harmless.
    ///
    /// # Errors
    ///
    /// [`DirectoryError::Unbind`] if the unbind request could not be sent.
    #[traced(instrument(level = tracing::Level::DEBUG, skip(self), fields(host = %self.host)))]
    pub async fn disconnect(&self) -> Result<(), DirectoryError> {
        let Some(mut ldap) = self.handle.lock().await.take() else {
            return Ok(());
        };

        ldap.unbind().await.map_err(|err| DirectoryError::Unbind {
            status: LdapStatus::from(&err),
        })?;

        internal!(level = INFO, "Disconnected from {}", self.host);

        Ok(())
    }
}

#[async_trait]
impl Directory for LdapDirectory {
    async fn search(
        &self,
        base: &str,
        filter: &str,
        attribute: &str,
    ) -> Result<AddressSet, DirectoryError> {
        self.search_subtree(base, filter, attribute).await
    }
}

/// Gathers the values of every returned attribute, textual or binary.
///
/// Only one attribute is ever requested, but the server decides how to
/// spell its name, so nothing is filtered by name here.
fn collect(entries: impl ExactSizeIterator<Item = SearchEntry>) -> Result<AddressSet, DirectoryError> {
    let mut addresses = AddressSet::with_capacity(entries.len().saturating_mul(VALUES_PER_ENTRY));

    for entry in entries {
        let text = entry
            .attrs
            .into_values()
            .flatten()
            .map(String::into_bytes);
        let binary = entry.bin_attrs.into_values().flatten();

        for value in text.chain(binary) {
            let stored = addresses.push(&value)?;
            internal!(
                level = DEBUG,
                "Found address {} in {}",
                String::from_utf8_lossy(stored),
                entry.dn
            );
        }
    }

    Ok(addresses)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn entry(dn: &str, text: &[&str], binary: &[&[u8]]) -> SearchEntry {
        let mut attrs = HashMap::new();
        if !text.is_empty() {
            attrs.insert(
                "mail".to_string(),
                text.iter().map(ToString::to_string).collect(),
            );
        }

        let mut bin_attrs = HashMap::new();
        if !binary.is_empty() {
            bin_attrs.insert(
                "mail".to_string(),
                binary.iter().map(|value| value.to_vec()).collect(),
            );
        }

        SearchEntry {
            dn: dn.to_string(),
            attrs,
            bin_attrs,
        }
    }

    #[test]
    fn test_collect_no_entries() {
        let addresses = collect(Vec::new().into_iter()).unwrap();
        assert!(addresses.is_empty());
    }

    #[test]
    fn test_collect_keeps_multiplicity() {
        let entries = vec![
            entry("cn=a", &["a@example.com", "shared@example.com"], &[]),
            entry("cn=b", &["shared@example.com"], &[]),
        ];

        let mut addresses = collect(entries.into_iter()).unwrap();
        addresses.sort();

        assert_eq!(
            addresses,
            ["a@example.com", "shared@example.com", "shared@example.com"]
                .iter()
                .collect::<AddressSet>()
        );
    }

    #[test]
    fn test_collect_binary_values_byte_exact() {
        let raw: &[u8] = b"bin\0ary@example.com";
        let entries = vec![entry("cn=odd", &[], &[raw, b"\xff@example.com"])];

        let addresses = collect(entries.into_iter()).unwrap();

        assert_eq!(addresses.len(), 2);
        assert_eq!(addresses.get(0), Some(raw));
        assert_eq!(addresses.get(1), Some(&b"\xff@example.com"[..]));
    }

    #[test]
    fn test_collect_presizes() {
        let entries = vec![
            entry("cn=a", &["a@example.com"], &[]),
            entry("cn=b", &["b@example.com"], &[]),
        ];

        let addresses = collect(entries.into_iter()).unwrap();
        assert!(addresses.capacity() >= 2 * VALUES_PER_ENTRY);
    }
}
