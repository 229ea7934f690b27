use std::collections::HashMap;

use async_trait::async_trait;
use milter_alias_common::{AddressSet, internal};
use tokio::sync::Mutex;

use crate::{Directory, DirectoryError, LdapStatus};

/// A search as it reached the directory, after substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Search {
    pub base: String,
    pub filter: String,
    pub attribute: String,
}

#[derive(Debug, Clone)]
enum Answer {
    Values(Vec<Vec<u8>>),
    Failure(LdapStatus),
}

/// A directory held in memory, answering searches by exact base and filter.
///
/// Searches nobody prepared an answer for match no entries. Every search is
/// recorded, which makes this the directory of choice for tests.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    answers: HashMap<(String, String), Answer>,
    searches: Mutex<Vec<Search>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers searches for `base` and `filter` with `values`.
    #[must_use]
    pub fn with_values<V: AsRef<[u8]>>(
        mut self,
        base: impl Into<String>,
        filter: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(|v| v.as_ref().to_vec()).collect();
        self.answers
            .insert((base.into(), filter.into()), Answer::Values(values));
        self
    }

    /// Fails searches for `base` and `filter` with the given result code.
    #[must_use]
    pub fn with_failure(
        mut self,
        base: impl Into<String>,
        filter: impl Into<String>,
        code: u32,
        message: impl Into<String>,
    ) -> Self {
        self.answers.insert(
            (base.into(), filter.into()),
            Answer::Failure(LdapStatus::new(Some(code), message)),
        );
        self
    }

    /// Every search made so far, oldest first.
    pub async fn searches(&self) -> Vec<Search> {
        self.searches.lock().await.clone()
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn search(
        &self,
        base: &str,
        filter: &str,
        attribute: &str,
    ) -> Result<AddressSet, DirectoryError> {
        self.searches.lock().await.push(Search {
            base: base.to_string(),
            filter: filter.to_string(),
            attribute: attribute.to_string(),
        });

        match self.answers.get(&(base.to_string(), filter.to_string())) {
            Some(Answer::Values(values)) => {
                let mut addresses = AddressSet::with_capacity(values.len());
                for value in values {
                    addresses.push(value)?;
                }
                Ok(addresses)
            }
            Some(Answer::Failure(status)) => Err(DirectoryError::Search {
                status: status.clone(),
            }),
            None => {
                internal!(level = DEBUG, "No entries under {base} match {filter}");
                Ok(AddressSet::new())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use milter_alias_common::config::QueryDefinition;
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn test_prepared_values() {
        let directory =
            MemoryDirectory::new().with_values("dc=example", "(mail=a)", ["x", "y", "x"]);

        let found = directory.search("dc=example", "(mail=a)", "mail").await.unwrap();
        assert_eq!(found.len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_search_is_empty() {
        let directory = MemoryDirectory::new();

        let found = directory.search("dc=example", "(mail=a)", "mail").await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_failure_carries_code() {
        let directory =
            MemoryDirectory::new().with_failure("dc=example", "(mail=a)", 51, "busy");

        let err = directory
            .search("dc=example", "(mail=a)", "mail")
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(51));
    }

    #[tokio::test]
    async fn test_query_substitutes_base_and_filter() {
        let directory = MemoryDirectory::new().with_values(
            "ou=lists,dc=example.com",
            "(&(objectClass=mailList)(mail=team@example.com))",
            ["a@example.com"],
        );
        let query = QueryDefinition::new(
            "ou=lists,dc=%d",
            "(&(objectClass=mailList)(mail=%u))",
            "member",
        );

        let found = directory.query(&query, b"team@example.com").await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(
            directory.searches().await,
            vec![Search {
                base: "ou=lists,dc=example.com".to_string(),
                filter: "(&(objectClass=mailList)(mail=team@example.com))".to_string(),
                attribute: "member".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_query_rejects_non_utf8_substitution() {
        let directory = MemoryDirectory::new();
        let query = QueryDefinition::new("dc=example", "(mail=%u)", "mail");

        let err = directory.query(&query, b"\xff@example.com").await.unwrap_err();

        assert!(matches!(err, DirectoryError::Encoding { field: "filter" }));
        assert!(directory.searches().await.is_empty());
    }
}
