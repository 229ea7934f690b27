mod error;
mod ldap;
mod memory;

use async_trait::async_trait;
use milter_alias_common::{AddressSet, config::QueryDefinition, template};

pub use self::{
    error::{DirectoryError, LdapStatus},
    ldap::LdapDirectory,
    memory::{MemoryDirectory, Search},
};

/// Somewhere addresses can be looked up.
///
/// Implementations only need to provide [`Directory::search`]; placeholder
/// substitution for configured queries happens in [`Directory::query`].
#[async_trait]
pub trait Directory: Send + Sync {
    /// Runs a subtree search under `base` and returns every value of
    /// `attribute` from every matching entry, duplicates included.
    ///
    /// No matching entries is not an error: the result is simply empty.
    async fn search(
        &self,
        base: &str,
        filter: &str,
        attribute: &str,
    ) -> Result<AddressSet, DirectoryError>;

    /// Fills `address` into the query's base and filter, then searches.
    ///
    /// # Errors
    ///
    /// [`DirectoryError::Encoding`] if substitution produced something that
    /// is not UTF-8, otherwise whatever [`Directory::search`] reports.
    async fn query(
        &self,
        query: &QueryDefinition,
        address: &[u8],
    ) -> Result<AddressSet, DirectoryError> {
        let base = String::from_utf8(template::substitute(&query.base, address))
            .map_err(|_| DirectoryError::Encoding { field: "base" })?;
        let filter = String::from_utf8(template::substitute(&query.filter, address))
            .map_err(|_| DirectoryError::Encoding { field: "filter" })?;

        self.search(&base, &filter, &query.result_attribute).await
    }
}
