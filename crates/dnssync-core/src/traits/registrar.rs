// # Registrar Client Trait
//
// Defines the interface for reading and replacing a domain's host records.
//
// ## Implementations
//
// - Namecheap: `dnssync-namecheap` crate
//
// The registrar API model is full-replace: `set_hosts` receives the complete
// record set and everything not in it is removed. There is no incremental
// add/remove primitive.

use crate::error::Result;
use crate::records::{DomainInfo, HostRecord};
use async_trait::async_trait;

/// Trait for registrar clients
///
/// # Trust Level: Untrusted
///
/// Implementations perform exactly one API call per invocation and return
/// errors instead of retrying. They must not cache host records between
/// calls; every cycle works from a fresh snapshot.
#[async_trait]
pub trait RegistrarClient: Send + Sync {
    /// Fetch registrar metadata for `domain`
    ///
    /// # Returns
    ///
    /// - `Ok(DomainInfo)`: The domain exists in this account
    /// - `Err(Error::NotFound)`: The registrar does not know the domain
    /// - `Err(Error)`: Any other failure
    async fn get_domain_info(&self, domain: &str) -> Result<DomainInfo>;

    /// Fetch every host record currently configured for `domain`
    async fn get_hosts(&self, domain: &str) -> Result<Vec<HostRecord>>;

    /// Replace the complete host record set of `domain`
    async fn set_hosts(&self, domain: &str, hosts: &[HostRecord]) -> Result<()>;

    /// Registrar name (for logging/debugging)
    fn registrar_name(&self) -> &'static str;
}
