// # Orchestration Client Trait
//
// Defines the interface to the service that owns desired state.
//
// ## Implementations
//
// - Protos: `dnssync-protos` crate
//
// ## Usage
//
// ```rust,ignore
// use dnssync_core::traits::OrchestrationClient;
// use dnssync_core::records::{ProviderKind, ResourceStatus};
//
// let client = /* OrchestrationClient implementation */;
// client.register_provider(ProviderKind::Dns).await?;
//
// let resources = client.get_resources().await?;
// let ids: Vec<String> = resources.keys().cloned().collect();
// client.set_status_batch(&ids, ResourceStatus::Created).await?;
// ```

use crate::error::Result;
use crate::records::{ProviderKind, Resource, ResourceStatus};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::error;

/// Trait for orchestration-service clients
///
/// # Trust Level: Untrusted
///
/// Like every collaborator, implementations are single-shot: one request per
/// call, no retries, no sleeping, no background tasks. Retry policy belongs
/// to the synchronizer.
#[async_trait]
pub trait OrchestrationClient: Send + Sync {
    /// Register this process as a provider of `kind`
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Registered
    /// - `Err(Error::AlreadyRegistered)`: A registration already exists
    /// - `Err(Error)`: Any other failure
    async fn register_provider(&self, kind: ProviderKind) -> Result<()>;

    /// Remove the registration for `kind`
    async fn deregister_provider(&self, kind: ProviderKind) -> Result<()>;

    /// Fetch the current desired resource set, keyed by resource id
    async fn get_resources(&self) -> Result<BTreeMap<String, Resource>>;

    /// Report the status of one resource
    async fn set_status(&self, resource_id: &str, status: ResourceStatus) -> Result<()>;

    /// Report the same status for many resources
    ///
    /// Every id is attempted; failures are logged and the last one is
    /// returned once all ids have been tried.
    async fn set_status_batch(&self, resource_ids: &[String], status: ResourceStatus) -> Result<()> {
        let mut last_error = None;
        for id in resource_ids {
            if let Err(e) = self.set_status(id, status).await {
                error!("Could not set status for resource {}: {}", id, e);
                last_error = Some(e);
            }
        }
        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Client name (for logging/debugging)
    fn client_name(&self) -> &'static str;
}
