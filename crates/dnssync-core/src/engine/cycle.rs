//! One reconciliation cycle
//!
//! ## Flow
//!
//! 1. Fetch desired resources, then live hosts (either failure aborts)
//! 2. Project resources into host records
//! 3. Equivalent: report every resource as created, no write
//! 4. Different: replace the full host set, wait for propagation, clean up,
//!    report every resource as created
//!
//! The registrar write failing aborts the cycle without reporting anything;
//! the next cycle starts again from fresh snapshots.

use super::{SyncEvent, emit};
use crate::compare::equivalent;
use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::records::{HostRecord, ReconciliationOutcome, RecordType, Resource, ResourceStatus, ResourceValue};
use crate::traits::{DnsResolver, OrchestrationClient, RegistrarClient};
use crate::verify::DnsVerifier;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, warn};

/// TTL of the transient cache-busting TXT record
const CACHE_BUST_TTL: u32 = 60;

/// Record type of the transient cache-busting record
const CACHE_BUST_TYPE: &str = "TXT";

/// Project desired resources into the registrar's host shape
///
/// Fails on the first resource that is not a DNS record.
pub fn project(resources: &BTreeMap<String, Resource>) -> Result<Vec<HostRecord>> {
    resources
        .values()
        .map(|resource| match &resource.value {
            ResourceValue::Dns(record) => Ok(HostRecord::from(record)),
            ResourceValue::Other { kind } => Err(Error::UnexpectedResource {
                id: resource.id.clone(),
                kind: kind.clone(),
            }),
        })
        .collect()
}

/// Result of the propagation-wait sub-loop
struct Propagation {
    /// Checks that found pending records
    attempts: usize,
    /// Whether a cache-busting record reached the registrar
    cache_busted: bool,
}

/// Runs reconciliation cycles against one domain
///
/// Holds no state between cycles; every call to [`Synchronizer::run_cycle`]
/// works from fresh snapshots.
pub struct Synchronizer {
    orchestrator: Arc<dyn OrchestrationClient>,
    registrar: Arc<dyn RegistrarClient>,
    verifier: DnsVerifier,
    config: SyncConfig,
    event_tx: mpsc::Sender<SyncEvent>,
    /// Desired set whose cache-busting record may still be at the registrar
    ///
    /// Set before every cache-busting write, cleared by a clean write.
    uncleaned: Mutex<Option<Vec<HostRecord>>>,
}

impl Synchronizer {
    /// Create a synchronizer
    ///
    /// # Parameters
    ///
    /// - `orchestrator`: Source of desired state, sink for status
    /// - `registrar`: Owner of live state
    /// - `resolver`: Transport used for propagation checks
    /// - `config`: Validated configuration
    /// - `event_tx`: Channel for [`SyncEvent`]s
    pub fn new(
        orchestrator: Arc<dyn OrchestrationClient>,
        registrar: Arc<dyn RegistrarClient>,
        resolver: Arc<dyn DnsResolver>,
        config: SyncConfig,
        event_tx: mpsc::Sender<SyncEvent>,
    ) -> Self {
        let verifier = DnsVerifier::new(resolver, config.domain.clone());
        Self {
            orchestrator,
            registrar,
            verifier,
            config,
            event_tx,
            uncleaned: Mutex::new(None),
        }
    }

    /// Run one reconciliation cycle
    ///
    /// # Returns
    ///
    /// - `Ok(outcome)`: The cycle ran to a decision; `outcome.write_error`
    ///   is set when the registrar rejected the replacement write
    /// - `Err(Error)`: A fetch failed, a resource was not a DNS record, or
    ///   propagation was not observed within the configured bound
    pub async fn run_cycle(&self) -> Result<ReconciliationOutcome> {
        let domain = &self.config.domain;

        let resources = self.orchestrator.get_resources().await?;
        debug!("Found {} DNS resource(s)", resources.len());

        let live = self.registrar.get_hosts(domain).await?;
        debug!("Registrar reports {} host(s) for {}", live.len(), domain);

        let desired = project(&resources)?;
        let resource_ids: Vec<String> = resources.keys().cloned().collect();

        if equivalent(&desired, &live, self.config.ttl_tolerance_secs) {
            info!("Records are in sync ({} desired)", desired.len());
            emit(&self.event_tx, SyncEvent::InSync { records: desired.len() });
            self.report_created(&resource_ids).await;
            return Ok(ReconciliationOutcome {
                in_sync: true,
                ..ReconciliationOutcome::default()
            });
        }

        info!(
            desired = desired.len(),
            live = live.len(),
            "Records are not in sync, replacing all hosts"
        );
        emit(
            &self.event_tx,
            SyncEvent::OutOfSync {
                desired: desired.len(),
                live: live.len(),
            },
        );

        if let Err(e) = self.write_hosts(&desired, false).await {
            error!("Replacing hosts for {} failed: {}", domain, e);
            emit(&self.event_tx, SyncEvent::WriteFailed { error: e.to_string() });
            return Ok(ReconciliationOutcome {
                in_sync: false,
                write_attempted: true,
                write_error: Some(e.to_string()),
                verified: false,
                verify_attempts: 0,
            });
        }

        let propagation = self.wait_for_propagation(&desired).await?;

        if propagation.cache_busted {
            // Drop the cache-busting record; a leftover is rewritten next cycle
            if let Err(e) = self.write_hosts(&desired, false).await {
                warn!("Cleanup write for {} failed: {}", domain, e);
                emit(&self.event_tx, SyncEvent::WriteFailed { error: e.to_string() });
            }
        }

        self.report_created(&resource_ids).await;

        Ok(ReconciliationOutcome {
            in_sync: false,
            write_attempted: true,
            write_error: None,
            verified: true,
            verify_attempts: propagation.attempts,
        })
    }

    /// Block until every desired record resolves, or the bound is hit
    async fn wait_for_propagation(&self, desired: &[HostRecord]) -> Result<Propagation> {
        let verify = &self.config.verify;
        let checked: Vec<&HostRecord> = desired
            .iter()
            .filter(|record| match record.record_type.parse::<RecordType>() {
                Ok(_) => true,
                Err(_) => {
                    debug!("Not verifying {}: type cannot be resolved", record.label());
                    false
                }
            })
            .collect();

        let mut attempts = 0;
        let mut cache_busted = false;

        loop {
            let pending = self.pending_records(&checked).await;
            if pending.is_empty() {
                info!("All {} record(s) verified live", checked.len());
                emit(&self.event_tx, SyncEvent::Verified { attempts });
                return Ok(Propagation {
                    attempts,
                    cache_busted,
                });
            }

            attempts += 1;
            info!(
                attempt = attempts,
                "{} record(s) not live yet: {}",
                pending.len(),
                pending.join(", ")
            );
            emit(
                &self.event_tx,
                SyncEvent::VerificationPending {
                    attempt: attempts,
                    pending: pending.len(),
                },
            );

            if verify.max_attempts.is_some_and(|max| attempts >= max) {
                error!("Giving up on propagation after {} attempt(s)", attempts);
                emit(&self.event_tx, SyncEvent::VerificationStalled { attempts });
                if cache_busted {
                    if let Err(e) = self.write_hosts(desired, false).await {
                        warn!("Cleanup write after stall failed: {}", e);
                    }
                }
                return Err(Error::VerificationStalled { attempts, pending });
            }

            match self.write_hosts(desired, true).await {
                Ok(()) => cache_busted = true,
                Err(e) => warn!("Cache-busting write failed: {}", e),
            }

            tokio::time::sleep(verify.delay_for(attempts)).await;
        }
    }

    /// Labels of the records the resolver does not return yet
    async fn pending_records(&self, records: &[&HostRecord]) -> Vec<String> {
        let mut pending = Vec::new();
        for record in records {
            if !self.verifier.record_is_live(record).await {
                pending.push(record.label());
            }
        }
        pending
    }

    /// Replace the registrar's host set, optionally with a cache-busting record
    async fn write_hosts(&self, desired: &[HostRecord], cache_bust: bool) -> Result<()> {
        let mut hosts = desired.to_vec();
        if cache_bust {
            hosts.push(self.cache_bust_record());
        }

        debug!(
            cache_bust,
            "Writing {} host(s) to {}",
            hosts.len(),
            self.registrar.registrar_name()
        );
        emit(
            &self.event_tx,
            SyncEvent::WriteAttempted {
                records: hosts.len(),
                cache_bust,
            },
        );

        if cache_bust {
            *self.uncleaned.lock().await = Some(desired.to_vec());
        }

        self.registrar.set_hosts(&self.config.domain, &hosts).await?;

        if !cache_bust {
            *self.uncleaned.lock().await = None;
        }
        Ok(())
    }

    /// Remove a cache-busting record left behind by an interrupted cycle
    ///
    /// Rewrites the desired set it was added to. Best-effort: a failure is
    /// logged and the next cycle repairs the registrar.
    ///
    /// # Returns
    ///
    /// Whether a cleanup write was needed.
    pub async fn clean_up_interrupted(&self) -> bool {
        let Some(desired) = self.uncleaned.lock().await.clone() else {
            return false;
        };

        info!("Removing cache-busting record left by an interrupted cycle");
        if let Err(e) = self.write_hosts(&desired, false).await {
            warn!("Cleanup write for {} failed: {}", self.config.domain, e);
            emit(&self.event_tx, SyncEvent::WriteFailed { error: e.to_string() });
        }
        true
    }

    /// A uniquely-valued TXT record that makes the zone look changed
    fn cache_bust_record(&self) -> HostRecord {
        HostRecord::new(
            self.config.verify.cache_bust_host.clone(),
            CACHE_BUST_TYPE,
            chrono::Utc::now().timestamp_millis().to_string(),
            CACHE_BUST_TTL,
        )
    }

    async fn report_created(&self, resource_ids: &[String]) {
        if resource_ids.is_empty() {
            return;
        }

        info!("Setting status for {} resource(s)", resource_ids.len());
        if let Err(e) = self
            .orchestrator
            .set_status_batch(resource_ids, ResourceStatus::Created)
            .await
        {
            warn!("Status report incomplete: {}", e);
        }
        emit(
            &self.event_tx,
            SyncEvent::StatusReported {
                resources: resource_ids.len(),
            },
        );
    }
}
