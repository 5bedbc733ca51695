//! Reconciliation loop
//!
//! The SyncEngine is responsible for:
//! - Registering as a provider with the orchestrator
//! - Checking the managed domain exists at the registrar
//! - Running [`Synchronizer`] cycles on a fixed interval
//! - Deregistering on shutdown
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐  resources   ┌──────────────┐  hosts   ┌─────────────┐
//! │ Orchestration │────────────▶│ Synchronizer │◀────────│  Registrar  │
//! │    Client     │◀────────────│   (cycle)    │────────▶│   Client    │
//! └───────────────┘   status     └──────────────┘ set_hosts└─────────────┘
//!                                       │
//!                                       ▼
//!                               ┌──────────────┐
//!                               │ DnsVerifier  │
//!                               └──────────────┘
//! ```
//!
//! ## Concurrency
//!
//! Cycles never overlap. The registrar has no per-write versioning, so two
//! concurrent full-set writes could interleave. The only concurrent path is
//! the shutdown signal, which drops an in-flight cycle, removes any
//! cache-busting record it left behind and deregisters.

mod cycle;

pub use cycle::{Synchronizer, project};

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::records::{DomainInfo, ProviderKind};
use crate::traits::{DnsResolver, OrchestrationClient, RegistrarClient};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Events emitted while the engine runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Registered with the orchestrator
    Registered {
        kind: ProviderKind,
        /// A registration already existed
        already: bool,
    },

    /// Managed domain found at the registrar
    DomainChecked {
        domain: String,
        nameservers: Vec<String>,
    },

    /// Cycle started
    CycleStarted { cycle: u64 },

    /// Live state already matched desired state
    InSync { records: usize },

    /// Live state differs from desired state
    OutOfSync { desired: usize, live: usize },

    /// Full-set replacement write issued
    WriteAttempted { records: usize, cache_bust: bool },

    /// Registrar rejected a write
    WriteFailed { error: String },

    /// Some records are not resolvable yet
    VerificationPending { attempt: usize, pending: usize },

    /// Every record resolved
    Verified { attempts: usize },

    /// Propagation bound exhausted
    VerificationStalled { attempts: usize },

    /// Resource statuses reported to the orchestrator
    StatusReported { resources: usize },

    /// Cycle aborted before reaching a decision
    CycleFailed { cycle: u64, error: String },

    /// Cycle finished (successfully or not)
    CycleFinished { cycle: u64, duration_ms: u64 },

    /// Deregistered from the orchestrator
    Deregistered { kind: ProviderKind },

    /// Engine stopped
    Stopped { reason: String },
}

/// Send an event without blocking the cycle
///
/// A full channel drops the event with a warning; a closed one drops it
/// silently.
pub(crate) fn emit(event_tx: &mpsc::Sender<SyncEvent>, event: SyncEvent) {
    if let Err(mpsc::error::TrySendError::Full(_)) = event_tx.try_send(event) {
        warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
    }
}

/// Core DNS sync engine
///
/// ## Lifecycle
///
/// 1. Create with [`SyncEngine::new()`]
/// 2. Start with [`SyncEngine::run()`]
/// 3. Startup registers and checks the domain; failures are returned as
///    [`Error::Startup`] before any cycle runs
/// 4. Cycles run until SIGINT/SIGTERM, then the engine deregisters
pub struct SyncEngine {
    /// Desired-state service
    orchestrator: Arc<dyn OrchestrationClient>,

    /// Live-state owner
    registrar: Arc<dyn RegistrarClient>,

    /// Cycle runner
    synchronizer: Synchronizer,

    /// Engine configuration
    config: SyncConfig,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<SyncEvent>,
}

impl SyncEngine {
    /// Create a new engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        orchestrator: Arc<dyn OrchestrationClient>,
        registrar: Arc<dyn RegistrarClient>,
        resolver: Arc<dyn DnsResolver>,
        config: SyncConfig,
    ) -> Result<(Self, mpsc::Receiver<SyncEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let synchronizer = Synchronizer::new(
            Arc::clone(&orchestrator),
            Arc::clone(&registrar),
            resolver,
            config.clone(),
            tx.clone(),
        );

        let engine = Self {
            orchestrator,
            registrar,
            synchronizer,
            config,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Register as a provider and check the managed domain
    ///
    /// An existing registration is accepted. Any other registration error,
    /// or a domain the registrar cannot find, is fatal.
    pub async fn startup(&self) -> Result<DomainInfo> {
        let kind = self.config.provider_kind;

        info!("Registering as {} provider", kind);
        let already = match self.orchestrator.register_provider(kind).await {
            Ok(()) => false,
            Err(Error::AlreadyRegistered(msg)) => {
                info!("Already registered as {} provider: {}", kind, msg);
                true
            }
            Err(e) => {
                error!("Failed to register as {} provider: {}", kind, e);
                return Err(Error::startup(format!(
                    "failed to register as {} provider: {}",
                    kind, e
                )));
            }
        };
        self.emit_event(SyncEvent::Registered { kind, already });

        let domain = &self.config.domain;
        info!("Checking domain {}", domain);
        let info = self
            .registrar
            .get_domain_info(domain)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    error!("Domain {} is not in the registrar account: {}", domain, e);
                    Error::startup(format!("domain {} not found at registrar: {}", domain, e))
                } else {
                    error!("Can't check domain {}: {}", domain, e);
                    Error::startup(format!("can't check domain {}: {}", domain, e))
                }
            })?;

        info!(
            "Found domain {} with nameservers {:?}",
            info.name, info.nameservers
        );
        self.emit_event(SyncEvent::DomainChecked {
            domain: info.name.clone(),
            nameservers: info.nameservers.clone(),
        });

        Ok(info)
    }

    /// Run the engine
    ///
    /// Runs until SIGINT/SIGTERM is received.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error::Startup)`: Registration or domain check failed
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the engine, stopping when `shutdown_rx` fires
    ///
    /// **TESTING ONLY**: production code should use [`SyncEngine::run()`],
    /// which listens for OS signals.
    pub async fn run_with_shutdown(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        info!(
            "Starting with a check interval of {}s for {}",
            self.config.poll_interval_secs, self.config.domain
        );

        self.startup().await?;

        let shutdown = wait_for_shutdown(shutdown_rx);
        tokio::pin!(shutdown);

        let mut cycle = 0u64;
        let mut previous: Option<Duration> = None;

        let reason = loop {
            cycle += 1;
            if let Some(took) = previous {
                debug!("Previous cycle took {:?}", took);
            }

            tokio::select! {
                took = self.run_cycle(cycle) => previous = Some(took),
                reason = &mut shutdown => break reason,
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval()) => {}
                reason = &mut shutdown => break reason,
            }
        };

        info!("Shutdown signal received: {}", reason);
        self.synchronizer.clean_up_interrupted().await;
        self.deregister().await;
        self.emit_event(SyncEvent::Stopped {
            reason: reason.to_string(),
        });

        Ok(())
    }

    /// Run and log one cycle, returning how long it took
    async fn run_cycle(&self, cycle: u64) -> Duration {
        let started = Instant::now();
        info!(cycle, "Starting reconciliation cycle");
        self.emit_event(SyncEvent::CycleStarted { cycle });

        match self.synchronizer.run_cycle().await {
            Ok(outcome) => match outcome.write_error {
                Some(ref e) => error!(cycle, "Write failed, retrying next cycle: {}", e),
                None => debug!(cycle, ?outcome, "Cycle complete"),
            },
            Err(e) => {
                error!(cycle, "Reconciliation cycle aborted: {}", e);
                self.emit_event(SyncEvent::CycleFailed {
                    cycle,
                    error: e.to_string(),
                });
            }
        }

        let took = started.elapsed();
        self.emit_event(SyncEvent::CycleFinished {
            cycle,
            duration_ms: took.as_millis() as u64,
        });
        took
    }

    /// Best-effort deregistration
    async fn deregister(&self) {
        let kind = self.config.provider_kind;
        info!("Deregistering as {} provider", kind);
        match self.orchestrator.deregister_provider(kind).await {
            Ok(()) => self.emit_event(SyncEvent::Deregistered { kind }),
            Err(e) => error!("Failed to deregister as {} provider: {}", kind, e),
        }
    }

    fn emit_event(&self, event: SyncEvent) {
        emit(&self.event_tx, event);
    }
}

/// Resolve once a shutdown is requested, returning its source
async fn wait_for_shutdown(shutdown_rx: Option<oneshot::Receiver<()>>) -> &'static str {
    match shutdown_rx {
        Some(rx) => {
            // A dropped sender counts as a shutdown request
            let _ = rx.await;
            "shutdown channel"
        }
        None => wait_for_signal().await,
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    let (mut sigterm, mut sigint) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(term), Ok(int)) => (term, int),
        (Err(e), _) | (_, Err(e)) => {
            warn!("Failed to install signal handlers ({}), falling back to CTRL-C", e);
            return ctrl_c().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    ctrl_c().await
}

async fn ctrl_c() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to wait for CTRL-C: {}", e);
        // Without a signal source the loop runs until killed
        std::future::pending::<()>().await;
    }
    "SIGINT"
}
