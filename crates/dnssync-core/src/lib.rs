// # dnssync-core
//
// Core library keeping a registrar's host records in sync with the desired
// DNS resources published by an orchestration service.
//
// ## Architecture Overview
//
// - **OrchestrationClient**: Trait for fetching desired resources and reporting status
// - **RegistrarClient**: Trait for reading and replacing the registrar's host set
// - **DnsResolver**: Trait for raw DNS queries against a pinned upstream
// - **compare**: Tolerant equivalence between desired and live host sets
// - **DnsVerifier**: Checks that written records are visible via real DNS
// - **Synchronizer**: One reconciliation cycle (compare, write, verify, report)
// - **SyncEngine**: Startup registration, cycle loop, shutdown deregistration
//
// ## Design Principles
//
// 1. **Full-replace writes**: Every write carries the complete desired set
// 2. **Stateless cycles**: Each cycle starts from fresh snapshots
// 3. **Sequential cycles**: A cycle never starts before the previous one ends
// 4. **Library-First**: Collaborators are traits; the daemon only wires them

pub mod traits;
pub mod engine;
pub mod compare;
pub mod verify;
pub mod records;
pub mod config;
pub mod error;

// Re-export core types for convenience
pub use traits::{DnsResolver, OrchestrationClient, RawAnswer, RegistrarClient};
pub use engine::{SyncEngine, SyncEvent, Synchronizer};
pub use compare::equivalent;
pub use verify::{DnsVerifier, Resolution};
pub use records::{
    DnsRecord, DomainInfo, HostRecord, ProviderKind, ReconciliationOutcome, RecordType, Resource,
    ResourceStatus, ResourceValue,
};
pub use config::{SyncConfig, VerifyConfig};
pub use error::{Error, Result};
