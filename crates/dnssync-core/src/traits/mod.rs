//! Core traits for the DNS sync system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`OrchestrationClient`]: Desired state and status reporting
//! - [`RegistrarClient`]: Live host records and full-set replacement
//! - [`DnsResolver`]: Raw DNS queries for propagation checks

pub mod orchestrator;
pub mod registrar;
pub mod resolver;

pub use orchestrator::OrchestrationClient;
pub use registrar::RegistrarClient;
pub use resolver::{DnsResolver, RawAnswer};
