//! Record and resource types shared by every component
//!
//! Desired state arrives from the orchestrator as [`Resource`]s; live state
//! arrives from the registrar as [`HostRecord`]s. The synchronizer projects
//! the former into the latter before comparing or writing.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Host label that stands for the bare domain
pub const ROOT_HOST: &str = "@";

/// Record types the verifier knows how to resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// Text record
    Txt,
    /// Mail exchanger record
    Mx,
}

impl RecordType {
    /// Canonical upper-case mnemonic
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Txt => "TXT",
            RecordType::Mx => "MX",
        }
    }
}

impl FromStr for RecordType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Ok(RecordType::A),
            "TXT" => Ok(RecordType::Txt),
            "MX" => Ok(RecordType::Mx),
            _ => Err(Error::unsupported_type(s)),
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A desired DNS record as declared by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Subdomain label, or `@` for the bare domain
    pub host: String,

    /// Record type mnemonic (A, TXT, MX, ...)
    #[serde(rename = "type")]
    pub record_type: String,

    /// Address, text or target
    pub value: String,

    /// Advisory TTL in seconds
    #[serde(default)]
    pub ttl: u32,
}

/// Payload of an orchestrator resource
///
/// Only the DNS case is consumed by the synchronizer; anything else is
/// carried through so that projection can reject it by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceValue {
    /// A DNS record
    Dns(DnsRecord),
    /// A resource kind this provider does not handle
    Other {
        /// Kind as reported by the orchestrator
        kind: String,
    },
}

/// Provisioning status of an orchestrator resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    /// Waiting for a provider to act
    Requested,
    /// Applied at the registrar and observed live
    Created,
    /// Provider gave up on the resource
    Failed,
}

impl ResourceStatus {
    /// Wire name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceStatus::Requested => "requested",
            ResourceStatus::Created => "created",
            ResourceStatus::Failed => "failed",
        }
    }
}

/// One entry of the orchestrator's resource set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Opaque identifier owned by the orchestrator
    pub id: String,
    /// Resource payload
    pub value: ResourceValue,
    /// Last status the orchestrator knows about
    pub status: Option<ResourceStatus>,
}

impl Resource {
    /// Create a DNS resource
    pub fn dns(id: impl Into<String>, record: DnsRecord) -> Self {
        Self {
            id: id.into(),
            value: ResourceValue::Dns(record),
            status: None,
        }
    }
}

/// Kinds of provider the orchestrator knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// DNS provider
    Dns,
}

impl ProviderKind {
    /// Wire name of the provider kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Dns => "dns",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A host record in the registrar's shape
///
/// Used both for what the registrar reports and for what gets written back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    /// Host label, `@` for the bare domain
    pub name: String,

    /// Record type mnemonic
    pub record_type: String,

    /// Address, text or target
    pub address: String,

    /// TTL in seconds
    pub ttl: u32,

    /// MX preference, if the registrar tracks one
    #[serde(default)]
    pub mx_pref: Option<u16>,
}

impl HostRecord {
    /// Create a host record without registrar metadata
    pub fn new(
        name: impl Into<String>,
        record_type: impl Into<String>,
        address: impl Into<String>,
        ttl: u32,
    ) -> Self {
        Self {
            name: name.into(),
            record_type: record_type.into(),
            address: address.into(),
            ttl,
            mx_pref: None,
        }
    }

    /// Short `name/type/address` label for logs and errors
    pub fn label(&self) -> String {
        format!("{}/{}/{}", self.name, self.record_type, self.address)
    }
}

impl From<&DnsRecord> for HostRecord {
    fn from(record: &DnsRecord) -> Self {
        HostRecord::new(
            record.host.clone(),
            record.record_type.clone(),
            record.value.clone(),
            record.ttl,
        )
    }
}

/// Registrar metadata about the managed domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainInfo {
    /// Domain name
    pub name: String,
    /// Authoritative nameservers
    pub nameservers: Vec<String>,
    /// Whether the registrar's own DNS serves the zone
    pub using_registrar_dns: bool,
}

/// Result of one reconciliation cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationOutcome {
    /// Live state already matched desired state
    pub in_sync: bool,
    /// A full-set replacement write was issued
    pub write_attempted: bool,
    /// Registrar error from the replacement write, if any
    pub write_error: Option<String>,
    /// Every desired record was observed live
    pub verified: bool,
    /// Number of propagation checks that found pending records
    pub verify_attempts: usize,
}
