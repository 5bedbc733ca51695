// # DNS Resolver Trait
//
// Defines the raw DNS transport used for propagation checks.
//
// ## Implementations
//
// - hickory-resolver, pinned to one upstream: `dnssync-resolver` crate
//
// The transport only answers "what does this server say for name+type".
// Turning answers into comparable strings is done by
// [`DnsVerifier`](crate::verify::DnsVerifier).

use crate::error::Result;
use crate::records::RecordType;
use async_trait::async_trait;
use std::net::Ipv4Addr;

/// One answer record, as returned by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawAnswer {
    /// IPv4 address
    A(Ipv4Addr),
    /// TXT payload in presentation form (quoted character-strings)
    Txt(String),
    /// Mail exchanger
    Mx {
        /// Preference value
        preference: u16,
        /// Exchange host name, possibly fully qualified with a trailing dot
        exchange: String,
    },
}

/// Trait for DNS transports
///
/// # Returns
///
/// - `Ok(answers)` with at least one entry: the name resolved
/// - `Ok(vec![])`: no answers (NXDOMAIN or no data for the type)
/// - `Err(Error::Resolver)`: the query itself failed
///
/// Implementations must not retry internally and must not cache answers.
#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// Query `fqdn` for `record_type`
    async fn query(&self, fqdn: &str, record_type: RecordType) -> Result<Vec<RawAnswer>>;

    /// Upstream server description (for logging/debugging)
    fn upstream(&self) -> String;
}
