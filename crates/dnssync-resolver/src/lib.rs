// # Pinned DNS Resolver
//
// `DnsResolver` implementation on hickory-resolver, pinned to one upstream
// server with caching disabled.
//
// Propagation checks must observe what a public resolver sees right now:
// no system resolver, no hosts file, no cached answers between queries.

use async_trait::async_trait;
use dnssync_core::records::RecordType;
use dnssync_core::traits::{DnsResolver, RawAnswer};
use dnssync_core::{Error, Result};
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::proto::rr::{RData, RecordType as WireType};
use hickory_resolver::TokioAsyncResolver;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::trace;

/// Upstream used when none is configured
pub const DEFAULT_UPSTREAM: &str = "8.8.8.8:53";

/// Per-query timeout
const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// DNS resolver pinned to a single upstream
pub struct HickoryResolver {
    upstream: SocketAddr,
    resolver: TokioAsyncResolver,
}

impl std::fmt::Debug for HickoryResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HickoryResolver")
            .field("upstream", &self.upstream)
            .finish()
    }
}

impl HickoryResolver {
    /// Create a resolver that only talks to `upstream`
    pub fn new(upstream: SocketAddr) -> Self {
        let servers = NameServerConfigGroup::from_ips_clear(&[upstream.ip()], upstream.port(), true);
        let config = ResolverConfig::from_parts(None, vec![], servers);

        let mut opts = ResolverOpts::default();
        opts.cache_size = 0;
        opts.use_hosts_file = false;
        opts.timeout = QUERY_TIMEOUT;

        Self {
            upstream,
            resolver: TokioAsyncResolver::tokio(config, opts),
        }
    }

    /// Parse `ip:port` and create a resolver for it
    pub fn from_addr(upstream: &str) -> Result<Self> {
        let addr: SocketAddr = upstream
            .parse()
            .map_err(|e| Error::config(format!("Invalid resolver address '{}': {}", upstream, e)))?;
        Ok(Self::new(addr))
    }
}

fn wire_type(record_type: RecordType) -> WireType {
    match record_type {
        RecordType::A => WireType::A,
        RecordType::Txt => WireType::TXT,
        RecordType::Mx => WireType::MX,
    }
}

/// Absolute form of a name, so no search domain is ever appended
fn absolute(fqdn: &str) -> String {
    if fqdn.ends_with('.') {
        fqdn.to_string()
    } else {
        format!("{}.", fqdn)
    }
}

/// One TXT character-string in presentation form
fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Convert one answer into the transport-neutral shape
///
/// Answers of other types (a CNAME in front of the target, for example)
/// yield `None`.
fn to_raw(rdata: &RData) -> Option<RawAnswer> {
    match rdata {
        RData::A(a) => Some(RawAnswer::A(a.0)),
        RData::TXT(txt) => {
            let strings: Vec<String> = txt
                .txt_data()
                .iter()
                .map(|part| quote(&String::from_utf8_lossy(part)))
                .collect();
            Some(RawAnswer::Txt(strings.join(" ")))
        }
        RData::MX(mx) => Some(RawAnswer::Mx {
            preference: mx.preference(),
            exchange: mx.exchange().to_string(),
        }),
        _ => None,
    }
}

#[async_trait]
impl DnsResolver for HickoryResolver {
    async fn query(&self, fqdn: &str, record_type: RecordType) -> Result<Vec<RawAnswer>> {
        let name = absolute(fqdn);
        trace!("Querying {} {} via {}", name, record_type, self.upstream);

        match self.resolver.lookup(name.as_str(), wire_type(record_type)).await {
            Ok(lookup) => Ok(lookup.iter().filter_map(to_raw).collect()),
            Err(e) => match e.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => Ok(Vec::new()),
                _ => Err(Error::resolver(format!(
                    "{} {} via {}: {}",
                    name, record_type, self.upstream, e
                ))),
            },
        }
    }

    fn upstream(&self) -> String {
        self.upstream.to_string()
    }
}
