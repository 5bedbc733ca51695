//! Propagation verification
//!
//! The verifier asks a real resolver whether a record is visible, independent
//! of what the registrar claims. Its checks are observational: failures are
//! logged and reported as "not live", never raised into the cycle.

use crate::compare::normalize_value;
use crate::error::Result;
use crate::records::{HostRecord, ROOT_HOST, RecordType};
use crate::traits::{DnsResolver, RawAnswer};
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of a successful resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Comparable answer values
    Found(Vec<String>),
    /// The resolver returned no answers
    NotFound,
}

/// DNS verifier bound to one domain and one transport
#[derive(Clone)]
pub struct DnsVerifier {
    resolver: Arc<dyn DnsResolver>,
    domain: String,
}

impl DnsVerifier {
    /// Create a verifier for `domain`
    pub fn new(resolver: Arc<dyn DnsResolver>, domain: impl Into<String>) -> Self {
        Self {
            resolver,
            domain: domain.into(),
        }
    }

    /// Fully-qualified name for a host label
    pub fn fqdn(&self, host: &str) -> String {
        if host == ROOT_HOST || host.is_empty() {
            self.domain.clone()
        } else {
            format!("{}.{}", host, self.domain)
        }
    }

    /// Resolve `fqdn` for `record_type`
    ///
    /// # Returns
    ///
    /// - `Ok(Resolution::Found)`: Comparable values, one per answer
    /// - `Ok(Resolution::NotFound)`: Empty answer section
    /// - `Err(Error::UnsupportedRecordType)`: Type outside {A, TXT, MX}
    /// - `Err(Error::Resolver)`: The query failed
    pub async fn resolve(&self, fqdn: &str, record_type: &str) -> Result<Resolution> {
        let record_type: RecordType = record_type.parse()?;
        let answers = self.resolver.query(fqdn, record_type).await?;

        if answers.is_empty() {
            return Ok(Resolution::NotFound);
        }

        Ok(Resolution::Found(answers.iter().map(answer_value).collect()))
    }

    /// Whether `record` is observable via DNS
    pub async fn record_is_live(&self, record: &HostRecord) -> bool {
        let fqdn = self.fqdn(&record.name);

        match self.resolve(&fqdn, &record.record_type).await {
            Ok(Resolution::Found(values)) => {
                let wanted = normalize_value(&record.address);
                let live = values.iter().any(|v| normalize_value(v) == wanted);
                debug!(
                    fqdn = %fqdn,
                    record_type = %record.record_type,
                    live,
                    "Resolved {} answer(s) via {}",
                    values.len(),
                    self.resolver.upstream()
                );
                live
            }
            Ok(Resolution::NotFound) => {
                debug!("No {} answers for {} yet", record.record_type, fqdn);
                false
            }
            Err(e) => {
                warn!("Could not verify {} record for {}: {}", record.record_type, fqdn, e);
                false
            }
        }
    }
}

impl std::fmt::Debug for DnsVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsVerifier")
            .field("domain", &self.domain)
            .field("upstream", &self.resolver.upstream())
            .finish()
    }
}

/// Comparable value of one answer
///
/// TXT character-strings are concatenated without separators, MX loses
/// its preference.
pub fn answer_value(answer: &RawAnswer) -> String {
    match answer {
        RawAnswer::A(addr) => addr.to_string(),
        RawAnswer::Txt(text) => txt_content(text),
        RawAnswer::Mx { exchange, .. } => exchange.clone(),
    }
}

/// Concatenated content of a TXT presentation string
///
/// `"abc" "def"` yields `abcdef`; values longer than 255 bytes arrive split
/// this way. Unquoted input is returned unchanged.
fn txt_content(text: &str) -> String {
    if !text.contains('"') {
        return text.to_string();
    }

    let mut content = String::with_capacity(text.len());
    let mut quoted = false;
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => quoted = !quoted,
            '\\' if quoted => {
                if let Some(escaped) = chars.next() {
                    content.push(escaped);
                }
            }
            _ if quoted => content.push(c),
            _ => {}
        }
    }
    content
}
