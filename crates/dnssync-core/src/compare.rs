//! Record comparison
//!
//! Decides whether the registrar's live host set already reflects the desired
//! set. The rule is deliberately tolerant: registrars append root-label dots,
//! change the case of names and round TTLs, none of which should trigger a
//! rewrite.
//!
//! The match step is a presence check per desired entry, not a one-to-one
//! pairing. A single live entry may satisfy several identical desired
//! entries, so duplicated desired records can mask a missing live one. The
//! cardinality check bounds the effect but does not remove it.

use crate::records::{HostRecord, ROOT_HOST};

/// Addresses a registrar uses for hosts nobody has customized
const PLACEHOLDER_TARGETS: &[&str] = &["parkingpage.namecheap.com"];

/// Registrar-side redirect types; a parked domain's bare host is one of these
const REDIRECT_TYPES: &[&str] = &["URL", "URL301", "FRAME"];

/// Strip a single trailing root-label dot
pub fn normalize_value(value: &str) -> &str {
    value.strip_suffix('.').unwrap_or(value)
}

/// Compare a desired host set against the live one
///
/// # Parameters
///
/// - `desired`: Desired records projected into the registrar's shape
/// - `live`: Records reported by the registrar
/// - `ttl_tolerance_secs`: Accepted TTL drift, inclusive
pub fn equivalent(desired: &[HostRecord], live: &[HostRecord], ttl_tolerance_secs: u32) -> bool {
    if desired.is_empty() && is_default_hosts(live) {
        return true;
    }

    if desired.len() != live.len() {
        return false;
    }

    let matched = desired
        .iter()
        .filter(|d| live.iter().any(|l| records_match(d, l, ttl_tolerance_secs)))
        .count();

    matched >= desired.len()
}

/// Whether two records describe the same DNS data
pub fn records_match(desired: &HostRecord, live: &HostRecord, ttl_tolerance_secs: u32) -> bool {
    normalize_value(&desired.address) == normalize_value(&live.address)
        && desired.name.eq_ignore_ascii_case(&live.name)
        && desired.record_type.eq_ignore_ascii_case(&live.record_type)
        && desired.ttl.abs_diff(live.ttl) <= ttl_tolerance_secs
}

/// Whether `live` is the registrar's untouched default host pair
///
/// A fresh domain carries exactly two placeholder hosts, one for the bare
/// domain and one for `www`, neither pointing anywhere custom.
pub fn is_default_hosts(live: &[HostRecord]) -> bool {
    let [first, second] = live else {
        return false;
    };

    let names_match = (is_named(first, ROOT_HOST) && is_named(second, "www"))
        || (is_named(first, "www") && is_named(second, ROOT_HOST));

    names_match && is_placeholder(first) && is_placeholder(second)
}

fn is_named(host: &HostRecord, name: &str) -> bool {
    host.name.eq_ignore_ascii_case(name)
}

fn is_placeholder(host: &HostRecord) -> bool {
    if is_named(host, ROOT_HOST)
        && REDIRECT_TYPES
            .iter()
            .any(|t| host.record_type.eq_ignore_ascii_case(t))
    {
        return true;
    }

    let address = normalize_value(host.address.trim());
    address.is_empty()
        || PLACEHOLDER_TARGETS
            .iter()
            .any(|target| address.eq_ignore_ascii_case(target))
}
