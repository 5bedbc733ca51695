//! Test doubles and common utilities for contract tests
//!
//! The doubles keep their state behind `Arc`s so a test can hand one clone
//! to the engine and inspect another afterwards.

#![allow(dead_code)]

use dnssync_core::error::{Error, Result};
use dnssync_core::records::{
    DnsRecord, DomainInfo, HostRecord, ProviderKind, RecordType, Resource, ResourceStatus,
};
use dnssync_core::traits::{DnsResolver, OrchestrationClient, RawAnswer, RegistrarClient};
use dnssync_core::SyncConfig;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const DOMAIN: &str = "example.com";

/// How the orchestrator answers a registration request
#[derive(Debug, Clone, Copy)]
pub enum Registration {
    Accept,
    AlreadyRegistered,
    Reject,
}

/// An orchestrator that serves a fixed resource set and records status calls
pub struct MockOrchestrator {
    resources: Mutex<BTreeMap<String, Resource>>,
    registration: Registration,
    fail_fetch: AtomicBool,
    get_call_count: AtomicUsize,
    register_call_count: AtomicUsize,
    deregister_call_count: AtomicUsize,
    statuses: Mutex<Vec<(String, ResourceStatus)>>,
}

impl MockOrchestrator {
    pub fn new(resources: Vec<Resource>) -> Self {
        Self {
            resources: Mutex::new(resources.into_iter().map(|r| (r.id.clone(), r)).collect()),
            registration: Registration::Accept,
            fail_fetch: AtomicBool::new(false),
            get_call_count: AtomicUsize::new(0),
            register_call_count: AtomicUsize::new(0),
            deregister_call_count: AtomicUsize::new(0),
            statuses: Mutex::new(Vec::new()),
        }
    }

    pub fn with_registration(mut self, registration: Registration) -> Self {
        self.registration = registration;
        self
    }

    pub fn fail_fetches(&self) {
        self.fail_fetch.store(true, Ordering::SeqCst);
    }

    pub fn get_call_count(&self) -> usize {
        self.get_call_count.load(Ordering::SeqCst)
    }

    pub fn register_call_count(&self) -> usize {
        self.register_call_count.load(Ordering::SeqCst)
    }

    pub fn deregister_call_count(&self) -> usize {
        self.deregister_call_count.load(Ordering::SeqCst)
    }

    /// Every (resource id, status) pair reported so far
    pub fn statuses(&self) -> Vec<(String, ResourceStatus)> {
        self.statuses.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl OrchestrationClient for MockOrchestrator {
    async fn register_provider(&self, _kind: ProviderKind) -> Result<()> {
        self.register_call_count.fetch_add(1, Ordering::SeqCst);
        match self.registration {
            Registration::Accept => Ok(()),
            Registration::AlreadyRegistered => {
                Err(Error::already_registered("provider of type dns already registered"))
            }
            Registration::Reject => Err(Error::orchestrator("connection refused")),
        }
    }

    async fn deregister_provider(&self, _kind: ProviderKind) -> Result<()> {
        self.deregister_call_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_resources(&self) -> Result<BTreeMap<String, Resource>> {
        self.get_call_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(Error::orchestrator("resource endpoint unavailable"));
        }
        Ok(self.resources.lock().unwrap().clone())
    }

    async fn set_status(&self, resource_id: &str, status: ResourceStatus) -> Result<()> {
        self.statuses
            .lock()
            .unwrap()
            .push((resource_id.to_string(), status));
        Ok(())
    }

    fn client_name(&self) -> &'static str {
        "mock"
    }
}

/// A registrar holding host records in memory and logging every write
pub struct MockRegistrar {
    hosts: Mutex<Vec<HostRecord>>,
    writes: Mutex<Vec<Vec<HostRecord>>>,
    domain_exists: bool,
    fail_get: AtomicBool,
    /// Writes beyond this many are rejected
    fail_after: AtomicUsize,
}

impl MockRegistrar {
    pub fn new(hosts: Vec<HostRecord>) -> Self {
        Self {
            hosts: Mutex::new(hosts),
            writes: Mutex::new(Vec::new()),
            domain_exists: true,
            fail_get: AtomicBool::new(false),
            fail_after: AtomicUsize::new(usize::MAX),
        }
    }

    pub fn without_domain(mut self) -> Self {
        self.domain_exists = false;
        self
    }

    pub fn fail_gets(&self) {
        self.fail_get.store(true, Ordering::SeqCst);
    }

    pub fn fail_sets(&self) {
        self.fail_sets_after(0);
    }

    /// Accept the first `writes` writes, reject every later one
    pub fn fail_sets_after(&self, writes: usize) {
        self.fail_after.store(writes, Ordering::SeqCst);
    }

    /// Every host set passed to `set_hosts`, in order
    pub fn writes(&self) -> Vec<Vec<HostRecord>> {
        self.writes.lock().unwrap().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    pub fn hosts(&self) -> Vec<HostRecord> {
        self.hosts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl RegistrarClient for MockRegistrar {
    async fn get_domain_info(&self, domain: &str) -> Result<DomainInfo> {
        if !self.domain_exists {
            return Err(Error::not_found(format!("Domain not found: {}", domain)));
        }
        Ok(DomainInfo {
            name: domain.to_string(),
            nameservers: vec!["dns1.registrar-servers.com".to_string()],
            using_registrar_dns: true,
        })
    }

    async fn get_hosts(&self, _domain: &str) -> Result<Vec<HostRecord>> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(Error::registrar("getHosts timed out"));
        }
        Ok(self.hosts())
    }

    async fn set_hosts(&self, _domain: &str, hosts: &[HostRecord]) -> Result<()> {
        let previous_writes = {
            let mut writes = self.writes.lock().unwrap();
            writes.push(hosts.to_vec());
            writes.len() - 1
        };
        if previous_writes >= self.fail_after.load(Ordering::SeqCst) {
            return Err(Error::registrar("setHosts rejected"));
        }
        *self.hosts.lock().unwrap() = hosts.to_vec();
        Ok(())
    }

    fn registrar_name(&self) -> &'static str {
        "mock"
    }
}

/// A resolver that serves the registrar's hosts once enough writes happened
///
/// Models propagation lag: until the registrar has seen
/// `visible_after_writes` writes, every query comes back empty.
pub struct LaggingResolver {
    registrar: Arc<MockRegistrar>,
    visible_after_writes: usize,
    query_count: AtomicUsize,
}

impl LaggingResolver {
    pub fn new(registrar: Arc<MockRegistrar>, visible_after_writes: usize) -> Self {
        Self {
            registrar,
            visible_after_writes,
            query_count: AtomicUsize::new(0),
        }
    }

    /// A resolver that never observes anything
    pub fn never(registrar: Arc<MockRegistrar>) -> Self {
        Self::new(registrar, usize::MAX)
    }

    pub fn query_count(&self) -> usize {
        self.query_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DnsResolver for LaggingResolver {
    async fn query(&self, fqdn: &str, record_type: RecordType) -> Result<Vec<RawAnswer>> {
        self.query_count.fetch_add(1, Ordering::SeqCst);
        if self.registrar.write_count() < self.visible_after_writes {
            return Ok(Vec::new());
        }

        let host = if fqdn == DOMAIN {
            "@".to_string()
        } else {
            fqdn.trim_end_matches(&format!(".{}", DOMAIN)).to_string()
        };

        Ok(self
            .registrar
            .hosts()
            .into_iter()
            .filter(|h| h.name.eq_ignore_ascii_case(&host))
            .filter(|h| h.record_type.eq_ignore_ascii_case(record_type.as_str()))
            .filter_map(|h| match record_type {
                RecordType::A => h.address.parse().ok().map(RawAnswer::A),
                RecordType::Txt => Some(RawAnswer::Txt(format!("\"{}\"", h.address))),
                RecordType::Mx => Some(RawAnswer::Mx {
                    preference: 10,
                    exchange: format!("{}.", h.address),
                }),
            })
            .collect())
    }

    fn upstream(&self) -> String {
        "lagging".to_string()
    }
}

/// A DNS resource with the given id and record fields
pub fn dns_resource(id: &str, host: &str, record_type: &str, value: &str, ttl: u32) -> Resource {
    Resource::dns(
        id,
        DnsRecord {
            host: host.to_string(),
            record_type: record_type.to_string(),
            value: value.to_string(),
            ttl,
        },
    )
}

/// Configuration with no verification delay, for fast tests
pub fn fast_config() -> SyncConfig {
    let mut config = SyncConfig::new(DOMAIN);
    config.poll_interval_secs = 30;
    config.verify.delay_secs = 0;
    config.verify.max_delay_secs = 0;
    config
}
