// # Namecheap Registrar Client
//
// This crate implements `RegistrarClient` against the Namecheap XML API.
//
// ## Trust Level: Untrusted
//
// One HTTP request per call. No retries, no backoff, no caching; the
// synchronizer decides when to read and when to write.
//
// ## Security Requirements
//
// - API key NEVER appears in logs
// - Client fails fast if any credential is empty
//
// ## API Reference
//
// - Endpoint: `https://api.namecheap.com/xml.response` (sandbox: `api.sandbox.namecheap.com`)
// - `namecheap.domains.getInfo` (`DomainName`)
// - `namecheap.domains.dns.getHosts` (`SLD`, `TLD`)
// - `namecheap.domains.dns.setHosts` (`SLD`, `TLD`, `HostNameN`, `RecordTypeN`, ...)
//
// `setHosts` replaces the whole host set: any host not listed is deleted.

use async_trait::async_trait;
use dnssync_core::records::{DomainInfo, HostRecord};
use dnssync_core::traits::RegistrarClient;
use dnssync_core::{Error, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Production API endpoint
const NAMECHEAP_API: &str = "https://api.namecheap.com/xml.response";

/// Sandbox API endpoint
const NAMECHEAP_SANDBOX_API: &str = "https://api.sandbox.namecheap.com/xml.response";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Client IP sent when none is configured
pub const DEFAULT_CLIENT_IP: &str = "127.0.0.1";

/// MX preference used when a record carries none
const DEFAULT_MX_PREF: u16 = 10;

/// Error numbers meaning the domain is unknown to the account
const DOMAIN_NOT_FOUND_ERRORS: &[&str] = &["2019166", "2016166"];

/// Error numbers meaning the credentials or client IP were refused
const AUTH_ERRORS: &[&str] = &["1011102", "1011150", "1017150"];

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(rename = "@Status")]
    status: String,
    #[serde(rename = "Errors", default)]
    errors: ApiErrors,
    #[serde(rename = "CommandResponse")]
    command_response: Option<CommandResponse>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrors {
    #[serde(rename = "Error", default)]
    errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(rename = "@Number", default)]
    number: String,
    #[serde(rename = "$text", default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct CommandResponse {
    #[serde(rename = "DomainGetInfoResult")]
    domain_info: Option<DomainGetInfoResult>,
    #[serde(rename = "DomainDNSGetHostsResult")]
    get_hosts: Option<GetHostsResult>,
    #[serde(rename = "DomainDNSSetHostsResult")]
    set_hosts: Option<SetHostsResult>,
}

#[derive(Debug, Deserialize)]
struct DomainGetInfoResult {
    #[serde(rename = "@DomainName")]
    domain_name: String,
    #[serde(rename = "DnsDetails")]
    dns_details: Option<DnsDetails>,
}

#[derive(Debug, Deserialize)]
struct DnsDetails {
    #[serde(rename = "@IsUsingOurDNS", default)]
    using_our_dns: bool,
    #[serde(rename = "Nameserver", default)]
    nameservers: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GetHostsResult {
    #[serde(rename = "host", default)]
    hosts: Vec<WireHost>,
}

#[derive(Debug, Deserialize)]
struct WireHost {
    #[serde(rename = "@Name")]
    name: String,
    #[serde(rename = "@Type")]
    record_type: String,
    #[serde(rename = "@Address", default)]
    address: String,
    #[serde(rename = "@TTL", default)]
    ttl: u32,
    #[serde(rename = "@MXPref")]
    mx_pref: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct SetHostsResult {
    #[serde(rename = "@IsSuccess", default)]
    is_success: bool,
}

impl From<WireHost> for HostRecord {
    fn from(host: WireHost) -> Self {
        let is_mx = host.record_type.eq_ignore_ascii_case("MX");
        HostRecord {
            name: host.name,
            record_type: host.record_type,
            address: host.address,
            ttl: host.ttl,
            mx_pref: if is_mx { host.mx_pref } else { None },
        }
    }
}

/// Namecheap registrar client
pub struct NamecheapClient {
    /// API user
    api_user: String,

    /// API key
    /// ⚠️ NEVER log this value
    api_key: String,

    /// Account the domains belong to
    username: String,

    /// Whitelisted client IP sent with every request
    client_ip: String,

    /// API endpoint (production or sandbox)
    endpoint: &'static str,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API key
impl std::fmt::Debug for NamecheapClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamecheapClient")
            .field("api_user", &self.api_user)
            .field("api_key", &"<REDACTED>")
            .field("username", &self.username)
            .field("client_ip", &self.client_ip)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl NamecheapClient {
    /// Create a new Namecheap client against the production API
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if any credential is empty.
    pub fn new(
        api_user: impl Into<String>,
        api_key: impl Into<String>,
        username: impl Into<String>,
    ) -> Result<Self> {
        let api_user = api_user.into();
        let api_key = api_key.into();
        let username = username.into();

        if api_user.is_empty() {
            return Err(Error::config("Namecheap API user cannot be empty"));
        }
        if api_key.is_empty() {
            return Err(Error::config("Namecheap API key cannot be empty"));
        }
        if username.is_empty() {
            return Err(Error::config("Namecheap username cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_user,
            api_key,
            username,
            client_ip: DEFAULT_CLIENT_IP.to_string(),
            endpoint: NAMECHEAP_API,
            client,
        })
    }

    /// Send a different whitelisted client IP
    pub fn with_client_ip(mut self, client_ip: impl Into<String>) -> Self {
        self.client_ip = client_ip.into();
        self
    }

    /// Use the sandbox API instead of production
    pub fn with_sandbox(mut self, sandbox: bool) -> Self {
        self.endpoint = if sandbox {
            NAMECHEAP_SANDBOX_API
        } else {
            NAMECHEAP_API
        };
        self
    }

    /// Parameters every command carries
    fn global_params(&self, command: &str) -> Vec<(String, String)> {
        vec![
            ("ApiUser".to_string(), self.api_user.clone()),
            ("ApiKey".to_string(), self.api_key.clone()),
            ("UserName".to_string(), self.username.clone()),
            ("ClientIp".to_string(), self.client_ip.clone()),
            ("Command".to_string(), command.to_string()),
        ]
    }

    async fn get(&self, command: &str, params: Vec<(String, String)>) -> Result<CommandResponse> {
        debug!("Namecheap GET {}", command);
        let mut query = self.global_params(command);
        query.extend(params);

        let request = self.client.get(self.endpoint).query(&query);
        self.execute(command, request).await
    }

    async fn post(&self, command: &str, params: Vec<(String, String)>) -> Result<CommandResponse> {
        debug!("Namecheap POST {}", command);
        let mut form = self.global_params(command);
        form.extend(params);

        let request = self.client.post(self.endpoint).form(&form);
        self.execute(command, request).await
    }

    async fn execute(
        &self,
        command: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<CommandResponse> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::registrar(format!("{}: HTTP request failed: {}", command, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::registrar(format!("{}: failed to read response: {}", command, e)))?;

        if !status.is_success() {
            return Err(Error::registrar(format!(
                "{}: HTTP {} - {}",
                command,
                status,
                body.trim()
            )));
        }

        parse_response(command, &body)
    }
}

/// Parse an API response, turning `Status="ERROR"` into an error
fn parse_response(command: &str, body: &str) -> Result<CommandResponse> {
    let response: ApiResponse = quick_xml::de::from_str(body)
        .map_err(|e| Error::registrar(format!("{}: malformed XML response: {}", command, e)))?;

    if !response.status.eq_ignore_ascii_case("OK") {
        return Err(api_error(command, &response.errors.errors));
    }

    response
        .command_response
        .ok_or_else(|| Error::registrar(format!("{}: response has no CommandResponse", command)))
}

fn api_error(command: &str, errors: &[ApiError]) -> Error {
    let message = errors
        .iter()
        .map(|e| format!("{} ({})", e.message.trim(), e.number))
        .collect::<Vec<_>>()
        .join("; ");
    let message = if message.is_empty() {
        format!("{}: request failed without error details", command)
    } else {
        format!("{}: {}", command, message)
    };

    let has = |codes: &[&str]| errors.iter().any(|e| codes.contains(&e.number.as_str()));
    if has(DOMAIN_NOT_FOUND_ERRORS) {
        Error::not_found(message)
    } else if has(AUTH_ERRORS) {
        Error::auth(message)
    } else {
        Error::registrar(message)
    }
}

/// Split a domain into second-level label and the rest
///
/// `example.co.uk` becomes `("example", "co.uk")`.
fn split_domain(domain: &str) -> Result<(&str, &str)> {
    match domain.split_once('.') {
        Some((sld, tld)) if !sld.is_empty() && !tld.is_empty() => Ok((sld, tld)),
        _ => Err(Error::config(format!(
            "Domain must have the form name.tld: {}",
            domain
        ))),
    }
}

/// Form parameters for `setHosts`, hosts numbered from 1
fn set_hosts_params(sld: &str, tld: &str, hosts: &[HostRecord]) -> Vec<(String, String)> {
    let mut params = vec![
        ("SLD".to_string(), sld.to_string()),
        ("TLD".to_string(), tld.to_string()),
    ];

    let mut has_mx = false;
    for (i, host) in hosts.iter().enumerate() {
        let n = i + 1;
        params.push((format!("HostName{}", n), host.name.clone()));
        params.push((format!("RecordType{}", n), host.record_type.to_uppercase()));
        params.push((format!("Address{}", n), host.address.clone()));
        params.push((format!("TTL{}", n), host.ttl.to_string()));

        if host.record_type.eq_ignore_ascii_case("MX") {
            has_mx = true;
            let pref = host.mx_pref.unwrap_or(DEFAULT_MX_PREF);
            params.push((format!("MXPref{}", n), pref.to_string()));
        }
    }

    if has_mx {
        params.push(("EmailType".to_string(), "MX".to_string()));
    }

    params
}

/// Check that `setHosts` reported success
fn set_hosts_result(domain: &str, response: CommandResponse) -> Result<()> {
    match response.set_hosts {
        Some(result) if result.is_success => Ok(()),
        _ => Err(Error::registrar(format!(
            "setHosts for {} was not acknowledged",
            domain
        ))),
    }
}

#[async_trait]
impl RegistrarClient for NamecheapClient {
    async fn get_domain_info(&self, domain: &str) -> Result<DomainInfo> {
        let response = self
            .get(
                "namecheap.domains.getInfo",
                vec![("DomainName".to_string(), domain.to_string())],
            )
            .await?;

        let info = response
            .domain_info
            .ok_or_else(|| Error::registrar("getInfo response has no DomainGetInfoResult"))?;

        let (nameservers, using_registrar_dns) = match info.dns_details {
            Some(details) => (details.nameservers, details.using_our_dns),
            None => (Vec::new(), false),
        };

        Ok(DomainInfo {
            name: info.domain_name,
            nameservers,
            using_registrar_dns,
        })
    }

    async fn get_hosts(&self, domain: &str) -> Result<Vec<HostRecord>> {
        let (sld, tld) = split_domain(domain)?;
        let response = self
            .get(
                "namecheap.domains.dns.getHosts",
                vec![
                    ("SLD".to_string(), sld.to_string()),
                    ("TLD".to_string(), tld.to_string()),
                ],
            )
            .await?;

        let result = response
            .get_hosts
            .ok_or_else(|| Error::registrar("getHosts response has no DomainDNSGetHostsResult"))?;

        let hosts: Vec<HostRecord> = result.hosts.into_iter().map(HostRecord::from).collect();
        debug!("Registrar holds {} host record(s) for {}", hosts.len(), domain);
        Ok(hosts)
    }

    async fn set_hosts(&self, domain: &str, hosts: &[HostRecord]) -> Result<()> {
        let (sld, tld) = split_domain(domain)?;
        let response = self
            .post(
                "namecheap.domains.dns.setHosts",
                set_hosts_params(sld, tld, hosts),
            )
            .await?;

        set_hosts_result(domain, response)
    }

    fn registrar_name(&self) -> &'static str {
        "namecheap"
    }
}
