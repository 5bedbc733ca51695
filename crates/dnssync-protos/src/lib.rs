// # Protos Orchestration Client
//
// This crate implements `OrchestrationClient` against the Protos internal
// HTTP/JSON API.
//
// ## Endpoints
//
// - Register provider: POST `internal/provider` `{"type": "dns"}`
// - Deregister provider: DELETE `internal/provider` `{"type": "dns"}`
// - List resources: GET `internal/resource/provider`
// - Set resource status: POST `internal/resource/:id` `{"status": "created"}`
//
// Every request carries the `Appid` header identifying this provider.
//
// ## Trust Level: Untrusted
//
// One HTTP request per call. No retries, no caching, no background tasks;
// the synchronizer owns all of that.

use async_trait::async_trait;
use dnssync_core::records::{ProviderKind, Resource, ResourceStatus, ResourceValue, DnsRecord};
use dnssync_core::traits::OrchestrationClient;
use dnssync_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Default Protos API base URL
pub const DEFAULT_BASE_URL: &str = "http://protos:8080/";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Header carrying the provider's application id
const APPID_HEADER: &str = "Appid";

/// Resource kind handled by DNS providers
const DNS_KIND: &str = "dns";

/// Resource as Protos serializes it
#[derive(Debug, Deserialize)]
struct WireResource {
    #[serde(default)]
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Serialize)]
struct ProviderRequest<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Serialize)]
struct StatusRequest<'a> {
    status: &'a str,
}

/// Protos orchestration client
pub struct ProtosClient {
    /// API base URL, always ending in `/`
    base_url: String,

    /// Application id sent with every request
    /// ⚠️ NEVER log this value
    app_id: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the app id
impl std::fmt::Debug for ProtosClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtosClient")
            .field("base_url", &self.base_url)
            .field("app_id", &"<REDACTED>")
            .finish()
    }
}

impl ProtosClient {
    /// Create a new Protos client
    ///
    /// # Parameters
    ///
    /// - `base_url`: API base URL (e.g., "http://protos:8080/")
    /// - `app_id`: Application id issued by Protos
    pub fn new(base_url: impl Into<String>, app_id: impl Into<String>) -> Result<Self> {
        let app_id = app_id.into();
        if app_id.is_empty() {
            return Err(Error::config("Protos app id cannot be empty"));
        }

        let mut base_url = base_url.into();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::config(format!(
                "Protos URL must use HTTP or HTTPS scheme. Got: {}",
                base_url
            )));
        }
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            app_id,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        request
            .header(APPID_HEADER, &self.app_id)
            .send()
            .await
            .map_err(|e| Error::orchestrator(format!("HTTP request failed: {}", e)))
    }
}

/// Map a non-success response to an error
async fn error_for(response: reqwest::Response, what: &str) -> Error {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error response".to_string());

    match status.as_u16() {
        401 | 403 => Error::auth(format!("{}: Protos rejected the app id. Status: {}", what, status)),
        404 => Error::not_found(format!("{}: {}", what, body.trim())),
        500..=599 => Error::orchestrator(format!(
            "{}: Protos server error (transient): {} - {}",
            what,
            status,
            body.trim()
        )),
        _ => Error::orchestrator(format!("{}: {} - {}", what, status, body.trim())),
    }
}

/// Whether a registration response means "already registered"
fn is_already_registered(status: u16, body: &str) -> bool {
    status == 409 || body.to_lowercase().contains("already registered")
}

/// Convert the wire resource map into core resources
fn parse_resources(body: &str) -> Result<BTreeMap<String, Resource>> {
    let wire: BTreeMap<String, WireResource> = serde_json::from_str(body)?;

    wire.into_iter()
        .map(|(key, resource)| {
            let id = if resource.id.is_empty() {
                key.clone()
            } else {
                resource.id
            };

            let value = if resource.kind.eq_ignore_ascii_case(DNS_KIND) {
                let record: DnsRecord = serde_json::from_value(resource.value).map_err(|e| {
                    Error::orchestrator(format!("Resource {} has a malformed DNS value: {}", id, e))
                })?;
                ResourceValue::Dns(record)
            } else {
                ResourceValue::Other {
                    kind: resource.kind,
                }
            };

            let status = resource.status.as_deref().and_then(parse_status);

            Ok((key, Resource { id, value, status }))
        })
        .collect()
}

fn parse_status(status: &str) -> Option<ResourceStatus> {
    match status {
        "requested" => Some(ResourceStatus::Requested),
        "created" => Some(ResourceStatus::Created),
        "failed" => Some(ResourceStatus::Failed),
        _ => None,
    }
}

#[async_trait]
impl OrchestrationClient for ProtosClient {
    async fn register_provider(&self, kind: ProviderKind) -> Result<()> {
        let request = self
            .client
            .post(self.url("internal/provider"))
            .json(&ProviderRequest { kind: kind.as_str() });
        let response = self.send(request).await?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        if is_already_registered(status, &body) {
            return Err(Error::already_registered(body.trim().to_string()));
        }

        Err(Error::orchestrator(format!(
            "Provider registration failed: {} - {}",
            status,
            body.trim()
        )))
    }

    async fn deregister_provider(&self, kind: ProviderKind) -> Result<()> {
        let request = self
            .client
            .delete(self.url("internal/provider"))
            .json(&ProviderRequest { kind: kind.as_str() });
        let response = self.send(request).await?;

        if !response.status().is_success() {
            return Err(error_for(response, "Provider deregistration failed").await);
        }
        Ok(())
    }

    async fn get_resources(&self) -> Result<BTreeMap<String, Resource>> {
        let request = self.client.get(self.url("internal/resource/provider"));
        let response = self.send(request).await?;

        if !response.status().is_success() {
            return Err(error_for(response, "Resource fetch failed").await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::orchestrator(format!("Failed to read response: {}", e)))?;
        let resources = parse_resources(&body)?;
        debug!("Found {} resource(s)", resources.len());
        Ok(resources)
    }

    async fn set_status(&self, resource_id: &str, status: ResourceStatus) -> Result<()> {
        debug!("Setting status {} for resource {}", status.as_str(), resource_id);

        let request = self
            .client
            .post(self.url(&format!("internal/resource/{}", resource_id)))
            .json(&StatusRequest {
                status: status.as_str(),
            });
        let response = self.send(request).await?;

        if !response.status().is_success() {
            return Err(error_for(response, "Status update failed").await);
        }
        Ok(())
    }

    fn client_name(&self) -> &'static str {
        "protos"
    }
}
