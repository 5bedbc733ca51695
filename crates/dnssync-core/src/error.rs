//! Error types for the DNS sync system
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for DNS sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DNS sync system
#[derive(Error, Debug)]
pub enum Error {
    /// Orchestration-service errors (fetching resources, reporting status)
    #[error("Orchestrator error: {0}")]
    Orchestrator(String),

    /// Registrar API errors (fetching or replacing host records)
    #[error("Registrar error: {0}")]
    Registrar(String),

    /// DNS query errors (transport failure, malformed response)
    #[error("Resolver error: {0}")]
    Resolver(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Domain, record or resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The provider is already registered with the orchestration service
    #[error("Already registered: {0}")]
    AlreadyRegistered(String),

    /// Record type outside the verifiable set
    #[error("Unsupported record type: {0}")]
    UnsupportedRecordType(String),

    /// A desired resource carried a payload other than a DNS record
    #[error("Resource {id} has unexpected kind '{kind}'")]
    UnexpectedResource {
        /// Resource identifier
        id: String,
        /// Resource kind reported by the orchestrator
        kind: String,
    },

    /// Propagation was not observed within the configured attempt bound
    #[error("Propagation not verified after {attempts} attempt(s); pending: {}", pending.join(", "))]
    VerificationStalled {
        /// Number of verification rounds performed
        attempts: usize,
        /// Records (as `name/type/value`) that never resolved
        pending: Vec<String>,
    },

    /// Fatal startup failure (registration or domain check)
    #[error("Startup failed: {0}")]
    Startup(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an orchestrator error
    pub fn orchestrator(msg: impl Into<String>) -> Self {
        Self::Orchestrator(msg.into())
    }

    /// Create a registrar error
    pub fn registrar(msg: impl Into<String>) -> Self {
        Self::Registrar(msg.into())
    }

    /// Create a resolver error
    pub fn resolver(msg: impl Into<String>) -> Self {
        Self::Resolver(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an "already registered" error
    pub fn already_registered(msg: impl Into<String>) -> Self {
        Self::AlreadyRegistered(msg.into())
    }

    /// Create an unsupported record type error
    pub fn unsupported_type(record_type: impl Into<String>) -> Self {
        Self::UnsupportedRecordType(record_type.into())
    }

    /// Create a startup error
    pub fn startup(msg: impl Into<String>) -> Self {
        Self::Startup(msg.into())
    }

    /// Whether this error means the target does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
