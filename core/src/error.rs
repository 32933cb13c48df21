//! Error types for the Coinbase data client.
//!
//! # Design
//! Errors are split by the point at which they occur. Configuration problems
//! (`InsecureTransport`, `InvalidUri`, `TrustAnchor`) surface from
//! construction. `Transport` means no response was obtained at all. Once a
//! response exists it is either classified by status into an `ApiError`, or,
//! for a 2xx with a broken envelope, reported as `MalformedResponse`.

use std::fmt;

use thiserror::Error;

/// Errors returned by the client, the session and the transports.
#[derive(Debug, Error)]
pub enum Error {
    /// The base URI does not use `https` and the insecure override is off.
    #[error("refusing insecure API endpoint {uri}; use https or set allow_insecure")]
    InsecureTransport { uri: String },

    /// The base URI could not be parsed.
    #[error("invalid base URI {uri}: {source}")]
    InvalidUri {
        uri: String,
        #[source]
        source: url::ParseError,
    },

    /// The configured certificate bundle could not be loaded.
    #[error("failed to load trust anchor {path}: {message}")]
    TrustAnchor { path: String, message: String },

    /// A configuration value could not be interpreted.
    #[error("invalid configuration value for {key}: {message}")]
    InvalidConfig { key: String, message: String },

    /// A request parameter has an unusable value.
    #[error("invalid parameter {name}: {message}")]
    InvalidParameter { name: String, message: String },

    /// The endpoint requires credentials but no signer is configured.
    #[error("endpoint {endpoint} requires credentials but no signer is configured")]
    MissingCredentials { endpoint: String },

    /// No response was obtained from the remote service.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A non-2xx response, classified by status code.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A 2xx response whose envelope is unusable (not JSON, or no `data`).
    #[error("malformed response (HTTP {status}): {message}")]
    MalformedResponse { status: u16, message: String },

    /// A record inside `data` did not match the expected shape.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// Request parameters could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl Error {
    /// The API error kind, when this is a classified API error.
    pub fn api_kind(&self) -> Option<ApiErrorKind> {
        match self {
            Error::Api(e) => Some(e.kind),
            _ => None,
        }
    }

    /// HTTP status of the response that produced this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api(e) => Some(e.status),
            Error::MalformedResponse { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Classification of a non-2xx response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// 401 or 403.
    Authentication,
    /// 429.
    RateLimit,
    /// Any other 4xx.
    Client,
    /// 5xx.
    Server,
    /// Anything outside 2xx, 4xx and 5xx.
    Unknown,
}

impl ApiErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => ApiErrorKind::Authentication,
            429 => ApiErrorKind::RateLimit,
            400..=499 => ApiErrorKind::Client,
            500..=599 => ApiErrorKind::Server,
            _ => ApiErrorKind::Unknown,
        }
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApiErrorKind::Authentication => "authentication error",
            ApiErrorKind::RateLimit => "rate limit exceeded",
            ApiErrorKind::Client => "client error",
            ApiErrorKind::Server => "server error",
            ApiErrorKind::Unknown => "unknown API error",
        };
        f.write_str(name)
    }
}

/// A non-2xx response from the API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} (HTTP {status}): {message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    /// Machine-readable id from the error envelope, e.g. `not_found`.
    pub id: Option<String>,
    pub message: String,
    pub status: u16,
}

/// Why a request produced no response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Dns,
    Connect,
    Tls,
    Io,
    Other,
}

/// The request could not be completed at the transport level.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport error ({kind:?}): {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
