//! Executing requests over the network.
//!
//! # Design
//! `Transport` is the only seam that performs I/O. The default
//! implementation is a blocking `ureq` agent configured once from
//! `ClientConfig`: timeout, trust anchor, and status codes returned as data
//! so classification stays in `DataClient::parse`.

use std::sync::Arc;

use ureq::tls::{Certificate, PemItem, RootCerts, TlsConfig};

use crate::config::{ClientConfig, TrustAnchor};
use crate::error::{Error, TransportError, TransportErrorKind};
use crate::http::{HttpRequest, HttpResponse};

/// Performs one HTTP round-trip.
///
/// Implementations must be safe to share between threads; a `Session` is
/// `Sync` and may be used by several callers at once.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }
}

/// Blocking transport backed by a `ureq::Agent`.
///
/// The agent is internally synchronized, so one instance can serve
/// concurrent requests.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, Error> {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(config.timeout))
            .tls_config(tls_config(&config.trust_anchor)?)
            .build()
            .new_agent();
        Ok(Self { agent })
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = ureq::http::Request::builder()
            .method(request.method.as_str())
            .uri(request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let sent = match &request.body {
            Some(body) => builder.body(body.clone()).map(|req| self.agent.run(req)),
            None => builder.body(()).map(|req| self.agent.run(req)),
        };
        let mut response = sent
            .map_err(|e| TransportError::new(TransportErrorKind::Other, format!("invalid request: {e}")))?
            .map_err(classify)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.body_mut().read_to_string().map_err(classify)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn tls_config(anchor: &TrustAnchor) -> Result<TlsConfig, Error> {
    match anchor {
        TrustAnchor::Default => Ok(TlsConfig::builder().build()),
        TrustAnchor::Bundle(path) => {
            let trust_anchor_error = |message: String| Error::TrustAnchor {
                path: path.display().to_string(),
                message,
            };
            let pem = std::fs::read(path).map_err(|e| trust_anchor_error(e.to_string()))?;
            let certs = load_certificates(&pem).map_err(|e| trust_anchor_error(e.to_string()))?;
            if certs.is_empty() {
                return Err(trust_anchor_error("no certificates found".to_string()));
            }
            Ok(TlsConfig::builder()
                .root_certs(RootCerts::Specific(Arc::new(certs)))
                .build())
        }
        TrustAnchor::Disabled => {
            tracing::warn!("TLS certificate verification is disabled");
            Ok(TlsConfig::builder().disable_verification(true).build())
        }
    }
}

fn load_certificates(pem: &[u8]) -> Result<Vec<Certificate<'static>>, ureq::Error> {
    let mut certs = Vec::new();
    for item in ureq::tls::parse_pem(pem) {
        if let PemItem::Certificate(cert) = item? {
            certs.push(cert.to_owned());
        }
    }
    Ok(certs)
}

fn classify(err: ureq::Error) -> TransportError {
    let kind = match &err {
        ureq::Error::Timeout(_) => TransportErrorKind::Timeout,
        ureq::Error::HostNotFound => TransportErrorKind::Dns,
        ureq::Error::ConnectionFailed => TransportErrorKind::Connect,
        ureq::Error::Tls(_) => TransportErrorKind::Tls,
        ureq::Error::Io(_) => TransportErrorKind::Io,
        _ => TransportErrorKind::Other,
    };
    TransportError::new(kind, err.to_string())
}
