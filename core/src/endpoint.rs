//! Endpoint descriptors: a method plus an ordered list of path segments.

use std::fmt;

use percent_encoding::utf8_percent_encode;

use crate::http::HttpMethod;
use crate::params::COMPONENT;

/// A path + method combination exposed by the remote API.
///
/// Segments are stored raw and percent-encoded one by one when joined, so a
/// `/` inside a segment stays inside that segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub method: HttpMethod,
    pub segments: Vec<String>,
    pub authenticated: bool,
}

impl Endpoint {
    pub fn new<I, S>(method: HttpMethod, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method,
            segments: segments.into_iter().map(Into::into).collect(),
            authenticated: false,
        }
    }

    pub fn get<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(HttpMethod::Get, segments)
    }

    /// Mark the endpoint as requiring a signed request.
    pub fn authenticated(mut self) -> Self {
        self.authenticated = true;
        self
    }

    /// The encoded relative path, without a leading slash.
    pub fn path(&self) -> String {
        self.segments
            .iter()
            .map(|s| utf8_percent_encode(s, COMPONENT).to_string())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Join with `base`, which must already be validated.
    pub fn uri(&self, base: &str) -> String {
        format!("{}/{}", base.trim_end_matches('/'), self.path())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} /{}", self.method, self.path())
    }
}
