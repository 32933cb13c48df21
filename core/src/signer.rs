//! Pluggable request signing for endpoints that require credentials.

use crate::error::Error;
use crate::http::HttpRequest;

/// Attaches authentication material to a fully built request.
///
/// Implementations see the final URL, headers and body, which is what HMAC
/// style schemes need to compute a signature.
pub trait Signer: Send + Sync {
    fn sign(&self, request: HttpRequest) -> Result<HttpRequest, Error>;
}

impl<F> Signer for F
where
    F: Fn(HttpRequest) -> Result<HttpRequest, Error> + Send + Sync,
{
    fn sign(&self, request: HttpRequest) -> Result<HttpRequest, Error> {
        self(request)
    }
}

/// OAuth2 bearer token.
#[derive(Clone)]
pub struct BearerToken {
    token: String,
}

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerToken").field("token", &"<redacted>").finish()
    }
}

impl Signer for BearerToken {
    fn sign(&self, mut request: HttpRequest) -> Result<HttpRequest, Error> {
        request.set_header("Authorization", format!("Bearer {}", self.token));
        Ok(request)
    }
}
