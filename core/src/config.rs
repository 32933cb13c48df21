//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;

pub const DEFAULT_BASE_URI: &str = "https://api.coinbase.com/";
pub const DEFAULT_API_VERSION: &str = "2016-02-18";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How the remote TLS certificate is verified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TrustAnchor {
    /// The transport's bundled root store.
    #[default]
    Default,
    /// A PEM bundle on disk.
    Bundle(PathBuf),
    /// No verification. The caller accepts the risk.
    Disabled,
}

/// Settings fixed at construction for the lifetime of a client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_uri: String,
    /// Sent as `CB-VERSION` on every request.
    pub api_version: String,
    /// Accept a non-`https` base URI.
    pub allow_insecure: bool,
    pub trust_anchor: TrustAnchor,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_uri: DEFAULT_BASE_URI.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            allow_insecure: false,
            trust_anchor: TrustAnchor::Default,
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("coinbase-data/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Defaults pointed at another base URI.
    pub fn with_base_uri(base_uri: impl Into<String>) -> Self {
        Self {
            base_uri: base_uri.into(),
            ..Default::default()
        }
    }

    /// Read overrides from the process environment.
    ///
    /// | variable                | effect                                   |
    /// |-------------------------|------------------------------------------|
    /// | `COINBASE_API_URI`      | base URI                                 |
    /// | `COINBASE_API_VERSION`  | `CB-VERSION` header                      |
    /// | `COINBASE_CA_BUNDLE`    | PEM trust anchor path                    |
    /// | `COINBASE_VERIFY_SSL`   | `false`/`0` disables verification        |
    /// | `COINBASE_INSECURE`     | `true`/`1` allows a non-https base URI   |
    /// | `COINBASE_TIMEOUT_SECS` | request timeout in seconds               |
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with an arbitrary lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(uri) = lookup("COINBASE_API_URI") {
            config.base_uri = uri;
        }
        if let Some(version) = lookup("COINBASE_API_VERSION") {
            config.api_version = version;
        }
        if let Some(path) = lookup("COINBASE_CA_BUNDLE") {
            config.trust_anchor = TrustAnchor::Bundle(PathBuf::from(path));
        }
        if let Some(verify) = lookup("COINBASE_VERIFY_SSL") {
            if !parse_flag("COINBASE_VERIFY_SSL", &verify)? {
                config.trust_anchor = TrustAnchor::Disabled;
            }
        }
        if let Some(insecure) = lookup("COINBASE_INSECURE") {
            config.allow_insecure = parse_flag("COINBASE_INSECURE", &insecure)?;
        }
        if let Some(secs) = lookup("COINBASE_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|e| Error::InvalidConfig {
                key: "COINBASE_TIMEOUT_SECS".to_string(),
                message: format!("{e}"),
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, Error> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::InvalidConfig {
            key: key.to_string(),
            message: format!("expected a boolean, got {other:?}"),
        }),
    }
}
