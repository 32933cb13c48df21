//! Lobby settings read from the environment.

use std::net::{AddrParseError, SocketAddr};

use coinbase_data::{ClientConfig, DEFAULT_CURRENCY_PAIR};
use thiserror::Error;

pub const DEFAULT_ADDR: &str = "127.0.0.1:5000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Client(#[from] coinbase_data::Error),

    #[error("invalid LOBBY_ADDR {addr:?}: {source}")]
    Addr {
        addr: String,
        #[source]
        source: AddrParseError,
    },
}

#[derive(Debug, Clone)]
pub struct LobbyConfig {
    pub addr: SocketAddr,
    /// Pair whose buy price annotates every message.
    pub currency_pair: String,
    pub client: ClientConfig,
}

impl LobbyConfig {
    /// `LOBBY_ADDR` and `LOBBY_CURRENCY_PAIR`, plus the `COINBASE_*`
    /// variables understood by [`ClientConfig::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let addr = lookup("LOBBY_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr: SocketAddr = addr
            .parse()
            .map_err(|source| ConfigError::Addr { addr, source })?;
        let currency_pair =
            lookup("LOBBY_CURRENCY_PAIR").unwrap_or_else(|| DEFAULT_CURRENCY_PAIR.to_string());
        let client = ClientConfig::from_lookup(&lookup)?;
        Ok(Self {
            addr,
            currency_pair,
            client,
        })
    }
}
