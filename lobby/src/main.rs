use std::sync::Arc;

use coinbase_data::Session;
use lobby::{CoinbasePrice, Lobby, LobbyConfig};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = LobbyConfig::from_env()?;
    let session = Session::new(&config.client)?;
    let lobby = Arc::new(Lobby::new(CoinbasePrice::new(session, &config.currency_pair)));

    let listener = TcpListener::bind(config.addr).await?;
    tracing::info!(
        addr = %config.addr,
        api = %config.client.base_uri,
        pair = %config.currency_pair,
        "lobby listening on /websocket"
    );
    lobby::run(listener, lobby).await?;
    Ok(())
}
