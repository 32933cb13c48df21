//! WebSocket lobby that relays every message to all connected peers,
//! annotated with the current Coinbase buy price.
//!
//! Each socket is a session in the [`Registry`]. Text received from any
//! session, and the join/leave notices, are annotated by [`price::annotate`]
//! and queued for every session through [`Lobby::announce`].

pub mod config;
pub mod price;
pub mod registry;

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::{net::TcpListener, sync::mpsc::UnboundedReceiver};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub use config::{ConfigError, LobbyConfig};
pub use price::{annotate, CoinbasePrice, PriceSource};
pub use registry::{BroadcastReport, Registry, SendFailure};

pub const JOIN_MESSAGE: &str = "A new user has entered the Coinbase lobby.";
pub const LEAVE_MESSAGE: &str = "A user has left the Coinbase lobby.";

pub struct Lobby {
    registry: Registry,
    prices: Arc<dyn PriceSource>,
}

impl Lobby {
    pub fn new(prices: impl PriceSource) -> Self {
        Self {
            registry: Registry::new(),
            prices: Arc::new(prices),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Annotate `text` with the buy price and queue it for every session.
    pub async fn announce(&self, text: &str) -> BroadcastReport {
        let prices = Arc::clone(&self.prices);
        let price = match tokio::task::spawn_blocking(move || prices.buy_price()).await {
            Ok(Ok(price)) => Some(price),
            Ok(Err(e)) => {
                error!(error = %e, "buy price lookup failed");
                None
            }
            Err(e) => {
                error!(error = %e, "buy price task failed");
                None
            }
        };
        let report = self.registry.broadcast(&annotate(text, price.as_ref()));
        debug!(
            delivered = report.delivered,
            failed = report.failures.len(),
            "broadcast"
        );
        report
    }
}

pub fn app(lobby: Arc<Lobby>) -> Router {
    Router::new()
        .route("/websocket", get(ws_handler))
        .with_state(lobby)
}

pub async fn run(listener: TcpListener, lobby: Arc<Lobby>) -> Result<(), std::io::Error> {
    axum::serve(listener, app(lobby)).await
}

async fn ws_handler(ws: WebSocketUpgrade, State(lobby): State<Arc<Lobby>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, lobby))
}

/// Write queued texts to `sink` until the queue closes or a write fails.
async fn forward<S>(
    id: Uuid,
    mut outbound: UnboundedReceiver<String>,
    mut sink: S,
) -> Result<(), SendFailure>
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    while let Some(text) = outbound.recv().await {
        if let Err(e) = sink.send(Message::Text(text.into())).await {
            warn!(session = %id, error = %e, "websocket send failed");
            return Err(SendFailure::Socket {
                session: id,
                message: e.to_string(),
            });
        }
    }
    Ok(())
}

async fn handle_socket(socket: WebSocket, lobby: Arc<Lobby>) {
    let (id, outbound) = lobby.registry.add();
    info!(session = %id, "session connected");
    lobby.announce(JOIN_MESSAGE).await;

    let (sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(forward(id, outbound, sender));

    let inbound = Arc::clone(&lobby);
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    debug!(session = %id, "message received");
                    inbound.announce(text.as_str()).await;
                }
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    warn!(session = %id, error = %e, "websocket error");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        sent = &mut send_task => {
            recv_task.abort();
            if let Ok(Err(failure)) = sent {
                debug!(%failure, "send side ended the session");
            }
        }
        _ = &mut recv_task => send_task.abort(),
    }

    lobby.registry.remove(id);
    info!(session = %id, "session disconnected");
    lobby.announce(LEAVE_MESSAGE).await;
}
