//! Synchronous client for the Coinbase data API.
//!
//! # Overview
//! `DataClient` builds `HttpRequest` values and parses `HttpResponse` values
//! without touching the network. `Session` pairs it with a `Transport` (a
//! blocking `ureq` agent by default) and exposes one method per endpoint:
//!
//! ```no_run
//! use coinbase_data::{Params, Session};
//!
//! let session = Session::public()?;
//! let price = session.get_buy_price(&Params::new().with("currency_pair", "ETH-USD"))?;
//! if let Some(p) = price.one() {
//!     println!("{} {}", p.amount, p.currency);
//! }
//! # Ok::<(), coinbase_data::Error>(())
//! ```
//!
//! # Design
//! - Configuration is validated once; non-`https` base URIs are refused
//!   unless `allow_insecure` is set.
//! - Non-2xx responses are classified by status into `ApiError`; a 2xx
//!   response without `data` is `MalformedResponse`; no response at all is
//!   `Transport`.
//! - Envelope warnings are returned alongside the records, never raised.
//! - The crate emits `tracing` events but never installs a subscriber.

pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod model;
pub mod params;
pub mod session;
pub mod signer;
pub mod transport;
pub mod types;

pub use client::{DataClient, PriceKind, DEFAULT_CURRENCY_PAIR};
pub use config::{ClientConfig, TrustAnchor};
pub use endpoint::Endpoint;
pub use error::{ApiError, ApiErrorKind, Error, TransportError, TransportErrorKind};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use model::{ApiData, ApiObject, ErrorEntry, Pagination, Warning};
pub use params::{decode_query, encode_query, Params};
pub use session::Session;
pub use signer::{BearerToken, Signer};
pub use transport::{Transport, UreqTransport};
pub use types::{Currency, ExchangeRates, HistoricPrice, HistoricPrices, Price, ServerTime};
