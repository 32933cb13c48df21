//! Endpoint methods that perform the full request lifecycle.

use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::client::DataClient;
use crate::config::ClientConfig;
use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::http::HttpRequest;
use crate::model::ApiObject;
use crate::params::Params;
use crate::signer::Signer;
use crate::transport::{Transport, UreqTransport};
use crate::types::{Currency, ExchangeRates, HistoricPrices, Price, ServerTime};

/// A `DataClient` bound to a `Transport`.
///
/// Every method either returns a populated `ApiObject` or an `Error`;
/// nothing is retried. The session holds no mutable state, so it is `Sync`
/// whenever its transport is.
#[derive(Debug, Clone)]
pub struct Session<T: Transport = UreqTransport> {
    client: DataClient,
    transport: T,
}

impl Session<UreqTransport> {
    /// Validate `config` and build the default blocking transport.
    pub fn new(config: &ClientConfig) -> Result<Self, Error> {
        let client = DataClient::new(config)?;
        let transport = UreqTransport::new(config)?;
        Ok(Self { client, transport })
    }

    /// A session against the public API with default settings.
    pub fn public() -> Result<Self, Error> {
        Self::new(&ClientConfig::default())
    }
}

impl<T: Transport> Session<T> {
    pub fn with_transport(client: DataClient, transport: T) -> Self {
        Self { client, transport }
    }

    pub fn with_signer(mut self, signer: impl Signer + 'static) -> Self {
        self.client = self.client.with_signer(signer);
        self
    }

    pub fn client(&self) -> &DataClient {
        &self.client
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run the lifecycle for an arbitrary endpoint.
    pub fn request<R: DeserializeOwned>(
        &self,
        endpoint: &Endpoint,
        params: &Params,
    ) -> Result<ApiObject<R>, Error> {
        self.send(self.client.build_request(endpoint, params)?)
    }

    #[instrument(level = "debug", skip_all, fields(method = %request.method, url = %request.url))]
    fn send<R: DeserializeOwned>(&self, request: HttpRequest) -> Result<ApiObject<R>, Error> {
        let response = self.transport.execute(&request)?;
        debug!(status = response.status, bytes = response.body.len(), "received response");
        self.client.parse(response)
    }

    pub fn get_currencies(&self, params: &Params) -> Result<ApiObject<Currency>, Error> {
        self.send(self.client.build_currencies(params)?)
    }

    pub fn get_exchange_rates(&self, params: &Params) -> Result<ApiObject<ExchangeRates>, Error> {
        self.send(self.client.build_exchange_rates(params)?)
    }

    /// Buy price for `currency_pair` (default `BTC-USD`).
    pub fn get_buy_price(&self, params: &Params) -> Result<ApiObject<Price>, Error> {
        self.send(self.client.build_buy_price(params)?)
    }

    /// Sell price for `currency_pair` (default `BTC-USD`).
    pub fn get_sell_price(&self, params: &Params) -> Result<ApiObject<Price>, Error> {
        self.send(self.client.build_sell_price(params)?)
    }

    /// Spot price for `currency_pair` (default `BTC-USD`).
    pub fn get_spot_price(&self, params: &Params) -> Result<ApiObject<Price>, Error> {
        self.send(self.client.build_spot_price(params)?)
    }

    pub fn get_historic_prices(&self, params: &Params) -> Result<ApiObject<HistoricPrices>, Error> {
        self.send(self.client.build_historic_prices(params)?)
    }

    pub fn get_time(&self, params: &Params) -> Result<ApiObject<ServerTime>, Error> {
        self.send(self.client.build_time(params)?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::{ApiErrorKind, TransportError, TransportErrorKind};
    use crate::http::HttpResponse;

    /// Records requests and answers each with the same canned result.
    struct Canned {
        reply: Result<HttpResponse, TransportError>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl Canned {
        fn ok(status: u16, body: &str) -> Self {
            Self {
                reply: Ok(HttpResponse::new(status, body)),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn urls(&self) -> Vec<String> {
            self.seen.lock().unwrap().iter().map(|r| r.url.clone()).collect()
        }
    }

    impl Transport for Canned {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            self.seen.lock().unwrap().push(request.clone());
            self.reply.clone()
        }
    }

    fn session(transport: Canned) -> Session<Canned> {
        let client = DataClient::new(&ClientConfig::default()).unwrap();
        Session::with_transport(client, transport)
    }

    const PRICE: &str = r#"{"data": {"amount": "123.45", "currency": "USD"}}"#;

    #[test]
    fn session_is_send_and_sync() {
        fn assert_send_sync<S: Send + Sync>() {}
        assert_send_sync::<Session>();
        assert_send_sync::<Session<Canned>>();
    }

    #[test]
    fn buy_price_hits_default_then_given_pair() {
        let s = session(Canned::ok(200, PRICE));
        s.get_buy_price(&Params::new()).unwrap();
        s.get_buy_price(&Params::new().with("currency_pair", "LTC-USD")).unwrap();
        assert_eq!(
            s.transport().urls(),
            [
                "https://api.coinbase.com/v2/prices/BTC-USD/buy",
                "https://api.coinbase.com/v2/prices/LTC-USD/buy",
            ]
        );
    }

    #[test]
    fn every_endpoint_uses_its_path() {
        let s = session(Canned::ok(200, r#"{"data": []}"#));
        s.get_currencies(&Params::new()).unwrap();
        s.get_exchange_rates(&Params::new().with("currency", "EUR")).unwrap();
        s.get_sell_price(&Params::new()).unwrap();
        s.get_spot_price(&Params::new()).unwrap();
        s.get_historic_prices(&Params::new()).unwrap();
        s.get_time(&Params::new()).unwrap();
        assert_eq!(
            s.transport().urls(),
            [
                "https://api.coinbase.com/v2/currencies",
                "https://api.coinbase.com/v2/exchange-rates?currency=EUR",
                "https://api.coinbase.com/v2/prices/BTC-USD/sell",
                "https://api.coinbase.com/v2/prices/BTC-USD/spot",
                "https://api.coinbase.com/v2/prices/historic",
                "https://api.coinbase.com/v2/time",
            ]
        );
    }

    #[test]
    fn successful_price_has_amount_and_no_warnings() {
        let s = session(Canned::ok(200, PRICE));
        let obj = s.get_spot_price(&Params::new()).unwrap();
        assert_eq!(obj.one().unwrap().amount, "123.45");
        assert!(obj.warnings.is_empty());
    }

    #[test]
    fn rate_limit_is_classified() {
        let s = session(Canned::ok(429, r#"{"errors": [{"id": "rate_limit_exceeded", "message": "Too many requests"}]}"#));
        let err = s.get_time(&Params::new()).unwrap_err();
        assert_eq!(err.api_kind(), Some(ApiErrorKind::RateLimit));
    }

    #[test]
    fn transport_failure_is_not_an_api_error() {
        let s = session(Canned {
            reply: Err(TransportError::new(TransportErrorKind::Timeout, "timed out")),
            seen: Mutex::new(Vec::new()),
        });
        let err = s.get_time(&Params::new()).unwrap_err();
        assert!(matches!(
            err,
            Error::Transport(TransportError { kind: TransportErrorKind::Timeout, .. })
        ));
        assert_eq!(err.api_kind(), None);
    }

    #[test]
    fn missing_credentials_fail_before_io() {
        let s = session(Canned::ok(200, PRICE));
        let endpoint = Endpoint::get(["v2", "user"]).authenticated();
        let err = s.request::<serde_json::Value>(&endpoint, &Params::new()).unwrap_err();
        assert!(matches!(err, Error::MissingCredentials { .. }));
        assert!(s.transport().urls().is_empty());
    }

    #[test]
    fn signer_applies_to_authenticated_requests() {
        let s = session(Canned::ok(200, r#"{"data": {"id": "u1"}}"#))
            .with_signer(crate::signer::BearerToken::new("tok"));
        let endpoint = Endpoint::get(["v2", "user"]).authenticated();
        let obj = s.request::<serde_json::Value>(&endpoint, &Params::new()).unwrap();
        assert_eq!(obj.one().unwrap()["id"], "u1");
        let seen = s.transport().seen.lock().unwrap();
        assert_eq!(seen[0].header("Authorization"), Some("Bearer tok"));
    }
}
