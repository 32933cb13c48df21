//! Request builder and response parser for the Coinbase data API.
//!
//! # Design
//! `DataClient` holds only immutable configuration: the validated base URI,
//! the default headers and an optional signer. Each endpoint is split into a
//! `build_*` method that produces an `HttpRequest` and a `parse_*` method
//! that consumes an `HttpResponse`. `Session` (see `session.rs`) glues the
//! two halves to a `Transport`; tests drive them directly with literal
//! responses.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::endpoint::Endpoint;
use crate::error::{ApiError, ApiErrorKind, Error};
use crate::http::{HttpRequest, HttpResponse};
use crate::model::{ApiData, ApiObject, Envelope};
use crate::params::{encode_query, Params};
use crate::signer::Signer;
use crate::types::{Currency, ExchangeRates, HistoricPrices, Price, ServerTime};

/// Pair used by the price endpoints when `currency_pair` is not supplied.
pub const DEFAULT_CURRENCY_PAIR: &str = "BTC-USD";

/// Which side of the book a price request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceKind {
    Buy,
    Sell,
    Spot,
}

impl PriceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PriceKind::Buy => "buy",
            PriceKind::Sell => "sell",
            PriceKind::Spot => "spot",
        }
    }
}

/// Stateless request builder and response parser.
#[derive(Clone)]
pub struct DataClient {
    base_uri: String,
    api_version: String,
    headers: Vec<(String, String)>,
    signer: Option<Arc<dyn Signer>>,
}

impl std::fmt::Debug for DataClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataClient")
            .field("base_uri", &self.base_uri)
            .field("api_version", &self.api_version)
            .field("signed", &self.signer.is_some())
            .finish()
    }
}

impl DataClient {
    /// Validate `config` and prepare the default headers.
    pub fn new(config: &ClientConfig) -> Result<Self, Error> {
        let base_uri = check_uri_security(&config.base_uri, config.allow_insecure)?;
        let headers = vec![
            ("CB-VERSION".to_string(), config.api_version.clone()),
            ("Accept".to_string(), "application/json".to_string()),
            ("Content-Type".to_string(), "application/json".to_string()),
            ("User-Agent".to_string(), config.user_agent.clone()),
        ];
        Ok(Self {
            base_uri,
            api_version: config.api_version.clone(),
            headers,
            signer: None,
        })
    }

    /// Attach credentials used for endpoints marked as authenticated.
    pub fn with_signer(mut self, signer: impl Signer + 'static) -> Self {
        self.signer = Some(Arc::new(signer));
        self
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn default_headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Build the request for an arbitrary endpoint.
    ///
    /// GET and DELETE carry `params` in the query string; POST and PUT carry
    /// them as a JSON body. Empty parameters add neither.
    pub fn build_request(&self, endpoint: &Endpoint, params: &Params) -> Result<HttpRequest, Error> {
        let mut url = endpoint.uri(&self.base_uri);
        let mut body = None;
        if endpoint.method.carries_body() {
            if !params.is_empty() {
                body = Some(params.to_json()?);
            }
        } else {
            let query = encode_query(params);
            if !query.is_empty() {
                url.push('?');
                url.push_str(&query);
            }
        }

        let mut request = HttpRequest {
            method: endpoint.method,
            url,
            headers: self.headers.clone(),
            body,
        };
        if endpoint.authenticated {
            let signer = self.signer.as_ref().ok_or_else(|| Error::MissingCredentials {
                endpoint: endpoint.to_string(),
            })?;
            request = signer.sign(request)?;
        }
        debug!(method = %request.method, url = %request.url, "built request");
        Ok(request)
    }

    pub fn build_currencies(&self, params: &Params) -> Result<HttpRequest, Error> {
        self.build_request(&Endpoint::get(["v2", "currencies"]), params)
    }

    pub fn build_exchange_rates(&self, params: &Params) -> Result<HttpRequest, Error> {
        self.build_request(&Endpoint::get(["v2", "exchange-rates"]), params)
    }

    /// `currency_pair` is moved from `params` into the path.
    pub fn build_price(&self, kind: PriceKind, params: &Params) -> Result<HttpRequest, Error> {
        let mut params = params.clone();
        let pair = match params.remove("currency_pair") {
            None => DEFAULT_CURRENCY_PAIR.to_string(),
            Some(Value::String(pair)) => pair,
            Some(other) => {
                return Err(Error::InvalidParameter {
                    name: "currency_pair".to_string(),
                    message: format!("expected a string, got {other}"),
                })
            }
        };
        let endpoint = Endpoint::get(["v2", "prices", pair.as_str(), kind.as_str()]);
        self.build_request(&endpoint, &params)
    }

    pub fn build_buy_price(&self, params: &Params) -> Result<HttpRequest, Error> {
        self.build_price(PriceKind::Buy, params)
    }

    pub fn build_sell_price(&self, params: &Params) -> Result<HttpRequest, Error> {
        self.build_price(PriceKind::Sell, params)
    }

    pub fn build_spot_price(&self, params: &Params) -> Result<HttpRequest, Error> {
        self.build_price(PriceKind::Spot, params)
    }

    pub fn build_historic_prices(&self, params: &Params) -> Result<HttpRequest, Error> {
        self.build_request(&Endpoint::get(["v2", "prices", "historic"]), params)
    }

    pub fn build_time(&self, params: &Params) -> Result<HttpRequest, Error> {
        self.build_request(&Endpoint::get(["v2", "time"]), params)
    }

    /// Classify `response` and unwrap its envelope into typed records.
    pub fn parse<T: DeserializeOwned>(&self, response: HttpResponse) -> Result<ApiObject<T>, Error> {
        check_status(&response)?;

        let mut envelope: Envelope =
            serde_json::from_str(&response.body).map_err(|e| Error::MalformedResponse {
                status: response.status,
                message: format!("invalid JSON envelope: {e}"),
            })?;

        // All valid responses have a "data" key.
        let Some(data) = envelope.data.take() else {
            let message = envelope
                .first_error()
                .and_then(|e| e.message.or(e.id))
                .unwrap_or_else(|| "response envelope has no data".to_string());
            return Err(Error::MalformedResponse {
                status: response.status,
                message,
            });
        };

        let warnings = envelope.take_warnings();
        for warning in &warnings {
            debug!(%warning, "API returned a warning");
        }

        let data = match data {
            Value::Array(items) => ApiData::Many(
                items
                    .into_iter()
                    .map(decode_record)
                    .collect::<Result<Vec<T>, Error>>()?,
            ),
            record @ Value::Object(_) => ApiData::One(decode_record(record)?),
            other => {
                return Err(Error::MalformedResponse {
                    status: response.status,
                    message: format!("expected an object or array in data, got {other}"),
                })
            }
        };

        Ok(ApiObject {
            data,
            warnings,
            pagination: envelope.take_pagination(),
        })
    }

    pub fn parse_currencies(&self, response: HttpResponse) -> Result<ApiObject<Currency>, Error> {
        self.parse(response)
    }

    pub fn parse_exchange_rates(
        &self,
        response: HttpResponse,
    ) -> Result<ApiObject<ExchangeRates>, Error> {
        self.parse(response)
    }

    /// Shared by the buy, sell and spot endpoints.
    pub fn parse_price(&self, response: HttpResponse) -> Result<ApiObject<Price>, Error> {
        self.parse(response)
    }

    pub fn parse_historic_prices(
        &self,
        response: HttpResponse,
    ) -> Result<ApiObject<HistoricPrices>, Error> {
        self.parse(response)
    }

    pub fn parse_time(&self, response: HttpResponse) -> Result<ApiObject<ServerTime>, Error> {
        self.parse(response)
    }
}

/// Reject non-`https` base URIs unless explicitly allowed.
pub fn check_uri_security(uri: &str, allow_insecure: bool) -> Result<String, Error> {
    let parsed = Url::parse(uri).map_err(|source| Error::InvalidUri {
        uri: uri.to_string(),
        source,
    })?;
    if parsed.scheme() != "https" {
        if !allow_insecure {
            return Err(Error::InsecureTransport {
                uri: uri.to_string(),
            });
        }
        warn!(uri, "using an insecure API endpoint");
    }
    Ok(uri.to_string())
}

fn decode_record<T: DeserializeOwned>(value: Value) -> Result<T, Error> {
    serde_json::from_value(value).map_err(|e| Error::Deserialization(e.to_string()))
}

/// Map non-2xx status codes to a classified `ApiError`.
fn check_status(response: &HttpResponse) -> Result<(), Error> {
    if response.is_success() {
        return Ok(());
    }
    Err(build_api_error(response).into())
}

/// Best-effort decoding of an error body into an `ApiError`.
///
/// Understands `{"errors": [{"id", "message"}]}`, the OAuth
/// `{"error", "error_description"}` form and a bare `{"message"}`. Anything
/// else, including non-JSON, falls back to the raw body text.
pub fn build_api_error(response: &HttpResponse) -> ApiError {
    let (id, message) = error_details(&response.body).unwrap_or_else(|| {
        let body = response.body.trim();
        let message = if body.is_empty() {
            ureq::http::StatusCode::from_u16(response.status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("no error details")
                .to_string()
        } else {
            body.to_string()
        };
        (None, message)
    });
    ApiError {
        kind: ApiErrorKind::from_status(response.status),
        id,
        message,
        status: response.status,
    }
}

fn error_details(body: &str) -> Option<(Option<String>, String)> {
    let json: Value = serde_json::from_str(body).ok()?;

    if let Some(first) = json
        .get("errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first())
    {
        let id = first.get("id").and_then(Value::as_str).map(str::to_string);
        if let Some(message) = first.get("message").and_then(Value::as_str) {
            return Some((id, message.to_string()));
        }
        if let Some(id) = id {
            return Some((Some(id.clone()), id));
        }
    }

    if let Some(error) = json.get("error").and_then(Value::as_str) {
        let message = json
            .get("error_description")
            .and_then(Value::as_str)
            .unwrap_or(error);
        return Some((Some(error.to_string()), message.to_string()));
    }

    json.get("message")
        .and_then(Value::as_str)
        .map(|message| (None, message.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use crate::signer::BearerToken;
    use serde_json::json;

    fn client() -> DataClient {
        DataClient::new(&ClientConfig::default()).unwrap()
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse::new(status, body)
    }

    #[test]
    fn http_base_uri_is_rejected_by_default() {
        let err = DataClient::new(&ClientConfig::with_base_uri("http://api.coinbase.com/")).unwrap_err();
        assert!(matches!(err, Error::InsecureTransport { .. }));
    }

    #[test]
    fn http_base_uri_is_accepted_with_override() {
        let config = ClientConfig {
            allow_insecure: true,
            ..ClientConfig::with_base_uri("http://localhost:3000")
        };
        let client = DataClient::new(&config).unwrap();
        assert_eq!(client.base_uri(), "http://localhost:3000");
    }

    #[test]
    fn unparseable_base_uri_is_invalid() {
        let err = DataClient::new(&ClientConfig::with_base_uri("not a uri")).unwrap_err();
        assert!(matches!(err, Error::InvalidUri { .. }));
    }

    #[test]
    fn default_headers_are_attached() {
        let req = client().build_time(&Params::new()).unwrap();
        assert_eq!(req.header("CB-VERSION"), Some("2016-02-18"));
        assert_eq!(req.header("Accept"), Some("application/json"));
        assert_eq!(req.header("Content-Type"), Some("application/json"));
        assert!(req.header("User-Agent").is_some());
        assert!(req.header("Authorization").is_none());
    }

    #[test]
    fn build_currencies_produces_correct_request() {
        let req = client().build_currencies(&Params::new()).unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "https://api.coinbase.com/v2/currencies");
        assert!(req.body.is_none());
    }

    #[test]
    fn build_exchange_rates_puts_params_in_query() {
        let params = Params::new().with("currency", "BTC");
        let req = client().build_exchange_rates(&params).unwrap();
        assert_eq!(req.url, "https://api.coinbase.com/v2/exchange-rates?currency=BTC");
        assert!(req.body.is_none());
    }

    #[test]
    fn buy_price_defaults_to_btc_usd() {
        let req = client().build_buy_price(&Params::new()).unwrap();
        assert_eq!(req.url, "https://api.coinbase.com/v2/prices/BTC-USD/buy");
    }

    #[test]
    fn buy_price_uses_given_pair_and_drops_it_from_query() {
        let params = Params::new().with("currency_pair", "LTC-USD");
        let req = client().build_buy_price(&params).unwrap();
        assert_eq!(req.url, "https://api.coinbase.com/v2/prices/LTC-USD/buy");
    }

    #[test]
    fn sell_and_spot_prices_keep_other_params() {
        let params = Params::new()
            .with("currency_pair", "ETH-EUR")
            .with("date", "2024-01-02");
        let sell = client().build_sell_price(&params).unwrap();
        assert_eq!(
            sell.url,
            "https://api.coinbase.com/v2/prices/ETH-EUR/sell?date=2024-01-02"
        );
        let spot = client().build_spot_price(&Params::new()).unwrap();
        assert_eq!(spot.url, "https://api.coinbase.com/v2/prices/BTC-USD/spot");
    }

    #[test]
    fn non_string_currency_pair_is_rejected() {
        let params = Params::new().with("currency_pair", 42);
        let err = client().build_spot_price(&params).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }

    #[test]
    fn build_historic_prices_and_time() {
        let params = Params::new().with("currency_pair", "BTC-USD").with("period", "day");
        let historic = client().build_historic_prices(&params).unwrap();
        assert_eq!(
            historic.url,
            "https://api.coinbase.com/v2/prices/historic?currency_pair=BTC-USD&period=day"
        );
        let time = client().build_time(&Params::new()).unwrap();
        assert_eq!(time.url, "https://api.coinbase.com/v2/time");
    }

    #[test]
    fn post_params_become_json_body() {
        let endpoint = Endpoint::new(HttpMethod::Post, ["v2", "orders"]);
        let params = Params::new().with("amount", "1.5").with("meta", json!({"tag": [1, 2]}));
        let req = client().build_request(&endpoint, &params).unwrap();
        assert_eq!(req.url, "https://api.coinbase.com/v2/orders");
        let body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"amount": "1.5", "meta": {"tag": [1, 2]}}));
    }

    #[test]
    fn authenticated_endpoint_without_signer_fails() {
        let endpoint = Endpoint::get(["v2", "user"]).authenticated();
        let err = client().build_request(&endpoint, &Params::new()).unwrap_err();
        assert!(matches!(err, Error::MissingCredentials { .. }));
    }

    #[test]
    fn authenticated_endpoint_is_signed() {
        let client = client().with_signer(BearerToken::new("tok"));
        let endpoint = Endpoint::get(["v2", "user"]).authenticated();
        let req = client.build_request(&endpoint, &Params::new()).unwrap();
        assert_eq!(req.header("Authorization"), Some("Bearer tok"));

        let public = client.build_time(&Params::new()).unwrap();
        assert!(public.header("Authorization").is_none());
    }

    #[test]
    fn parse_single_record() {
        let obj = client()
            .parse_price(response(200, r#"{"data": {"amount": "123.45", "currency": "USD"}}"#))
            .unwrap();
        let price = obj.one().unwrap();
        assert_eq!(price.amount, "123.45");
        assert_eq!(price.currency, "USD");
        assert!(obj.warnings.is_empty());
        assert!(obj.pagination.is_none());
    }

    #[test]
    fn parse_sequence_keeps_order_and_pagination() {
        let body = json!({
            "pagination": {"limit": 2, "order": "asc", "next_uri": null},
            "data": [
                {"id": "EUR", "name": "Euro", "min_size": "0.01"},
                {"id": "USD", "name": "US Dollar", "min_size": "0.01"}
            ]
        });
        let obj = client().parse_currencies(response(200, &body.to_string())).unwrap();
        let ids: Vec<&str> = obj.many().unwrap().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["EUR", "USD"]);
        assert_eq!(obj.pagination.as_ref().unwrap().limit, Some(2));
    }

    #[test]
    fn warnings_are_collected_not_raised() {
        let body = json!({
            "data": {"iso": "2015-06-23T18:02:51Z", "epoch": 1435082571},
            "warnings": [{
                "id": "missing_version",
                "message": "Please supply API version (YYYY-MM-DD) as CB-VERSION header",
                "url": "https://developers.coinbase.com/api#versioning"
            }]
        });
        let obj = client().parse_time(response(200, &body.to_string())).unwrap();
        assert!(obj.has_warnings());
        assert_eq!(obj.warnings[0].id.as_deref(), Some("missing_version"));
        assert_eq!(obj.one().unwrap().epoch, 1_435_082_571);
    }

    #[test]
    fn odd_side_fields_do_not_fail_a_success() {
        let obj = client()
            .parse::<Value>(response(
                200,
                r#"{"data": {"a": 1}, "pagination": {"limit": "25", "ending_before": 7},
                    "warnings": [{"message": null, "url": "u"}], "errors": 5}"#,
            ))
            .unwrap();
        assert_eq!(obj.one().unwrap()["a"], 1);
        assert_eq!(obj.warnings.len(), 1);
        assert_eq!(obj.warnings[0].url.as_deref(), Some("u"));
        let pagination = obj.pagination.unwrap();
        assert_eq!(pagination.limit, Some(25));
        assert_eq!(pagination.raw["limit"], "25");
        assert_eq!(pagination.raw["ending_before"], 7);
    }

    #[test]
    fn missing_data_is_malformed() {
        let err = client()
            .parse_price(response(200, r#"{"warnings": []}"#))
            .unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { status: 200, .. }));
    }

    #[test]
    fn null_data_is_malformed_and_keeps_error_message() {
        let err = client()
            .parse_price(response(201, r#"{"data": null, "errors": [{"id": "x", "message": "nope"}]}"#))
            .unwrap_err();
        match err {
            Error::MalformedResponse { status, message } => {
                assert_eq!(status, 201);
                assert_eq!(message, "nope");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_json_success_is_malformed() {
        let err = client().parse_price(response(200, "<html>")).unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { .. }));
    }

    #[test]
    fn wrong_record_shape_is_deserialization_error() {
        let err = client()
            .parse_price(response(200, r#"{"data": {"currency": "USD"}}"#))
            .unwrap_err();
        assert!(matches!(err, Error::Deserialization(_)));
    }

    #[test]
    fn not_found_envelope_is_client_error() {
        let err = client()
            .parse_price(response(
                404,
                r#"{"errors": [{"id": "not_found", "message": "not found"}]}"#,
            ))
            .unwrap_err();
        match err {
            Error::Api(api) => {
                assert_eq!(api.kind, ApiErrorKind::Client);
                assert_eq!(api.id.as_deref(), Some("not_found"));
                assert_eq!(api.message, "not found");
                assert_eq!(api.status, 404);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn status_codes_select_error_kind() {
        let cases = [
            (401, ApiErrorKind::Authentication),
            (403, ApiErrorKind::Authentication),
            (429, ApiErrorKind::RateLimit),
            (422, ApiErrorKind::Client),
            (500, ApiErrorKind::Server),
            (502, ApiErrorKind::Server),
            (304, ApiErrorKind::Unknown),
        ];
        for (status, kind) in cases {
            let err = client().parse_time(response(status, "")).unwrap_err();
            assert_eq!(err.api_kind(), Some(kind), "status {status}");
            assert_eq!(err.status(), Some(status));
        }
    }

    #[test]
    fn oauth_error_body_is_understood() {
        let api = build_api_error(&response(
            401,
            r#"{"error": "invalid_token", "error_description": "The access token is invalid"}"#,
        ));
        assert_eq!(api.kind, ApiErrorKind::Authentication);
        assert_eq!(api.id.as_deref(), Some("invalid_token"));
        assert_eq!(api.message, "The access token is invalid");
    }

    #[test]
    fn plain_text_error_body_is_used_verbatim() {
        let api = build_api_error(&response(502, "Bad Gateway from upstream\n"));
        assert_eq!(api.kind, ApiErrorKind::Server);
        assert_eq!(api.message, "Bad Gateway from upstream");
        assert!(api.id.is_none());
    }

    #[test]
    fn empty_error_body_uses_status_reason() {
        let api = build_api_error(&response(429, ""));
        assert_eq!(api.message, "Too Many Requests");
    }

    #[test]
    fn error_without_message_falls_back_to_id() {
        let api = build_api_error(&response(400, r#"{"errors": [{"id": "param_required"}]}"#));
        assert_eq!(api.id.as_deref(), Some("param_required"));
        assert_eq!(api.message, "param_required");
    }
}
