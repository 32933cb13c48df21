use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;

/// Buy, sell and spot amounts for one currency pair.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Quote {
    pub buy: String,
    pub sell: String,
    pub spot: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CurrencyInfo {
    pub id: String,
    pub name: String,
    pub min_size: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoricPoint {
    pub price: String,
    pub time: String,
}

/// A scripted answer returned by every `/v2` route until cleared.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Fault {
    pub status: u16,
    #[serde(default)]
    pub body: Value,
}

#[derive(Clone, Debug)]
pub struct Market {
    /// Keyed by pair, e.g. `BTC-USD`.
    pub quotes: BTreeMap<String, Quote>,
    pub currencies: Vec<CurrencyInfo>,
    /// Keyed by base currency.
    pub rates: BTreeMap<String, BTreeMap<String, String>>,
    pub history: Vec<HistoricPoint>,
    pub server_time: (String, i64),
    pub fault: Option<Fault>,
}

impl Market {
    pub fn sample() -> Self {
        let quote = |buy: &str, sell: &str, spot: &str| Quote {
            buy: buy.to_string(),
            sell: sell.to_string(),
            spot: spot.to_string(),
        };
        let currency = |id: &str, name: &str| CurrencyInfo {
            id: id.to_string(),
            name: name.to_string(),
            min_size: "0.01".to_string(),
        };
        let point = |price: &str, time: &str| HistoricPoint {
            price: price.to_string(),
            time: time.to_string(),
        };
        let table = |pairs: &[(&str, &str)]| -> BTreeMap<String, String> {
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
        };

        Self {
            quotes: BTreeMap::from([
                ("BTC-USD".to_string(), quote("123.45", "121.10", "122.30")),
                ("LTC-USD".to_string(), quote("3.95", "3.90", "3.92")),
                ("ETH-EUR".to_string(), quote("10.50", "10.20", "10.35")),
            ]),
            currencies: vec![
                currency("EUR", "Euro"),
                currency("GBP", "British Pound"),
                currency("USD", "United States Dollar"),
            ],
            rates: BTreeMap::from([
                ("USD".to_string(), table(&[("BTC", "0.0081"), ("EUR", "0.92"), ("USD", "1.00")])),
                ("BTC".to_string(), table(&[("BTC", "1"), ("EUR", "113.50"), ("USD", "123.45")])),
            ]),
            history: vec![
                point("122.30", "2015-06-23T00:00:00Z"),
                point("120.00", "2015-06-22T00:00:00Z"),
                point("118.75", "2015-06-21T00:00:00Z"),
            ],
            server_time: ("2015-06-23T18:02:51Z".to_string(), 1_435_082_571),
            fault: None,
        }
    }
}

pub type Db = Arc<RwLock<Market>>;

pub fn app() -> Router {
    app_with(Market::sample())
}

pub fn app_with(market: Market) -> Router {
    let db: Db = Arc::new(RwLock::new(market));
    Router::new()
        .route("/v2/currencies", get(currencies))
        .route("/v2/exchange-rates", get(exchange_rates))
        .route("/v2/prices/historic", get(historic_prices))
        .route("/v2/prices/{pair}/{side}", get(price))
        .route("/v2/time", get(time))
        .route("/mock/fault", put(set_fault).delete(clear_fault))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// An error envelope with its status.
#[derive(Debug)]
pub struct Failure {
    status: StatusCode,
    body: Value,
}

impl Failure {
    fn new(status: StatusCode, id: &str, message: &str) -> Self {
        Self {
            status,
            body: json!({"errors": [{"id": id, "message": message}]}),
        }
    }

    fn not_found(message: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        if self.body.is_null() {
            return self.status.into_response();
        }
        (self.status, Json(self.body)).into_response()
    }
}

type Reply = Result<Json<Value>, Failure>;

fn check_fault(market: &Market) -> Result<(), Failure> {
    match &market.fault {
        None => Ok(()),
        Some(fault) => Err(Failure {
            status: StatusCode::from_u16(fault.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body: fault.body.clone(),
        }),
    }
}

fn envelope(headers: &HeaderMap, data: Value, pagination: Option<Value>) -> Json<Value> {
    let mut body = json!({ "data": data });
    if let Some(pagination) = pagination {
        body["pagination"] = pagination;
    }
    if !headers.contains_key("cb-version") {
        body["warnings"] = json!([{
            "id": "missing_version",
            "message": "Please supply API version (YYYY-MM-DD) as CB-VERSION header",
            "url": "https://developers.coinbase.com/api#versioning"
        }]);
    }
    Json(body)
}

async fn currencies(State(db): State<Db>, headers: HeaderMap) -> Reply {
    let market = db.read().await;
    check_fault(&market)?;
    let data = serde_json::to_value(&market.currencies).unwrap_or_default();
    Ok(envelope(&headers, data, None))
}

async fn exchange_rates(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(query): Query<BTreeMap<String, String>>,
) -> Reply {
    let market = db.read().await;
    check_fault(&market)?;
    let base = query.get("currency").map(String::as_str).unwrap_or("USD");
    let rates = market
        .rates
        .get(base)
        .ok_or_else(|| Failure::not_found("Invalid currency"))?;
    Ok(envelope(&headers, json!({"currency": base, "rates": rates}), None))
}

async fn price(
    State(db): State<Db>,
    headers: HeaderMap,
    Path((pair, side)): Path<(String, String)>,
) -> Reply {
    let market = db.read().await;
    check_fault(&market)?;
    let quote = market
        .quotes
        .get(&pair)
        .ok_or_else(|| Failure::not_found("Invalid currency pair"))?;
    let amount = match side.as_str() {
        "buy" => &quote.buy,
        "sell" => &quote.sell,
        "spot" => &quote.spot,
        _ => return Err(Failure::not_found("Not found")),
    };
    let (base, currency) = pair.split_once('-').unwrap_or((pair.as_str(), ""));
    debug!(%pair, %side, %amount, "serving price");
    Ok(envelope(
        &headers,
        json!({"amount": amount, "currency": currency, "base": base}),
        None,
    ))
}

async fn historic_prices(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(query): Query<BTreeMap<String, String>>,
) -> Reply {
    let market = db.read().await;
    check_fault(&market)?;
    let limit = match query.get("limit") {
        None => market.history.len(),
        Some(raw) => raw.parse::<usize>().map_err(|_| {
            Failure::new(StatusCode::BAD_REQUEST, "invalid_request", "limit must be a number")
        })?,
    };
    let pair = query.get("currency_pair").map(String::as_str).unwrap_or("BTC-USD");
    let currency = pair.split_once('-').map(|(_, c)| c).unwrap_or("USD");
    let prices: Vec<&HistoricPoint> = market.history.iter().take(limit).collect();
    let next_uri = (limit < market.history.len())
        .then(|| format!("/v2/prices/historic?currency_pair={pair}&starting_after={limit}"));
    let pagination = json!({
        "ending_before": null,
        "starting_after": null,
        "limit": limit,
        "order": "desc",
        "previous_uri": null,
        "next_uri": next_uri,
    });
    Ok(envelope(
        &headers,
        json!({"currency": currency, "prices": prices}),
        Some(pagination),
    ))
}

async fn time(State(db): State<Db>, headers: HeaderMap) -> Reply {
    let market = db.read().await;
    check_fault(&market)?;
    let (iso, epoch) = &market.server_time;
    Ok(envelope(&headers, json!({"iso": iso, "epoch": epoch}), None))
}

async fn set_fault(State(db): State<Db>, Json(fault): Json<Fault>) -> StatusCode {
    if StatusCode::from_u16(fault.status).is_err() {
        return StatusCode::BAD_REQUEST;
    }
    db.write().await.fault = Some(fault);
    StatusCode::NO_CONTENT
}

async fn clear_fault(State(db): State<Db>) -> StatusCode {
    db.write().await.fault = None;
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_market_has_default_pair() {
        let market = Market::sample();
        assert!(market.quotes.contains_key("BTC-USD"));
        assert_eq!(market.quotes["BTC-USD"].buy, "123.45");
    }

    #[test]
    fn fault_body_defaults_to_null() {
        let fault: Fault = serde_json::from_str(r#"{"status":500}"#).unwrap();
        assert_eq!(fault.status, 500);
        assert!(fault.body.is_null());
    }

    #[test]
    fn fault_rejects_missing_status() {
        let result: Result<Fault, _> = serde_json::from_str(r#"{"body":{}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn envelope_warns_without_version_header() {
        let Json(body) = envelope(&HeaderMap::new(), json!({"x": 1}), None);
        assert_eq!(body["warnings"][0]["id"], "missing_version");

        let mut headers = HeaderMap::new();
        headers.insert("cb-version", "2016-02-18".parse().unwrap());
        let Json(body) = envelope(&headers, json!({"x": 1}), None);
        assert!(body.get("warnings").is_none());
    }

    #[test]
    fn check_fault_passes_scripted_status_through() {
        let mut market = Market::sample();
        assert!(check_fault(&market).is_ok());
        market.fault = Some(Fault {
            status: 429,
            body: json!({"errors": [{"id": "rate_limit_exceeded", "message": "slow down"}]}),
        });
        let failure = check_fault(&market).unwrap_err();
        assert_eq!(failure.status, StatusCode::TOO_MANY_REQUESTS);
    }
}
