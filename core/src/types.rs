//! Typed records returned by the data endpoints.
//!
//! # Design
//! Each record names the fields the API documents and keeps everything else
//! in a flattened `extra` map, so a field added upstream is still visible to
//! callers instead of being dropped during decoding.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A fiat currency known to the exchange (`GET /v2/currencies`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Currency {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_size: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Exchange rates relative to one base currency (`GET /v2/exchange-rates`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRates {
    pub currency: String,
    pub rates: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A buy, sell or spot price.
///
/// Amounts stay decimal strings as sent by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub amount: String,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Price history for a currency (`GET /v2/prices/historic`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricPrices {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default)]
    pub prices: Vec<HistoricPrice>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricPrice {
    pub price: String,
    pub time: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Server clock (`GET /v2/time`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerTime {
    pub iso: String,
    pub epoch: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
