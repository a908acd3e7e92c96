//! DhanHQ market-feed adapter.
//!
//! Polls `POST {base}/marketfeed/ltp` for a single NSE equity per request and
//! maps the response onto [`Quote`].

use async_trait::async_trait;
use rp_types::{Quote, QuoteError, Symbol};
use serde_json::Value;

use crate::registry::SymbolRegistry;
use crate::source::{QuoteResult, QuoteSource};

pub const DEFAULT_DHAN_BASE_URL: &str = "https://api.dhan.co/v2";

const EXCHANGE_SEGMENT: &str = "NSE_EQ";

/// Credentials for the DhanHQ REST API.
#[derive(Debug, Clone, PartialEq)]
pub struct DhanCredentials {
    pub client_id: String,
    pub access_token: String,
}

/// Quote source backed by the DhanHQ last-traded-price endpoint.
#[derive(Debug)]
pub struct DhanQuoteSource {
    base_url: String,
    credentials: DhanCredentials,
    registry: SymbolRegistry,
    client: reqwest::Client,
}

impl DhanQuoteSource {
    pub fn new(base_url: &str, credentials: DhanCredentials, registry: SymbolRegistry) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            registry,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/marketfeed/ltp", self.base_url)
    }

    fn request_body(instrument_id: &str) -> Value {
        let id = instrument_id
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::from(instrument_id));
        serde_json::json!({ "NSE_EQ": [id] })
    }

    /// Extract `data.NSE_EQ["<id>"]` from an LTP response.
    pub fn parse_ltp_response(symbol: &Symbol, instrument_id: &str, body: &Value) -> QuoteResult {
        let malformed = |message: String| QuoteError::Malformed {
            symbol: symbol.to_string(),
            message,
        };

        let entry = body
            .get("data")
            .and_then(|d| d.get(EXCHANGE_SEGMENT))
            .and_then(|seg| seg.get(instrument_id))
            .ok_or_else(|| malformed(format!("missing data.{EXCHANGE_SEGMENT}.{instrument_id}")))?;

        let last_price = entry
            .get("last_price")
            .and_then(number_field)
            .ok_or_else(|| malformed("missing or non-numeric last_price".to_string()))?;

        let previous_close = entry.get("previous_close").and_then(number_field);

        Ok(Quote::new(last_price, previous_close))
    }
}

fn number_field(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl QuoteSource for DhanQuoteSource {
    async fn fetch(&self, symbol: &Symbol) -> QuoteResult {
        let instrument_id =
            self.registry
                .instrument_id(symbol)
                .ok_or_else(|| QuoteError::UnknownSymbol {
                    symbol: symbol.to_string(),
                })?;

        let unavailable = |message: String| QuoteError::Unavailable {
            symbol: symbol.to_string(),
            message,
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("client-id", self.credentials.client_id.as_str())
            .header("access-token", self.credentials.access_token.as_str())
            .json(&Self::request_body(instrument_id))
            .send()
            .await
            .map_err(|e| unavailable(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(unavailable(format!("HTTP error {status}: {text}")));
        }

        let body: Value = response.json().await.map_err(|e| QuoteError::Malformed {
            symbol: symbol.to_string(),
            message: format!("invalid JSON: {e}"),
        })?;

        tracing::trace!(%symbol, %body, "ltp response");
        Self::parse_ltp_response(symbol, instrument_id, &body)
    }

    fn name(&self) -> &str {
        "dhan"
    }
}
