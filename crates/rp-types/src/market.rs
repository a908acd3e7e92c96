use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque ticker identifier for a tracked instrument (e.g. `RELIANCE`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(symbol: &str) -> Self {
        Self(symbol.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Symbol {
    fn from(symbol: &str) -> Self {
        Self::new(symbol)
    }
}

impl From<String> for Symbol {
    fn from(symbol: String) -> Self {
        Self::new(&symbol)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single observed price at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

impl PriceSample {
    pub fn new(timestamp: DateTime<Utc>, price: f64) -> Self {
        Self { timestamp, price }
    }

    /// Timestamp as fractional seconds since the Unix epoch.
    pub fn epoch_seconds(&self) -> f64 {
        self.timestamp.timestamp_micros() as f64 / 1_000_000.0
    }
}

/// Latest quote returned by an upstream quote source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Last traded price (LTP).
    pub last_price: f64,
    /// Previous session close, when the upstream reports one.
    pub previous_close: Option<f64>,
}

impl Quote {
    pub fn new(last_price: f64, previous_close: Option<f64>) -> Self {
        Self {
            last_price,
            previous_close,
        }
    }

    /// Whether the last price can enter a history window.
    pub fn has_valid_price(&self) -> bool {
        self.last_price.is_finite() && self.last_price > 0.0
    }

    /// Reference close used for the day change. Falls back to the last price
    /// when the upstream omits it or reports something unusable, which yields
    /// a zero change.
    pub fn reference_close(&self) -> f64 {
        match self.previous_close {
            Some(close) if close.is_finite() && close > 0.0 => close,
            _ => self.last_price,
        }
    }

    /// Percentage change of the last price against the reference close,
    /// rounded to 2 decimals.
    pub fn change_percent(&self) -> f64 {
        let close = self.reference_close();
        round_to((self.last_price - close) / close * 100.0, 2)
    }
}

/// Round `value` half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
