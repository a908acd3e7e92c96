//! Per-tick output types: risk metrics, snapshots, batches and the wire
//! message pushed to subscribers.

use serde::{Deserialize, Serialize};

use crate::market::{PriceSample, Symbol};

/// Risk statistics derived from one symbol's history window.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// Annualized volatility of simple returns, in percentage points.
    pub volatility: f64,
    /// Worst peak-to-trough decline, in percent (always `<= 0`).
    pub max_drawdown: f64,
    /// 95% historical value-at-risk of simple returns, in percent.
    pub var_95: f64,
    /// Composite score in `[0, 100]`.
    pub risk_score: f64,
}

/// One history entry as seen on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    /// Seconds since the Unix epoch.
    pub t: f64,
    pub price: f64,
}

impl From<&PriceSample> for HistoryPoint {
    fn from(sample: &PriceSample) -> Self {
        Self {
            t: sample.epoch_seconds(),
            price: sample.price,
        }
    }
}

/// Per-symbol result of one successful tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub symbol: Symbol,
    pub price: f64,
    pub change_percent: f64,
    pub history: Vec<HistoryPoint>,
    pub metrics: RiskMetrics,
}

impl Snapshot {
    pub fn new(
        symbol: Symbol,
        price: f64,
        change_percent: f64,
        samples: &[PriceSample],
        metrics: RiskMetrics,
    ) -> Self {
        Self {
            symbol,
            price,
            change_percent,
            history: samples.iter().map(HistoryPoint::from).collect(),
            metrics,
        }
    }
}

/// All snapshots produced by a single tick, in registry order. May hold fewer
/// entries than there are tracked symbols when some fetches failed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Batch {
    pub tick: u64,
    pub snapshots: Vec<Snapshot>,
}

impl Batch {
    pub fn new(tick: u64, snapshots: Vec<Snapshot>) -> Self {
        Self { tick, snapshots }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn get(&self, symbol: &Symbol) -> Option<&Snapshot> {
        self.snapshots.iter().find(|s| &s.symbol == symbol)
    }

    /// Borrow this batch as the message pushed to subscribers.
    pub fn to_message(&self) -> SnapshotMessage<'_> {
        SnapshotMessage {
            kind: SnapshotMessage::KIND,
            data: &self.snapshots,
        }
    }
}

/// `{ "type": "snapshot", "data": [...] }`
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotMessage<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub data: &'a [Snapshot],
}

impl SnapshotMessage<'_> {
    pub const KIND: &'static str = "snapshot";
}

/// Response body of the tracked-symbol listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolList {
    pub symbols: Vec<Symbol>,
}
