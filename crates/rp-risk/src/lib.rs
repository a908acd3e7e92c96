//! Rolling price history and real-time risk metrics for RiskPulse.
//!
//! Provides:
//! - A bounded, per-symbol price history with FIFO eviction
//! - Simple-return series derived from a price sequence
//! - Volatility, max drawdown, historical VaR and a composite risk score

pub mod history;
pub mod metrics;
pub mod returns;

pub use history::{HistoryStore, DEFAULT_HISTORY_CAPACITY};
pub use metrics::RiskMetricsCalculator;
pub use returns::compute_returns;
