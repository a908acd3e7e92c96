//! Risk metrics computation.
//!
//! [`RiskMetricsCalculator`] turns a symbol's price history into the
//! [`RiskMetrics`] published with every snapshot. All functions are pure: the
//! same prices always produce the same metrics.

use rp_types::{round_to, RiskMetrics};

use crate::returns::compute_returns;

/// Trading days per year used to annualize volatility.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Minimum number of returns before historical VaR is reported.
pub const MIN_VAR_OBSERVATIONS: usize = 5;

/// Tail probability for historical VaR.
pub const VAR_TAIL: f64 = 0.05;

const DRAWDOWN_WEIGHT: f64 = 0.4;
const VAR_WEIGHT: f64 = 0.4;
const VOLATILITY_WEIGHT: f64 = 0.2;

/// Stateless calculator for risk metrics.
pub struct RiskMetricsCalculator;

impl RiskMetricsCalculator {
    /// Compute the full metric set for a chronological price sequence.
    ///
    /// Volatility, drawdown and VaR are rounded to 2 decimals, the score to a
    /// whole number.
    pub fn compute(prices: &[f64]) -> RiskMetrics {
        let returns = compute_returns(prices);

        let volatility = Self::volatility(&returns);
        let max_drawdown = Self::max_drawdown(prices);
        let var_95 = Self::historical_var_95(&returns);
        let risk_score = Self::risk_score(max_drawdown, var_95, volatility);

        RiskMetrics {
            volatility: round_to(volatility, 2),
            max_drawdown,
            var_95,
            risk_score,
        }
    }

    /// Sample standard deviation (`n - 1` denominator). Zero for fewer than two
    /// values.
    pub fn stddev(values: &[f64]) -> f64 {
        if values.len() < 2 {
            return 0.0;
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        variance.sqrt()
    }

    /// Annualized volatility of a return series in percentage points.
    pub fn volatility(returns: &[f64]) -> f64 {
        if returns.is_empty() {
            return 0.0;
        }
        Self::stddev(returns) * TRADING_DAYS_PER_YEAR.sqrt() * 100.0
    }

    /// Most negative decline from the running peak, in percent rounded to 2
    /// decimals. Empty input yields `0.0`.
    pub fn max_drawdown(prices: &[f64]) -> f64 {
        let mut peak = prices.first().copied().unwrap_or(0.0);
        let mut max_dd = 0.0_f64;

        for &price in prices {
            peak = peak.max(price);
            // A zero peak has no meaningful drawdown.
            if peak > 0.0 {
                let dd = (price - peak) / peak;
                max_dd = max_dd.min(dd);
            }
        }

        round_to(max_dd * 100.0, 2)
    }

    /// 95% historical VaR: the return at sorted index `floor(0.05 * n)`, in
    /// percent rounded to 2 decimals. Needs at least five returns, otherwise
    /// `0.0`.
    pub fn historical_var_95(returns: &[f64]) -> f64 {
        if returns.len() < MIN_VAR_OBSERVATIONS {
            return 0.0;
        }

        let mut sorted = returns.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let idx = (VAR_TAIL * sorted.len() as f64) as usize;
        round_to(sorted[idx] * 100.0, 2)
    }

    /// Weighted blend of |drawdown|, |VaR| and volatility, rounded and clamped
    /// to `[0, 100]`.
    pub fn risk_score(max_drawdown: f64, var_95: f64, volatility: f64) -> f64 {
        let raw = max_drawdown.abs() * DRAWDOWN_WEIGHT
            + var_95.abs() * VAR_WEIGHT
            + volatility * VOLATILITY_WEIGHT;

        if raw.is_nan() {
            return 0.0;
        }
        raw.round().clamp(0.0, 100.0)
    }
}
