/// Simple returns `(p[i] - p[i-1]) / p[i-1]` in chronological order.
///
/// Fewer than two prices produce an empty series. Prices must be strictly
/// positive; the history store rejects anything else before it gets here.
pub fn compute_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .map(|pair| (pair[1] - pair[0]) / pair[0])
        .collect()
}
