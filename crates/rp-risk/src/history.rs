//! Bounded rolling price history.
//!
//! [`HistoryStore`] keeps one fixed-capacity window of [`PriceSample`]s per
//! tracked symbol. Each window sits behind its own reader/writer lock, so an
//! append together with its eviction is applied atomically and readers always
//! get a consistent copy.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rp_types::{config_error, HistoryError, PriceSample, RpResult, Symbol};
use tracing::trace;

/// Default number of samples retained per symbol.
pub const DEFAULT_HISTORY_CAPACITY: usize = 300;

/// Per-symbol bounded sample buffers.
#[derive(Debug)]
pub struct HistoryStore {
    windows: HashMap<Symbol, RwLock<VecDeque<PriceSample>>>,
    symbols: Vec<Symbol>,
    capacity: usize,
}

impl HistoryStore {
    /// Create one empty window per symbol. Duplicate symbols are collapsed.
    pub fn new<I>(capacity: usize, symbols: I) -> RpResult<Self>
    where
        I: IntoIterator<Item = Symbol>,
    {
        if capacity == 0 {
            return Err(config_error!("history capacity must be at least 1"));
        }

        let mut windows = HashMap::new();
        let mut ordered = Vec::new();
        for symbol in symbols {
            if windows.contains_key(&symbol) {
                continue;
            }
            windows.insert(symbol.clone(), RwLock::new(VecDeque::with_capacity(capacity)));
            ordered.push(symbol);
        }

        Ok(Self {
            windows,
            symbols: ordered,
            capacity,
        })
    }

    pub fn with_default_capacity<I>(symbols: I) -> RpResult<Self>
    where
        I: IntoIterator<Item = Symbol>,
    {
        Self::new(DEFAULT_HISTORY_CAPACITY, symbols)
    }

    /// Append a sample, evicting the oldest ones once the window is over
    /// capacity. Returns how many samples were evicted.
    ///
    /// Non-positive or non-finite prices and samples older than the newest
    /// stored one are rejected and leave the window untouched.
    pub fn append(
        &self,
        symbol: &Symbol,
        timestamp: DateTime<Utc>,
        price: f64,
    ) -> Result<usize, HistoryError> {
        if !(price.is_finite() && price > 0.0) {
            return Err(HistoryError::InvalidPrice {
                symbol: symbol.to_string(),
                price,
            });
        }

        let window = self.window(symbol)?;
        let mut samples = window.write();

        if let Some(latest) = samples.back() {
            if timestamp < latest.timestamp {
                return Err(HistoryError::OutOfOrder {
                    symbol: symbol.to_string(),
                    timestamp: timestamp.to_rfc3339(),
                    latest: latest.timestamp.to_rfc3339(),
                });
            }
        }

        samples.push_back(PriceSample::new(timestamp, price));

        let mut evicted = 0;
        while samples.len() > self.capacity {
            samples.pop_front();
            evicted += 1;
        }

        if evicted > 0 {
            trace!(%symbol, evicted, "history window full; evicted oldest samples");
        }

        Ok(evicted)
    }

    /// Copy of the symbol's samples, oldest first.
    pub fn snapshot(&self, symbol: &Symbol) -> Result<Vec<PriceSample>, HistoryError> {
        let window = self.window(symbol)?;
        let samples = window.read();
        Ok(samples.iter().copied().collect())
    }

    /// Copy of the symbol's prices, oldest first.
    pub fn prices(&self, symbol: &Symbol) -> Result<Vec<f64>, HistoryError> {
        let window = self.window(symbol)?;
        let samples = window.read();
        Ok(samples.iter().map(|s| s.price).collect())
    }

    /// Newest sample, if any.
    pub fn latest(&self, symbol: &Symbol) -> Result<Option<PriceSample>, HistoryError> {
        Ok(self.window(symbol)?.read().back().copied())
    }

    pub fn len(&self, symbol: &Symbol) -> Result<usize, HistoryError> {
        Ok(self.window(symbol)?.read().len())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tracked symbols in registration order.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.windows.contains_key(symbol)
    }

    fn window(&self, symbol: &Symbol) -> Result<&RwLock<VecDeque<PriceSample>>, HistoryError> {
        self.windows
            .get(symbol)
            .ok_or_else(|| HistoryError::UnknownSymbol {
                symbol: symbol.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    fn sym(ticker: &str) -> Symbol {
        Symbol::new(ticker)
    }

    fn store(capacity: usize) -> HistoryStore {
        HistoryStore::new(capacity, vec![sym("RELIANCE"), sym("TCS")]).unwrap()
    }

    #[test]
    fn zero_capacity_rejected() {
        assert!(HistoryStore::new(0, vec![sym("TCS")]).is_err());
    }

    #[test]
    fn default_capacity() {
        let store = HistoryStore::with_default_capacity(vec![sym("TCS")]).unwrap();
        assert_eq!(store.capacity(), 300);
    }

    #[test]
    fn windows_start_empty() {
        let store = store(3);
        assert_eq!(store.len(&sym("RELIANCE")).unwrap(), 0);
        assert!(store.snapshot(&sym("TCS")).unwrap().is_empty());
        assert_eq!(store.symbols(), &[sym("RELIANCE"), sym("TCS")]);
    }

    #[test]
    fn fifo_eviction_keeps_newest() {
        let store = store(3);
        let base = Utc::now();
        let s = sym("RELIANCE");

        let mut evicted = Vec::new();
        for (i, price) in [10.0, 11.0, 9.0, 12.0].into_iter().enumerate() {
            evicted.push(store.append(&s, base + Duration::seconds(i as i64), price).unwrap());
            assert!(store.len(&s).unwrap() <= 3);
        }

        assert_eq!(evicted, vec![0, 0, 0, 1]);
        assert_eq!(store.prices(&s).unwrap(), vec![11.0, 9.0, 12.0]);

        let samples = store.snapshot(&s).unwrap();
        assert_eq!(samples[0].timestamp, base + Duration::seconds(1));
        assert_eq!(samples[2].timestamp, base + Duration::seconds(3));
    }

    #[test]
    fn length_never_exceeds_capacity() {
        let store = store(5);
        let base = Utc::now();
        let s = sym("TCS");
        for i in 0..100 {
            store
                .append(&s, base + Duration::milliseconds(i), 100.0 + i as f64)
                .unwrap();
            assert!(store.len(&s).unwrap() <= 5);
        }
        assert_eq!(store.prices(&s).unwrap(), vec![195.0, 196.0, 197.0, 198.0, 199.0]);
    }

    #[test]
    fn invalid_prices_never_enter_window() {
        let store = store(3);
        let s = sym("RELIANCE");
        let now = Utc::now();

        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = store.append(&s, now, bad).unwrap_err();
            assert!(matches!(err, HistoryError::InvalidPrice { .. }));
        }
        assert_eq!(store.len(&s).unwrap(), 0);
    }

    #[test]
    fn unknown_symbol_rejected() {
        let store = store(3);
        let err = store.append(&sym("INFY"), Utc::now(), 10.0).unwrap_err();
        assert!(matches!(err, HistoryError::UnknownSymbol { .. }));
        assert!(store.snapshot(&sym("INFY")).is_err());
        assert!(!store.contains(&sym("INFY")));
    }

    #[test]
    fn out_of_order_sample_rejected() {
        let store = store(3);
        let s = sym("TCS");
        let now = Utc::now();

        store.append(&s, now, 10.0).unwrap();
        // equal timestamps are allowed
        store.append(&s, now, 10.5).unwrap();
        let err = store.append(&s, now - Duration::seconds(1), 11.0).unwrap_err();

        assert!(matches!(err, HistoryError::OutOfOrder { .. }));
        assert_eq!(store.prices(&s).unwrap(), vec![10.0, 10.5]);
    }

    #[test]
    fn latest_is_newest_sample() {
        let store = store(2);
        let s = sym("TCS");
        let base = Utc::now();
        assert_eq!(store.latest(&s).unwrap(), None);

        for (i, price) in [10.0, 11.0, 12.0].into_iter().enumerate() {
            store.append(&s, base + Duration::seconds(i as i64), price).unwrap();
        }
        let latest = store.latest(&s).unwrap().unwrap();
        assert_eq!(latest.price, 12.0);
        assert_eq!(latest.timestamp, base + Duration::seconds(2));
        assert!(store.latest(&sym("INFY")).is_err());
    }

    #[test]
    fn snapshot_is_detached_copy() {
        let store = store(3);
        let s = sym("TCS");
        let base = Utc::now();
        store.append(&s, base, 10.0).unwrap();

        let before = store.snapshot(&s).unwrap();
        store.append(&s, base + Duration::seconds(1), 11.0).unwrap();

        assert_eq!(before.len(), 1);
        assert_eq!(store.len(&s).unwrap(), 2);
    }

    #[test]
    fn duplicate_symbols_collapse() {
        let store = HistoryStore::new(2, vec![sym("TCS"), sym("TCS"), sym("INFY")]).unwrap();
        assert_eq!(store.symbols(), &[sym("TCS"), sym("INFY")]);
    }

    #[test]
    fn concurrent_readers_see_whole_windows() {
        let store = Arc::new(store(4));
        let s = sym("RELIANCE");
        let base = Utc::now();

        let writer = {
            let store = Arc::clone(&store);
            let s = s.clone();
            std::thread::spawn(move || {
                for i in 0..2_000 {
                    store
                        .append(&s, base + Duration::milliseconds(i), 1.0 + i as f64)
                        .unwrap();
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                let s = s.clone();
                std::thread::spawn(move || {
                    for _ in 0..2_000 {
                        let prices = store.prices(&s).unwrap();
                        assert!(prices.len() <= 4);
                        // Consecutive prices always differ by exactly one step.
                        for pair in prices.windows(2) {
                            assert_eq!(pair[1] - pair[0], 1.0);
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(store.len(&s).unwrap(), 4);
    }
}
