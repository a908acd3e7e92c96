//! Offline quote source: a seeded random walk per symbol.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rp_types::{round_to, Quote, QuoteError, Symbol};

use crate::source::{QuoteResult, QuoteSource};

/// Largest fractional move per fetch (±1%).
pub const MAX_STEP: f64 = 0.01;

#[derive(Debug, Clone, Copy)]
struct Walk {
    price: f64,
    previous_close: f64,
}

/// Generates plausible quotes without any upstream connection. Used when no
/// market-data credentials are configured.
#[derive(Debug)]
pub struct SimulatedQuoteSource {
    walks: Mutex<HashMap<Symbol, Walk>>,
    rng: Mutex<StdRng>,
}

impl SimulatedQuoteSource {
    pub fn new<I>(symbols: I, seed: u64) -> Self
    where
        I: IntoIterator<Item = Symbol>,
    {
        let walks = symbols
            .into_iter()
            .map(|symbol| {
                let start = starting_price(&symbol);
                (
                    symbol,
                    Walk {
                        price: start,
                        previous_close: start,
                    },
                )
            })
            .collect();

        Self {
            walks: Mutex::new(walks),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

fn starting_price(symbol: &Symbol) -> f64 {
    match symbol.as_str() {
        "RELIANCE" => 2900.0,
        "TCS" => 3900.0,
        "HDFCBANK" => 1600.0,
        "INFY" => 1500.0,
        "ICICIBANK" => 1100.0,
        _ => 100.0,
    }
}

#[async_trait]
impl QuoteSource for SimulatedQuoteSource {
    async fn fetch(&self, symbol: &Symbol) -> QuoteResult {
        let step = {
            let mut rng = self.rng.lock();
            rng.random_range(-MAX_STEP..=MAX_STEP)
        };

        let mut walks = self.walks.lock();
        let walk = walks.get_mut(symbol).ok_or_else(|| QuoteError::UnknownSymbol {
            symbol: symbol.to_string(),
        })?;

        walk.price = round_to(walk.price * (1.0 + step), 2).max(0.01);
        Ok(Quote::new(walk.price, Some(walk.previous_close)))
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols() -> Vec<Symbol> {
        vec![Symbol::new("RELIANCE"), Symbol::new("TCS")]
    }

    #[tokio::test]
    async fn walk_stays_positive_and_bounded() {
        let source = SimulatedQuoteSource::new(symbols(), 7);
        let s = Symbol::new("RELIANCE");

        let mut last = 2900.0;
        for _ in 0..200 {
            let quote = source.fetch(&s).await.unwrap();
            assert!(quote.has_valid_price());
            assert_eq!(quote.previous_close, Some(2900.0));
            // one step is at most 1% plus rounding
            assert!((quote.last_price - last).abs() <= last * 0.01 + 0.01);
            last = quote.last_price;
        }
    }

    #[tokio::test]
    async fn same_seed_same_prices() {
        let a = SimulatedQuoteSource::new(symbols(), 42);
        let b = SimulatedQuoteSource::new(symbols(), 42);
        let s = Symbol::new("TCS");
        for _ in 0..10 {
            assert_eq!(a.fetch(&s).await.unwrap(), b.fetch(&s).await.unwrap());
        }
    }

    #[tokio::test]
    async fn unknown_symbol_is_an_error() {
        let source = SimulatedQuoteSource::new(symbols(), 1);
        let err = source.fetch(&Symbol::new("INFY")).await.unwrap_err();
        assert!(matches!(err, QuoteError::UnknownSymbol { .. }));
    }
}
