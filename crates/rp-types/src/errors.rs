use thiserror::Error;

/// Main error type for the RiskPulse system
#[derive(Error, Debug)]
pub enum RpError {
    #[error("History error: {0}")]
    History(#[from] HistoryError),

    #[error("Quote error: {0}")]
    Quote(#[from] QuoteError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Rolling history errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HistoryError {
    #[error("Invalid price for {symbol}: {price} (must be positive)")]
    InvalidPrice { symbol: String, price: f64 },

    #[error("Symbol not tracked: {symbol}")]
    UnknownSymbol { symbol: String },

    #[error("Out-of-order sample for {symbol}: {timestamp} precedes {latest}")]
    OutOfOrder {
        symbol: String,
        timestamp: String,
        latest: String,
    },
}

/// Quote acquisition errors. Every variant is recovered locally by skipping the
/// symbol for the current tick.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuoteError {
    #[error("Quote unavailable for {symbol}: {message}")]
    Unavailable { symbol: String, message: String },

    #[error("Quote for {symbol} timed out after {timeout_ms} ms")]
    Timeout { symbol: String, timeout_ms: u64 },

    #[error("Malformed quote payload for {symbol}: {message}")]
    Malformed { symbol: String, message: String },

    #[error("Invalid price for {symbol}: {price}")]
    InvalidPrice { symbol: String, price: f64 },

    #[error("No instrument mapping for {symbol}")]
    UnknownSymbol { symbol: String },
}

impl QuoteError {
    pub fn symbol(&self) -> &str {
        match self {
            QuoteError::Unavailable { symbol, .. }
            | QuoteError::Timeout { symbol, .. }
            | QuoteError::Malformed { symbol, .. }
            | QuoteError::InvalidPrice { symbol, .. }
            | QuoteError::UnknownSymbol { symbol } => symbol,
        }
    }

    /// True for the `InvalidPrice` class, false for every flavor of
    /// `QuoteUnavailable`.
    pub fn is_invalid_price(&self) -> bool {
        matches!(self, QuoteError::InvalidPrice { .. })
    }
}

impl From<HistoryError> for QuoteError {
    fn from(err: HistoryError) -> Self {
        let message = err.to_string();
        match err {
            HistoryError::InvalidPrice { symbol, price } => QuoteError::InvalidPrice { symbol, price },
            HistoryError::UnknownSymbol { symbol } => QuoteError::UnknownSymbol { symbol },
            HistoryError::OutOfOrder { symbol, .. } => QuoteError::Unavailable { symbol, message },
        }
    }
}

/// Fan-out errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubscriberError {
    #[error("Subscriber hub closed")]
    HubClosed,
}

/// Result type alias for RiskPulse operations
pub type RpResult<T> = Result<T, RpError>;

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::RpError::Config(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = QuoteError::Timeout {
            symbol: "TCS".to_string(),
            timeout_ms: 1500,
        };

        assert!(error.to_string().contains("TCS"));
        assert!(error.to_string().contains("1500"));
        assert_eq!(error.symbol(), "TCS");
    }

    #[test]
    fn test_error_conversion() {
        let history_error = HistoryError::UnknownSymbol {
            symbol: "XYZ".to_string(),
        };
        let rp_error: RpError = history_error.into();

        match rp_error {
            RpError::History(_) => (),
            _ => panic!("Expected History error"),
        }
    }

    #[test]
    fn test_history_error_maps_to_quote_error() {
        let invalid: QuoteError = HistoryError::InvalidPrice {
            symbol: "INFY".to_string(),
            price: -1.0,
        }
        .into();
        assert!(invalid.is_invalid_price());

        let out_of_order: QuoteError = HistoryError::OutOfOrder {
            symbol: "INFY".to_string(),
            timestamp: "a".to_string(),
            latest: "b".to_string(),
        }
        .into();
        assert!(!out_of_order.is_invalid_price());
        assert_eq!(out_of_order.symbol(), "INFY");
    }

    #[test]
    fn test_macros() {
        let err = config_error!("Missing required field: {}", "symbol");
        assert!(err.to_string().contains("symbol"));
    }
}
