//! Quote source abstraction.

use async_trait::async_trait;
use rp_types::{Quote, QuoteError, Symbol};

/// Result alias for quote fetches.
pub type QuoteResult = Result<Quote, QuoteError>;

/// Upstream provider of the latest quote for a symbol.
///
/// Implementations may call a real market-data REST API (see
/// [`super::dhan::DhanQuoteSource`]) or generate prices locally (see
/// [`super::simulated::SimulatedQuoteSource`]). Fetches for different symbols
/// run concurrently, so implementations must be safe to share.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Fetch the latest quote. Transport failures, malformed payloads and
    /// unknown symbols are reported as [`QuoteError`]; the caller applies the
    /// timeout.
    async fn fetch(&self, symbol: &Symbol) -> QuoteResult;

    /// Short human-readable name for logs.
    fn name(&self) -> &str;
}
