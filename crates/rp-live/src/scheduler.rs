//! Snapshot scheduler: the single shared producer.
//!
//! One [`SnapshotScheduler`] per tracked symbol set drives a fixed-interval
//! loop. Each tick it fetches every symbol's quote concurrently, appends the
//! accepted prices to the [`HistoryStore`], recomputes risk metrics, and
//! publishes the resulting [`Batch`] through the [`SubscriberHub`]. Subscribers
//! come and go without ever starting or stopping a poll.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use futures::FutureExt;
use parking_lot::RwLock;
use rp_risk::{HistoryStore, RiskMetricsCalculator};
use rp_types::{Batch, Quote, QuoteError, Snapshot, Symbol};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::fanout::SubscriberHub;
use crate::source::{QuoteResult, QuoteSource};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(1800);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_millis(1500);

/// Timing configuration for the tick loop.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    pub tick_interval: Duration,
    /// Upper bound on a single quote fetch; slower fetches count as failures.
    pub fetch_timeout: Duration,
    /// Stop the loop once no subscriber has been attached for this long.
    /// `None` keeps it running until shut down.
    pub idle_shutdown: Option<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            idle_shutdown: None,
        }
    }
}

/// Running counters, readable while the loop runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub snapshots: u64,
    pub quote_failures: u64,
    pub invalid_prices: u64,
    pub deliveries: u64,
    pub last_tick_at: Option<DateTime<Utc>>,
}

/// Outcome of a single tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub batch: Arc<Batch>,
    /// Symbols left out of the batch and why.
    pub failures: Vec<QuoteError>,
    /// Subscribers the batch was handed to.
    pub delivered: usize,
}

pub struct SnapshotScheduler {
    source: Arc<dyn QuoteSource>,
    history: Arc<HistoryStore>,
    hub: SubscriberHub,
    config: SchedulerConfig,
    stats: Arc<RwLock<SchedulerStats>>,
    tick: u64,
}

impl SnapshotScheduler {
    pub fn new(
        source: Arc<dyn QuoteSource>,
        history: Arc<HistoryStore>,
        hub: SubscriberHub,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            source,
            history,
            hub,
            config,
            stats: Arc::new(RwLock::new(SchedulerStats::default())),
            tick: 0,
        }
    }

    /// Shared view of the counters.
    pub fn stats_handle(&self) -> Arc<RwLock<SchedulerStats>> {
        Arc::clone(&self.stats)
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats.read().clone()
    }

    pub fn hub(&self) -> &SubscriberHub {
        &self.hub
    }

    /// Run one fetch → append → compute → publish cycle.
    ///
    /// All fetches of the tick resolve (or time out) before the batch is
    /// assembled; a failing symbol is left out and its history untouched.
    pub async fn tick(&mut self) -> TickReport {
        self.tick += 1;
        let tick = self.tick;

        let symbols = self.history.symbols();
        let results = join_all(symbols.iter().map(|s| self.fetch_with_timeout(s))).await;
        let now = Utc::now();

        let mut snapshots = Vec::with_capacity(symbols.len());
        let mut failures = Vec::new();
        for (symbol, result) in symbols.iter().zip(results) {
            match result.and_then(|quote| self.ingest(symbol, now, quote)) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(err) => {
                    warn!(tick, %symbol, error = %err, "symbol skipped this tick");
                    failures.push(err);
                }
            }
        }

        let batch = Arc::new(Batch::new(tick, snapshots));
        let delivered = self.hub.publish(Arc::clone(&batch));

        {
            let mut stats = self.stats.write();
            stats.ticks += 1;
            stats.snapshots += batch.len() as u64;
            stats.invalid_prices += failures.iter().filter(|f| f.is_invalid_price()).count() as u64;
            stats.quote_failures += failures.iter().filter(|f| !f.is_invalid_price()).count() as u64;
            stats.deliveries += delivered as u64;
            stats.last_tick_at = Some(now);
        }

        debug!(
            tick,
            snapshots = batch.len(),
            failures = failures.len(),
            delivered,
            "tick complete"
        );

        TickReport {
            batch,
            failures,
            delivered,
        }
    }

    async fn fetch_with_timeout(&self, symbol: &Symbol) -> QuoteResult {
        // A panicking fetch only costs that symbol its slot in the tick.
        let fetch = AssertUnwindSafe(self.source.fetch(symbol)).catch_unwind();
        match tokio::time::timeout(self.config.fetch_timeout, fetch).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                error!(%symbol, source = self.source.name(), "quote fetch panicked");
                Err(QuoteError::Unavailable {
                    symbol: symbol.to_string(),
                    message: "quote source panicked".to_string(),
                })
            }
            Err(_) => Err(QuoteError::Timeout {
                symbol: symbol.to_string(),
                timeout_ms: self.config.fetch_timeout.as_millis() as u64,
            }),
        }
    }

    fn ingest(
        &self,
        symbol: &Symbol,
        now: DateTime<Utc>,
        quote: Quote,
    ) -> Result<Snapshot, QuoteError> {
        if !quote.has_valid_price() {
            return Err(QuoteError::InvalidPrice {
                symbol: symbol.to_string(),
                price: quote.last_price,
            });
        }

        // Samples stay ordered even if the wall clock steps backwards.
        let at = match self.history.latest(symbol)? {
            Some(latest) if latest.timestamp > now => {
                debug!(%symbol, %now, latest = %latest.timestamp, "clock behind newest sample");
                latest.timestamp
            }
            _ => now,
        };
        self.history.append(symbol, at, quote.last_price)?;

        let samples = self.history.snapshot(symbol)?;
        let prices: Vec<f64> = samples.iter().map(|s| s.price).collect();
        let metrics = RiskMetricsCalculator::compute(&prices);

        Ok(Snapshot::new(
            symbol.clone(),
            quote.last_price,
            quote.change_percent(),
            &samples,
            metrics,
        ))
    }

    /// Start the tick loop on the runtime. The returned handle owns the
    /// loop's lifetime.
    pub fn spawn(self) -> SchedulerHandle {
        let token = CancellationToken::new();
        let hub = self.hub.clone();
        let stats = self.stats_handle();

        let loop_token = token.clone();
        let loop_hub = hub.clone();
        let task = tokio::spawn(async move {
            let outcome = AssertUnwindSafe(self.run(loop_token.clone()))
                .catch_unwind()
                .await;
            if outcome.is_err() {
                error!("snapshot loop crashed; closing subscribers");
            }
            loop_hub.close();
            // observers of the token learn the loop is gone
            loop_token.cancel();
        });

        SchedulerHandle {
            token,
            task,
            hub,
            stats,
        }
    }

    async fn run(mut self, token: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut idle_since: Option<Instant> = None;

        info!(
            source = self.source.name(),
            symbols = self.history.symbols().len(),
            interval_ms = self.config.tick_interval.as_millis() as u64,
            "snapshot loop started"
        );

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    info!("snapshot loop cancelled");
                    break;
                }
                _ = interval.tick() => {}
            }

            if let Some(grace) = self.config.idle_shutdown {
                if self.hub.is_empty() {
                    let since = *idle_since.get_or_insert_with(Instant::now);
                    if since.elapsed() >= grace {
                        info!(grace_ms = grace.as_millis() as u64, "no subscribers; stopping snapshot loop");
                        break;
                    }
                } else {
                    idle_since = None;
                }
            }

            // In-flight ticks always finish; cancellation is only observed
            // between ticks.
            self.tick().await;
        }

        info!(ticks = self.tick, "snapshot loop stopped");
    }
}

/// Owner of a running tick loop.
pub struct SchedulerHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
    hub: SubscriberHub,
    stats: Arc<RwLock<SchedulerStats>>,
}

impl SchedulerHandle {
    pub fn hub(&self) -> &SubscriberHub {
        &self.hub
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats.read().clone()
    }

    pub fn stats_handle(&self) -> Arc<RwLock<SchedulerStats>> {
        Arc::clone(&self.stats)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Token that stops the loop when cancelled. It is also cancelled once
    /// the loop ends for any other reason.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Request a stop, let the current tick finish, and wait for the loop to
    /// release its timer and close all subscribers.
    pub async fn shutdown(self) {
        self.token.cancel();
        self.join().await;
    }

    /// Wait for the loop to end on its own (idle shutdown or cancellation
    /// through a cloned token).
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            error!(error = %e, "snapshot loop task failed");
        }
    }
}
