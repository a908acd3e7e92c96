//! Live side of RiskPulse.
//!
//! A single [`SnapshotScheduler`] polls a [`QuoteSource`] on a fixed interval,
//! feeds the rolling history and pushes one [`rp_types::Batch`] per tick to
//! every attached subscriber through the [`SubscriberHub`]. The [`server`]
//! module exposes the hub over WebSocket.

pub mod config;
pub mod dhan;
pub mod fanout;
pub mod registry;
pub mod scheduler;
pub mod server;
pub mod simulated;
pub mod source;

pub use config::ServiceConfig;
pub use dhan::{DhanCredentials, DhanQuoteSource};
pub use fanout::{SubscriberHub, Subscription};
pub use registry::SymbolRegistry;
pub use scheduler::{
    SchedulerConfig, SchedulerHandle, SchedulerStats, SnapshotScheduler, TickReport,
};
pub use simulated::SimulatedQuoteSource;
pub use source::{QuoteResult, QuoteSource};
