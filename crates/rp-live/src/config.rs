//! Service configuration read from `RISKPULSE_*` and `DHAN_*` environment variables.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use rp_risk::DEFAULT_HISTORY_CAPACITY;
use rp_types::{config_error, RpResult};

use crate::dhan::{DhanCredentials, DhanQuoteSource, DEFAULT_DHAN_BASE_URL};
use crate::registry::SymbolRegistry;
use crate::scheduler::{SchedulerConfig, DEFAULT_FETCH_TIMEOUT, DEFAULT_TICK_INTERVAL};
use crate::simulated::SimulatedQuoteSource;
use crate::source::QuoteSource;

/// Service configuration derived from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub bind: String,
    pub port: u16,
    /// Browser origin allowed by CORS.
    pub cors_origin: String,

    // ── Snapshot loop ──────────────────────────────────────────────
    pub tick_interval: Duration,
    pub fetch_timeout: Duration,
    pub history_capacity: usize,
    pub idle_shutdown: Option<Duration>,

    // ── Upstream ───────────────────────────────────────────────────
    pub registry: SymbolRegistry,
    pub dhan_base_url: String,
    /// `None` ⇒ quotes are simulated locally.
    pub dhan_credentials: Option<DhanCredentials>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8000,
            cors_origin: "http://localhost:5173".to_string(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            idle_shutdown: None,
            registry: SymbolRegistry::nse_default(),
            dhan_base_url: DEFAULT_DHAN_BASE_URL.to_string(),
            dhan_credentials: None,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> RpResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Unset or blank variables fall
    /// back to defaults; unparsable ones are errors.
    pub fn from_lookup<F>(lookup: F) -> RpResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        let defaults = Self::default();

        let tick_ms = parse_or(&get, "RISKPULSE_TICK_MS", defaults.tick_interval.as_millis() as u64)?;
        let fetch_ms = parse_or(
            &get,
            "RISKPULSE_FETCH_TIMEOUT_MS",
            defaults.fetch_timeout.as_millis() as u64,
        )?;
        let history_capacity = parse_or(&get, "RISKPULSE_HISTORY_CAPACITY", defaults.history_capacity)?;

        if tick_ms == 0 {
            return Err(config_error!("RISKPULSE_TICK_MS must be positive"));
        }
        if fetch_ms == 0 {
            return Err(config_error!("RISKPULSE_FETCH_TIMEOUT_MS must be positive"));
        }
        if history_capacity == 0 {
            return Err(config_error!("RISKPULSE_HISTORY_CAPACITY must be positive"));
        }

        let idle_shutdown = match get("RISKPULSE_IDLE_SHUTDOWN_SECS") {
            Some(raw) => Some(Duration::from_secs(parse_value("RISKPULSE_IDLE_SHUTDOWN_SECS", &raw)?)),
            None => None,
        };

        let registry = match get("RISKPULSE_SYMBOLS") {
            Some(list) => SymbolRegistry::parse(&list)?,
            None => defaults.registry,
        };

        let dhan_credentials = match (get("DHAN_CLIENT_ID"), get("DHAN_ACCESS_TOKEN")) {
            (Some(client_id), Some(access_token)) => Some(DhanCredentials {
                client_id,
                access_token,
            }),
            (None, None) => None,
            _ => {
                return Err(config_error!(
                    "DHAN_CLIENT_ID and DHAN_ACCESS_TOKEN must be set together"
                ))
            }
        };

        Ok(Self {
            bind: get("RISKPULSE_BIND").unwrap_or(defaults.bind),
            port: parse_or(&get, "RISKPULSE_PORT", defaults.port)?,
            cors_origin: get("RISKPULSE_CORS_ORIGIN").unwrap_or(defaults.cors_origin),
            tick_interval: Duration::from_millis(tick_ms),
            fetch_timeout: Duration::from_millis(fetch_ms),
            history_capacity,
            idle_shutdown,
            registry,
            dhan_base_url: get("DHAN_BASE_URL").unwrap_or(defaults.dhan_base_url),
            dhan_credentials,
        })
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            tick_interval: self.tick_interval,
            fetch_timeout: self.fetch_timeout,
            idle_shutdown: self.idle_shutdown,
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    /// DhanHQ when credentials are present, otherwise a seeded random walk.
    pub fn quote_source(&self, seed: u64) -> Arc<dyn QuoteSource> {
        match &self.dhan_credentials {
            Some(credentials) => Arc::new(DhanQuoteSource::new(
                &self.dhan_base_url,
                credentials.clone(),
                self.registry.clone(),
            )),
            None => Arc::new(SimulatedQuoteSource::new(self.registry.symbols(), seed)),
        }
    }
}

fn parse_or<G, T>(get: &G, name: &str, default: T) -> RpResult<T>
where
    G: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match get(name) {
        Some(raw) => parse_value(name, &raw),
        None => Ok(default),
    }
}

fn parse_value<T: std::str::FromStr>(name: &str, raw: &str) -> RpResult<T> {
    raw.parse()
        .map_err(|_| config_error!("{} has invalid value '{}'", name, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> RpResult<ServiceConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.listen_addr(), "127.0.0.1:8000");
        assert_eq!(config.history_capacity, 300);
        assert_eq!(config.scheduler_config(), SchedulerConfig::default());
        assert!(config.dhan_credentials.is_none());
        assert_eq!(config.quote_source(1).name(), "simulated");
    }

    #[test]
    fn overrides_are_applied() {
        let config = config_from(&[
            ("RISKPULSE_PORT", "9100"),
            ("RISKPULSE_TICK_MS", "500"),
            ("RISKPULSE_HISTORY_CAPACITY", " 50 "),
            ("RISKPULSE_IDLE_SHUTDOWN_SECS", "30"),
            ("RISKPULSE_SYMBOLS", "SBIN:3045"),
            ("DHAN_CLIENT_ID", "1100"),
            ("DHAN_ACCESS_TOKEN", "secret"),
        ])
        .unwrap();

        assert_eq!(config.port, 9100);
        assert_eq!(config.tick_interval, Duration::from_millis(500));
        assert_eq!(config.history_capacity, 50);
        assert_eq!(config.idle_shutdown, Some(Duration::from_secs(30)));
        assert_eq!(config.registry.len(), 1);
        assert_eq!(config.quote_source(1).name(), "dhan");
        assert_eq!(
            config.dhan_credentials.unwrap().access_token,
            "secret".to_string()
        );
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = config_from(&[("RISKPULSE_PORT", "  "), ("RISKPULSE_BIND", "")]).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.bind, "127.0.0.1");
    }

    #[test]
    fn invalid_values_are_errors() {
        assert!(config_from(&[("RISKPULSE_PORT", "eighty")]).is_err());
        assert!(config_from(&[("RISKPULSE_TICK_MS", "0")]).is_err());
        assert!(config_from(&[("RISKPULSE_HISTORY_CAPACITY", "0")]).is_err());
        assert!(config_from(&[("RISKPULSE_SYMBOLS", "SBIN")]).is_err());
        assert!(config_from(&[("DHAN_CLIENT_ID", "only-half")]).is_err());
    }
}
