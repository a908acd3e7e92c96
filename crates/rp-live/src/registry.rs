//! Static symbol → upstream instrument-id mapping.

use rp_types::{config_error, RpResult, Symbol};

/// Ordered, immutable registry of tracked symbols and their upstream
/// instrument identifiers. Loaded once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolRegistry {
    entries: Vec<(Symbol, String)>,
}

impl SymbolRegistry {
    /// Build from `(symbol, instrument id)` pairs. Rejects an empty set and
    /// duplicate symbols.
    pub fn new<I, S, T>(entries: I) -> RpResult<Self>
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<Symbol>,
        T: Into<String>,
    {
        let mut out: Vec<(Symbol, String)> = Vec::new();
        for (symbol, id) in entries {
            let symbol = symbol.into();
            let id = id.into().trim().to_string();
            if symbol.as_str().is_empty() || id.is_empty() {
                return Err(config_error!("empty symbol or instrument id in registry"));
            }
            if out.iter().any(|(s, _)| s == &symbol) {
                return Err(config_error!("duplicate symbol in registry: {}", symbol));
            }
            out.push((symbol, id));
        }

        if out.is_empty() {
            return Err(config_error!("symbol registry is empty"));
        }
        Ok(Self { entries: out })
    }

    /// The five NSE equities tracked out of the box.
    pub fn nse_default() -> Self {
        Self {
            entries: [
                ("RELIANCE", "2885"),
                ("TCS", "11536"),
                ("HDFCBANK", "1333"),
                ("INFY", "1594"),
                ("ICICIBANK", "4963"),
            ]
            .into_iter()
            .map(|(s, id)| (Symbol::new(s), id.to_string()))
            .collect(),
        }
    }

    /// Parse `SYM:ID,SYM:ID,...`.
    pub fn parse(list: &str) -> RpResult<Self> {
        let mut pairs = Vec::new();
        for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (symbol, id) = item
                .split_once(':')
                .ok_or_else(|| config_error!("registry entry '{}' is not SYMBOL:ID", item))?;
            pairs.push((Symbol::new(symbol), id.to_string()));
        }
        Self::new(pairs)
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        self.entries.iter().map(|(s, _)| s.clone()).collect()
    }

    pub fn instrument_id(&self, symbol: &Symbol) -> Option<&str> {
        self.entries
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, id)| id.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_order() {
        let registry = SymbolRegistry::nse_default();
        let names: Vec<String> = registry.symbols().iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["RELIANCE", "TCS", "HDFCBANK", "INFY", "ICICIBANK"]);
        assert_eq!(registry.instrument_id(&Symbol::new("TCS")), Some("11536"));
        assert_eq!(registry.instrument_id(&Symbol::new("WIPRO")), None);
    }

    #[test]
    fn test_parse_list() {
        let registry = SymbolRegistry::parse(" SBIN:3045, WIPRO:3787 ,").unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.instrument_id(&Symbol::new("WIPRO")), Some("3787"));
    }

    #[test]
    fn test_parse_rejects_bad_entries() {
        assert!(SymbolRegistry::parse("").is_err());
        assert!(SymbolRegistry::parse("SBIN").is_err());
        assert!(SymbolRegistry::parse("SBIN:").is_err());
        assert!(SymbolRegistry::parse("SBIN:1,SBIN:2").is_err());
    }
}
