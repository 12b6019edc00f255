//! Symbol universe sources.
//!
//! Listing scrapers are external collaborators behind `UniverseSource`;
//! the built-in static universe is used when none is configured or it fails.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

use super::SymbolInfo;

/// Produces the list of symbols eligible for screening.
#[async_trait]
pub trait UniverseSource: Send + Sync {
    /// Source name for logging
    fn name(&self) -> &'static str;

    async fn fetch_symbols(&self) -> Result<Vec<SymbolInfo>>;
}

/// A fixed in-memory universe.
#[derive(Debug, Clone)]
pub struct StaticUniverse {
    symbols: Vec<SymbolInfo>,
}

impl StaticUniverse {
    pub fn new(symbols: Vec<SymbolInfo>) -> Self {
        Self { symbols }
    }

    /// The built-in large-cap NSE list.
    pub fn fallback() -> Self {
        Self::new(fallback_universe())
    }
}

#[async_trait]
impl UniverseSource for StaticUniverse {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch_symbols(&self) -> Result<Vec<SymbolInfo>> {
        Ok(self.symbols.clone())
    }
}

/// Large-cap NSE constituents used when no listing source is available.
pub fn fallback_universe() -> Vec<SymbolInfo> {
    const STOCKS: &[(&str, &str, &str)] = &[
        ("RELIANCE", "Reliance Industries Ltd", "ENERGY"),
        ("TCS", "Tata Consultancy Services Ltd", "IT"),
        ("HDFCBANK", "HDFC Bank Ltd", "BANK"),
        ("INFY", "Infosys Ltd", "IT"),
        ("ICICIBANK", "ICICI Bank Ltd", "BANK"),
        ("HINDUNILVR", "Hindustan Unilever Ltd", "FMCG"),
        ("SBIN", "State Bank of India", "BANK"),
        ("BHARTIARTL", "Bharti Airtel Ltd", "TELECOM"),
        ("KOTAKBANK", "Kotak Mahindra Bank Ltd", "BANK"),
        ("ITC", "ITC Ltd", "FMCG"),
        ("LT", "Larsen & Toubro Ltd", "INFRASTRUCTURE"),
        ("AXISBANK", "Axis Bank Ltd", "BANK"),
        ("WIPRO", "Wipro Ltd", "IT"),
        ("MARUTI", "Maruti Suzuki India Ltd", "AUTO"),
        ("SUNPHARMA", "Sun Pharmaceutical Industries Ltd", "PHARMA"),
    ];

    STOCKS
        .iter()
        .map(|(symbol, name, category)| SymbolInfo::new(*symbol, *name, *category, "NSE"))
        .collect()
}

/// Remove duplicate symbols. The last occurrence of a symbol wins but keeps
/// the position of the first.
pub fn dedup_by_symbol(symbols: Vec<SymbolInfo>) -> Vec<SymbolInfo> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<SymbolInfo> = Vec::with_capacity(symbols.len());

    for info in symbols {
        match index.get(&info.symbol) {
            Some(&pos) => unique[pos] = info,
            None => {
                index.insert(info.symbol.clone(), unique.len());
                unique.push(info);
            }
        }
    }

    unique
}
