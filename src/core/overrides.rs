//! Operator-curated shares-outstanding counts loaded from a CSV file.
//!
//! The file carries a `ticker,shares_outstanding` header. Overrides only
//! improve accuracy, so any problem reading the file degrades to an empty
//! mapping instead of failing the valuation.

use crate::core::cache::KeyValueCollection;
use crate::core::ticker::Ticker;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const TICKER_COLUMN: &str = "ticker";
pub const SHARES_COLUMN: &str = "shares_outstanding";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Overrides {
    shares: HashMap<Ticker, u64>,
}

impl Overrides {
    pub fn get(&self, ticker: &Ticker) -> Option<u64> {
        self.shares.get(ticker).copied()
    }

    pub fn len(&self) -> usize {
        self.shares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    /// Parses override rows. Blank cells and non-positive counts are skipped;
    /// a later row for the same ticker replaces an earlier one.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = rdr.headers().context("Failed to read overrides header")?.clone();
        let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
        let (Some(ticker_idx), Some(shares_idx)) = (column(TICKER_COLUMN), column(SHARES_COLUMN))
        else {
            bail!("Overrides must have '{TICKER_COLUMN}' and '{SHARES_COLUMN}' columns");
        };

        let mut shares = HashMap::new();
        for record in rdr.records() {
            let record = record.context("Failed to read overrides row")?;
            let line = record.position().map_or(0, |p| p.line());
            let symbol = record.get(ticker_idx).unwrap_or_default();
            let count = record.get(shares_idx).unwrap_or_default();
            if symbol.is_empty() || count.is_empty() {
                debug!("Skipping incomplete overrides row at line {}", line);
                continue;
            }

            let ticker: Ticker = symbol
                .parse()
                .with_context(|| format!("Invalid ticker at line {line}"))?;
            let value: f64 = count
                .parse()
                .with_context(|| format!("Invalid shares_outstanding '{count}' at line {line}"))?;
            if !value.is_finite() {
                bail!("Invalid shares_outstanding '{count}' at line {line}");
            }

            let value = value.trunc();
            if value < 1.0 {
                debug!("Skipping non-positive override for {} at line {}", ticker, line);
                continue;
            }
            if let Some(previous) = shares.insert(ticker.clone(), value as u64) {
                debug!("Override for {} at line {} replaces {}", ticker, line, previous);
            }
        }

        Ok(Overrides { shares })
    }
}

impl FromIterator<(Ticker, u64)> for Overrides {
    fn from_iter<I: IntoIterator<Item = (Ticker, u64)>>(iter: I) -> Self {
        Overrides {
            shares: iter.into_iter().filter(|(_, count)| *count > 0).collect(),
        }
    }
}

/// Reads the overrides file, returning an empty mapping on any failure.
pub fn load(path: &Path) -> Overrides {
    let result = File::open(path)
        .with_context(|| format!("Failed to open overrides file: {}", path.display()))
        .and_then(Overrides::from_reader);
    match result {
        Ok(overrides) => {
            info!("Loaded {} share overrides from {}", overrides.len(), path.display());
            overrides
        }
        Err(e) => {
            warn!("Ignoring share overrides: {:#}", e);
            Overrides::default()
        }
    }
}

/// Serves the overrides mapping, re-reading the file at most once per `ttl`.
pub struct OverridesStore {
    path: PathBuf,
    cache: Arc<dyn KeyValueCollection>,
    ttl: Duration,
}

impl OverridesStore {
    pub fn new(path: PathBuf, cache: Arc<dyn KeyValueCollection>, ttl: Duration) -> Self {
        Self { path, cache, ttl }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn current(&self) -> Overrides {
        let key = format!("overrides:{}", self.path.display());
        if let Some(bytes) = self.cache.get(key.as_bytes()).await {
            match serde_json::from_slice(&bytes) {
                Ok(overrides) => return overrides,
                Err(e) => debug!("Discarding unreadable cached overrides: {}", e),
            }
        }

        let overrides = load(&self.path);
        match serde_json::to_vec(&overrides) {
            Ok(bytes) => self.cache.put(key.as_bytes(), &bytes, Some(self.ttl)).await,
            Err(e) => debug!("Failed to cache overrides: {}", e),
        }
        overrides
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryCollection;
    use std::fs;
    use tempfile::tempdir;

    fn parse(csv: &str) -> Result<Overrides> {
        Overrides::from_reader(csv.as_bytes())
    }

    fn ticker(symbol: &str) -> Ticker {
        symbol.parse().unwrap()
    }

    #[test]
    fn test_parse_normalizes_ticker_case() {
        let overrides = parse("ticker,shares_outstanding\nlrgc,1500000\nHidv,250000\n").unwrap();
        assert_eq!(overrides.len(), 2);
        assert_eq!(overrides.get(&ticker("LRGC")), Some(1_500_000));
        assert_eq!(overrides.get(&ticker("HIDV")), Some(250_000));
    }

    #[test]
    fn test_parse_discards_incomplete_and_non_positive_rows() {
        let overrides = parse(
            "ticker,shares_outstanding\n,100\nILOW,\nLRGC,0\nHIDV,-5\nFWD,0.4\nHYDB,1200.9\n",
        )
        .unwrap();
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides.get(&ticker("HYDB")), Some(1200));
        assert_eq!(overrides.get(&ticker("LRGC")), None);
    }

    #[test]
    fn test_parse_last_duplicate_wins() {
        let overrides = parse("ticker,shares_outstanding\nLRGC,100\nlrgc,200\n").unwrap();
        assert_eq!(overrides.get(&ticker("LRGC")), Some(200));
    }

    #[test]
    fn test_parse_tolerates_extra_columns_and_spacing() {
        let overrides =
            parse(" Shares_Outstanding , note , Ticker \n 300 , from fund site , ilow \n").unwrap();
        assert_eq!(overrides.get(&ticker("ILOW")), Some(300));
    }

    #[test]
    fn test_parse_fails_on_missing_column() {
        let err = parse("ticker,shares\nLRGC,100\n").unwrap_err();
        assert!(err.to_string().contains("shares_outstanding"));
    }

    #[test]
    fn test_parse_fails_on_non_numeric_count() {
        assert!(parse("ticker,shares_outstanding\nLRGC,lots\n").is_err());
    }

    #[test]
    fn test_load_missing_file_yields_empty_mapping() {
        let dir = tempdir().unwrap();
        let overrides = load(&dir.path().join("absent.csv"));
        assert!(overrides.is_empty());
    }

    #[test]
    fn test_load_malformed_file_yields_empty_mapping() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shares_overrides.csv");
        fs::write(&path, "symbol,count\nLRGC,100\n").unwrap();
        assert!(load(&path).is_empty());
    }

    #[test]
    fn test_from_iter_drops_zero_counts() {
        let overrides: Overrides = [(ticker("A"), 0), (ticker("B"), 5)].into_iter().collect();
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides.get(&ticker("B")), Some(5));
    }

    #[tokio::test]
    async fn test_store_rereads_only_after_ttl() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shares_overrides.csv");
        fs::write(&path, "ticker,shares_outstanding\nLRGC,100\n").unwrap();

        let store = OverridesStore::new(
            path.clone(),
            Arc::new(MemoryCollection::new()),
            Duration::from_millis(50),
        );
        assert_eq!(store.current().await.get(&ticker("LRGC")), Some(100));

        fs::write(&path, "ticker,shares_outstanding\nLRGC,200\n").unwrap();
        assert_eq!(store.current().await.get(&ticker("LRGC")), Some(100));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(store.current().await.get(&ticker("LRGC")), Some(200));
    }
}
