//! Market data abstractions and core types

use crate::core::ticker::Ticker;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Display;

/// Raw provider fields keyed by the provider's own field names.
pub type FieldMap = HashMap<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub fields: FieldMap,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundamentalsSnapshot {
    pub fields: FieldMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: i64,
    pub close: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarRange {
    OneDay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarInterval {
    OneMinute,
    OneDay,
}

impl Display for BarRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            BarRange::OneDay => "1d",
        })
    }
}

impl Display for BarInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            BarInterval::OneMinute => "1m",
            BarInterval::OneDay => "1d",
        })
    }
}

/// The three independently fallible capabilities of a market data source.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn quote_snapshot(&self, ticker: &Ticker) -> Result<QuoteSnapshot>;

    async fn fundamentals_snapshot(&self, ticker: &Ticker) -> Result<FundamentalsSnapshot>;

    /// Bars ordered oldest first.
    async fn recent_bars(
        &self,
        ticker: &Ticker,
        range: BarRange,
        interval: BarInterval,
    ) -> Result<Vec<Bar>>;
}

/// Interprets a provider value as a positive, finite number.
///
/// Accepts JSON numbers, numeric strings and Yahoo style `{"raw": n}` objects.
pub fn positive_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Object(map) => return map.get("raw").and_then(positive_number),
        _ => None,
    }?;
    (number.is_finite() && number > 0.0).then_some(number)
}

/// Tries `candidates` in order and returns the first field holding a
/// positive number, along with the name of that field.
pub fn first_positive(fields: &FieldMap, candidates: &[&'static str]) -> Option<(&'static str, f64)> {
    candidates.iter().find_map(|name| {
        fields
            .get(*name)
            .and_then(positive_number)
            .map(|value| (*name, value))
    })
}
