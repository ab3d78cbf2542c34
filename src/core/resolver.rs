//! Per-ticker price and shares resolution with ordered fallbacks.
//!
//! Every provider failure is absorbed here and treated as "this source
//! yielded nothing"; the next fallback is then tried.

use crate::core::market::{BarInterval, BarRange, MarketDataProvider, first_positive};
use crate::core::overrides::Overrides;
use crate::core::ticker::Ticker;
use serde::Serialize;
use std::fmt::Display;
use tracing::debug;

/// Quote fields that may carry the last traded price, most preferred first.
pub const PRICE_FIELDS: &[&str] = &["lastPrice", "regularMarketPrice", "currentPrice"];

/// Fundamentals fields carrying a share count; equities and funds differ.
pub const SHARES_FIELDS: &[&str] = &["sharesOutstanding", "fundSharesOutstanding"];

/// Fundamentals fields carrying aggregate fund assets.
pub const TOTAL_ASSETS_FIELDS: &[&str] = &["totalAssets", "netAssets"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "field", rename_all = "snake_case")]
pub enum PriceSource {
    Quote(&'static str),
    IntradayBar,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "field", rename_all = "snake_case")]
pub enum SharesSource {
    Override,
    Fundamentals(&'static str),
    TotalAssets(&'static str),
}

impl Display for PriceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriceSource::Quote(field) => write!(f, "quote ({field})"),
            PriceSource::IntradayBar => f.write_str("last 1m bar"),
        }
    }
}

impl Display for SharesSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SharesSource::Override => f.write_str("override"),
            SharesSource::Fundamentals(field) => write!(f, "fundamentals ({field})"),
            SharesSource::TotalAssets(field) => write!(f, "{field} / price"),
        }
    }
}

/// A resolved value together with the source that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolved<T, S> {
    pub value: T,
    pub source: S,
}

pub struct PriceResolver<'a> {
    market: &'a dyn MarketDataProvider,
}

impl<'a> PriceResolver<'a> {
    pub fn new(market: &'a dyn MarketDataProvider) -> Self {
        Self { market }
    }

    /// Last traded price from the quote snapshot, else the close of the most
    /// recent intraday bar. Non-positive prices count as absent.
    pub async fn resolve_price(&self, ticker: &Ticker) -> Option<Resolved<f64, PriceSource>> {
        match self.market.quote_snapshot(ticker).await {
            Ok(quote) => {
                if let Some((field, price)) = first_positive(&quote.fields, PRICE_FIELDS) {
                    return Some(Resolved {
                        value: price,
                        source: PriceSource::Quote(field),
                    });
                }
                debug!("No usable price field in quote for {}", ticker);
            }
            Err(e) => debug!("Quote unavailable for {}: {:#}", ticker, e),
        }

        match self
            .market
            .recent_bars(ticker, BarRange::OneDay, BarInterval::OneMinute)
            .await
        {
            Ok(bars) => {
                let close = bars.iter().rev().find_map(|bar| bar.close);
                match close {
                    Some(price) if price.is_finite() && price > 0.0 => {
                        return Some(Resolved {
                            value: price,
                            source: PriceSource::IntradayBar,
                        });
                    }
                    _ => debug!("No usable intraday close for {}", ticker),
                }
            }
            Err(e) => debug!("Intraday bars unavailable for {}: {:#}", ticker, e),
        }

        None
    }
}

pub struct SharesResolver<'a> {
    market: &'a dyn MarketDataProvider,
    overrides: &'a Overrides,
}

impl<'a> SharesResolver<'a> {
    pub fn new(market: &'a dyn MarketDataProvider, overrides: &'a Overrides) -> Self {
        Self { market, overrides }
    }

    /// Override first, then the fundamentals share count, then total assets
    /// divided by `price` when a positive price is known.
    pub async fn resolve_shares(
        &self,
        ticker: &Ticker,
        price: Option<f64>,
    ) -> Option<Resolved<u64, SharesSource>> {
        if let Some(count) = self.overrides.get(ticker).filter(|count| *count > 0) {
            return Some(Resolved {
                value: count,
                source: SharesSource::Override,
            });
        }

        let fundamentals = match self.market.fundamentals_snapshot(ticker).await {
            Ok(fundamentals) => fundamentals,
            Err(e) => {
                debug!("Fundamentals unavailable for {}: {:#}", ticker, e);
                return None;
            }
        };

        if let Some((field, count)) = first_positive(&fundamentals.fields, SHARES_FIELDS) {
            let count = count.trunc();
            if count >= 1.0 {
                return Some(Resolved {
                    value: count as u64,
                    source: SharesSource::Fundamentals(field),
                });
            }
        }

        let price = price.filter(|p| p.is_finite() && *p > 0.0)?;
        let (field, total_assets) = first_positive(&fundamentals.fields, TOTAL_ASSETS_FIELDS)?;
        let estimate = (total_assets / price).floor();
        if estimate >= 1.0 {
            debug!(
                "Estimated {} shares for {} from {} at price {}",
                estimate, ticker, field, price
            );
            return Some(Resolved {
                value: estimate as u64,
                source: SharesSource::TotalAssets(field),
            });
        }

        debug!("No usable share count for {}", ticker);
        None
    }
}
