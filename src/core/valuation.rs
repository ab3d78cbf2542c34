//! Combines resolved prices and share counts into an estimated AUM.
use crate::core::market::MarketDataProvider;
use crate::core::overrides::Overrides;
use crate::core::resolver::{PriceResolver, PriceSource, SharesResolver, SharesSource};
use crate::core::ticker::Ticker;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info};

/// Estimated value of a single fund. `aum` is present only when both price
/// and shares resolved, and is then exactly `price * shares`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuationRow {
    pub ticker: Ticker,
    pub price: Option<f64>,
    pub shares: Option<u64>,
    pub aum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_source: Option<PriceSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shares_source: Option<SharesSource>,
}

/// Outcome of one refresh cycle over the tracked universe.
#[derive(Debug, Clone, PartialEq)]
pub struct Valuation {
    pub rows: Vec<ValuationRow>,
    pub total: f64,
    pub missing_shares: Vec<Ticker>,
}

/// What the presentation layer renders.
#[derive(Debug, Clone, Serialize)]
pub struct ValuationReport {
    pub generated_at: DateTime<Tz>,
    pub rows: Vec<ValuationRow>,
    pub portfolio_total: f64,
    pub tracked_count: usize,
    pub tickers_missing_shares: Vec<Ticker>,
}

impl Valuation {
    pub fn into_report(self, generated_at: DateTime<Utc>, tz: Tz) -> ValuationReport {
        ValuationReport {
            generated_at: generated_at.with_timezone(&tz),
            tracked_count: self.rows.len(),
            rows: self.rows,
            portfolio_total: self.total,
            tickers_missing_shares: self.missing_shares,
        }
    }
}

pub struct ValuationEngine<'a> {
    prices: PriceResolver<'a>,
    shares: SharesResolver<'a>,
}

impl<'a> ValuationEngine<'a> {
    pub fn new(market: &'a dyn MarketDataProvider, overrides: &'a Overrides) -> Self {
        Self {
            prices: PriceResolver::new(market),
            shares: SharesResolver::new(market, overrides),
        }
    }

    async fn value_ticker(&self, ticker: &Ticker) -> ValuationRow {
        // Shares may be derived from the price, so it resolves first.
        let price = self.prices.resolve_price(ticker).await;
        let shares = self
            .shares
            .resolve_shares(ticker, price.map(|p| p.value))
            .await;

        let aum = match (price, shares) {
            (Some(p), Some(s)) => Some(p.value * s.value as f64),
            _ => None,
        };
        debug!(%ticker, ?price, ?shares, ?aum, "Valued ticker");

        ValuationRow {
            ticker: ticker.clone(),
            price: price.map(|p| p.value),
            shares: shares.map(|s| s.value),
            aum,
            price_source: price.map(|p| p.source),
            shares_source: shares.map(|s| s.source),
        }
    }

    /// Values every ticker in order, one row each. Tickers resolve
    /// concurrently; the total is only computed once all of them finished.
    /// `update_callback` runs after each ticker completes.
    pub async fn value(&self, tickers: &[Ticker], update_callback: &(dyn Fn())) -> Valuation {
        let futures = tickers.iter().map(|ticker| async move {
            let row = self.value_ticker(ticker).await;
            update_callback();
            row
        });
        let rows = join_all(futures).await;

        let total: f64 = rows.iter().filter_map(|row| row.aum).sum();
        let missing_shares: Vec<Ticker> = rows
            .iter()
            .filter(|row| row.shares.is_none())
            .map(|row| row.ticker.clone())
            .collect();

        info!(
            tracked = rows.len(),
            missing = missing_shares.len(),
            total,
            "Valuation cycle complete"
        );

        Valuation {
            rows,
            total,
            missing_shares,
        }
    }
}
