use crate::core::market::{
    Bar, BarInterval, BarRange, FieldMap, FundamentalsSnapshot, MarketDataProvider, QuoteSnapshot,
};
use crate::core::ticker::Ticker;
use crate::providers::util::with_retry;
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{COOKIE, SET_COOKIE};
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

const USER_AGENT: &str = "Mozilla/5.0 (compatible; aumdash/0.1)";
const FUNDAMENTALS_MODULES: &str = "defaultKeyStatistics,summaryDetail,price";
const RETRIES: usize = 2;
const RETRY_DELAY_MS: u64 = 300;
const HANDSHAKE_RETRY_AFTER: Duration = Duration::from_secs(60);

#[derive(Deserialize, Debug)]
struct YahooChartResponse {
    chart: ChartResult,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    result: Option<Vec<ChartItem>>,
}

#[derive(Deserialize, Debug)]
struct ChartItem {
    meta: FieldMap,
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    quote: Vec<QuoteIndicator>,
}

#[derive(Deserialize, Debug)]
struct QuoteIndicator {
    close: Option<Vec<Option<f64>>>,
}

#[derive(Deserialize, Debug)]
struct QuoteSummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: QuoteSummaryResult,
}

#[derive(Deserialize, Debug)]
struct QuoteSummaryResult {
    result: Option<Vec<serde_json::Map<String, Value>>>,
}

/// Cookie and crumb pair Yahoo expects on quoteSummary requests.
#[derive(Debug, Clone)]
struct YahooSession {
    cookie: String,
    crumb: String,
}

/// Outcome of the last handshake. A failure is kept for
/// `HANDSHAKE_RETRY_AFTER` so concurrent fetches do not each retry it.
#[derive(Debug)]
enum SessionState {
    Ready(YahooSession),
    Failed(Instant),
}

fn extract_bars(item: &ChartItem) -> Vec<Bar> {
    let closes = item
        .indicators
        .as_ref()
        .and_then(|inds| inds.quote.first())
        .and_then(|q| q.close.as_ref());
    match (item.timestamp.as_ref(), closes) {
        (Some(timestamps), Some(closes)) => timestamps
            .iter()
            .zip(closes.iter())
            .map(|(timestamp, close)| Bar {
                timestamp: *timestamp,
                close: *close,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Merges every quoteSummary module into one field map, reducing
/// `{"raw": .., "fmt": ..}` objects to their raw value.
fn flatten_modules(modules: serde_json::Map<String, Value>) -> FieldMap {
    let mut fields = FieldMap::new();
    for (_, module) in modules {
        let Value::Object(module_fields) = module else {
            continue;
        };
        for (name, value) in module_fields {
            let value = match value {
                Value::Object(mut obj) if obj.contains_key("raw") => {
                    obj.remove("raw").unwrap_or(Value::Null)
                }
                other => other,
            };
            fields.entry(name).or_insert(value);
        }
    }
    fields
}

pub struct YahooFinanceProvider {
    base_url: String,
    cookie_url: Option<String>,
    client: reqwest::Client,
    session: Mutex<Option<SessionState>>,
}

impl YahooFinanceProvider {
    /// `cookie_url` is where the session cookie for the crumb handshake comes
    /// from; `None` skips the handshake entirely.
    pub fn new(base_url: &str, cookie_url: Option<&str>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(YahooFinanceProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            cookie_url: cookie_url.map(str::to_string),
            client,
            session: Mutex::new(None),
        })
    }

    async fn fetch_chart(
        &self,
        ticker: &Ticker,
        range: BarRange,
        interval: BarInterval,
    ) -> Result<ChartItem> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, ticker);
        let params = [("interval", interval.to_string()), ("range", range.to_string())];
        debug!("Requesting chart data from {} {:?}", url, params);

        let response = with_retry(
            || self.client.get(&url).query(&params).send(),
            RETRIES,
            RETRY_DELAY_MS,
        )
        .await
        .with_context(|| format!("Request error for symbol: {ticker} URL: {url}"))?;

        if !response.status().is_success() {
            bail!("HTTP error: {} for symbol: {}", response.status(), ticker);
        }

        let text = response.text().await?;
        let data: YahooChartResponse = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse chart response for {ticker}"))?;

        data.chart
            .result
            .and_then(|items| items.into_iter().next())
            .ok_or_else(|| anyhow!("No chart data found for symbol: {}", ticker))
    }

    async fn session(&self) -> Option<YahooSession> {
        let cookie_url = self.cookie_url.as_deref()?;
        let mut guard = self.session.lock().await;
        match guard.as_ref() {
            Some(SessionState::Ready(session)) => return Some(session.clone()),
            Some(SessionState::Failed(at)) if at.elapsed() < HANDSHAKE_RETRY_AFTER => {
                return None;
            }
            _ => {}
        }
        match self.fetch_session(cookie_url).await {
            Ok(session) => {
                *guard = Some(SessionState::Ready(session.clone()));
                Some(session)
            }
            Err(e) => {
                debug!("Continuing without Yahoo crumb: {:#}", e);
                *guard = Some(SessionState::Failed(Instant::now()));
                None
            }
        }
    }

    async fn fetch_session(&self, cookie_url: &str) -> Result<YahooSession> {
        let response = self
            .client
            .get(cookie_url)
            .send()
            .await
            .context("Failed to get cookie")?;
        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.split(';').next())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Failed to parse Yahoo cookie"))?;

        let response = self
            .client
            .get(format!("{}/v1/test/getcrumb", self.base_url))
            .header(COOKIE, &cookie)
            .send()
            .await
            .context("Failed to get crumb")?;
        if !response.status().is_success() {
            bail!("HTTP error: {} while fetching crumb", response.status());
        }
        let crumb = response.text().await?.trim().to_string();
        if crumb.is_empty() {
            bail!("Received empty crumb");
        }
        Ok(YahooSession { cookie, crumb })
    }
}

#[async_trait]
impl MarketDataProvider for YahooFinanceProvider {
    #[instrument(name = "YahooQuoteFetch", skip(self), fields(symbol = %ticker))]
    async fn quote_snapshot(&self, ticker: &Ticker) -> Result<QuoteSnapshot> {
        let item = self
            .fetch_chart(ticker, BarRange::OneDay, BarInterval::OneDay)
            .await?;
        Ok(QuoteSnapshot { fields: item.meta })
    }

    #[instrument(name = "YahooFundamentalsFetch", skip(self), fields(symbol = %ticker))]
    async fn fundamentals_snapshot(&self, ticker: &Ticker) -> Result<FundamentalsSnapshot> {
        let url = format!("{}/v10/finance/quoteSummary/{}", self.base_url, ticker);
        let session = self.session().await;
        debug!("Requesting fundamentals from {}", url);

        let response = with_retry(
            || {
                let mut request = self
                    .client
                    .get(&url)
                    .query(&[("modules", FUNDAMENTALS_MODULES)]);
                if let Some(session) = &session {
                    request = request
                        .query(&[("crumb", session.crumb.as_str())])
                        .header(COOKIE, &session.cookie);
                }
                request.send()
            },
            RETRIES,
            RETRY_DELAY_MS,
        )
        .await
        .with_context(|| format!("Request error for symbol: {ticker} URL: {url}"))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            *self.session.lock().await = None;
            bail!("Yahoo authentication expired for symbol: {}", ticker);
        }
        if !response.status().is_success() {
            bail!("HTTP error: {} for symbol: {}", response.status(), ticker);
        }

        let text = response.text().await?;
        let data: QuoteSummaryResponse = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse fundamentals response for {ticker}"))?;
        let modules = data
            .quote_summary
            .result
            .and_then(|items| items.into_iter().next())
            .ok_or_else(|| anyhow!("No fundamentals found for symbol: {}", ticker))?;

        Ok(FundamentalsSnapshot {
            fields: flatten_modules(modules),
        })
    }

    #[instrument(name = "YahooBarsFetch", skip(self), fields(symbol = %ticker))]
    async fn recent_bars(
        &self,
        ticker: &Ticker,
        range: BarRange,
        interval: BarInterval,
    ) -> Result<Vec<Bar>> {
        let item = self.fetch_chart(ticker, range, interval).await?;
        Ok(extract_bars(&item))
    }
}
