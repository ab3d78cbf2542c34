//! Terminal front end: wires configuration to the valuation pipeline and
//! renders its reports.

pub mod dashboard;
pub mod kiosk;
pub mod setup;
pub mod template;
pub mod ui;
pub mod watch;

use crate::core::config::{AppConfig, DisplayOptions};
use crate::core::{OverridesStore, Ticker, ValuationEngine, ValuationReport};
use crate::providers::{CachingMarketData, YahooFinanceProvider};
use crate::store::KeyValueStore;
use anyhow::Result;
use chrono::Utc;
use chrono_tz::Tz;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Everything one refresh cycle needs, kept alive across cycles so the
/// caches carry over in watch mode.
pub struct Session {
    universe: Vec<Ticker>,
    market: CachingMarketData<YahooFinanceProvider>,
    overrides: OverridesStore,
    timezone: Tz,
    title: String,
    _store: KeyValueStore,
}

impl Session {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let universe = config.universe()?;

        let data_path = if config.cache.persist {
            config.default_data_path().ok()
        } else {
            None
        };
        debug!(?data_path, "Opening caches");
        let store = KeyValueStore::new(data_path.as_deref());

        let yahoo = &config.providers.yahoo;
        let provider = YahooFinanceProvider::new(
            &yahoo.base_url,
            yahoo.cookie_url.as_deref(),
            Duration::from_secs(yahoo.timeout_secs),
        )?;
        let market = CachingMarketData::new(
            provider,
            store.collection_or_memory("market", false),
            store.collection_or_memory("fundamentals", config.cache.persist),
            config.cache.ttls(),
        );
        let overrides = OverridesStore::new(
            config.overrides_path(),
            store.collection_or_memory("overrides", false),
            config.cache.overrides_ttl(),
        );

        Ok(Session {
            universe,
            market,
            overrides,
            timezone: config.timezone(),
            title: config.display.title.clone(),
            _store: store,
        })
    }

    pub fn universe(&self) -> &[Ticker] {
        &self.universe
    }

    pub fn overrides_path(&self) -> &Path {
        self.overrides.path()
    }

    /// Runs one valuation cycle over the whole universe.
    pub async fn refresh(&self, show_progress: bool) -> ValuationReport {
        let overrides = self.overrides.current().await;
        let engine = ValuationEngine::new(&self.market, &overrides);

        let pb = show_progress.then(|| {
            let pb = ui::new_progress_bar(self.universe.len() as u64, true);
            pb.set_message("Fetching market data...");
            pb
        });
        let valuation = engine
            .value(&self.universe, &|| {
                if let Some(pb) = &pb {
                    pb.inc(1);
                }
            })
            .await;
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }

        valuation.into_report(Utc::now(), self.timezone)
    }

    pub fn render(&self, report: &ValuationReport, options: &DisplayOptions) -> String {
        if options.kiosk {
            report.display_as_kiosk(ui::terminal_width())
        } else {
            report.display_as_table(&self.title, self.overrides_path())
        }
    }
}
