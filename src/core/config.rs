use crate::core::ticker::Ticker;
use crate::providers::CacheTtls;
use anyhow::{Context, Result, bail};
use chrono_tz::Tz;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_REFRESH_MS: u64 = 15_000;
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::New_York;
pub const DEFAULT_OVERRIDES_FILE: &str = "shares_overrides.csv";

fn default_yahoo_base_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}

fn default_cookie_url() -> Option<String> {
    Some("https://fc.yahoo.com".to_string())
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_overrides_path() -> PathBuf {
    PathBuf::from(DEFAULT_OVERRIDES_FILE)
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YahooProviderConfig {
    #[serde(default = "default_yahoo_base_url")]
    pub base_url: String,
    #[serde(default = "default_cookie_url")]
    pub cookie_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for YahooProviderConfig {
    fn default() -> Self {
        YahooProviderConfig {
            base_url: default_yahoo_base_url(),
            cookie_url: default_cookie_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub yahoo: YahooProviderConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub quote_ttl_secs: u64,
    pub bars_ttl_secs: u64,
    pub fundamentals_ttl_secs: u64,
    pub overrides_ttl_secs: u64,
    pub failure_ttl_secs: u64,
    /// Keep fundamentals on disk between runs.
    pub persist: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            quote_ttl_secs: 60,
            bars_ttl_secs: 60,
            fundamentals_ttl_secs: 6 * 60 * 60,
            overrides_ttl_secs: 60 * 60,
            failure_ttl_secs: 60,
            persist: true,
        }
    }
}

impl CacheConfig {
    pub fn ttls(&self) -> CacheTtls {
        CacheTtls {
            quote: Duration::from_secs(self.quote_ttl_secs),
            fundamentals: Duration::from_secs(self.fundamentals_ttl_secs),
            bars: Duration::from_secs(self.bars_ttl_secs),
            failure: Duration::from_secs(self.failure_ttl_secs),
        }
    }

    pub fn overrides_ttl(&self) -> Duration {
        Duration::from_secs(self.overrides_ttl_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct DisplayConfig {
    pub kiosk: bool,
    pub refresh_ms: u64,
    pub timezone: String,
    pub title: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            kiosk: false,
            refresh_ms: DEFAULT_REFRESH_MS,
            timezone: DEFAULT_TIMEZONE.name().to_string(),
            title: "ETFs - Estimated Live Total Assets".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub tickers: Vec<Ticker>,
    #[serde(default = "default_overrides_path")]
    pub overrides_path: PathBuf,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    pub data_path: Option<String>,
    /// Directory of the loaded file; relative paths resolve against it.
    #[serde(skip)]
    pub config_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("io", "aumdash", "aumdash")
            .context("Could not determine project directories")
    }

    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        Ok(Self::project_dirs()?.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let mut config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config.config_dir = path.as_ref().parent().map(|p| p.to_path_buf());
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// The tracked universe in configured order with duplicates removed.
    /// An empty universe leaves nothing to value and is an error.
    pub fn universe(&self) -> Result<Vec<Ticker>> {
        let mut seen = HashSet::new();
        let mut universe = Vec::with_capacity(self.tickers.len());
        for ticker in &self.tickers {
            if seen.insert(ticker) {
                universe.push(ticker.clone());
            } else {
                warn!("Ignoring duplicate ticker in config: {}", ticker);
            }
        }
        if universe.is_empty() {
            bail!("No tickers configured; add at least one symbol under 'tickers'");
        }
        Ok(universe)
    }

    pub fn overrides_path(&self) -> PathBuf {
        match &self.config_dir {
            Some(dir) if self.overrides_path.is_relative() => dir.join(&self.overrides_path),
            _ => self.overrides_path.clone(),
        }
    }

    pub fn timezone(&self) -> Tz {
        self.display.timezone.parse().unwrap_or_else(|_| {
            warn!(
                "Unknown timezone '{}', using {}",
                self.display.timezone,
                DEFAULT_TIMEZONE.name()
            );
            DEFAULT_TIMEZONE
        })
    }
}

/// How a report is shown: kiosk big-number mode and refresh cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayOptions {
    pub kiosk: bool,
    pub refresh: Duration,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        DisplayOptions {
            kiosk: false,
            refresh: Duration::from_millis(DEFAULT_REFRESH_MS),
        }
    }
}

impl DisplayOptions {
    /// Raw command line values win over the config file. Values that do not
    /// parse are ignored rather than rejected.
    pub fn resolve(kiosk: Option<&str>, refresh: Option<&str>, config: &DisplayConfig) -> Self {
        let kiosk = kiosk.map(parse_flag).unwrap_or(config.kiosk);
        let refresh_ms = refresh
            .and_then(|raw| {
                let parsed = parse_refresh_ms(raw);
                if parsed.is_none() {
                    warn!("Ignoring invalid refresh interval '{}'", raw);
                }
                parsed
            })
            .or(Some(config.refresh_ms).filter(|ms| *ms > 0))
            .unwrap_or(DEFAULT_REFRESH_MS);
        DisplayOptions {
            kiosk,
            refresh: Duration::from_millis(refresh_ms),
        }
    }
}

pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y"
    )
}

/// Positive millisecond count; `_` digit separators are accepted.
pub fn parse_refresh_ms(value: &str) -> Option<u64> {
    value
        .trim()
        .replace('_', "")
        .parse::<u64>()
        .ok()
        .filter(|ms| *ms > 0)
}
