use crate::scrapers::types::FilterCriteria;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
    #[serde(default = "default_max_concurrent_sites")]
    pub max_concurrent_sites: usize,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub direct: DirectConfig,
    #[serde(default)]
    pub geocoder: GeocoderConfig,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceEntry>,
    #[serde(default)]
    pub criteria: FilterCriteria,
}

/// Settings for the headless-browser page fetcher
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub user_agents: Vec<String>,
    pub navigation_timeout_secs: u64,
    pub wait_timeout_secs: u64,
    pub scroll_step_px: u32,
    pub scroll_interval_ms: u64,
    pub max_scroll_px: u32,
}

/// Settings for the plain HTTP page fetcher
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DirectConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct GeocoderConfig {
    pub enabled: bool,
    pub base_url: String,
    pub region_suffix: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

/// A named search URL aggregated when no explicit targets are given
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SourceEntry {
    pub name: String,
    pub target: String,
}

fn default_bind_address() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_tracing_level() -> String {
    "info".to_string()
}

fn default_max_concurrent_sites() -> usize {
    2
}

fn default_user_agents() -> Vec<String> {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36".to_string(),
    ]
}

fn default_sources() -> Vec<SourceEntry> {
    vec![
        SourceEntry {
            name: "Rightmove".to_string(),
            target: "https://www.rightmove.co.uk/property-for-sale/find.html?locationIdentifier=REGION%5E61310&propertyTypes=detached,semi-detached&minBedrooms=3&maxPrice=230000&includeSSTC=false".to_string(),
        },
        SourceEntry {
            name: "Zoopla".to_string(),
            target: "https://www.zoopla.co.uk/for-sale/property/lincolnshire/?beds_min=3&price_max=230000&property_type=detached,semi-detached&include_sold=false".to_string(),
        },
        SourceEntry {
            name: "OnTheMarket".to_string(),
            target: "https://www.onthemarket.com/for-sale/property/lincolnshire/?min-bedrooms=3&max-price=230000&property-type=detached,semi-detached".to_string(),
        },
    ]
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            user_agents: default_user_agents(),
            navigation_timeout_secs: 60,
            wait_timeout_secs: 30,
            scroll_step_px: 100,
            scroll_interval_ms: 100,
            max_scroll_px: 5000,
        }
    }
}

impl BrowserConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn scroll_interval(&self) -> Duration {
        Duration::from_millis(self.scroll_interval_ms)
    }
}

impl Default for DirectConfig {
    fn default() -> Self {
        Self {
            user_agent: format!(
                "Mozilla/5.0 (compatible; property-scout/{})",
                env!("CARGO_PKG_VERSION")
            ),
            timeout_secs: 30,
        }
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://nominatim.openstreetmap.org/search".to_string(),
            region_suffix: "Lincolnshire, UK".to_string(),
            user_agent: format!("property-scout/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 10,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            tracing_level: default_tracing_level(),
            max_concurrent_sites: default_max_concurrent_sites(),
            browser: BrowserConfig::default(),
            direct: DirectConfig::default(),
            geocoder: GeocoderConfig::default(),
            sources: default_sources(),
            criteria: FilterCriteria::default(),
        }
    }
}

impl Config {
    /// Load `config.yaml` (or `$PROPERTY_SCOUT_CONFIG`), then apply env overrides.
    /// A missing file is not an error; defaults are used instead.
    pub fn load() -> Result<Self> {
        let path = env::var("PROPERTY_SCOUT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let mut config = match fs::read_to_string(&path) {
            Ok(contents) => Self::from_yaml(&contents)
                .with_context(|| format!("Failed to parse config file {}", path))?,
            Err(_) => Config::default(),
        };

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(contents)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(bind_address) = env::var("BIND_ADDRESS") {
            self.bind_address = bind_address;
        }

        if let Ok(tracing_level) = env::var("TRACING_LEVEL") {
            self.tracing_level = tracing_level;
        }

        if let Ok(max_concurrent) = env::var("MAX_CONCURRENT_SITES") {
            self.max_concurrent_sites = max_concurrent
                .parse()
                .context("Failed to parse MAX_CONCURRENT_SITES environment variable")?;
        }

        // User-agent strings contain commas, so the pool is '|' separated
        if let Ok(user_agents) = env::var("USER_AGENTS") {
            self.browser.user_agents = user_agents
                .split('|')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(enabled) = env::var("GEOCODER_ENABLED") {
            self.geocoder.enabled = enabled
                .parse()
                .context("Failed to parse GEOCODER_ENABLED environment variable")?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_sites == 0 {
            anyhow::bail!("max_concurrent_sites must be at least 1");
        }

        if self.browser.user_agents.is_empty() {
            anyhow::bail!("browser.user_agents must contain at least one user agent");
        }

        if self.browser.scroll_step_px == 0 {
            anyhow::bail!("browser.scroll_step_px must be positive");
        }

        if self.criteria.min_price > self.criteria.max_price {
            anyhow::bail!(
                "criteria.min_price ({}) exceeds criteria.max_price ({})",
                self.criteria.min_price,
                self.criteria.max_price
            );
        }

        Ok(())
    }
}
