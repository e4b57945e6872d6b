use anyhow::{Context, Result};
use dashboard_orchestrator::{default_watchlist, DashboardSettings, DEFAULT_BENCHMARK};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    // External APIs
    pub polygon_api_key: String,
    pub newsapi_key: Option<String>,
    pub polygon_rate_limit: usize,   // requests per minute, 5 on the free tier

    // Dashboard
    pub benchmark_symbol: String,    // I:COMP
    pub watchlist: Vec<String>,
    pub history_days: i64,           // calendar days, ~10 sessions
    pub news_top_k: usize,           // headlines tagged per symbol

    // Runtime
    pub cache_ttl_secs: i64,
    pub max_concurrency: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset and empty values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let config = Self {
            polygon_api_key: get("POLYGON_API_KEY").context("POLYGON_API_KEY not set")?,
            newsapi_key: get("NEWSAPI_KEY"),
            polygon_rate_limit: get("POLYGON_RATE_LIMIT")
                .unwrap_or_else(|| "500".to_string())
                .parse()
                .context("POLYGON_RATE_LIMIT must be a whole number")?,

            benchmark_symbol: get("BENCHMARK_SYMBOL").unwrap_or_else(|| DEFAULT_BENCHMARK.to_string()),
            watchlist: match get("WATCHLIST") {
                Some(list) => list
                    .split(',')
                    .map(|s| s.trim().to_uppercase())
                    .filter(|s| !s.is_empty())
                    .collect(),
                None => default_watchlist(),
            },
            history_days: get("HISTORY_DAYS")
                .unwrap_or_else(|| "14".to_string())
                .parse()
                .context("HISTORY_DAYS must be a whole number")?,
            news_top_k: get("NEWS_TOP_K")
                .unwrap_or_else(|| "5".to_string())
                .parse()
                .context("NEWS_TOP_K must be a whole number")?,

            cache_ttl_secs: get("CACHE_TTL_SECS")
                .unwrap_or_else(|| "300".to_string())
                .parse()
                .context("CACHE_TTL_SECS must be a whole number")?,
            max_concurrency: get("MAX_CONCURRENCY")
                .unwrap_or_else(|| "4".to_string())
                .parse()
                .context("MAX_CONCURRENCY must be a whole number")?,
        };

        if config.watchlist.is_empty() {
            anyhow::bail!("WATCHLIST contains no symbols");
        }
        if config.history_days < 1 {
            anyhow::bail!("HISTORY_DAYS must be at least 1");
        }

        Ok(config)
    }

    pub fn dashboard_settings(&self) -> DashboardSettings {
        DashboardSettings {
            benchmark_symbol: self.benchmark_symbol.clone(),
            history_days: self.history_days,
            top_k: self.news_top_k,
            max_concurrency: self.max_concurrency.max(1),
            cache_ttl_secs: self.cache_ttl_secs,
        }
    }
}
