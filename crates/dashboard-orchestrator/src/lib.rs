use chrono::{DateTime, NaiveDate, Utc};
use forecast_composer::forecast_series;
use forecast_core::{
    AnalysisError, AnalystConsensus, AnalystRating, CompanyProfile, ComparisonPoint, DailyChange,
    ForecastResult, MarketDataProvider, NewsItem, NewsReason, NewsSource, PriceBar, PriceSeries,
};
use sentiment_tagger::{SentimentTagger, DEFAULT_TOP_K};
use serde::{Deserialize, Serialize};
use signal_extractor::{daily_change, relative_performance, summarize_insights, Insight};
use std::collections::BTreeMap;
use std::sync::Arc;

pub mod cache;
pub mod news;
pub mod scanner;

pub use cache::TtlCache;
pub use news::merge_news;
pub use scanner::{
    ConfidenceFilter, ForecastSummary, MarketScanner, Mover, MoversReport, SortKey, SummaryOptions,
    SummaryRow, SummaryStats,
};

/// NASDAQ Composite on Polygon
pub const DEFAULT_BENCHMARK: &str = "I:COMP";
/// Calendar days of history fetched per symbol, enough for ten sessions
pub const DEFAULT_HISTORY_DAYS: i64 = 14;
/// Sessions shown in the security vs benchmark comparison
pub const COMPARISON_SESSIONS: usize = 5;
/// Sessions shown in the market overview chart
const OVERVIEW_SESSIONS: usize = 5;
const RECENT_RATINGS: usize = 10;

pub const POPULAR_STOCKS: [&str; 24] = [
    "AAPL", "MSFT", "GOOGL", "AMZN", "NVDA", "META", "TSLA", "NFLX", "AMD", "INTC", "ADBE", "PYPL",
    "CMCSA", "COST", "AVGO", "QCOM", "TXN", "CHTR", "AMGN", "ISRG", "INTU", "BKNG", "SBUX", "ADI",
];

pub fn default_watchlist() -> Vec<String> {
    POPULAR_STOCKS.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone)]
pub struct DashboardSettings {
    pub benchmark_symbol: String,
    pub history_days: i64,
    /// Headlines tagged per symbol; the same set drives the reasons list and the news signal
    pub top_k: usize,
    /// Symbols processed at once by the batch views
    pub max_concurrency: usize,
    pub cache_ttl_secs: i64,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            benchmark_symbol: DEFAULT_BENCHMARK.to_string(),
            history_days: DEFAULT_HISTORY_DAYS,
            top_k: DEFAULT_TOP_K,
            max_concurrency: 4,
            cache_ttl_secs: cache::DEFAULT_TTL_SECS,
        }
    }
}

/// Benchmark index snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketOverview {
    pub symbol: String,
    pub as_of: NaiveDate,
    pub last_close: f64,
    pub period_high: f64,
    pub period_low: f64,
    pub daily_change: DailyChange,
    pub recent_bars: Vec<PriceBar>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingSummary {
    pub consensus_rating: Option<String>,
    pub target_price: Option<f64>,
    /// Number of recent ratings per rating label
    pub counts: BTreeMap<String, usize>,
    pub recent: Vec<AnalystRating>,
}

impl RatingSummary {
    pub fn from_consensus(consensus: &AnalystConsensus) -> Self {
        let mut counts = BTreeMap::new();
        for rating in consensus.recent_ratings.iter().filter_map(|r| r.rating.as_deref()) {
            *counts.entry(rating.to_string()).or_insert(0) += 1;
        }

        Self {
            consensus_rating: consensus.consensus_rating.clone(),
            target_price: consensus.target_price,
            counts,
            recent: consensus.recent_ratings.iter().take(RECENT_RATINGS).cloned().collect(),
        }
    }
}

/// Everything the single-security view shows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockAnalysis {
    pub symbol: String,
    pub company_name: Option<String>,
    pub market_cap: Option<f64>,
    pub current_price: f64,
    pub daily_change: DailyChange,
    pub news: Vec<NewsItem>,
    pub reasons: Vec<NewsReason>,
    pub forecast: Option<ForecastResult>,
    /// Why no forecast was produced
    pub forecast_unavailable: Option<String>,
    pub insights: Vec<Insight>,
    pub comparison: Vec<ComparisonPoint>,
    pub ratings: RatingSummary,
    pub generated_at: DateTime<Utc>,
}

pub struct DashboardService {
    provider: Arc<dyn MarketDataProvider>,
    /// Queried before the provider's own news feed
    news_sources: Vec<Arc<dyn NewsSource>>,
    tagger: SentimentTagger,
    settings: DashboardSettings,
    /// Price series per `symbol:days`
    series_cache: TtlCache<PriceSeries>,
    profile_cache: TtlCache<CompanyProfile>,
    consensus_cache: TtlCache<AnalystConsensus>,
    news_cache: TtlCache<Vec<NewsItem>>,
}

impl DashboardService {
    pub fn new(provider: Arc<dyn MarketDataProvider>, settings: DashboardSettings) -> Self {
        let ttl = settings.cache_ttl_secs;
        Self {
            provider,
            news_sources: Vec::new(),
            tagger: SentimentTagger::new().with_top_k(settings.top_k),
            settings,
            series_cache: TtlCache::new(ttl),
            profile_cache: TtlCache::new(ttl),
            consensus_cache: TtlCache::new(ttl),
            news_cache: TtlCache::new(ttl),
        }
    }

    /// Add a news source ahead of the provider's feed
    pub fn with_news_source(mut self, source: Arc<dyn NewsSource>) -> Self {
        self.news_sources.push(source);
        self
    }

    pub fn with_series_cache(mut self, cache: TtlCache<PriceSeries>) -> Self {
        self.series_cache = cache;
        self
    }

    pub fn with_tagger(mut self, tagger: SentimentTagger) -> Self {
        self.tagger = tagger;
        self
    }

    pub fn settings(&self) -> &DashboardSettings {
        &self.settings
    }

    pub fn tagger(&self) -> &SentimentTagger {
        &self.tagger
    }

    /// Drop expired entries from every cache, returning how many went
    pub fn purge_expired_caches(&self) -> usize {
        let purged = self.series_cache.purge_expired()
            + self.profile_cache.purge_expired()
            + self.consensus_cache.purge_expired()
            + self.news_cache.purge_expired();
        if purged > 0 {
            tracing::debug!("Purged {} expired cache entries", purged);
        }
        purged
    }

    pub async fn price_series(&self, symbol: &str, days: i64) -> Result<PriceSeries, AnalysisError> {
        let key = format!("{}:{}", symbol, days);
        if let Some(series) = self.series_cache.get(&key) {
            tracing::debug!("Using cached bars for {}", key);
            return Ok(series);
        }

        let series = self.provider.price_history(symbol, days).await?;
        self.series_cache.insert(key, series.clone());
        Ok(series)
    }

    /// Company reference data; a failed lookup yields an empty profile
    pub async fn company_profile(&self, symbol: &str) -> CompanyProfile {
        if let Some(profile) = self.profile_cache.get(symbol) {
            return profile;
        }

        match self.provider.company_profile(symbol).await {
            Ok(profile) => {
                self.profile_cache.insert(symbol, profile.clone());
                profile
            }
            Err(e) => {
                tracing::warn!("Company profile unavailable for {}: {}", symbol, e);
                CompanyProfile {
                    symbol: symbol.to_string(),
                    name: None,
                    market_cap: None,
                }
            }
        }
    }

    /// Analyst consensus; a failed lookup yields an empty consensus
    pub async fn analyst_consensus(&self, symbol: &str) -> AnalystConsensus {
        if let Some(consensus) = self.consensus_cache.get(symbol) {
            return consensus;
        }

        match self.provider.analyst_consensus(symbol).await {
            Ok(consensus) => {
                self.consensus_cache.insert(symbol, consensus.clone());
                consensus
            }
            Err(e) => {
                tracing::warn!("Analyst data unavailable for {}: {}", symbol, e);
                AnalystConsensus::default()
            }
        }
    }

    /// Recent headlines from every configured source, merged.
    ///
    /// Extra sources are asked first; the provider's feed fills in when they
    /// return fewer than `MIN_PRIMARY_NEWS` items. A failing source is skipped
    /// for this call, and a result missing a failed source is not cached.
    pub async fn news(&self, symbol: &str, company_name: Option<&str>) -> Vec<NewsItem> {
        if let Some(items) = self.news_cache.get(symbol) {
            tracing::debug!("Using cached news for {}", symbol);
            return items;
        }

        let mut batches = Vec::new();
        let mut collected = 0;
        let mut degraded = false;
        for source in &self.news_sources {
            match source.recent_news(symbol, company_name, news::MAX_MERGED_NEWS).await {
                Ok(items) => {
                    collected += items.len();
                    batches.push(items);
                }
                Err(e) => {
                    tracing::warn!("{} news failed for {}: {}", source.name(), symbol, e);
                    degraded = true;
                }
            }
        }

        if collected < news::MIN_PRIMARY_NEWS {
            match self.provider.recent_news(symbol, company_name, news::MAX_MERGED_NEWS).await {
                Ok(items) => batches.push(items),
                Err(e) => {
                    tracing::warn!("{} news failed for {}: {}", self.provider.name(), symbol, e);
                    degraded = true;
                }
            }
        }

        let merged = merge_news(batches);
        if !degraded {
            self.news_cache.insert(symbol, merged.clone());
        }
        merged
    }

    /// Benchmark index close, range and day-over-day change
    pub async fn market_overview(&self) -> Result<MarketOverview, AnalysisError> {
        let symbol = &self.settings.benchmark_symbol;
        tracing::info!("Loading market overview for {}", symbol);

        let series = self.price_series(symbol, self.settings.history_days).await?;
        let change = daily_change(&series)?;
        let last = series
            .last()
            .ok_or_else(|| AnalysisError::InsufficientData(format!("{}: no bars", symbol)))?;

        let period_high = series.bars().iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let period_low = series.bars().iter().map(|b| b.low).fold(f64::MAX, f64::min);

        Ok(MarketOverview {
            symbol: symbol.clone(),
            as_of: last.date,
            last_close: last.close,
            period_high,
            period_low,
            daily_change: change,
            recent_bars: series.tail(OVERVIEW_SESSIONS).to_vec(),
        })
    }

    /// Full single-security view.
    ///
    /// Fails only when the security's own price history is unusable; missing
    /// profile, analyst, news or benchmark data degrade to empty sections.
    pub async fn analyze_stock(&self, symbol: &str) -> Result<StockAnalysis, AnalysisError> {
        tracing::info!("Analyzing {}", symbol);
        let days = self.settings.history_days;

        let (series, benchmark, profile, consensus) = tokio::join!(
            self.price_series(symbol, days),
            self.price_series(&self.settings.benchmark_symbol, days),
            self.company_profile(symbol),
            self.analyst_consensus(symbol),
        );
        let series = series?;
        let change = daily_change(&series)?;

        let news = self.news(symbol, profile.name.as_deref()).await;
        let reasons = self.tagger.tag_top(&news);

        let (forecast, forecast_unavailable) =
            match forecast_series(&series, &reasons, consensus.target_price) {
                Ok(forecast) => (Some(forecast), None),
                Err(e) => {
                    tracing::info!("No forecast for {}: {}", symbol, e);
                    (None, Some(e.to_string()))
                }
            };

        let insights = summarize_insights(&series, &reasons).unwrap_or_else(|e| {
            tracing::debug!("No insights for {}: {}", symbol, e);
            Vec::new()
        });

        let comparison = match &benchmark {
            Ok(bench) => relative_performance(&series, bench, COMPARISON_SESSIONS + 1),
            Err(e) => {
                tracing::warn!("Benchmark {} unavailable: {}", self.settings.benchmark_symbol, e);
                Vec::new()
            }
        };

        Ok(StockAnalysis {
            symbol: symbol.to_string(),
            company_name: profile.name,
            market_cap: profile.market_cap,
            current_price: change.current_close,
            daily_change: change,
            news,
            reasons,
            forecast,
            forecast_unavailable,
            insights,
            comparison,
            ratings: RatingSummary::from_consensus(&consensus),
            generated_at: Utc::now(),
        })
    }
}
