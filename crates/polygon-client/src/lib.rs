use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use forecast_core::{
    AnalysisError, AnalystConsensus, AnalystRating, CompanyProfile, MarketDataProvider, NewsItem,
    NewsSource, PriceBar, PriceSeries,
};
use reqwest::Client;
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub mod newsapi;
pub use newsapi::NewsApiClient;

const BASE_URL: &str = "https://api.polygon.io";
/// Summaries longer than this are cut and suffixed with "..."
pub const SUMMARY_MAX_CHARS: usize = 300;
/// First request plus three retries on HTTP 429
const MAX_ATTEMPTS: u32 = 4;
const BACKOFF_BASE_SECS: u64 = 2;

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            // Remove timestamps outside the window
            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }

            // Wait until the oldest request falls out of the window
            let sleep_dur = match ts.front() {
                Some(&oldest) => (oldest + self.window).duration_since(now) + Duration::from_millis(50),
                None => Duration::from_millis(50),
            };
            drop(ts);
            tracing::debug!("Rate limiter: waiting {:.1}s for Polygon API slot", sleep_dur.as_secs_f64());
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

/// Backoff before retry `attempt` (0-based): 2s, 4s, 8s, ...
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(BACKOFF_BASE_SECS << attempt.min(6))
}

/// Cut a summary to `SUMMARY_MAX_CHARS` characters. Empty summaries become `None`.
pub fn truncate_summary(summary: Option<&str>) -> Option<String> {
    let text = summary.map(str::trim).filter(|s| !s.is_empty())?;
    if text.chars().count() > SUMMARY_MAX_CHARS {
        let cut: String = text.chars().take(SUMMARY_MAX_CHARS).collect();
        Some(format!("{}...", cut))
    } else {
        Some(text.to_string())
    }
}

#[derive(Clone)]
pub struct PolygonClient {
    api_key: String,
    client: Client,
    rate_limiter: RateLimiter,
}

impl PolygonClient {
    /// Client with the Starter-plan default of 500 requests per minute.
    pub fn new(api_key: String) -> Self {
        Self::with_rate_limit(api_key, 500)
    }

    /// Free tier users should pass 5.
    pub fn with_rate_limit(api_key: String, requests_per_minute: usize) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key,
            client,
            rate_limiter: RateLimiter::new(requests_per_minute, Duration::from_secs(60)),
        }
    }

    /// Send a request with rate limiting and exponential backoff on 429.
    async fn send_request(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, AnalysisError> {
        let request = builder.build().map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        for attempt in 0..MAX_ATTEMPTS {
            self.rate_limiter.acquire().await;
            let req_clone = request
                .try_clone()
                .ok_or_else(|| AnalysisError::ApiError("Cannot clone request".to_string()))?;
            let response = self
                .client
                .execute(req_clone)
                .await
                .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

            if response.status().as_u16() != 429 {
                return Ok(response);
            }
            if attempt + 1 == MAX_ATTEMPTS {
                break;
            }

            let wait = backoff_delay(attempt);
            tracing::warn!(
                "Polygon 429 rate limited, waiting {}s before retry {}/{}",
                wait.as_secs(),
                attempt + 1,
                MAX_ATTEMPTS - 1
            );
            tokio::time::sleep(wait).await;
        }

        Err(AnalysisError::ApiError(format!(
            "Rate limited by Polygon after {} attempts",
            MAX_ATTEMPTS
        )))
    }

    async fn error_for_status(response: reqwest::Response) -> AnalysisError {
        AnalysisError::ApiError(format!(
            "HTTP {}: {}",
            response.status(),
            response.text().await.unwrap_or_default()
        ))
    }

    /// Daily bars for the last `days` calendar days
    pub async fn get_daily_bars(&self, symbol: &str, days: i64) -> Result<PriceSeries, AnalysisError> {
        let to = Utc::now();
        let from = to - ChronoDuration::days(days);
        let url = format!(
            "{}/v2/aggs/ticker/{}/range/1/day/{}/{}",
            BASE_URL,
            symbol,
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d")
        );

        let response = self
            .send_request(self.client.get(&url).query(&[
                ("apiKey", self.api_key.as_str()),
                ("adjusted", "true"),
                ("sort", "asc"),
            ]))
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for_status(response).await);
        }

        let agg_response: AggregateResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::InvalidData(e.to_string()))?;

        Ok(agg_response.into_series(symbol))
    }

    /// Get news articles for a ticker
    pub async fn get_news(&self, symbol: &str, limit: usize) -> Result<Vec<NewsItem>, AnalysisError> {
        let url = format!("{}/v2/reference/news", BASE_URL);

        let response = self
            .send_request(self.client.get(&url).query(&[
                ("apiKey", self.api_key.clone()),
                ("ticker", symbol.to_string()),
                ("limit", limit.to_string()),
                ("order", "desc".to_string()),
            ]))
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for_status(response).await);
        }

        let news_response: NewsResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::InvalidData(e.to_string()))?;

        Ok(news_response.into_items())
    }

    /// Get ticker details (company name, market cap)
    pub async fn get_ticker_details(&self, symbol: &str) -> Result<CompanyProfile, AnalysisError> {
        let url = format!("{}/v3/reference/tickers/{}", BASE_URL, symbol);

        let response = self
            .send_request(self.client.get(&url).query(&[("apiKey", &self.api_key)]))
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for_status(response).await);
        }

        let details: TickerDetailsResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::InvalidData(e.to_string()))?;

        Ok(CompanyProfile {
            symbol: symbol.to_string(),
            name: details.results.name,
            market_cap: details.results.market_cap,
        })
    }

    /// Get Benzinga consensus ratings for a ticker.
    /// Returns Ok(None) on 403/401 (subscription not available).
    pub async fn get_consensus_rating(&self, symbol: &str) -> Result<Option<BenzingaConsensus>, AnalysisError> {
        let url = format!("{}/benzinga/v1/consensus-ratings/{}", BASE_URL, symbol);

        let response = self
            .send_request(self.client.get(&url).query(&[("apiKey", &self.api_key)]))
            .await?;

        let status = response.status().as_u16();
        if status == 403 || status == 401 {
            tracing::info!("Benzinga consensus ratings not available (HTTP {}), skipping", status);
            return Ok(None);
        }

        if !response.status().is_success() {
            tracing::warn!("Benzinga consensus HTTP {}: ignoring", status);
            return Ok(None);
        }

        let body: BenzingaConsensusResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::InvalidData(e.to_string()))?;

        Ok(body.results.into_iter().next())
    }

    /// Get recent Benzinga analyst ratings for a ticker.
    /// Returns Ok(vec![]) on 403/401 (subscription not available).
    pub async fn get_analyst_ratings(&self, symbol: &str, limit: u32) -> Result<Vec<AnalystRating>, AnalysisError> {
        let url = format!("{}/benzinga/v1/ratings", BASE_URL);

        let response = self
            .send_request(self.client.get(&url).query(&[
                ("apiKey", self.api_key.as_str()),
                ("ticker", symbol),
                ("sort", "date.desc"),
                ("limit", &limit.to_string()),
            ]))
            .await?;

        let status = response.status().as_u16();
        if status == 403 || status == 401 {
            tracing::info!("Benzinga analyst ratings not available (HTTP {}), skipping", status);
            return Ok(Vec::new());
        }

        if !response.status().is_success() {
            tracing::warn!("Benzinga ratings HTTP {}: ignoring", status);
            return Ok(Vec::new());
        }

        let body: BenzingaRatingsResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::InvalidData(e.to_string()))?;

        Ok(body.results.into_iter().map(AnalystRating::from).collect())
    }
}

#[async_trait]
impl NewsSource for PolygonClient {
    fn name(&self) -> &'static str {
        "Polygon"
    }

    async fn recent_news(
        &self,
        symbol: &str,
        _company_name: Option<&str>,
        limit: usize,
    ) -> Result<Vec<NewsItem>, AnalysisError> {
        self.get_news(symbol, limit).await
    }
}

#[async_trait]
impl MarketDataProvider for PolygonClient {
    async fn price_history(&self, symbol: &str, days: i64) -> Result<PriceSeries, AnalysisError> {
        self.get_daily_bars(symbol, days).await
    }

    async fn company_profile(&self, symbol: &str) -> Result<CompanyProfile, AnalysisError> {
        self.get_ticker_details(symbol).await
    }

    async fn analyst_consensus(&self, symbol: &str) -> Result<AnalystConsensus, AnalysisError> {
        let consensus = self.get_consensus_rating(symbol).await?;
        let recent_ratings = self.get_analyst_ratings(symbol, 20).await?;

        Ok(AnalystConsensus {
            // Fall back to the high target when no mean target is published
            target_price: consensus
                .as_ref()
                .and_then(|c| c.consensus_price_target.or(c.high_price_target)),
            consensus_rating: consensus.and_then(|c| c.consensus_rating),
            recent_ratings,
        })
    }
}

// Response structures
#[derive(Debug, Deserialize)]
struct AggregateResponse {
    #[serde(default)]
    results: Vec<AggregateResult>,
}

#[derive(Debug, Deserialize)]
struct AggregateResult {
    t: i64, // timestamp (ms)
    o: f64, // open
    h: f64, // high
    l: f64, // low
    c: f64, // close
    #[serde(default)]
    v: f64, // volume, absent for indices
}

impl AggregateResponse {
    fn into_series(self, symbol: &str) -> PriceSeries {
        let bars = self
            .results
            .into_iter()
            .filter_map(|r| {
                let date = DateTime::from_timestamp_millis(r.t)?.date_naive();
                Some(PriceBar {
                    date,
                    open: r.o,
                    high: r.h,
                    low: r.l,
                    close: r.c,
                    volume: r.v,
                })
            })
            .collect();
        PriceSeries::new(symbol, bars)
    }
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    results: Vec<NewsResult>,
}

#[derive(Debug, Deserialize)]
struct NewsResult {
    title: String,
    author: Option<String>,
    publisher: Option<NewsPublisher>,
    published_utc: Option<String>,
    article_url: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsPublisher {
    name: Option<String>,
}

impl NewsResponse {
    fn into_items(self) -> Vec<NewsItem> {
        self.results
            .into_iter()
            .map(|r| NewsItem {
                publisher: r
                    .publisher
                    .and_then(|p| p.name)
                    .or(r.author)
                    .unwrap_or_else(|| "Unknown".to_string()),
                published_at: r
                    .published_utc
                    .as_deref()
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&Utc)),
                summary: truncate_summary(r.description.as_deref()),
                title: r.title,
                url: r.article_url,
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct TickerDetailsResponse {
    results: TickerDetails,
}

#[derive(Debug, Deserialize)]
struct TickerDetails {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    market_cap: Option<f64>,
}

// Benzinga response structures
#[derive(Debug, Deserialize)]
struct BenzingaConsensusResponse {
    #[serde(default)]
    results: Vec<BenzingaConsensus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BenzingaConsensus {
    #[serde(default)]
    pub consensus_rating: Option<String>,
    #[serde(default)]
    pub consensus_price_target: Option<f64>,
    #[serde(default)]
    pub high_price_target: Option<f64>,
    #[serde(default)]
    pub low_price_target: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct BenzingaRatingsResponse {
    #[serde(default)]
    results: Vec<BenzingaRatingResult>,
}

#[derive(Debug, Deserialize)]
struct BenzingaRatingResult {
    #[serde(default)]
    price_target: Option<f64>,
    #[serde(default)]
    rating: Option<String>,
    #[serde(default)]
    previous_rating: Option<String>,
    #[serde(default)]
    rating_action: Option<String>,
    #[serde(default)]
    firm: Option<String>,
    #[serde(default)]
    date: Option<String>,
}

impl From<BenzingaRatingResult> for AnalystRating {
    fn from(r: BenzingaRatingResult) -> Self {
        AnalystRating {
            date: r.date,
            firm: r.firm,
            previous_rating: r.previous_rating,
            rating: r.rating,
            action: r.rating_action,
            price_target: r.price_target,
        }
    }
}
