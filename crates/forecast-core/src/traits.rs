use async_trait::async_trait;
use crate::{AnalysisError, AnalystConsensus, CompanyProfile, NewsItem, PriceSeries};

/// Source of recent headlines for a symbol
#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Short name used in logs and in the "sources used" list
    fn name(&self) -> &'static str;

    /// Up to `limit` recent headlines. `company_name` is a better search term
    /// than the ticker for full-text sources.
    async fn recent_news(
        &self,
        symbol: &str,
        company_name: Option<&str>,
        limit: usize,
    ) -> Result<Vec<NewsItem>, AnalysisError>;
}

/// Trait for the market data backend the dashboard reads from
#[async_trait]
pub trait MarketDataProvider: NewsSource {
    /// Daily bars covering the last `days` calendar days
    async fn price_history(&self, symbol: &str, days: i64) -> Result<PriceSeries, AnalysisError>;

    async fn company_profile(&self, symbol: &str) -> Result<CompanyProfile, AnalysisError>;

    async fn analyst_consensus(&self, symbol: &str) -> Result<AnalystConsensus, AnalysisError>;
}
