use super::DashboardService;
use forecast_composer::forecast_series;
use forecast_core::{AnalysisError, Confidence};
use serde::{Deserialize, Serialize};
use signal_extractor::daily_change;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Default number of gainers and of losers reported
pub const DEFAULT_TOP_N: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mover {
    pub symbol: String,
    pub current_price: f64,
    pub change: f64,
    pub percent_change: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoversReport {
    pub gainers: Vec<Mover>,
    pub losers: Vec<Mover>,
    /// Sum of the reported gainers' percent changes
    pub total_positive_pct: f64,
    /// Sum of the reported losers' absolute percent changes
    pub total_negative_pct: f64,
    pub total_scanned: usize,
    pub failed: Vec<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfidenceFilter {
    #[default]
    All,
    Only(Confidence),
}

impl ConfidenceFilter {
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("all") {
            Some(ConfidenceFilter::All)
        } else {
            Confidence::parse(value).map(ConfidenceFilter::Only)
        }
    }

    pub fn accepts(&self, confidence: Confidence) -> bool {
        match self {
            ConfidenceFilter::All => true,
            ConfidenceFilter::Only(level) => *level == confidence,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortKey {
    /// High first
    #[default]
    Confidence,
    /// Largest forecast change first
    ForecastPct,
    /// Highest price first
    CurrentPrice,
    Symbol,
}

impl SortKey {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().replace(|c: char| c == '-' || c == '_' || c == ' ', "").as_str() {
            "confidence" => Some(SortKey::Confidence),
            "forecast" | "forecastpct" | "forecast%" => Some(SortKey::ForecastPct),
            "price" | "currentprice" => Some(SortKey::CurrentPrice),
            "symbol" => Some(SortKey::Symbol),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SummaryOptions {
    pub filter: ConfidenceFilter,
    pub sort: SortKey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRow {
    pub symbol: String,
    pub company: String,
    pub current_price: f64,
    pub daily_change_pct: f64,
    pub forecast_price: f64,
    pub forecast_pct: f64,
    pub price_change: f64,
    pub confidence: Confidence,
    pub factor_count: usize,
    pub target_price: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub high_confidence: usize,
    /// 0 when no rows remain
    pub average_forecast_pct: f64,
    pub positive_forecasts: usize,
    pub total: usize,
}

impl SummaryStats {
    pub fn from_rows(rows: &[SummaryRow]) -> Self {
        let total = rows.len();
        let average_forecast_pct = if total == 0 {
            0.0
        } else {
            rows.iter().map(|r| r.forecast_pct).sum::<f64>() / total as f64
        };

        Self {
            high_confidence: rows.iter().filter(|r| r.confidence == Confidence::High).count(),
            average_forecast_pct,
            positive_forecasts: rows.iter().filter(|r| r.forecast_pct > 0.0).count(),
            total,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastSummary {
    pub rows: Vec<SummaryRow>,
    pub stats: SummaryStats,
    pub total_analyzed: usize,
    pub failed: Vec<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Multi-symbol views over a shared `DashboardService`
pub struct MarketScanner {
    service: Arc<DashboardService>,
}

impl MarketScanner {
    pub fn new(service: Arc<DashboardService>) -> Self {
        Self { service }
    }

    /// Run `job` for every symbol with at most `max_concurrency` in flight.
    /// Failures, including panicked tasks, are logged and returned by symbol.
    async fn run_batch<T, F, Fut>(&self, symbols: &[String], job: F) -> (Vec<T>, Vec<String>)
    where
        T: Send + 'static,
        F: Fn(Arc<DashboardService>, String) -> Fut,
        Fut: std::future::Future<Output = Result<T, AnalysisError>> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.service.settings().max_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut symbol_by_task = HashMap::with_capacity(symbols.len());

        for symbol in symbols {
            let sem = Arc::clone(&semaphore);
            let fut = job(Arc::clone(&self.service), symbol.clone());
            let handle = tasks.spawn(async move {
                let _permit = sem.acquire().await;
                fut.await
            });
            symbol_by_task.insert(handle.id(), symbol.clone());
        }

        let mut results = Vec::new();
        let mut failed = Vec::new();

        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, Ok(value))) => results.push(value),
                Ok((id, Err(e))) => {
                    let symbol = symbol_by_task.remove(&id).unwrap_or_default();
                    tracing::warn!("Skipping {}: {}", symbol, e);
                    failed.push(symbol);
                }
                Err(e) => {
                    let symbol = symbol_by_task.remove(&e.id()).unwrap_or_default();
                    tracing::error!("Task for {} failed: {}", symbol, e);
                    failed.push(symbol);
                }
            }
        }

        failed.sort();
        (results, failed)
    }

    /// Daily movers among `symbols`: positive change is a gainer, anything
    /// else a loser.
    pub async fn gainers_losers(&self, symbols: &[String], top_n: usize) -> Result<MoversReport, anyhow::Error> {
        tracing::info!("Scanning {} symbols for gainers and losers", symbols.len());
        self.service.purge_expired_caches();
        let days = self.service.settings().history_days;

        let (movers, failed) = self
            .run_batch(symbols, move |service, symbol| async move {
                let series = service.price_series(&symbol, days).await?;
                let change = daily_change(&series)?;
                Ok::<_, AnalysisError>(Mover {
                    symbol,
                    current_price: change.current_close,
                    change: change.change,
                    percent_change: change.percent_change,
                })
            })
            .await;

        if movers.is_empty() && !symbols.is_empty() {
            anyhow::bail!("No price data for any of {} symbols", symbols.len());
        }

        let report = split_movers(movers, top_n, symbols.len(), failed);
        tracing::info!(
            "Scan complete: {} gainers, {} losers, {} failed",
            report.gainers.len(),
            report.losers.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Forecast table for `symbols`, filtered and sorted per `options`.
    ///
    /// Symbols without enough history for a forecast are dropped from the
    /// table and listed in `failed`.
    pub async fn forecast_summary(
        &self,
        symbols: &[String],
        options: SummaryOptions,
    ) -> Result<ForecastSummary, anyhow::Error> {
        tracing::info!("Building forecast summary for {} symbols", symbols.len());
        self.service.purge_expired_caches();
        let days = self.service.settings().history_days;

        let (rows, failed) = self
            .run_batch(symbols, move |service, symbol| async move {
                let (series, profile, consensus) = tokio::join!(
                    service.price_series(&symbol, days),
                    service.company_profile(&symbol),
                    service.analyst_consensus(&symbol),
                );
                let series = series?;
                let news = service.news(&symbol, profile.name.as_deref()).await;
                let reasons = service.tagger().tag_top(&news);
                let forecast = forecast_series(&series, &reasons, consensus.target_price)?;
                let daily_change_pct = daily_change(&series).map(|c| c.percent_change).unwrap_or(0.0);

                Ok::<_, AnalysisError>(SummaryRow {
                    company: profile.name.unwrap_or_else(|| symbol.clone()),
                    symbol,
                    current_price: forecast.current_price,
                    daily_change_pct,
                    forecast_price: forecast.forecast_price,
                    forecast_pct: forecast.percent_change,
                    price_change: forecast.price_change,
                    confidence: forecast.confidence,
                    factor_count: forecast.active_factors.len(),
                    target_price: forecast.target_price,
                })
            })
            .await;

        if rows.is_empty() && !symbols.is_empty() {
            anyhow::bail!("No forecasts could be produced for {} symbols", symbols.len());
        }

        let rows = arrange_rows(rows, symbols, options);
        let stats = SummaryStats::from_rows(&rows);
        tracing::info!(
            "Summary complete: {} rows ({} high confidence), {} failed",
            stats.total,
            stats.high_confidence,
            failed.len()
        );

        Ok(ForecastSummary {
            rows,
            stats,
            total_analyzed: symbols.len(),
            failed,
            timestamp: chrono::Utc::now(),
        })
    }
}

fn split_movers(movers: Vec<Mover>, top_n: usize, total_scanned: usize, failed: Vec<String>) -> MoversReport {
    let (mut gainers, mut losers): (Vec<Mover>, Vec<Mover>) =
        movers.into_iter().partition(|m| m.change > 0.0);

    gainers.sort_by(|a, b| {
        b.percent_change
            .partial_cmp(&a.percent_change)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    losers.sort_by(|a, b| {
        a.percent_change
            .partial_cmp(&b.percent_change)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    gainers.truncate(top_n);
    losers.truncate(top_n);

    MoversReport {
        total_positive_pct: gainers.iter().map(|g| g.percent_change).sum(),
        total_negative_pct: losers.iter().map(|l| l.percent_change.abs()).sum(),
        gainers,
        losers,
        total_scanned,
        failed,
        timestamp: chrono::Utc::now(),
    }
}

/// Filter, then sort. Ties keep the watch-list order.
fn arrange_rows(rows: Vec<SummaryRow>, symbols: &[String], options: SummaryOptions) -> Vec<SummaryRow> {
    let position = |symbol: &str| symbols.iter().position(|s| s == symbol).unwrap_or(usize::MAX);

    let mut rows: Vec<SummaryRow> = rows
        .into_iter()
        .filter(|r| options.filter.accepts(r.confidence))
        .collect();
    // Task completion order is arbitrary
    rows.sort_by_key(|r| position(&r.symbol));

    match options.sort {
        SortKey::Confidence => rows.sort_by(|a, b| b.confidence.cmp(&a.confidence)),
        SortKey::ForecastPct => {
            rows.sort_by(|a, b| b.forecast_pct.partial_cmp(&a.forecast_pct).unwrap_or(Ordering::Equal))
        }
        SortKey::CurrentPrice => {
            rows.sort_by(|a, b| b.current_price.partial_cmp(&a.current_price).unwrap_or(Ordering::Equal))
        }
        SortKey::Symbol => rows.sort_by(|a, b| a.symbol.cmp(&b.symbol)),
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use crate::DashboardSettings;

    fn scanner(provider: StaticProvider) -> MarketScanner {
        let settings = DashboardSettings {
            max_concurrency: 2,
            ..Default::default()
        };
        MarketScanner::new(Arc::new(DashboardService::new(Arc::new(provider), settings)))
    }

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_panicked_task_reported_as_failed() {
        let (mut done, failed) = scanner(StaticProvider::default())
            .run_batch(&symbols(&["AAPL", "BOOM", "MSFT"]), |_service, symbol| async move {
                if symbol == "BOOM" {
                    panic!("job for {} blew up", symbol);
                }
                Ok::<_, AnalysisError>(symbol)
            })
            .await;

        done.sort();
        assert_eq!(done, symbols(&["AAPL", "MSFT"]));
        assert_eq!(failed, symbols(&["BOOM"]));
    }

    fn row(symbol: &str, price: f64, pct: f64, confidence: Confidence) -> SummaryRow {
        SummaryRow {
            symbol: symbol.to_string(),
            company: symbol.to_string(),
            current_price: price,
            daily_change_pct: 0.0,
            forecast_price: price * (1.0 + pct / 100.0),
            forecast_pct: pct,
            price_change: price * pct / 100.0,
            confidence,
            factor_count: 0,
            target_price: None,
        }
    }

    #[tokio::test]
    async fn test_gainers_losers_split_and_order() {
        let provider = StaticProvider::default()
            .with_closes("UP1", &[100.0, 101.0])
            .with_closes("UP2", &[100.0, 105.0])
            .with_closes("FLAT", &[50.0, 50.0])
            .with_closes("DOWN", &[100.0, 90.0]);
        let report = scanner(provider)
            .gainers_losers(&symbols(&["UP1", "UP2", "FLAT", "DOWN", "MISSING"]), 10)
            .await
            .unwrap();

        let gainers: Vec<_> = report.gainers.iter().map(|m| m.symbol.as_str()).collect();
        let losers: Vec<_> = report.losers.iter().map(|m| m.symbol.as_str()).collect();
        assert_eq!(gainers, vec!["UP2", "UP1"]);
        // zero change counts as a loser
        assert_eq!(losers, vec!["DOWN", "FLAT"]);
        assert_eq!(report.failed, vec!["MISSING".to_string()]);
        assert_eq!(report.total_scanned, 5);
        assert!((report.total_positive_pct - 6.0).abs() < 1e-9);
        assert!((report.total_negative_pct - 10.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_gainers_losers_top_n() {
        let provider = StaticProvider::default()
            .with_closes("A", &[100.0, 101.0])
            .with_closes("B", &[100.0, 102.0])
            .with_closes("C", &[100.0, 103.0]);
        let report = scanner(provider).gainers_losers(&symbols(&["A", "B", "C"]), 2).await.unwrap();
        assert_eq!(report.gainers.len(), 2);
        assert_eq!(report.gainers[0].symbol, "C");
    }

    #[tokio::test]
    async fn test_gainers_losers_all_failed() {
        let result = scanner(StaticProvider::default()).gainers_losers(&symbols(&["X"]), 10).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_forecast_summary_rows_and_stats() {
        let provider = StaticProvider::default()
            .with_closes("AAPL", &[100.0, 101.0, 102.0, 103.0, 104.0])
            .with_closes("FLAT", &[50.0; 6])
            .with_closes("SHORT", &[1.0, 2.0, 3.0])
            .with_target("AAPL", 110.0);
        let summary = scanner(provider)
            .forecast_summary(&symbols(&["AAPL", "FLAT", "SHORT"]), SummaryOptions::default())
            .await
            .unwrap();

        assert_eq!(summary.rows.len(), 2);
        assert_eq!(summary.failed, vec!["SHORT".to_string()]);
        assert_eq!(summary.total_analyzed, 3);

        let aapl = summary.rows.iter().find(|r| r.symbol == "AAPL").unwrap();
        assert_eq!(aapl.company, "AAPL Inc.");
        assert_eq!(aapl.target_price, Some(110.0));
        // strong momentum + analyst target
        assert_eq!(aapl.confidence, Confidence::Medium);
        assert_eq!(aapl.factor_count, 2);

        let flat = summary.rows.iter().find(|r| r.symbol == "FLAT").unwrap();
        assert_eq!(flat.forecast_pct, 0.0);
        assert_eq!(flat.confidence, Confidence::Low);

        // confidence sort puts Medium ahead of Low
        assert_eq!(summary.rows[0].symbol, "AAPL");
        assert_eq!(summary.stats.positive_forecasts, 1);
        assert_eq!(summary.stats.total, 2);
    }

    #[test]
    fn test_arrange_rows_filter_and_sorts() {
        let list = symbols(&["MSFT", "AAPL", "NVDA"]);
        let rows = || {
            vec![
                row("NVDA", 900.0, -1.0, Confidence::Low),
                row("AAPL", 190.0, 3.0, Confidence::High),
                row("MSFT", 420.0, 1.0, Confidence::Low),
            ]
        };
        let order = |rows: &[SummaryRow]| rows.iter().map(|r| r.symbol.clone()).collect::<Vec<_>>();

        let by_conf = arrange_rows(rows(), &list, SummaryOptions::default());
        // ties keep watch-list order
        assert_eq!(order(&by_conf), vec!["AAPL", "MSFT", "NVDA"]);

        let by_pct = arrange_rows(rows(), &list, SummaryOptions { sort: SortKey::ForecastPct, ..Default::default() });
        assert_eq!(order(&by_pct), vec!["AAPL", "MSFT", "NVDA"]);

        let by_price = arrange_rows(rows(), &list, SummaryOptions { sort: SortKey::CurrentPrice, ..Default::default() });
        assert_eq!(order(&by_price), vec!["NVDA", "MSFT", "AAPL"]);

        let low_only = arrange_rows(
            rows(),
            &list,
            SummaryOptions {
                filter: ConfidenceFilter::Only(Confidence::Low),
                sort: SortKey::Symbol,
            },
        );
        assert_eq!(order(&low_only), vec!["MSFT", "NVDA"]);
    }

    #[test]
    fn test_summary_stats() {
        let stats = SummaryStats::from_rows(&[
            row("A", 10.0, 2.0, Confidence::High),
            row("B", 10.0, -4.0, Confidence::Low),
        ]);
        assert_eq!(stats.high_confidence, 1);
        assert!((stats.average_forecast_pct + 1.0).abs() < 1e-9);
        assert_eq!(stats.positive_forecasts, 1);
        assert_eq!(stats.total, 2);
        assert_eq!(SummaryStats::from_rows(&[]).average_forecast_pct, 0.0);
    }

    #[test]
    fn test_parse_options() {
        assert_eq!(ConfidenceFilter::parse("ALL"), Some(ConfidenceFilter::All));
        assert_eq!(ConfidenceFilter::parse("high"), Some(ConfidenceFilter::Only(Confidence::High)));
        assert_eq!(ConfidenceFilter::parse("certain"), None);
        assert_eq!(SortKey::parse("forecast-pct"), Some(SortKey::ForecastPct));
        assert_eq!(SortKey::parse("Current Price"), Some(SortKey::CurrentPrice));
        assert_eq!(SortKey::parse("volume"), None);
    }
}
