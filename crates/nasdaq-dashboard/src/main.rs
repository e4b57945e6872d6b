//! nasdaq-dashboard: NASDAQ market overview, movers and one-week forecasts.
//!
//! Prints each dashboard view as JSON on stdout.
//!
//! Usage:
//!   cargo run -p nasdaq-dashboard -- overview
//!   cargo run -p nasdaq-dashboard -- analyze NVDA
//!   cargo run -p nasdaq-dashboard -- movers --top 5
//!   cargo run -p nasdaq-dashboard -- summary --count 10 --confidence high --sort forecast

mod config;

use anyhow::{Context, Result};
use config::AppConfig;
use dashboard_orchestrator::scanner::DEFAULT_TOP_N;
use dashboard_orchestrator::{
    ConfidenceFilter, DashboardService, MarketScanner, SortKey, SummaryOptions,
};
use polygon_client::{NewsApiClient, PolygonClient};
use serde::Serialize;
use std::sync::Arc;

const USAGE: &str = "usage: nasdaq-dashboard <overview | analyze SYMBOL | movers [--top N] [--count N] | summary [--count N] [--confidence all|high|medium|low] [--sort confidence|forecast|price|symbol]>";

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Overview,
    Analyze(String),
    Movers { top_n: usize, count: Option<usize> },
    Summary { count: Option<usize>, options: SummaryOptions },
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

fn parse_count(args: &[String], flag: &str) -> Result<Option<usize>> {
    flag_value(args, flag)
        .map(|v| v.parse().with_context(|| format!("{} expects a number, got {:?}", flag, v)))
        .transpose()
}

/// Parse arguments after the program name
fn parse_args(args: &[String]) -> Result<Command> {
    let command = args.first().map(|s| s.as_str()).unwrap_or("overview");

    match command {
        "overview" => Ok(Command::Overview),
        "analyze" => {
            let symbol = args
                .get(1)
                .filter(|s| !s.starts_with("--"))
                .context("analyze needs a SYMBOL")?;
            Ok(Command::Analyze(symbol.to_uppercase()))
        }
        "movers" => Ok(Command::Movers {
            top_n: parse_count(args, "--top")?.unwrap_or(DEFAULT_TOP_N),
            count: parse_count(args, "--count")?,
        }),
        "summary" => {
            let filter = match flag_value(args, "--confidence") {
                Some(v) => ConfidenceFilter::parse(v).with_context(|| format!("unknown confidence level {:?}", v))?,
                None => ConfidenceFilter::All,
            };
            let sort = match flag_value(args, "--sort") {
                Some(v) => SortKey::parse(v).with_context(|| format!("unknown sort key {:?}", v))?,
                None => SortKey::Confidence,
            };
            Ok(Command::Summary {
                count: parse_count(args, "--count")?,
                options: SummaryOptions { filter, sort },
            })
        }
        other => anyhow::bail!("unknown command {:?}\n{}", other, USAGE),
    }
}

fn init_tracing() {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "nasdaq_dashboard=info,dashboard_orchestrator=info,polygon_client=warn".into())
    };
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    // Logs go to stderr so stdout stays valid JSON
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_env_filter(filter())
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter())
            .init();
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn watchlist(config: &AppConfig, count: Option<usize>) -> Vec<String> {
    let n = count.unwrap_or(config.watchlist.len()).min(config.watchlist.len());
    config.watchlist[..n].to_vec()
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{}", USAGE);
        return Ok(());
    }
    let command = parse_args(&args)?;
    let config = AppConfig::from_env()?;

    let polygon = PolygonClient::with_rate_limit(config.polygon_api_key.clone(), config.polygon_rate_limit);
    let mut service = DashboardService::new(Arc::new(polygon), config.dashboard_settings());
    if let Some(key) = &config.newsapi_key {
        service = service.with_news_source(Arc::new(NewsApiClient::new(key.clone())));
    } else {
        tracing::info!("NEWSAPI_KEY not set, using Polygon news only");
    }
    let service = Arc::new(service);

    match command {
        Command::Overview => {
            let overview = service.market_overview().await?;
            print_json(&overview)?;
        }
        Command::Analyze(symbol) => {
            let analysis = service
                .analyze_stock(&symbol)
                .await
                .with_context(|| format!("analysis of {} failed", symbol))?;
            for insight in &analysis.insights {
                tracing::info!("{}: {}", symbol, insight);
            }
            print_json(&analysis)?;
        }
        Command::Movers { top_n, count } => {
            let symbols = watchlist(&config, count);
            let report = MarketScanner::new(Arc::clone(&service))
                .gainers_losers(&symbols, top_n)
                .await?;
            print_json(&report)?;
        }
        Command::Summary { count, options } => {
            let symbols = watchlist(&config, count);
            let summary = MarketScanner::new(Arc::clone(&service))
                .forecast_summary(&symbols, options)
                .await?;
            print_json(&summary)?;
        }
    }

    Ok(())
}
