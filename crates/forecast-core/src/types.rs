use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One trading session (OHLCV)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Ordered price history for one symbol.
///
/// Bars are kept in ascending date order with at most one bar per date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Build a series from bars in any order. When two bars share a date the
    /// one that appears later in `bars` is kept.
    pub fn new(symbol: impl Into<String>, bars: Vec<PriceBar>) -> Self {
        let mut bars = bars;
        // Stable sort keeps arrival order within a date, so the last one wins below
        bars.sort_by_key(|b| b.date);
        let mut deduped: Vec<PriceBar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.date == bar.date => *last = bar,
                _ => deduped.push(bar),
            }
        }

        Self {
            symbol: symbol.into(),
            bars: deduped,
        }
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// The most recent `n` bars (all of them if fewer are available)
    pub fn tail(&self, n: usize) -> &[PriceBar] {
        let start = self.bars.len().saturating_sub(n);
        &self.bars[start..]
    }

    pub fn last(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}

/// News headline as delivered by a news source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub publisher: String,
    pub url: String,
    /// `None` when the source does not say (shown as "recent")
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Keyword sentiment of a single headline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentTag {
    Positive,
    Negative,
    Neutral,
}

impl SentimentTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentTag::Positive => "positive",
            SentimentTag::Negative => "negative",
            SentimentTag::Neutral => "neutral",
        }
    }
}

/// A headline with the tag it received during one analysis pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsReason {
    pub title: String,
    pub publisher: String,
    pub sentiment: SentimentTag,
}

/// Close-to-close change between the last two sessions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyChange {
    pub prev_close: f64,
    pub current_close: f64,
    pub change: f64,
    pub percent_change: f64,
}

/// Numeric signals extracted from a price window and its tagged news
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalSet {
    /// Percent change across the window
    pub momentum: f64,
    pub ma5: f64,
    pub ma10: f64,
    pub volume_trend: f64,
    /// (positive - negative) / count, in [-1, 1]
    pub news_score: f64,
    pub news_considered: usize,
    /// Last close of the window
    pub current_price: f64,
    /// Number of bars the signals were computed over
    pub window_len: usize,
}

/// Forecast confidence, derived from how many factors are active
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn from_factor_count(count: usize) -> Self {
        match count {
            c if c >= 3 => Confidence::High,
            2 => Confidence::Medium,
            _ => Confidence::Low,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Confidence::Low => "Low",
            Confidence::Medium => "Medium",
            Confidence::High => "High",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "low" => Some(Confidence::Low),
            "medium" => Some(Confidence::Medium),
            "high" => Some(Confidence::High),
            _ => None,
        }
    }
}

/// A signal that exceeded its materiality threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConfidenceFactor {
    StrongMomentum,
    ClearTrend,
    NewsCoverage,
    AnalystTargets,
}

impl ConfidenceFactor {
    pub fn label(&self) -> &'static str {
        match self {
            ConfidenceFactor::StrongMomentum => "Strong momentum",
            ConfidenceFactor::ClearTrend => "Clear trend",
            ConfidenceFactor::NewsCoverage => "News coverage",
            ConfidenceFactor::AnalystTargets => "Analyst targets",
        }
    }
}

/// One-week price forecast for a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub current_price: f64,
    pub forecast_price: f64,
    pub price_change: f64,
    /// Clamped to [-15, 15]
    pub percent_change: f64,
    pub confidence: Confidence,
    pub active_factors: Vec<ConfidenceFactor>,
    pub target_price: Option<f64>,
}

/// Daily percent change of a security next to its benchmark on the same date
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparisonPoint {
    pub date: NaiveDate,
    pub security_pct: f64,
    pub benchmark_pct: f64,
}

/// Reference data about a listed company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub symbol: String,
    pub name: Option<String>,
    pub market_cap: Option<f64>,
}

/// Individual analyst rating
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalystRating {
    pub date: Option<String>,
    pub firm: Option<String>,
    pub previous_rating: Option<String>,
    pub rating: Option<String>,
    pub action: Option<String>,
    pub price_target: Option<f64>,
}

/// Analyst consensus for a symbol; every field is optional at the source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalystConsensus {
    pub target_price: Option<f64>,
    pub consensus_rating: Option<String>,
    pub recent_ratings: Vec<AnalystRating>,
}
