use forecast_core::{stats, AnalysisError, NewsReason, PriceSeries};
use sentiment_tagger::count_sentiment;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::SHORT_LEN;

/// Current volume above this multiple of the 5-day mean is flagged
const HIGH_VOLUME_RATIO: f64 = 1.2;
/// Close-price coefficient of variation (percent) above which volatility is flagged
const HIGH_VOLATILITY_PCT: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Upward,
    Downward,
}

/// One observation about recent price action or news flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Insight {
    PriceTrend { direction: TrendDirection },
    MovingAverage { above: bool },
    HighVolume { pct_above_average: f64 },
    PositiveNews { positive: usize, negative: usize },
    NegativeNews { positive: usize, negative: usize },
    MixedNews,
    HighVolatility { volatility_pct: f64 },
}

impl fmt::Display for Insight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Insight::PriceTrend { direction } => {
                let label = match direction {
                    TrendDirection::Upward => "Upward",
                    TrendDirection::Downward => "Downward",
                };
                write!(f, "Price Trend: {} trend detected", label)
            }
            Insight::MovingAverage { above } => write!(
                f,
                "Moving Average: Current price is {} 5-day average",
                if *above { "above" } else { "below" }
            ),
            Insight::HighVolume { pct_above_average } => write!(
                f,
                "Volume: High trading volume detected ({:.1}% above average)",
                pct_above_average
            ),
            Insight::PositiveNews { positive, negative } => write!(
                f,
                "News Sentiment: Positive news flow ({} positive vs {} negative)",
                positive, negative
            ),
            Insight::NegativeNews { positive, negative } => write!(
                f,
                "News Sentiment: Negative news flow ({} negative vs {} positive)",
                negative, positive
            ),
            Insight::MixedNews => write!(f, "News Sentiment: Mixed news flow"),
            Insight::HighVolatility { volatility_pct } => write!(
                f,
                "Volatility: High volatility detected ({:.2}%)",
                volatility_pct
            ),
        }
    }
}

/// Summarize the last 5 bars and the tagged headlines.
///
/// Order: trend, moving average, volume (only when unusual), news balance,
/// volatility (only when high).
pub fn summarize_insights(series: &PriceSeries, reasons: &[NewsReason]) -> Result<Vec<Insight>, AnalysisError> {
    if series.len() < SHORT_LEN {
        return Err(AnalysisError::InsufficientData(format!(
            "{}: insights need {} bars, got {}",
            series.symbol,
            SHORT_LEN,
            series.len()
        )));
    }

    let recent = series.tail(SHORT_LEN);
    let closes: Vec<f64> = recent.iter().map(|b| b.close).collect();
    let volumes: Vec<f64> = recent.iter().map(|b| b.volume).collect();
    let current_price = closes[closes.len() - 1];
    let current_volume = volumes[volumes.len() - 1];
    let ma5 = stats::mean(&closes);
    let avg_volume = stats::mean(&volumes);

    let above = current_price > ma5;
    let mut insights = vec![
        Insight::PriceTrend {
            direction: if above { TrendDirection::Upward } else { TrendDirection::Downward },
        },
        Insight::MovingAverage { above },
    ];

    if avg_volume > 0.0 && current_volume > avg_volume * HIGH_VOLUME_RATIO {
        insights.push(Insight::HighVolume {
            pct_above_average: (current_volume / avg_volume - 1.0) * 100.0,
        });
    }

    let (positive, negative) = count_sentiment(reasons);
    insights.push(if positive > negative {
        Insight::PositiveNews { positive, negative }
    } else if negative > positive {
        Insight::NegativeNews { positive, negative }
    } else {
        Insight::MixedNews
    });

    let volatility_pct = stats::coefficient_of_variation_pct(&closes);
    if volatility_pct > HIGH_VOLATILITY_PCT {
        insights.push(Insight::HighVolatility { volatility_pct });
    }

    Ok(insights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use forecast_core::{PriceBar, SentimentTag};

    fn series(closes: &[f64], volumes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let bars = closes
            .iter()
            .zip(volumes)
            .enumerate()
            .map(|(i, (&close, &volume))| PriceBar {
                date: start + chrono::Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume,
            })
            .collect();
        PriceSeries::new("TEST", bars)
    }

    fn reason(sentiment: SentimentTag) -> NewsReason {
        NewsReason {
            title: "headline".to_string(),
            publisher: "Wire".to_string(),
            sentiment,
        }
    }

    #[test]
    fn test_uptrend_with_volume_spike() {
        let s = series(&[100.0, 101.0, 102.0, 103.0, 104.0], &[1000.0, 1000.0, 1000.0, 1000.0, 2000.0]);
        let insights = summarize_insights(&s, &[reason(SentimentTag::Positive)]).unwrap();

        assert_eq!(insights[0], Insight::PriceTrend { direction: TrendDirection::Upward });
        assert_eq!(insights[1], Insight::MovingAverage { above: true });
        // mean volume 1200, current 2000 -> 66.7% above
        match &insights[2] {
            Insight::HighVolume { pct_above_average } => {
                assert!((pct_above_average - 66.666).abs() < 0.01)
            }
            other => panic!("expected volume insight, got {:?}", other),
        }
        assert_eq!(insights[3], Insight::PositiveNews { positive: 1, negative: 0 });
        assert_eq!(insights.len(), 4);
        assert_eq!(
            insights[0].to_string(),
            "Price Trend: Upward trend detected"
        );
    }

    #[test]
    fn test_downtrend_negative_news() {
        let s = series(&[104.0, 103.0, 102.0, 101.0, 100.0], &[1000.0; 5]);
        let reasons = vec![reason(SentimentTag::Negative), reason(SentimentTag::Negative), reason(SentimentTag::Positive)];
        let insights = summarize_insights(&s, &reasons).unwrap();

        assert_eq!(insights[0], Insight::PriceTrend { direction: TrendDirection::Downward });
        assert_eq!(insights[1].to_string(), "Moving Average: Current price is below 5-day average");
        assert_eq!(
            insights[2].to_string(),
            "News Sentiment: Negative news flow (2 negative vs 1 positive)"
        );
        assert_eq!(insights.len(), 3);
    }

    #[test]
    fn test_flat_price_is_downward_and_mixed() {
        let s = series(&[50.0; 5], &[10.0; 5]);
        let insights = summarize_insights(&s, &[]).unwrap();
        assert_eq!(insights[0], Insight::PriceTrend { direction: TrendDirection::Downward });
        assert_eq!(insights[2], Insight::MixedNews);
    }

    #[test]
    fn test_high_volatility_flag() {
        let s = series(&[100.0, 110.0, 95.0, 112.0, 90.0], &[1000.0; 5]);
        let insights = summarize_insights(&s, &[]).unwrap();
        let last = insights.last().unwrap();
        assert!(matches!(last, Insight::HighVolatility { volatility_pct } if *volatility_pct > 3.0));
        assert!(last.to_string().starts_with("Volatility: High volatility detected"));
    }

    #[test]
    fn test_insufficient_bars() {
        let s = series(&[1.0, 2.0, 3.0], &[1.0; 3]);
        let err = summarize_insights(&s, &[]).unwrap_err();
        assert!(err.is_insufficient_data());
    }
}
