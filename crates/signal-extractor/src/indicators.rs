use forecast_core::{stats, AnalysisError, ComparisonPoint, DailyChange, NewsReason, PriceBar, PriceSeries};
use sentiment_tagger::count_sentiment;
use std::collections::HashMap;

/// Bars used for momentum and the long moving average
pub const WINDOW_LEN: usize = 10;
/// Bars used for the short moving average and volume trend
pub const SHORT_LEN: usize = 5;

/// Percent change of close across the window
pub fn momentum(window: &[PriceBar]) -> Result<f64, AnalysisError> {
    if window.len() < 2 {
        return Err(AnalysisError::InsufficientData(format!(
            "momentum needs at least 2 bars, got {}",
            window.len()
        )));
    }

    let first = window[0].close;
    let last = window[window.len() - 1].close;
    stats::pct_change(first, last).ok_or_else(|| {
        AnalysisError::InsufficientData("momentum undefined: first close is zero".to_string())
    })
}

/// (MA5, MA10). MA5 covers the last 5 bars (or all if fewer); MA10 covers the
/// whole window only when it holds at least 10 bars, otherwise equals MA5.
pub fn moving_averages(window: &[PriceBar]) -> (f64, f64) {
    let closes: Vec<f64> = window.iter().map(|b| b.close).collect();
    let short = &closes[closes.len().saturating_sub(SHORT_LEN)..];
    let ma5 = stats::mean(short);
    let ma10 = if closes.len() >= WINDOW_LEN {
        stats::mean(&closes)
    } else {
        ma5
    };
    (ma5, ma10)
}

/// Relative change in volume over the last 5 bars. Zero when the oldest of
/// those volumes is zero.
pub fn volume_trend(window: &[PriceBar]) -> f64 {
    let recent = &window[window.len().saturating_sub(SHORT_LEN)..];
    match (recent.first(), recent.last()) {
        (Some(first), Some(last)) if first.volume != 0.0 => {
            (last.volume - first.volume) / first.volume
        }
        _ => 0.0,
    }
}

/// (positive - negative) / count over tagged headlines, 0 when there are none
pub fn news_score(reasons: &[NewsReason]) -> f64 {
    if reasons.is_empty() {
        return 0.0;
    }
    let (positive, negative) = count_sentiment(reasons);
    (positive as f64 - negative as f64) / reasons.len().max(1) as f64
}

/// Percent gap between an analyst target and the current price.
///
/// `Ok(None)` when no strictly positive target is supplied.
pub fn target_gap(target_price: Option<f64>, current_price: f64) -> Result<Option<f64>, AnalysisError> {
    let target = match target_price {
        Some(t) if t > 0.0 => t,
        _ => return Ok(None),
    };
    stats::pct_change(current_price, target)
        .map(Some)
        .ok_or_else(|| {
            AnalysisError::InsufficientData("target gap undefined: current price is zero".to_string())
        })
}

/// Change between the last two closes of a series
pub fn daily_change(series: &PriceSeries) -> Result<DailyChange, AnalysisError> {
    let recent = series.tail(2);
    if recent.len() < 2 {
        return Err(AnalysisError::InsufficientData(format!(
            "{}: daily change needs 2 bars, got {}",
            series.symbol,
            recent.len()
        )));
    }

    let prev_close = recent[0].close;
    let current_close = recent[1].close;
    let percent_change = stats::pct_change(prev_close, current_close).ok_or_else(|| {
        AnalysisError::InsufficientData(format!("{}: previous close is zero", series.symbol))
    })?;

    Ok(DailyChange {
        prev_close,
        current_close,
        change: current_close - prev_close,
        percent_change,
    })
}

/// Day-over-day percent changes of `security` and `benchmark` for the last
/// `sessions` bars of the security, joined on date. Dates missing from the
/// benchmark, or whose previous close is zero, are skipped.
pub fn relative_performance(
    security: &PriceSeries,
    benchmark: &PriceSeries,
    sessions: usize,
) -> Vec<ComparisonPoint> {
    let benchmark_changes: HashMap<_, f64> = benchmark
        .bars()
        .windows(2)
        .filter_map(|w| stats::pct_change(w[0].close, w[1].close).map(|pct| (w[1].date, pct)))
        .collect();

    security
        .tail(sessions)
        .windows(2)
        .filter_map(|w| {
            let security_pct = stats::pct_change(w[0].close, w[1].close)?;
            let benchmark_pct = *benchmark_changes.get(&w[1].date)?;
            Some(ComparisonPoint {
                date: w[1].date,
                security_pct,
                benchmark_pct,
            })
        })
        .collect()
}
