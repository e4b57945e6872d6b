//! Weighted one-week price forecast.
//!
//! The forecast is a fixed linear blend of the extracted signals, scaled from
//! a 5-session lookback to a 7-day horizon and clamped to ±15%. It is a
//! documented heuristic: the weights are not fitted and must stay as they are.

use forecast_core::{
    AnalysisError, Confidence, ConfidenceFactor, ForecastResult, NewsReason, PriceSeries, SignalSet,
};
use signal_extractor::{extract_signals, target_gap};

/// Bars required before a forecast is attempted
pub const MIN_FORECAST_BARS: usize = 5;

const MOMENTUM_WEIGHT: f64 = 0.30;
const MA_OFFSET_WEIGHT: f64 = 0.20;
const NEWS_WEIGHT: f64 = 2.0;
const VOLUME_WEIGHT: f64 = 0.50;
/// 5-session signals extrapolated to 7 calendar days
const HORIZON_SCALE: f64 = 7.0 / 5.0;
/// Share of the signal forecast kept when an analyst target is blended in
const SIGNAL_SHARE_WITH_TARGET: f64 = 0.70;
const TARGET_WEIGHT: f64 = 0.30;
const MAX_WEEKLY_PCT: f64 = 15.0;

const MOMENTUM_THRESHOLD_PCT: f64 = 1.0;
const TREND_THRESHOLD: f64 = 0.02;
const NEWS_COVERAGE_MIN: usize = 3;

/// Individual weighted contributions, before horizon scaling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorContributions {
    pub momentum: f64,
    pub ma_offset: f64,
    pub news: f64,
    pub volume: f64,
}

impl FactorContributions {
    pub fn sum(&self) -> f64 {
        self.momentum + self.ma_offset + self.news + self.volume
    }
}

fn insufficient_bars(window_len: usize) -> AnalysisError {
    AnalysisError::InsufficientData(format!(
        "Insufficient data for forecast: need {} sessions, have {}",
        MIN_FORECAST_BARS, window_len
    ))
}

fn ma_offset_pct(current_price: f64, ma5: f64) -> Result<f64, AnalysisError> {
    if ma5 == 0.0 {
        return Err(AnalysisError::InsufficientData(
            "moving-average offset undefined: 5-day average is zero".to_string(),
        ));
    }
    Ok((current_price - ma5) / ma5 * 100.0)
}

/// Weighted factor contributions for a signal set at `current_price`
pub fn factor_contributions(signals: &SignalSet, current_price: f64) -> Result<FactorContributions, AnalysisError> {
    Ok(FactorContributions {
        momentum: signals.momentum * MOMENTUM_WEIGHT,
        ma_offset: ma_offset_pct(current_price, signals.ma5)? * MA_OFFSET_WEIGHT,
        news: signals.news_score * NEWS_WEIGHT,
        volume: signals.volume_trend * VOLUME_WEIGHT,
    })
}

/// Factors that are materially active. Independent of forecast magnitude.
pub fn active_factors(signals: &SignalSet, current_price: f64, target_price: Option<f64>) -> Vec<ConfidenceFactor> {
    let mut factors = Vec::with_capacity(4);
    if signals.momentum.abs() > MOMENTUM_THRESHOLD_PCT {
        factors.push(ConfidenceFactor::StrongMomentum);
    }
    if signals.ma5 != 0.0 && (current_price - signals.ma5).abs() / signals.ma5 > TREND_THRESHOLD {
        factors.push(ConfidenceFactor::ClearTrend);
    }
    if signals.news_considered >= NEWS_COVERAGE_MIN {
        factors.push(ConfidenceFactor::NewsCoverage);
    }
    if target_price.is_some() {
        factors.push(ConfidenceFactor::AnalystTargets);
    }
    factors
}

/// Combine extracted signals into a one-week forecast.
///
/// Targets that are not strictly positive are treated as absent: they neither
/// move the forecast nor count as an active factor.
pub fn compose_forecast(
    signals: &SignalSet,
    current_price: f64,
    target_price: Option<f64>,
) -> Result<ForecastResult, AnalysisError> {
    if signals.window_len < MIN_FORECAST_BARS {
        return Err(insufficient_bars(signals.window_len));
    }

    let target_price = target_price.filter(|t| *t > 0.0);
    let contributions = factor_contributions(signals, current_price)?;
    let mut weekly_pct = contributions.sum() * HORIZON_SCALE;

    if let Some(gap) = target_gap(target_price, current_price)? {
        weekly_pct = weekly_pct * SIGNAL_SHARE_WITH_TARGET + gap * TARGET_WEIGHT;
    }

    let percent_change = weekly_pct.clamp(-MAX_WEEKLY_PCT, MAX_WEEKLY_PCT);
    let forecast_price = current_price * (1.0 + percent_change / 100.0);
    let active_factors = active_factors(signals, current_price, target_price);

    Ok(ForecastResult {
        current_price,
        forecast_price,
        price_change: forecast_price - current_price,
        percent_change,
        confidence: Confidence::from_factor_count(active_factors.len()),
        active_factors,
        target_price,
    })
}

/// Extract signals from `series` and compose the forecast at its last close.
pub fn forecast_series(
    series: &PriceSeries,
    reasons: &[NewsReason],
    target_price: Option<f64>,
) -> Result<ForecastResult, AnalysisError> {
    if series.len() < MIN_FORECAST_BARS {
        return Err(insufficient_bars(series.len()));
    }
    let signals = extract_signals(series, reasons)?;
    compose_forecast(&signals, signals.current_price, target_price)
}
