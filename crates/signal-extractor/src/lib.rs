pub mod indicators;
pub mod insights;

#[cfg(test)]
mod indicators_tests;

pub use indicators::*;
pub use insights::*;

use forecast_core::{AnalysisError, NewsReason, PriceSeries, SignalSet};

/// Extract the forecast signals from the last 10 bars of `series` and the
/// tagged headlines.
///
/// Fails with `InsufficientData` when momentum is undefined (fewer than two
/// bars or a zero first close) or the short moving average is zero. The
/// 5-bar minimum for a forecast is enforced by the composer, so callers can
/// still inspect signals on a short series.
pub fn extract_signals(series: &PriceSeries, reasons: &[NewsReason]) -> Result<SignalSet, AnalysisError> {
    let window = series.tail(WINDOW_LEN);
    let momentum = momentum(window)?;
    let (ma5, ma10) = moving_averages(window);
    if ma5 == 0.0 {
        return Err(AnalysisError::InsufficientData(format!(
            "{}: 5-day average close is zero",
            series.symbol
        )));
    }

    Ok(SignalSet {
        momentum,
        ma5,
        ma10,
        volume_trend: volume_trend(window),
        news_score: news_score(reasons),
        news_considered: reasons.len(),
        current_price: window[window.len() - 1].close,
        window_len: window.len(),
    })
}
