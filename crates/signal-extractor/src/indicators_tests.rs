#[cfg(test)]
mod tests {
    use super::super::indicators::*;
    use super::super::extract_signals;
    use chrono::NaiveDate;
    use forecast_core::{NewsReason, PriceBar, PriceSeries, SentimentTag};

    // Helper function to create bars from closes and volumes
    fn sample_bars(closes: &[f64], volumes: &[f64]) -> Vec<PriceBar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        closes
            .iter()
            .zip(volumes)
            .enumerate()
            .map(|(i, (&close, &volume))| PriceBar {
                date: start + chrono::Duration::days(i as i64),
                open: close - 0.5,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume,
            })
            .collect()
    }

    fn sample_series(closes: &[f64], volumes: &[f64]) -> PriceSeries {
        PriceSeries::new("TEST", sample_bars(closes, volumes))
    }

    fn reasons(tags: &[SentimentTag]) -> Vec<NewsReason> {
        tags.iter()
            .map(|&sentiment| NewsReason {
                title: "headline".to_string(),
                publisher: "Wire".to_string(),
                sentiment,
            })
            .collect()
    }

    #[test]
    fn test_momentum_basic() {
        let bars = sample_bars(&[100.0, 101.0, 102.0, 103.0, 104.0], &[1.0; 5]);
        assert!((momentum(&bars).unwrap() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_momentum_sign_follows_price() {
        let down = sample_bars(&[50.0, 49.0, 45.0], &[1.0; 3]);
        assert!(momentum(&down).unwrap() < 0.0);

        let flat = sample_bars(&[50.0, 52.0, 50.0], &[1.0; 3]);
        assert_eq!(momentum(&flat).unwrap(), 0.0);
    }

    #[test]
    fn test_momentum_insufficient_data() {
        let bars = sample_bars(&[100.0], &[1.0]);
        assert!(momentum(&bars).unwrap_err().is_insufficient_data());
    }

    #[test]
    fn test_momentum_zero_first_close() {
        let bars = sample_bars(&[0.0, 1.0, 2.0], &[1.0; 3]);
        assert!(momentum(&bars).unwrap_err().is_insufficient_data());
    }

    #[test]
    fn test_moving_averages_short_window() {
        let bars = sample_bars(&[100.0, 101.0, 102.0, 103.0, 104.0, 105.0, 106.0], &[1.0; 7]);
        let (ma5, ma10) = moving_averages(&bars);
        assert!((ma5 - 104.0).abs() < 1e-9); // mean of 102..106
        assert_eq!(ma5, ma10);
    }

    #[test]
    fn test_moving_averages_full_window() {
        let closes: Vec<f64> = (1..=10).map(|i| i as f64).collect();
        let bars = sample_bars(&closes, &[1.0; 10]);
        let (ma5, ma10) = moving_averages(&bars);
        assert!((ma5 - 8.0).abs() < 1e-9);
        assert!((ma10 - 5.5).abs() < 1e-9);
    }

    #[test]
    fn test_moving_averages_fewer_than_five() {
        let bars = sample_bars(&[10.0, 20.0, 30.0], &[1.0; 3]);
        let (ma5, ma10) = moving_averages(&bars);
        assert!((ma5 - 20.0).abs() < 1e-9);
        assert_eq!(ma10, ma5);
    }

    #[test]
    fn test_volume_trend_uses_last_five() {
        // The first bar's volume is outside the last-5 window
        let bars = sample_bars(&[1.0; 6], &[1.0, 1000.0, 900.0, 800.0, 1200.0, 1500.0]);
        assert!((volume_trend(&bars) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_volume_trend_zero_base() {
        let bars = sample_bars(&[1.0; 5], &[0.0, 100.0, 200.0, 300.0, 400.0]);
        assert_eq!(volume_trend(&bars), 0.0);
    }

    #[test]
    fn test_news_score() {
        use SentimentTag::*;
        assert_eq!(news_score(&[]), 0.0);
        assert!((news_score(&reasons(&[Positive, Positive, Negative, Neutral])) - 0.25).abs() < 1e-9);
        assert!((news_score(&reasons(&[Negative, Negative])) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_target_gap() {
        assert_eq!(target_gap(None, 100.0).unwrap(), None);
        assert_eq!(target_gap(Some(0.0), 100.0).unwrap(), None);
        assert_eq!(target_gap(Some(-5.0), 100.0).unwrap(), None);
        assert!((target_gap(Some(110.0), 100.0).unwrap().unwrap() - 10.0).abs() < 1e-9);
        assert!(target_gap(Some(110.0), 0.0).unwrap_err().is_insufficient_data());
    }

    #[test]
    fn test_daily_change() {
        let series = sample_series(&[200.0, 198.0, 201.96], &[1.0; 3]);
        let change = daily_change(&series).unwrap();
        assert_eq!(change.prev_close, 198.0);
        assert!((change.change - 3.96).abs() < 1e-9);
        assert!((change.percent_change - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_daily_change_guards() {
        let one_bar = sample_series(&[10.0], &[1.0]);
        assert!(daily_change(&one_bar).unwrap_err().is_insufficient_data());

        let zero_prev = sample_series(&[0.0, 10.0], &[1.0; 2]);
        assert!(daily_change(&zero_prev).unwrap_err().is_insufficient_data());
    }

    #[test]
    fn test_relative_performance_joins_on_date() {
        let security = sample_series(&[100.0, 102.0, 101.0, 103.02, 104.0, 106.08], &[1.0; 6]);
        let mut bench_bars = sample_bars(&[1000.0, 1010.0, 1000.0, 1020.0, 1020.0, 1030.2], &[0.0; 6]);
        // Drop one benchmark session so that date is missing from the join
        bench_bars.remove(4);
        let benchmark = PriceSeries::new("I:COMP", bench_bars);

        let points = relative_performance(&security, &benchmark, 5);
        // last 5 security bars -> 4 changes, one of which has no benchmark date
        assert_eq!(points.len(), 3);
        assert!((points[0].security_pct + 0.980392).abs() < 1e-5);
        assert!((points[0].benchmark_pct + 0.990099).abs() < 1e-5);
        let last = points.last().unwrap();
        assert!((last.security_pct - 2.0).abs() < 1e-9);
        assert!((last.benchmark_pct - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_extract_signals_worked_example() {
        let series = sample_series(
            &[100.0, 101.0, 102.0, 103.0, 104.0],
            &[1000.0, 1000.0, 1000.0, 1000.0, 1500.0],
        );
        let signals = extract_signals(&series, &[]).unwrap();

        assert!((signals.momentum - 4.0).abs() < 1e-9);
        assert!((signals.ma5 - 102.0).abs() < 1e-9);
        assert_eq!(signals.ma10, signals.ma5);
        assert!((signals.volume_trend - 0.5).abs() < 1e-9);
        assert_eq!(signals.news_score, 0.0);
        assert_eq!(signals.news_considered, 0);
        assert_eq!(signals.current_price, 104.0);
        assert_eq!(signals.window_len, 5);
    }

    #[test]
    fn test_extract_signals_uses_last_ten_bars() {
        let closes: Vec<f64> = (1..=15).map(|i| i as f64 * 10.0).collect();
        let series = sample_series(&closes, &[1.0; 15]);
        let signals = extract_signals(&series, &reasons(&[SentimentTag::Positive])).unwrap();

        assert_eq!(signals.window_len, 10);
        // window is 60..150
        assert!((signals.momentum - 150.0).abs() < 1e-9);
        assert!((signals.ma10 - 105.0).abs() < 1e-9);
        assert!((signals.news_score - 1.0).abs() < 1e-9);
        assert_eq!(signals.news_considered, 1);
    }

    #[test]
    fn test_extract_signals_zero_ma5() {
        let series = sample_series(&[5.0, 0.0, 0.0, 0.0, 0.0, 0.0], &[1.0; 6]);
        assert!(extract_signals(&series, &[]).unwrap_err().is_insufficient_data());
    }
}
