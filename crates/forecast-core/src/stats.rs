//! Small descriptive-statistics helpers shared by the signal crates.

/// Compute the mean of a data slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Compute sample standard deviation (n - 1 denominator).
pub fn std_dev(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let m = mean(data);
    let variance = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (data.len() - 1) as f64;
    variance.sqrt()
}

/// Coefficient of variation in percent (std / mean * 100).
/// Returns 0.0 when the mean is zero.
pub fn coefficient_of_variation_pct(data: &[f64]) -> f64 {
    let m = mean(data);
    if m == 0.0 {
        return 0.0;
    }
    std_dev(data) / m * 100.0
}

/// Percent change from `from` to `to`, or `None` when `from` is zero.
pub fn pct_change(from: f64, to: f64) -> Option<f64> {
    if from == 0.0 {
        return None;
    }
    Some((to - from) / from * 100.0)
}
