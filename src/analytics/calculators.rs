//! Numeric primitives shared by the statistics and analytics engines.
//!
//! Everything here is a pure function over `f64` slices. Price sequences
//! come from the store already sorted ascending by timestamp.

/// Arithmetic mean, or NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance (divide by N, not N-1), or NaN for an empty slice.
///
/// The population divisor is used across the whole crate so that the
/// statistics engine and the volatility engine agree on one convention.
pub fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let n = values.len() as f64;
    let mu = mean(values);
    values.iter().map(|&v| (v - mu).powi(2)).sum::<f64>() / n
}

/// Population standard deviation, or NaN for an empty slice.
pub fn population_std_dev(values: &[f64]) -> f64 {
    population_variance(values).sqrt()
}

/// Median of the values, or NaN for an empty slice.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Simple percentage returns between consecutive prices:
/// `r_i = (p_i - p_{i-1}) / p_{i-1} * 100`.
///
/// Gaps between observations are not interpolated; each consecutive pair
/// produces exactly one return. A zero previous price yields a 0 return
/// rather than a division blowup. Fewer than two prices yields an empty
/// vector.
pub fn percent_returns(prices: &[f64]) -> Vec<f64> {
    if prices.len() < 2 {
        return Vec::new();
    }
    let mut returns = Vec::with_capacity(prices.len() - 1);
    for pair in prices.windows(2) {
        let (prev, curr) = (pair[0], pair[1]);
        if prev == 0.0 {
            returns.push(0.0);
        } else {
            returns.push((curr - prev) / prev * 100.0);
        }
    }
    returns
}

/// Maximum drawdown over the CUMULATIVE SUM of the price series.
///
/// Computes the running maximum of the cumulative-sum series, takes the
/// gap `cumulative - running_max` at each point, and returns the absolute
/// value of the most negative gap (0 when the gap never goes negative).
///
/// Note this operates on a sum-of-prices series, not on prices or
/// returns. A conventional peak-to-trough drawdown would use the price
/// series itself; this definition is retained for compatibility with the
/// established reports built on it.
pub fn max_drawdown(prices: &[f64]) -> f64 {
    let mut cumulative = 0.0;
    let mut running_max = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &price in prices {
        cumulative += price;
        running_max = running_max.max(cumulative);
        let drawdown = cumulative - running_max;
        if drawdown < worst {
            worst = drawdown;
        }
    }
    worst.abs()
}

/// Trailing simple moving average with the given window size.
///
/// Output has one slot per input value; slots before `window - 1` values
/// have accumulated are `None`. A window of 0 yields all-`None`.
pub fn trailing_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    if window == 0 {
        out.resize(values.len(), None);
        return out;
    }
    let mut running = 0.0;
    for (i, &value) in values.iter().enumerate() {
        running += value;
        if i + 1 < window {
            out.push(None);
        } else {
            if i >= window {
                running -= values[i - window];
            }
            out.push(Some(running / window as f64));
        }
    }
    out
}

/// Ordinary least squares fit of `values` against their indices
/// (x = 0, 1, 2, ...). Returns `(slope, intercept)`.
///
/// Callers guarantee at least two values; a degenerate input yields a
/// flat line through the single value (or the origin when empty).
pub fn linear_fit(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    if values.is_empty() {
        return (0.0, 0.0);
    }
    if values.len() == 1 {
        return (0.0, values[0]);
    }
    let sum_x: f64 = (0..values.len()).map(|i| i as f64).sum();
    let sum_y: f64 = values.iter().sum();
    let sum_xy: f64 = values.iter().enumerate().map(|(i, &y)| i as f64 * y).sum();
    let sum_xx: f64 = (0..values.len()).map(|i| (i as f64).powi(2)).sum();

    let slope = (n * sum_xy - sum_x * sum_y) / (n * sum_xx - sum_x * sum_x);
    let intercept = (sum_y - slope * sum_x) / n;
    (slope, intercept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_empty_is_nan() {
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn population_std_dev_matches_known_value() {
        // population std of [1,2,3] is sqrt(2/3)
        let result = population_std_dev(&[1.0, 2.0, 3.0]);
        assert!((result - (2.0_f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn population_std_dev_of_singleton_is_zero() {
        assert_eq!(population_std_dev(&[42.0]), 0.0);
    }

    #[test]
    fn median_handles_odd_and_even_lengths() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert!(median(&[]).is_nan());
    }

    #[test]
    fn percent_returns_between_consecutive_points() {
        let returns = percent_returns(&[100.0, 90.0, 99.0]);
        assert_eq!(returns.len(), 2);
        assert!((returns[0] - -10.0).abs() < 1e-12);
        assert!((returns[1] - 10.0).abs() < 1e-12);
    }

    #[test]
    fn percent_returns_requires_two_prices() {
        assert!(percent_returns(&[]).is_empty());
        assert!(percent_returns(&[100.0]).is_empty());
    }

    #[test]
    fn percent_returns_guards_zero_previous_price() {
        assert_eq!(percent_returns(&[0.0, 50.0]), vec![0.0]);
    }

    #[test]
    fn max_drawdown_is_zero_for_increasing_cumsum() {
        // cumsum [10,30,35,65] never dips below its running max
        assert_eq!(max_drawdown(&[10.0, 20.0, 5.0, 30.0]), 0.0);
    }

    #[test]
    fn max_drawdown_zero_when_empty() {
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    #[test]
    fn max_drawdown_is_zero_for_decreasing_prices_too() {
        // cumsum of non-negative prices never decreases, so the gap
        // never goes negative: [30,10,5,2] -> cumsum [30,40,45,47]
        assert_eq!(max_drawdown(&[30.0, 10.0, 5.0, 2.0]), 0.0);
    }

    #[test]
    fn max_drawdown_on_series_with_negative_gap() {
        // cumsum [30,20,15,13] after a 30, -10, -5, -2 sequence:
        // running max stays 30, worst gap is 13 - 30 = -17
        assert_eq!(max_drawdown(&[30.0, -10.0, -5.0, -2.0]), 17.0);
    }

    #[test]
    fn trailing_mean_undefined_before_window_fills() {
        let out = trailing_mean(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 7);
        assert!(out.iter().all(|v| v.is_none()));

        let out = trailing_mean(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0], 7);
        assert_eq!(out.iter().filter(|v| v.is_some()).count(), 1);
        assert_eq!(out[6], Some(4.0));
    }

    #[test]
    fn trailing_mean_slides_the_window() {
        let out = trailing_mean(&[1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(out, vec![None, Some(1.5), Some(2.5), Some(3.5)]);
    }

    #[test]
    fn linear_fit_recovers_exact_line() {
        let values: Vec<f64> = (0..10).map(|i| 3.0 * i as f64 + 7.0).collect();
        let (slope, intercept) = linear_fit(&values);
        assert!((slope - 3.0).abs() < 1e-9);
        assert!((intercept - 7.0).abs() < 1e-9);
    }

    #[test]
    fn linear_fit_flat_series_has_zero_slope() {
        let (slope, intercept) = linear_fit(&[5.0, 5.0, 5.0, 5.0]);
        assert!(slope.abs() < 1e-12);
        assert!((intercept - 5.0).abs() < 1e-9);
    }
}
