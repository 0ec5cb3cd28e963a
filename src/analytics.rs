//! Trend and volatility analytics.
//!
//! Every operation here is a pure read+compute pass over a snapshot of a
//! product's observation sequence: open the store, query, derive, return.
//! Nothing writes, nothing retries, nothing caches. Failures that a batch
//! caller should skip (too few observations, bad arguments) come back as
//! structured `AnalyticsError` values rather than panics.

pub mod calculators;

use crate::price_series::{PricePoint, PriceStore, StoreError};
use calculators::{
    linear_fit, max_drawdown, mean, percent_returns, population_std_dev, population_variance,
    trailing_mean,
};
use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Default lookback window for volatility, in days.
pub const DEFAULT_VOLATILITY_WINDOW_DAYS: i64 = 30;
/// Default moving-average window sizes, in observations.
pub const DEFAULT_MOVING_AVERAGE_WINDOWS: [usize; 3] = [7, 14, 30];
/// Default projection horizon for price prediction, in days.
pub const DEFAULT_FORECAST_DAYS: usize = 7;

/// Errors produced by analytics operations.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    /// Fewer observations than the analytic requires
    InsufficientData { required: usize, available: usize },
    /// Caller supplied an invalid argument (non-positive window, empty name)
    InvalidInput(String),
    /// Fault propagated from the storage layer
    Store(StoreError),
}

impl fmt::Display for AnalyticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalyticsError::InsufficientData {
                required,
                available,
            } => write!(
                f,
                "Insufficient data: need at least {} observations, have {}",
                required, available
            ),
            AnalyticsError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AnalyticsError::Store(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for AnalyticsError {}

impl From<StoreError> for AnalyticsError {
    fn from(err: StoreError) -> Self {
        AnalyticsError::Store(err)
    }
}

/// Coarse volatility classification in percentage-return units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolatilityLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for VolatilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolatilityLevel::Low => write!(f, "Low"),
            VolatilityLevel::Medium => write!(f, "Medium"),
            VolatilityLevel::High => write!(f, "High"),
        }
    }
}

/// Classifies a returns standard deviation into a volatility level.
///
/// Fixed thresholds: `< 2` is Low, `< 5` is Medium, anything else High.
/// A stddev of exactly 2.0 is therefore Medium and exactly 5.0 is High.
pub fn classify_volatility(volatility: f64) -> VolatilityLevel {
    if volatility < 2.0 {
        VolatilityLevel::Low
    } else if volatility < 5.0 {
        VolatilityLevel::Medium
    } else {
        VolatilityLevel::High
    }
}

/// Volatility metrics over a recent window of observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityReport {
    pub product_name: String,
    /// Lookback window the report covers, in days
    pub period_days: i64,
    /// Population standard deviation of consecutive percentage returns
    pub volatility: f64,
    /// Population variance of the same returns
    pub variance: f64,
    /// Cumulative-sum drawdown over the windowed prices (see calculators)
    pub max_drawdown: f64,
    /// Highest minus lowest price in the window
    pub price_range: f64,
    /// Price range as a percentage of the window minimum
    pub price_range_percent: f64,
    pub level: VolatilityLevel,
    /// Observations that fell inside the window
    pub data_points: usize,
}

/// One trailing simple-moving-average series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovingAverageSeries {
    /// Window size in observations
    pub window: usize,
    /// One slot per observation; `None` before the window has filled
    pub values: Vec<Option<f64>>,
    /// Last defined value, if any
    pub latest: Option<f64>,
}

/// Crossover between the shortest- and longest-window moving averages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossoverSignal {
    /// Short MA above long MA (bullish)
    GoldenCross,
    /// Short MA at or below long MA (bearish)
    DeathCross,
}

impl fmt::Display for CrossoverSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrossoverSignal::GoldenCross => write!(f, "Golden Cross (Bullish)"),
            CrossoverSignal::DeathCross => write!(f, "Death Cross (Bearish)"),
        }
    }
}

/// Moving averages for a product, one series per qualifying window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovingAverageReport {
    pub product_name: String,
    pub current_price: f64,
    /// Only windows no larger than the available point count appear here
    pub series: Vec<MovingAverageSeries>,
    /// `None` unless both the smallest and largest requested windows
    /// produced a defined latest value
    pub crossover: Option<CrossoverSignal>,
}

/// Aggregated price statistics for one calendar bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalBucket {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
}

/// Calendar-bucketed price patterns for a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalReport {
    pub product_name: String,
    /// Keyed by calendar month, 1-12
    pub monthly: BTreeMap<u32, SeasonalBucket>,
    /// Keyed by weekday, 0 = Monday through 6 = Sunday
    pub weekday: BTreeMap<u32, SeasonalBucket>,
    /// Keyed by quarter, 1-4
    pub quarterly: BTreeMap<u32, SeasonalBucket>,
    /// Month with the lowest mean price (first month wins a tie)
    pub best_month: u32,
    /// Month with the highest mean price (first month wins a tie)
    pub worst_month: u32,
}

/// Direction of the fitted price trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    Increasing,
    Decreasing,
}

/// Confidence band for a prediction, derived from recent price spread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// One projected price point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedPoint {
    pub date: DateTime<Utc>,
    pub price: f64,
}

/// Linear trend projection for a product.
///
/// The fit is price against observation index, so the projection assumes
/// roughly uniform sampling intervals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionReport {
    pub product_name: String,
    pub days_ahead: usize,
    pub current_price: f64,
    /// Final projected price at the end of the horizon
    pub predicted_price: f64,
    pub predicted_change: f64,
    pub predicted_change_percent: f64,
    /// One projection per day, dates continuing from the last observation
    pub predictions: Vec<PredictedPoint>,
    pub trend: TrendDirection,
    pub slope: f64,
    pub confidence: Confidence,
    /// Population stddev of the last min(30, n) prices
    pub recent_volatility: f64,
}

/// Restricts a sequence to observations within the trailing `days_back`
/// window, measured from now.
pub(crate) fn recent_points(points: &[PricePoint], days_back: i64) -> Vec<PricePoint> {
    let cutoff = Utc::now() - Duration::days(days_back);
    points
        .iter()
        .filter(|p| p.recorded_at >= cutoff)
        .cloned()
        .collect()
}

pub(crate) fn ensure_positive_days(days_back: i64) -> Result<(), AnalyticsError> {
    if days_back <= 0 {
        return Err(AnalyticsError::InvalidInput(format!(
            "days_back must be positive, got {}",
            days_back
        )));
    }
    Ok(())
}

/// Trend and volatility analytics over a price store.
///
/// Holds a borrowed store handle; construct one per store (or per test)
/// rather than reaching for any shared global.
pub struct TrendAnalytics<'a, S: PriceStore> {
    store: &'a S,
}

impl<'a, S: PriceStore> TrendAnalytics<'a, S> {
    pub fn new(store: &'a S) -> Self {
        TrendAnalytics { store }
    }

    /// Volatility of consecutive percentage returns over the trailing
    /// `days_back` window.
    ///
    /// # Errors
    /// `InvalidInput` for a non-positive window; `InsufficientData` when
    /// fewer than 2 observations fall inside the window.
    pub fn volatility(
        &self,
        name: &str,
        days_back: i64,
    ) -> Result<VolatilityReport, AnalyticsError> {
        ensure_positive_days(days_back)?;
        let all = self.store.history(name, None)?;
        let windowed = recent_points(&all, days_back);
        if windowed.len() < 2 {
            return Err(AnalyticsError::InsufficientData {
                required: 2,
                available: windowed.len(),
            });
        }

        let prices: Vec<f64> = windowed.iter().map(|p| p.price).collect();
        let returns = percent_returns(&prices);
        let volatility = population_std_dev(&returns);
        let variance = population_variance(&returns);

        let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
        let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let price_range = max - min;
        let price_range_percent = if min > 0.0 {
            price_range / min * 100.0
        } else {
            0.0
        };

        Ok(VolatilityReport {
            product_name: name.to_string(),
            period_days: days_back,
            volatility,
            variance,
            max_drawdown: max_drawdown(&prices),
            price_range,
            price_range_percent,
            level: classify_volatility(volatility),
            data_points: windowed.len(),
        })
    }

    /// Trailing simple moving averages over the full history.
    ///
    /// Windows larger than the available point count are silently left
    /// out of the report; the crossover compares the smallest requested
    /// window's latest value against the largest requested window's.
    ///
    /// # Errors
    /// `InvalidInput` for an empty window list or a zero window;
    /// `InsufficientData` when the product has no observations.
    pub fn moving_averages(
        &self,
        name: &str,
        windows: &[usize],
    ) -> Result<MovingAverageReport, AnalyticsError> {
        if windows.is_empty() {
            return Err(AnalyticsError::InvalidInput(
                "At least one moving-average window is required".to_string(),
            ));
        }
        if windows.contains(&0) {
            return Err(AnalyticsError::InvalidInput(
                "Moving-average windows must be positive".to_string(),
            ));
        }

        let points = self.store.history(name, None)?;
        let current_price = match points.last() {
            Some(point) => point.price,
            None => {
                return Err(AnalyticsError::InsufficientData {
                    required: 1,
                    available: 0,
                })
            }
        };
        let prices: Vec<f64> = points.iter().map(|p| p.price).collect();

        let mut series = Vec::new();
        for &window in windows {
            if prices.len() >= window {
                let values = trailing_mean(&prices, window);
                let latest = values.last().copied().flatten();
                series.push(MovingAverageSeries {
                    window,
                    values,
                    latest,
                });
            }
        }

        let latest_of = |w: usize| {
            series
                .iter()
                .find(|s| s.window == w)
                .and_then(|s| s.latest)
        };
        let crossover = match (windows.iter().min(), windows.iter().max()) {
            (Some(&short), Some(&long)) if windows.len() >= 2 => {
                match (latest_of(short), latest_of(long)) {
                    (Some(short_ma), Some(long_ma)) => {
                        if short_ma > long_ma {
                            Some(CrossoverSignal::GoldenCross)
                        } else {
                            Some(CrossoverSignal::DeathCross)
                        }
                    }
                    _ => None,
                }
            }
            _ => None,
        };

        Ok(MovingAverageReport {
            product_name: name.to_string(),
            current_price,
            series,
            crossover,
        })
    }

    /// Calendar-bucketed seasonal patterns over the full history.
    ///
    /// # Errors
    /// `InsufficientData` when the product has no observations.
    pub fn seasonal_trends(&self, name: &str) -> Result<SeasonalReport, AnalyticsError> {
        let points = self.store.history(name, None)?;
        if points.is_empty() {
            return Err(AnalyticsError::InsufficientData {
                required: 1,
                available: 0,
            });
        }

        let mut by_month: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
        let mut by_weekday: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
        let mut by_quarter: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
        for point in &points {
            let month = point.recorded_at.month();
            let weekday = point.recorded_at.weekday().num_days_from_monday();
            let quarter = (month - 1) / 3 + 1;
            by_month.entry(month).or_default().push(point.price);
            by_weekday.entry(weekday).or_default().push(point.price);
            by_quarter.entry(quarter).or_default().push(point.price);
        }

        let monthly = bucketize(by_month);
        let weekday = bucketize(by_weekday);
        let quarterly = bucketize(by_quarter);

        // First month in ascending order wins ties on both ends.
        let mut best_month = 0;
        let mut worst_month = 0;
        let mut best_mean = f64::INFINITY;
        let mut worst_mean = f64::NEG_INFINITY;
        for (&month, bucket) in &monthly {
            if bucket.mean < best_mean {
                best_mean = bucket.mean;
                best_month = month;
            }
            if bucket.mean > worst_mean {
                worst_mean = bucket.mean;
                worst_month = month;
            }
        }

        Ok(SeasonalReport {
            product_name: name.to_string(),
            monthly,
            weekday,
            quarterly,
            best_month,
            worst_month,
        })
    }

    /// Projects the price `days_ahead` days out with an ordinary
    /// least-squares line fit against observation index.
    ///
    /// # Errors
    /// `InvalidInput` for a zero horizon; `InsufficientData` when fewer
    /// than 10 observations exist.
    pub fn predict_price(
        &self,
        name: &str,
        days_ahead: usize,
    ) -> Result<PredictionReport, AnalyticsError> {
        if days_ahead == 0 {
            return Err(AnalyticsError::InvalidInput(
                "days_ahead must be positive".to_string(),
            ));
        }
        let points = self.store.history(name, None)?;
        if points.len() < 10 {
            return Err(AnalyticsError::InsufficientData {
                required: 10,
                available: points.len(),
            });
        }

        let prices: Vec<f64> = points.iter().map(|p| p.price).collect();
        let (slope, intercept) = linear_fit(&prices);

        let last_date = points[points.len() - 1].recorded_at;
        let mut predictions = Vec::with_capacity(days_ahead);
        for day in 0..days_ahead {
            let index = (prices.len() + day) as f64;
            predictions.push(PredictedPoint {
                date: last_date + Duration::days(day as i64 + 1),
                price: slope * index + intercept,
            });
        }

        let current_price = prices[prices.len() - 1];
        let predicted_price = predictions[predictions.len() - 1].price;
        let predicted_change = predicted_price - current_price;
        let predicted_change_percent = if current_price != 0.0 {
            predicted_change / current_price * 100.0
        } else {
            0.0
        };

        let recent = &prices[prices.len() - prices.len().min(30)..];
        let recent_volatility = population_std_dev(recent);
        let confidence = if recent_volatility > current_price * 0.10 {
            Confidence::Low
        } else if recent_volatility > current_price * 0.05 {
            Confidence::Medium
        } else {
            Confidence::High
        };

        Ok(PredictionReport {
            product_name: name.to_string(),
            days_ahead,
            current_price,
            predicted_price,
            predicted_change,
            predicted_change_percent,
            predictions,
            trend: if slope > 0.0 {
                TrendDirection::Increasing
            } else {
                TrendDirection::Decreasing
            },
            slope,
            confidence,
            recent_volatility,
        })
    }
}

fn bucketize(groups: BTreeMap<u32, Vec<f64>>) -> BTreeMap<u32, SeasonalBucket> {
    groups
        .into_iter()
        .map(|(key, prices)| {
            let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
            let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            (
                key,
                SeasonalBucket {
                    mean: mean(&prices),
                    min,
                    max,
                    std_dev: population_std_dev(&prices),
                },
            )
        })
        .collect()
}
