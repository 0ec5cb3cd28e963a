use crate::analytics::calculators::{mean, population_std_dev};
use crate::price_series::PricePoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Descriptive statistics derived from a product's observation sequence.
///
/// Ephemeral: computed on demand, never persisted. Standard deviation
/// uses the population divisor (N), the same convention the volatility
/// engine uses for returns, so the two never disagree on a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceStatistics {
    /// Number of observations
    pub count: usize,
    /// Lowest observed price
    pub min_price: f64,
    /// Highest observed price
    pub max_price: f64,
    /// Arithmetic mean of all observed prices
    pub avg_price: f64,
    /// Population standard deviation of all observed prices
    pub std_price: f64,
    /// Earliest observation's price
    pub first_price: f64,
    /// Newest observation's price
    pub last_price: f64,
    /// Earliest observation's timestamp
    pub first_date: DateTime<Utc>,
    /// Newest observation's timestamp
    pub last_date: DateTime<Utc>,
}

impl PriceStatistics {
    /// Computes statistics over an observation sequence already sorted
    /// ascending by timestamp.
    ///
    /// Returns `None` for an empty sequence — "no data" is an explicit
    /// state, never a row of NaN defaults. A singleton sequence yields
    /// min = max = mean = that price with a standard deviation of 0.
    pub fn from_points(points: &[PricePoint]) -> Option<Self> {
        let first = points.first()?;
        let last = points.last()?;

        let prices: Vec<f64> = points.iter().map(|p| p.price).collect();
        let min_price = prices.iter().copied().fold(f64::INFINITY, f64::min);
        let max_price = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Some(PriceStatistics {
            count: points.len(),
            min_price,
            max_price,
            avg_price: mean(&prices),
            std_price: population_std_dev(&prices),
            first_price: first.price,
            last_price: last.price,
            first_date: first.recorded_at,
            last_date: last.recorded_at,
        })
    }
}
