//! Discount tracking: current discount, price-drop events, and the best
//! discount ever observed for a product.

use crate::analytics::{ensure_positive_days, recent_points, AnalyticsError};
use crate::analytics::calculators::mean;
use crate::price_series::{PricePoint, PriceStore};
use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

/// Default lookback for price-drop scanning, in days.
pub const DEFAULT_DROP_WINDOW_DAYS: i64 = 30;

/// Where the current price sits relative to the product's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountReport {
    pub product_name: String,
    pub current_price: f64,
    pub maximum_price: f64,
    pub minimum_price: f64,
    pub average_price: f64,
    /// Percent below the historical maximum
    pub discount_from_max_percent: f64,
    /// Percent below the historical average (negative when above it)
    pub discount_from_avg_percent: f64,
    pub savings_from_max: f64,
    pub savings_from_avg: f64,
    pub is_lowest_price: bool,
    pub is_below_average: bool,
}

/// One price decrease between consecutive observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceDropEvent {
    /// Timestamp of the lower observation
    pub date: DateTime<Utc>,
    pub previous_price: f64,
    pub new_price: f64,
    pub drop_amount: f64,
    pub drop_percent: f64,
}

/// The single best discount in the product's recorded history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestDiscountReport {
    pub product_name: String,
    /// Lowest price ever observed, with its first occurrence
    pub best_price: f64,
    pub best_price_date: DateTime<Utc>,
    /// Highest price ever observed, with its first occurrence
    pub highest_price: f64,
    pub highest_price_date: DateTime<Utc>,
    /// Percent spread from the maximum down to the minimum
    pub best_discount_percent: f64,
    pub potential_savings: f64,
}

/// Discount analytics over a price store.
pub struct DiscountTracker<'a, S: PriceStore> {
    store: &'a S,
}

impl<'a, S: PriceStore> DiscountTracker<'a, S> {
    pub fn new(store: &'a S) -> Self {
        DiscountTracker { store }
    }

    /// Current discount relative to the product's full history.
    ///
    /// # Errors
    /// `InsufficientData` when fewer than 2 observations exist.
    pub fn current_discount(&self, name: &str) -> Result<DiscountReport, AnalyticsError> {
        let points = self.store.history(name, None)?;
        if points.len() < 2 {
            return Err(AnalyticsError::InsufficientData {
                required: 2,
                available: points.len(),
            });
        }

        let prices: Vec<f64> = points.iter().map(|p| p.price).collect();
        let max_price = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min_price = prices.iter().copied().fold(f64::INFINITY, f64::min);
        let avg_price = mean(&prices);
        let current_price = prices[prices.len() - 1];

        let discount_from_max = if max_price > 0.0 {
            (max_price - current_price) / max_price * 100.0
        } else {
            0.0
        };
        let discount_from_avg = if avg_price > 0.0 {
            (avg_price - current_price) / avg_price * 100.0
        } else {
            0.0
        };

        Ok(DiscountReport {
            product_name: name.to_string(),
            current_price,
            maximum_price: max_price,
            minimum_price: min_price,
            average_price: avg_price,
            discount_from_max_percent: discount_from_max,
            discount_from_avg_percent: discount_from_avg,
            savings_from_max: max_price - current_price,
            savings_from_avg: avg_price - current_price,
            is_lowest_price: current_price == min_price,
            is_below_average: current_price < avg_price,
        })
    }

    /// Price drops between consecutive observations inside the trailing
    /// window, sorted descending by absolute drop amount (NOT
    /// chronologically; re-sort by `date` if needed).
    ///
    /// Fewer than 2 observations yields an empty list. When the window
    /// filter leaves nothing, the scan falls back to the full history.
    ///
    /// # Errors
    /// `InvalidInput` for a non-positive window.
    pub fn price_drops(
        &self,
        name: &str,
        days_back: i64,
    ) -> Result<Vec<PriceDropEvent>, AnalyticsError> {
        ensure_positive_days(days_back)?;
        let all = self.store.history(name, None)?;
        if all.len() < 2 {
            return Ok(Vec::new());
        }

        let mut windowed = recent_points(&all, days_back);
        if windowed.is_empty() {
            windowed = all;
        }

        let mut drops = Vec::new();
        for pair in windowed.windows(2) {
            let (prev, curr) = (&pair[0], &pair[1]);
            if curr.price < prev.price {
                let drop_amount = prev.price - curr.price;
                drops.push(PriceDropEvent {
                    date: curr.recorded_at,
                    previous_price: prev.price,
                    new_price: curr.price,
                    drop_amount,
                    drop_percent: drop_amount / prev.price * 100.0,
                });
            }
        }

        drops.sort_by_key(|d| Reverse(OrderedFloat(d.drop_amount)));
        Ok(drops)
    }

    /// Historical minimum and maximum with the percent spread between
    /// them — the best discount ever observed.
    ///
    /// # Errors
    /// `InsufficientData` when the product has no observations.
    pub fn best_discount_period(&self, name: &str) -> Result<BestDiscountReport, AnalyticsError> {
        let points = self.store.history(name, None)?;
        if points.is_empty() {
            return Err(AnalyticsError::InsufficientData {
                required: 1,
                available: 0,
            });
        }

        let min_point = first_extreme(&points, |a, b| a < b);
        let max_point = first_extreme(&points, |a, b| a > b);

        let best_discount = if max_point.price > 0.0 {
            (max_point.price - min_point.price) / max_point.price * 100.0
        } else {
            0.0
        };

        Ok(BestDiscountReport {
            product_name: name.to_string(),
            best_price: min_point.price,
            best_price_date: min_point.recorded_at,
            highest_price: max_point.price,
            highest_price_date: max_point.recorded_at,
            best_discount_percent: best_discount,
            potential_savings: max_point.price - min_point.price,
        })
    }
}

/// Chronologically first occurrence of the extreme price under `better`.
fn first_extreme(points: &[PricePoint], better: fn(f64, f64) -> bool) -> &PricePoint {
    let mut extreme = &points[0];
    for point in &points[1..] {
        if better(point.price, extreme.price) {
            extreme = point;
        }
    }
    extreme
}
