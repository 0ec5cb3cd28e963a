//! Cross-product comparison, buy-timing analysis, and deal finding.

use crate::analytics::{ensure_positive_days, recent_points, AnalyticsError};
use crate::analytics::calculators::{mean, median};
use crate::price_series::{PricePoint, PriceStore};
use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// Default lookback for buy-timing and trend comparison, in days.
pub const DEFAULT_COMPARISON_WINDOW_DAYS: i64 = 30;
/// Default minimum discount for the deal finder, in percent.
pub const DEFAULT_MIN_DISCOUNT_PERCENT: f64 = 10.0;

/// One product's standing inside a cross-product comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub name: String,
    pub latest_price: f64,
    pub average_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    /// First-to-last percent change over the full history
    pub price_change_percent: f64,
    pub record_count: usize,
}

/// Aggregate view across every product that had data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub cheapest_product: String,
    pub cheapest_price: f64,
    pub most_expensive_product: String,
    pub most_expensive_price: f64,
    pub price_difference: f64,
    pub price_difference_percent: f64,
    /// Mean of the latest prices across the set
    pub average_price: f64,
    /// Median of the latest prices across the set
    pub median_price: f64,
}

/// Result of comparing several products by latest price.
///
/// Products with no observations are skipped rather than failing the
/// whole comparison; `summary` is `None` when nothing qualified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductComparison {
    pub products: Vec<ProductSnapshot>,
    pub summary: Option<ComparisonSummary>,
}

/// Per-weekday price pattern inside the analysis window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekdayPattern {
    pub mean: f64,
    pub min: f64,
    pub count: usize,
}

/// Buy-now recommendation bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuyRecommendation {
    /// Within 5% of the window minimum
    Excellent,
    /// At or below the window average
    Good,
    /// Within 110% of the window average
    Fair,
    /// Significantly above average
    Wait,
}

impl std::fmt::Display for BuyRecommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuyRecommendation::Excellent => {
                write!(f, "Excellent time to buy - price is near historical low")
            }
            BuyRecommendation::Good => write!(f, "Good time to buy - price is below average"),
            BuyRecommendation::Fair => {
                write!(f, "Fair time to buy - price is slightly above average")
            }
            BuyRecommendation::Wait => write!(
                f,
                "Wait for better price - current price is significantly above average"
            ),
        }
    }
}

/// Buy-timing analysis for one product over a trailing window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyTimingReport {
    pub product_name: String,
    pub period_days: i64,
    pub current_price: f64,
    pub minimum_price: f64,
    pub maximum_price: f64,
    pub average_price: f64,
    pub median_price: f64,
    /// First occurrence of the window minimum
    pub minimum_price_date: DateTime<Utc>,
    /// Current price relative to the minimum, in percent
    pub vs_minimum_percent: f64,
    /// Current price relative to the average, in percent
    pub vs_average_percent: f64,
    /// Current price within 5% of the window minimum
    pub is_near_minimum: bool,
    /// Keyed by weekday name ("Monday" .. "Sunday")
    pub weekday_patterns: BTreeMap<String, WeekdayPattern>,
    pub recommendation: BuyRecommendation,
}

/// Direction of a product's price movement over a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceTrend {
    /// More than 5% up over the window
    Increasing,
    /// More than 5% down over the window
    Decreasing,
    /// Within the +/-5% band
    Stable,
}

/// One product's price movement over a comparison window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    pub name: String,
    pub start_price: f64,
    pub end_price: f64,
    pub price_change: f64,
    pub price_change_percent: f64,
    pub direction: PriceTrend,
    pub data_points: usize,
}

/// A product whose max-to-current discount met the deal threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub product_name: String,
    pub current_price: f64,
    pub maximum_price: f64,
    pub discount_percent: f64,
    pub savings: f64,
}

/// Cross-product and cross-time comparison over a price store.
pub struct PriceComparer<'a, S: PriceStore> {
    store: &'a S,
}

impl<'a, S: PriceStore> PriceComparer<'a, S> {
    pub fn new(store: &'a S) -> Self {
        PriceComparer { store }
    }

    /// When-to-buy analysis over a trailing window, with a full-history
    /// fallback when the window has no observations.
    ///
    /// # Errors
    /// `InvalidInput` for a non-positive window; `InsufficientData` when
    /// the product has no observations at all.
    pub fn best_buy_time(
        &self,
        name: &str,
        days_back: i64,
    ) -> Result<BuyTimingReport, AnalyticsError> {
        ensure_positive_days(days_back)?;
        let all = self.store.history(name, None)?;
        if all.is_empty() {
            return Err(AnalyticsError::InsufficientData {
                required: 1,
                available: 0,
            });
        }

        let mut windowed = recent_points(&all, days_back);
        if windowed.is_empty() {
            windowed = all;
        }

        let prices: Vec<f64> = windowed.iter().map(|p| p.price).collect();
        let maximum_price = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let average_price = mean(&prices);
        let median_price = median(&prices);
        let current_price = prices[prices.len() - 1];

        // First occurrence of the window minimum, with its date.
        let mut min_point = &windowed[0];
        for point in &windowed[1..] {
            if point.price < min_point.price {
                min_point = point;
            }
        }
        let minimum_price = min_point.price;
        let minimum_price_date = min_point.recorded_at;

        let vs_minimum_percent = if minimum_price > 0.0 {
            (current_price - minimum_price) / minimum_price * 100.0
        } else {
            0.0
        };
        let vs_average_percent = if average_price > 0.0 {
            (current_price - average_price) / average_price * 100.0
        } else {
            0.0
        };

        let is_near_minimum = current_price <= minimum_price * 1.05;
        let recommendation = if is_near_minimum {
            BuyRecommendation::Excellent
        } else if current_price <= average_price {
            BuyRecommendation::Good
        } else if current_price <= average_price * 1.1 {
            BuyRecommendation::Fair
        } else {
            BuyRecommendation::Wait
        };

        Ok(BuyTimingReport {
            product_name: name.to_string(),
            period_days: days_back,
            current_price,
            minimum_price,
            maximum_price,
            average_price,
            median_price,
            minimum_price_date,
            vs_minimum_percent,
            vs_average_percent,
            is_near_minimum,
            weekday_patterns: weekday_patterns(&windowed),
            recommendation,
        })
    }

    /// Compares products by latest price. Products with no data are
    /// skipped; storage faults still propagate.
    pub fn compare_products(&self, names: &[&str]) -> Result<ProductComparison, AnalyticsError> {
        let mut products = Vec::new();

        for &name in names {
            let points = self.store.history(name, None)?;
            let stats = match self.store.statistics(name)? {
                Some(stats) => stats,
                None => continue,
            };
            products.push(ProductSnapshot {
                name: name.to_string(),
                latest_price: stats.last_price,
                average_price: stats.avg_price,
                min_price: stats.min_price,
                max_price: stats.max_price,
                price_change_percent: overall_change_percent(&points),
                record_count: stats.count,
            });
        }

        let cheapest = products.iter().min_by_key(|p| OrderedFloat(p.latest_price));
        let most_expensive = products.iter().max_by_key(|p| OrderedFloat(p.latest_price));
        let summary = if let (Some(cheapest), Some(most_expensive)) = (cheapest, most_expensive) {
            let difference = most_expensive.latest_price - cheapest.latest_price;
            let latest: Vec<f64> = products.iter().map(|p| p.latest_price).collect();
            Some(ComparisonSummary {
                cheapest_product: cheapest.name.clone(),
                cheapest_price: cheapest.latest_price,
                most_expensive_product: most_expensive.name.clone(),
                most_expensive_price: most_expensive.latest_price,
                price_difference: difference,
                price_difference_percent: if cheapest.latest_price > 0.0 {
                    difference / cheapest.latest_price * 100.0
                } else {
                    0.0
                },
                average_price: mean(&latest),
                median_price: median(&latest),
            })
        } else {
            None
        };

        Ok(ProductComparison { products, summary })
    }

    /// Price movement per product over a trailing window. Products with
    /// no observations inside the window are skipped.
    ///
    /// # Errors
    /// `InvalidInput` for a non-positive window.
    pub fn compare_trends(
        &self,
        names: &[&str],
        days_back: i64,
    ) -> Result<Vec<TrendSummary>, AnalyticsError> {
        ensure_positive_days(days_back)?;
        let mut trends = Vec::new();

        for &name in names {
            let all = self.store.history(name, None)?;
            let windowed = recent_points(&all, days_back);
            let (first, last) = match (windowed.first(), windowed.last()) {
                (Some(first), Some(last)) => (first, last),
                _ => continue,
            };

            let price_change = last.price - first.price;
            let price_change_percent = if first.price != 0.0 {
                price_change / first.price * 100.0
            } else {
                0.0
            };
            let direction = if price_change_percent < -5.0 {
                PriceTrend::Decreasing
            } else if price_change_percent > 5.0 {
                PriceTrend::Increasing
            } else {
                PriceTrend::Stable
            };

            trends.push(TrendSummary {
                name: name.to_string(),
                start_price: first.price,
                end_price: last.price,
                price_change,
                price_change_percent,
                direction,
                data_points: windowed.len(),
            });
        }

        Ok(trends)
    }

    /// Scans every tracked product for a max-to-current discount of at
    /// least `min_discount_percent`, sorted descending by discount.
    ///
    /// Products with fewer than 2 observations (or a zero maximum) are
    /// skipped.
    ///
    /// # Errors
    /// `InvalidInput` for a negative threshold.
    pub fn find_best_deals(
        &self,
        min_discount_percent: f64,
    ) -> Result<Vec<Deal>, AnalyticsError> {
        if min_discount_percent < 0.0 {
            return Err(AnalyticsError::InvalidInput(format!(
                "Discount threshold must be non-negative, got {}",
                min_discount_percent
            )));
        }

        let mut deals = Vec::new();
        for name in self.store.all_product_names()? {
            let points = self.store.history(&name, None)?;
            if points.len() < 2 {
                continue;
            }
            let max_price = points
                .iter()
                .map(|p| p.price)
                .fold(f64::NEG_INFINITY, f64::max);
            if max_price == 0.0 {
                continue;
            }
            let current_price = points[points.len() - 1].price;
            let discount_percent = (max_price - current_price) / max_price * 100.0;
            if discount_percent >= min_discount_percent {
                deals.push(Deal {
                    product_name: name,
                    current_price,
                    maximum_price: max_price,
                    discount_percent,
                    savings: max_price - current_price,
                });
            }
        }

        deals.sort_by_key(|d| Reverse(OrderedFloat(d.discount_percent)));
        Ok(deals)
    }
}

fn overall_change_percent(points: &[PricePoint]) -> f64 {
    let (first, last) = match (points.first(), points.last()) {
        (Some(first), Some(last)) if points.len() >= 2 => (first, last),
        _ => return 0.0,
    };
    if first.price == 0.0 {
        return 0.0;
    }
    (last.price - first.price) / first.price * 100.0
}

fn weekday_patterns(points: &[PricePoint]) -> BTreeMap<String, WeekdayPattern> {
    let mut grouped: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for point in points {
        grouped
            .entry(point.recorded_at.format("%A").to_string())
            .or_default()
            .push(point.price);
    }
    grouped
        .into_iter()
        .map(|(day, prices)| {
            let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
            (
                day,
                WeekdayPattern {
                    mean: mean(&prices),
                    min,
                    count: prices.len(),
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price_series::InMemoryPriceStore;
    use chrono::Duration;

    fn days_ago(days: i64) -> DateTime<Utc> {
        Utc::now() - Duration::days(days)
    }

    fn seed(store: &InMemoryPriceStore, name: &str, points: &[(i64, f64)]) {
        store.upsert_product(name, "https://shop.example/item").unwrap();
        for &(days, price) in points {
            store
                .append_observation(name, price, None, Some(days_ago(days)))
                .unwrap();
        }
    }

    #[test]
    fn test_buy_recommendation_bands() {
        let store = InMemoryPriceStore::new();
        // window stats: min 100, avg 110 over [100, 120, current]
        seed(&store, "Excellent", &[(5, 100.0), (4, 120.0), (1, 102.0)]);
        seed(&store, "Good", &[(5, 100.0), (4, 120.0), (1, 107.0)]);
        seed(&store, "Fair", &[(5, 100.0), (4, 120.0), (1, 115.0)]);
        seed(&store, "Wait", &[(5, 100.0), (4, 120.0), (1, 140.0)]);

        let comparer = PriceComparer::new(&store);
        let rec = |name| {
            comparer
                .best_buy_time(name, DEFAULT_COMPARISON_WINDOW_DAYS)
                .unwrap()
                .recommendation
        };
        assert_eq!(rec("Excellent"), BuyRecommendation::Excellent);
        assert_eq!(rec("Good"), BuyRecommendation::Good);
        assert_eq!(rec("Fair"), BuyRecommendation::Fair);
        assert_eq!(rec("Wait"), BuyRecommendation::Wait);
    }

    #[test]
    fn test_buy_time_statistics_and_near_minimum_flag() {
        let store = InMemoryPriceStore::new();
        seed(&store, "Widget", &[(4, 100.0), (3, 80.0), (2, 120.0), (1, 82.0)]);
        let report = PriceComparer::new(&store)
            .best_buy_time("Widget", 30)
            .unwrap();

        assert_eq!(report.minimum_price, 80.0);
        assert_eq!(report.maximum_price, 120.0);
        assert!((report.average_price - 95.5).abs() < 1e-9);
        assert!((report.median_price - 91.0).abs() < 1e-9);
        assert!(report.is_near_minimum); // 82 <= 80 * 1.05
        assert_eq!(report.recommendation, BuyRecommendation::Excellent);
        assert!(!report.weekday_patterns.is_empty());
        let total: usize = report.weekday_patterns.values().map(|p| p.count).sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn test_buy_time_requires_data() {
        let store = InMemoryPriceStore::new();
        store.upsert_product("Empty", "u").unwrap();
        let result = PriceComparer::new(&store).best_buy_time("Empty", 30);
        assert!(matches!(
            result,
            Err(AnalyticsError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_compare_products_skips_empty_and_summarizes() {
        let store = InMemoryPriceStore::new();
        seed(&store, "Cheap", &[(2, 50.0), (1, 40.0)]);
        seed(&store, "Pricey", &[(2, 90.0), (1, 100.0)]);
        store.upsert_product("NoData", "u").unwrap();

        let comparison = PriceComparer::new(&store)
            .compare_products(&["Cheap", "Pricey", "NoData", "Unknown"])
            .unwrap();

        assert_eq!(comparison.products.len(), 2);
        let summary = comparison.summary.unwrap();
        assert_eq!(summary.cheapest_product, "Cheap");
        assert_eq!(summary.cheapest_price, 40.0);
        assert_eq!(summary.most_expensive_product, "Pricey");
        assert_eq!(summary.price_difference, 60.0);
        assert!((summary.price_difference_percent - 150.0).abs() < 1e-9);
        assert!((summary.average_price - 70.0).abs() < 1e-9);
        assert!((summary.median_price - 70.0).abs() < 1e-9);

        let cheap = &comparison.products[0];
        assert!((cheap.price_change_percent - -20.0).abs() < 1e-9);
    }

    #[test]
    fn test_compare_products_all_empty_has_no_summary() {
        let store = InMemoryPriceStore::new();
        let comparison = PriceComparer::new(&store)
            .compare_products(&["A", "B"])
            .unwrap();
        assert!(comparison.products.is_empty());
        assert!(comparison.summary.is_none());
    }

    #[test]
    fn test_compare_trends_directions() {
        let store = InMemoryPriceStore::new();
        seed(&store, "Up", &[(5, 100.0), (1, 110.0)]);
        seed(&store, "Down", &[(5, 100.0), (1, 90.0)]);
        seed(&store, "Flat", &[(5, 100.0), (1, 102.0)]);

        let trends = PriceComparer::new(&store)
            .compare_trends(&["Up", "Down", "Flat", "Missing"], 30)
            .unwrap();

        assert_eq!(trends.len(), 3);
        assert_eq!(trends[0].direction, PriceTrend::Increasing);
        assert_eq!(trends[1].direction, PriceTrend::Decreasing);
        assert_eq!(trends[2].direction, PriceTrend::Stable);
        assert_eq!(trends[0].data_points, 2);
    }

    #[test]
    fn test_deal_finder_threshold() {
        let store = InMemoryPriceStore::new();
        // A: 20% off its max; B: only 5% off
        seed(&store, "A", &[(2, 100.0), (1, 80.0)]);
        seed(&store, "B", &[(2, 100.0), (1, 95.0)]);

        let deals = PriceComparer::new(&store)
            .find_best_deals(DEFAULT_MIN_DISCOUNT_PERCENT)
            .unwrap();

        assert_eq!(deals.len(), 1);
        assert_eq!(deals[0].product_name, "A");
        assert!((deals[0].discount_percent - 20.0).abs() < 1e-9);
        assert_eq!(deals[0].savings, 20.0);
    }

    #[test]
    fn test_deal_finder_sorts_descending() {
        let store = InMemoryPriceStore::new();
        seed(&store, "Small", &[(2, 100.0), (1, 85.0)]);
        seed(&store, "Big", &[(2, 100.0), (1, 50.0)]);
        seed(&store, "Single", &[(1, 10.0)]); // skipped, one observation

        let deals = PriceComparer::new(&store).find_best_deals(10.0).unwrap();
        let names: Vec<&str> = deals.iter().map(|d| d.product_name.as_str()).collect();
        assert_eq!(names, vec!["Big", "Small"]);
    }

    #[test]
    fn test_deal_finder_rejects_negative_threshold() {
        let store = InMemoryPriceStore::new();
        let result = PriceComparer::new(&store).find_best_deals(-1.0);
        assert!(matches!(result, Err(AnalyticsError::InvalidInput(_))));
    }
}
