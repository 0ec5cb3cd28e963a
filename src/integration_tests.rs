// Integration tests for end-to-end workflows across the store and the
// analytics engines.

#[cfg(test)]
mod integration_tests {
    use crate::analytics::TrendAnalytics;
    use crate::comparison::PriceComparer;
    use crate::discounts::DiscountTracker;
    use crate::price_series::{InMemoryPriceStore, PriceStore};
    use crate::sqlite_store::SqlitePriceStore;
    use chrono::{DateTime, Duration, Utc};

    fn days_ago(days: i64) -> DateTime<Utc> {
        Utc::now() - Duration::days(days)
    }

    /// The canonical scenario: register "Widget", record 100 -> 90 -> 95,
    /// then check every engine agrees on what happened.
    fn run_widget_scenario<S: PriceStore>(store: &S) {
        store
            .upsert_product("Widget", "https://shop.example/widget")
            .unwrap();
        store
            .append_observation("Widget", 100.0, None, Some(days_ago(3)))
            .unwrap();
        store
            .append_observation("Widget", 90.0, None, Some(days_ago(2)))
            .unwrap();
        store
            .append_observation("Widget", 95.0, None, Some(days_ago(1)))
            .unwrap();

        assert_eq!(store.latest_price("Widget").unwrap(), Some(95.0));

        let stats = store.statistics("Widget").unwrap().unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.min_price, 90.0);
        assert_eq!(stats.max_price, 100.0);

        let drops = DiscountTracker::new(store)
            .price_drops("Widget", 30)
            .unwrap();
        assert_eq!(drops.len(), 1);
        assert_eq!(drops[0].previous_price, 100.0);
        assert_eq!(drops[0].new_price, 90.0);
        assert!((drops[0].drop_percent - 10.0).abs() < 1e-9);

        let discount = DiscountTracker::new(store)
            .current_discount("Widget")
            .unwrap();
        assert!((discount.discount_from_max_percent - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_widget_scenario_in_memory() {
        let store = InMemoryPriceStore::new();
        run_widget_scenario(&store);
    }

    #[test]
    fn test_widget_scenario_sqlite() {
        let store = SqlitePriceStore::open_in_memory().unwrap();
        run_widget_scenario(&store);
    }

    #[test]
    fn test_both_stores_agree_on_analytics() {
        let in_memory = InMemoryPriceStore::new();
        let sqlite = SqlitePriceStore::open_in_memory().unwrap();

        let prices = [120.0, 118.0, 122.0, 117.0, 119.0, 116.0, 121.0, 115.0];
        for store in [&in_memory as &dyn PriceStore, &sqlite as &dyn PriceStore] {
            for (i, &price) in prices.iter().enumerate() {
                store
                    .append_observation(
                        "Gadget",
                        price,
                        Some("https://shop.example/gadget"),
                        Some(days_ago(prices.len() as i64 - i as i64)),
                    )
                    .unwrap();
            }
        }

        let vol_mem = TrendAnalytics::new(&in_memory)
            .volatility("Gadget", 30)
            .unwrap();
        let vol_sql = TrendAnalytics::new(&sqlite)
            .volatility("Gadget", 30)
            .unwrap();
        assert!((vol_mem.volatility - vol_sql.volatility).abs() < 1e-9);
        assert_eq!(vol_mem.level, vol_sql.level);
        assert_eq!(vol_mem.data_points, vol_sql.data_points);

        let ma_mem = TrendAnalytics::new(&in_memory)
            .moving_averages("Gadget", &[2, 4])
            .unwrap();
        let ma_sql = TrendAnalytics::new(&sqlite)
            .moving_averages("Gadget", &[2, 4])
            .unwrap();
        assert_eq!(ma_mem.crossover, ma_sql.crossover);
        assert_eq!(ma_mem.series.len(), ma_sql.series.len());
    }

    #[test]
    fn test_deal_finder_across_store_population() {
        let store = InMemoryPriceStore::new();
        for (name, old, new) in [("A", 100.0, 80.0), ("B", 100.0, 95.0), ("C", 200.0, 150.0)] {
            store
                .append_observation(name, old, Some("https://shop.example"), Some(days_ago(2)))
                .unwrap();
            store
                .append_observation(name, new, None, Some(days_ago(1)))
                .unwrap();
        }

        let deals = PriceComparer::new(&store).find_best_deals(10.0).unwrap();
        let names: Vec<&str> = deals.iter().map(|d| d.product_name.as_str()).collect();
        // C is 25% off, A is 20% off, B misses the threshold
        assert_eq!(names, vec!["C", "A"]);
    }

    #[test]
    fn test_full_pipeline_on_single_store() {
        let store = SqlitePriceStore::open_in_memory().unwrap();
        let base_prices: Vec<f64> = (0..15).map(|i| 100.0 - i as f64 * 0.5).collect();
        for (i, &price) in base_prices.iter().enumerate() {
            store
                .append_observation(
                    "Laptop",
                    price,
                    Some("https://shop.example/laptop"),
                    Some(days_ago(15 - i as i64)),
                )
                .unwrap();
        }

        // Prediction sees the declining line
        let prediction = TrendAnalytics::new(&store).predict_price("Laptop", 7).unwrap();
        assert!(prediction.slope < 0.0);

        // Buy-timing sees the current price sitting at the minimum
        let timing = PriceComparer::new(&store).best_buy_time("Laptop", 30).unwrap();
        assert!(timing.is_near_minimum);

        // Deleting the product empties everything
        assert!(store.delete_product("Laptop").unwrap());
        assert_eq!(store.store_info().unwrap().observation_count, 0);
    }
}
