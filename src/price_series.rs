use crate::product::{validate_product_name, ProductRecord};
use crate::statistics::PriceStatistics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;

/// A single price observation for a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Timestamp of the observation
    pub recorded_at: DateTime<Utc>,
    /// Observed price in a single currency unit
    pub price: f64,
}

impl PricePoint {
    /// Creates a new PricePoint.
    pub fn new(recorded_at: DateTime<Utc>, price: f64) -> Self {
        PricePoint { recorded_at, price }
    }
}

/// Errors that can occur at the storage layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Operation referenced a product name that has never been registered
    ProductNotFound(String),
    /// Caller supplied an invalid argument (empty name, negative price)
    InvalidInput(String),
    /// I/O or corruption fault in the persistence layer
    Storage(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::ProductNotFound(name) => write!(f, "Product not found: {}", name),
            StoreError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            StoreError::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<crate::product::ProductNameError> for StoreError {
    fn from(err: crate::product::ProductNameError) -> Self {
        StoreError::InvalidInput(err.to_string())
    }
}

/// Trait for the durable price-history store.
///
/// Keyed by product name (the natural key). Observations are append-only:
/// they are never edited in place, and are only removed by a retention
/// sweep or a cascading product deletion.
///
/// Implementations can be:
/// - In-memory (for testing and embedding)
/// - SQLite database
/// - Any other relational backend
///
/// "Product has no data yet" is a normal state: `latest_price` and
/// `history` report it as `None`/empty rather than an error. Storage
/// faults always surface as `StoreError::Storage` and are never masked
/// by empty results.
pub trait PriceStore {
    /// Registers a product, or returns the existing id if the name is
    /// already present. Idempotent: repeat calls (even with a different
    /// URL) return the same id and leave the stored URL untouched.
    ///
    /// # Errors
    /// Returns `StoreError::InvalidInput` for an empty name.
    fn upsert_product(&self, name: &str, url: &str) -> Result<i64, StoreError>;

    /// Appends one price observation for a product.
    ///
    /// If the product is unknown and `url` is supplied, the product is
    /// registered first, so call sites that always know the URL never
    /// need a separate `upsert_product`. If the product is unknown and no
    /// URL is supplied, fails with `ProductNotFound`. `recorded_at`
    /// defaults to now. Refreshes the product's `updated_at` to the
    /// observation timestamp.
    ///
    /// # Errors
    /// `ProductNotFound` as above; `InvalidInput` for an empty name or a
    /// negative price.
    fn append_observation(
        &self,
        name: &str,
        price: f64,
        url: Option<&str>,
        recorded_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    /// Price of the newest observation, or `None` if the product is
    /// unknown or has no observations yet.
    fn latest_price(&self, name: &str) -> Result<Option<f64>, StoreError>;

    /// Full observation sequence in ascending `recorded_at` order, ties
    /// broken by insertion order.
    ///
    /// `limit` truncates to the OLDEST `n` observations (a `LIMIT` on the
    /// ascending query), which keeps pagination deterministic. An unknown
    /// product yields an empty vector.
    fn history(&self, name: &str, limit: Option<usize>) -> Result<Vec<PricePoint>, StoreError>;

    /// Looks up a single product record by name.
    fn product(&self, name: &str) -> Result<Option<ProductRecord>, StoreError>;

    /// All product names, sorted.
    fn all_product_names(&self) -> Result<Vec<String>, StoreError>;

    /// All product records, in registration order.
    fn all_products(&self) -> Result<Vec<ProductRecord>, StoreError>;

    /// Deletes a product and all of its observations. Returns `false`
    /// if the product was not found.
    fn delete_product(&self, name: &str) -> Result<bool, StoreError>;

    /// Retention sweep: deletes observations strictly older than
    /// `cutoff` across all products. Returns the number deleted.
    fn purge_observations_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;

    /// Descriptive statistics over the product's full history, or `None`
    /// when there are no observations.
    fn statistics(&self, name: &str) -> Result<Option<PriceStatistics>, StoreError> {
        let points = self.history(name, None)?;
        Ok(PriceStatistics::from_points(&points))
    }
}

#[derive(Debug, Clone)]
struct StoredProduct {
    record: ProductRecord,
    points: Vec<PricePoint>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    products: Vec<StoredProduct>,
}

/// In-memory price store implementation for testing and embedding.
///
/// Keeps every product's observations sorted by `recorded_at` (insertion
/// order within equal timestamps). Single-threaded by construction; the
/// SQLite store is the one to share between worker handles.
#[derive(Debug)]
pub struct InMemoryPriceStore {
    inner: RefCell<Inner>,
}

impl InMemoryPriceStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        InMemoryPriceStore {
            inner: RefCell::new(Inner {
                next_id: 1,
                products: Vec::new(),
            }),
        }
    }
}

impl Default for InMemoryPriceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn find(&self, name: &str) -> Option<usize> {
        self.products.iter().position(|p| p.record.name == name)
    }

    fn register(&mut self, name: &str, url: &str, at: DateTime<Utc>) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        self.products.push(StoredProduct {
            record: ProductRecord {
                id,
                name: name.to_string(),
                url: url.to_string(),
                created_at: at,
                updated_at: at,
            },
            points: Vec::new(),
        });
        self.products.len() - 1
    }
}

impl PriceStore for InMemoryPriceStore {
    fn upsert_product(&self, name: &str, url: &str) -> Result<i64, StoreError> {
        validate_product_name(name)?;
        let mut inner = self.inner.borrow_mut();
        if let Some(idx) = inner.find(name) {
            return Ok(inner.products[idx].record.id);
        }
        let idx = inner.register(name, url, Utc::now());
        Ok(inner.products[idx].record.id)
    }

    fn append_observation(
        &self,
        name: &str,
        price: f64,
        url: Option<&str>,
        recorded_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        validate_product_name(name)?;
        if price < 0.0 {
            return Err(StoreError::InvalidInput(format!(
                "Price must be non-negative, got {}",
                price
            )));
        }
        let at = recorded_at.unwrap_or_else(Utc::now);

        let mut inner = self.inner.borrow_mut();
        let idx = match inner.find(name) {
            Some(idx) => idx,
            None => match url {
                Some(url) => inner.register(name, url, at),
                None => return Err(StoreError::ProductNotFound(name.to_string())),
            },
        };

        let product = &mut inner.products[idx];
        // Keep ascending order with ties resolved by insertion order.
        let pos = product
            .points
            .partition_point(|p| p.recorded_at <= at);
        product.points.insert(pos, PricePoint::new(at, price));
        product.record.updated_at = at;
        Ok(())
    }

    fn latest_price(&self, name: &str) -> Result<Option<f64>, StoreError> {
        let inner = self.inner.borrow();
        Ok(inner
            .find(name)
            .and_then(|idx| inner.products[idx].points.last())
            .map(|p| p.price))
    }

    fn history(&self, name: &str, limit: Option<usize>) -> Result<Vec<PricePoint>, StoreError> {
        let inner = self.inner.borrow();
        let points = match inner.find(name) {
            Some(idx) => &inner.products[idx].points,
            None => return Ok(Vec::new()),
        };
        let take = limit.unwrap_or(points.len()).min(points.len());
        Ok(points[..take].to_vec())
    }

    fn product(&self, name: &str) -> Result<Option<ProductRecord>, StoreError> {
        let inner = self.inner.borrow();
        Ok(inner.find(name).map(|idx| inner.products[idx].record.clone()))
    }

    fn all_product_names(&self) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.borrow();
        let mut names: Vec<String> = inner
            .products
            .iter()
            .map(|p| p.record.name.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    fn all_products(&self) -> Result<Vec<ProductRecord>, StoreError> {
        let inner = self.inner.borrow();
        Ok(inner.products.iter().map(|p| p.record.clone()).collect())
    }

    fn delete_product(&self, name: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.borrow_mut();
        match inner.find(name) {
            Some(idx) => {
                inner.products.remove(idx);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn purge_observations_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut inner = self.inner.borrow_mut();
        let mut deleted = 0;
        for product in inner.products.iter_mut() {
            let before = product.points.len();
            product.points.retain(|p| p.recorded_at >= cutoff);
            deleted += before - product.points.len();
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_upsert_product_is_idempotent() {
        let store = InMemoryPriceStore::new();
        let id1 = store.upsert_product("Widget", "https://a.example/w").unwrap();
        let id2 = store.upsert_product("Widget", "https://b.example/w").unwrap();
        assert_eq!(id1, id2);
        // First URL wins
        let record = store.product("Widget").unwrap().unwrap();
        assert_eq!(record.url, "https://a.example/w");
    }

    #[test]
    fn test_empty_name_rejected() {
        let store = InMemoryPriceStore::new();
        let result = store.upsert_product("  ", "https://a.example");
        assert!(matches!(result, Err(StoreError::InvalidInput(_))));
    }

    #[test]
    fn test_append_requires_url_for_unknown_product() {
        let store = InMemoryPriceStore::new();
        let result = store.append_observation("Ghost", 10.0, None, None);
        assert_eq!(result, Err(StoreError::ProductNotFound("Ghost".to_string())));
    }

    #[test]
    fn test_append_auto_registers_with_url() {
        let store = InMemoryPriceStore::new();
        store
            .append_observation("Widget", 99.0, Some("https://a.example/w"), None)
            .unwrap();
        assert_eq!(store.latest_price("Widget").unwrap(), Some(99.0));
        assert_eq!(
            store.product("Widget").unwrap().unwrap().url,
            "https://a.example/w"
        );
    }

    #[test]
    fn test_negative_price_rejected() {
        let store = InMemoryPriceStore::new();
        store.upsert_product("Widget", "u").unwrap();
        let result = store.append_observation("Widget", -1.0, None, None);
        assert!(matches!(result, Err(StoreError::InvalidInput(_))));
    }

    #[test]
    fn test_history_is_chronological_for_out_of_order_appends() {
        let store = InMemoryPriceStore::new();
        store.upsert_product("Widget", "u").unwrap();
        store
            .append_observation("Widget", 3.0, None, Some(ts(3, 0)))
            .unwrap();
        store
            .append_observation("Widget", 1.0, None, Some(ts(1, 0)))
            .unwrap();
        store
            .append_observation("Widget", 2.0, None, Some(ts(2, 0)))
            .unwrap();

        let history = store.history("Widget", None).unwrap();
        let prices: Vec<f64> = history.iter().map(|p| p.price).collect();
        assert_eq!(prices, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_equal_timestamps_keep_insertion_order() {
        let store = InMemoryPriceStore::new();
        store.upsert_product("Widget", "u").unwrap();
        let same = ts(5, 12);
        store.append_observation("Widget", 10.0, None, Some(same)).unwrap();
        store.append_observation("Widget", 20.0, None, Some(same)).unwrap();

        let history = store.history("Widget", None).unwrap();
        let prices: Vec<f64> = history.iter().map(|p| p.price).collect();
        assert_eq!(prices, vec![10.0, 20.0]);
        assert_eq!(store.latest_price("Widget").unwrap(), Some(20.0));
    }

    #[test]
    fn test_history_limit_truncates_to_oldest() {
        let store = InMemoryPriceStore::new();
        store.upsert_product("Widget", "u").unwrap();
        for day in 1..=5 {
            store
                .append_observation("Widget", day as f64, None, Some(ts(day, 0)))
                .unwrap();
        }
        let history = store.history("Widget", Some(2)).unwrap();
        let prices: Vec<f64> = history.iter().map(|p| p.price).collect();
        assert_eq!(prices, vec![1.0, 2.0]);
    }

    #[test]
    fn test_history_for_unknown_product_is_empty() {
        let store = InMemoryPriceStore::new();
        assert!(store.history("Ghost", None).unwrap().is_empty());
        assert_eq!(store.latest_price("Ghost").unwrap(), None);
    }

    #[test]
    fn test_append_refreshes_updated_at() {
        let store = InMemoryPriceStore::new();
        store.upsert_product("Widget", "u").unwrap();
        let at = ts(9, 8);
        store.append_observation("Widget", 42.0, None, Some(at)).unwrap();
        assert_eq!(store.product("Widget").unwrap().unwrap().updated_at, at);
    }

    #[test]
    fn test_delete_product_cascades() {
        let store = InMemoryPriceStore::new();
        store.upsert_product("Widget", "u").unwrap();
        store.append_observation("Widget", 1.0, None, None).unwrap();

        assert!(store.delete_product("Widget").unwrap());
        assert!(store.history("Widget", None).unwrap().is_empty());
        assert!(store.product("Widget").unwrap().is_none());
        assert!(!store.delete_product("Widget").unwrap());
    }

    #[test]
    fn test_purge_deletes_only_older_records() {
        let store = InMemoryPriceStore::new();
        store.upsert_product("Widget", "u").unwrap();
        let cutoff = ts(10, 0);
        store
            .append_observation("Widget", 1.0, None, Some(cutoff - Duration::days(2)))
            .unwrap();
        store
            .append_observation("Widget", 2.0, None, Some(cutoff))
            .unwrap();
        store
            .append_observation("Widget", 3.0, None, Some(cutoff + Duration::days(1)))
            .unwrap();

        let deleted = store.purge_observations_before(cutoff).unwrap();
        assert_eq!(deleted, 1);
        let prices: Vec<f64> = store
            .history("Widget", None)
            .unwrap()
            .iter()
            .map(|p| p.price)
            .collect();
        assert_eq!(prices, vec![2.0, 3.0]);
    }

    #[test]
    fn test_all_product_names_sorted() {
        let store = InMemoryPriceStore::new();
        store.upsert_product("Zed", "u").unwrap();
        store.upsert_product("Alpha", "u").unwrap();
        assert_eq!(
            store.all_product_names().unwrap(),
            vec!["Alpha".to_string(), "Zed".to_string()]
        );
        // Registration order preserved for full records
        let products = store.all_products().unwrap();
        assert_eq!(products[0].name, "Zed");
        assert_eq!(products[1].name, "Alpha");
    }
}
