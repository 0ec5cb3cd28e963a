use crate::price_series::{PricePoint, PriceStore, StoreError};
use crate::product::{validate_product_name, ProductRecord};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// SQLite-backed price store.
///
/// Owns one connection; schema is created on open. Multiple handles may
/// point at the same database file — SQLite serializes the writes, and
/// reads are allowed to be stale relative to a concurrent append since
/// observations are immutable once written.
#[derive(Debug)]
pub struct SqlitePriceStore {
    conn: Connection,
}

/// Whole-store summary counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreInfo {
    pub product_count: usize,
    pub observation_count: usize,
    pub first_recorded: Option<DateTime<Utc>>,
    pub last_recorded: Option<DateTime<Utc>>,
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Storage(err.to_string())
    }
}

impl SqlitePriceStore {
    /// Opens (creating if needed) a file-based store.
    ///
    /// # Errors
    /// Returns `StoreError::Storage` if the database cannot be opened or
    /// the schema cannot be created.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        let store = SqlitePriceStore { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Opens an in-memory store. Useful for testing.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = SqlitePriceStore { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Ensures the schema exists, creating tables and indexes if needed.
    fn ensure_schema(&self) -> Result<(), StoreError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                url TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS price_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                product_id INTEGER NOT NULL,
                price REAL NOT NULL,
                recorded_at TEXT NOT NULL,
                FOREIGN KEY (product_id) REFERENCES products(id)
            )",
            [],
        )?;

        // Indexes keep latest-price and range queries off full scans.
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_price_history_product_id
             ON price_history(product_id)",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_price_history_recorded_at
             ON price_history(recorded_at)",
            [],
        )?;

        Ok(())
    }

    fn product_id(&self, name: &str) -> Result<Option<i64>, StoreError> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM products WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Returns a reference to the underlying connection, for callers
    /// that need direct database access (backups, ad-hoc queries).
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Whole-store counters and observation date range.
    pub fn store_info(&self) -> Result<StoreInfo, StoreError> {
        let product_count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;
        let observation_count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM price_history", [], |row| row.get(0))?;
        let (first, last): (Option<String>, Option<String>) = self.conn.query_row(
            "SELECT MIN(recorded_at), MAX(recorded_at) FROM price_history",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(StoreInfo {
            product_count: product_count as usize,
            observation_count: observation_count as usize,
            first_recorded: first.as_deref().map(parse_timestamp).transpose()?,
            last_recorded: last.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Storage(format!("Invalid timestamp '{}': {}", text, e)))
}

impl PriceStore for SqlitePriceStore {
    fn upsert_product(&self, name: &str, url: &str) -> Result<i64, StoreError> {
        validate_product_name(name)?;
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT OR IGNORE INTO products (name, url, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)",
            params![name, url, now],
        )?;
        match self.product_id(name)? {
            Some(id) => Ok(id),
            None => Err(StoreError::Storage(format!(
                "Product '{}' missing after insert",
                name
            ))),
        }
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

        let product_id = match self.product_id(name)? {
            Some(id) => id,
            None => match url {
                Some(url) => self.upsert_product(name, url)?,
                None => return Err(StoreError::ProductNotFound(name.to_string())),
            },
        };

        self.conn.execute(
            "INSERT INTO price_history (product_id, price, recorded_at)
             VALUES (?1, ?2, ?3)",
            params![product_id, price, at.to_rfc3339()],
        )?;
        self.conn.execute(
            "UPDATE products SET updated_at = ?1 WHERE id = ?2",
            params![at.to_rfc3339(), product_id],
        )?;
        debug!(product = %name, price, "recorded observation");
        Ok(())
    }

    fn latest_price(&self, name: &str) -> Result<Option<f64>, StoreError> {
        let product_id = match self.product_id(name)? {
            Some(id) => id,
            None => return Ok(None),
        };
        let price = self
            .conn
            .query_row(
                "SELECT price FROM price_history
                 WHERE product_id = ?1
                 ORDER BY recorded_at DESC, id DESC
                 LIMIT 1",
                [product_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(price)
    }

    fn history(&self, name: &str, limit: Option<usize>) -> Result<Vec<PricePoint>, StoreError> {
        let product_id = match self.product_id(name)? {
            Some(id) => id,
            None => return Ok(Vec::new()),
        };

        // Ascending query; a limit therefore keeps the OLDEST rows.
        let mut sql = String::from(
            "SELECT recorded_at, price FROM price_history
             WHERE product_id = ?1
             ORDER BY recorded_at ASC, id ASC",
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([product_id], |row| {
            let recorded_at: String = row.get(0)?;
            let price: f64 = row.get(1)?;
            Ok((recorded_at, price))
        })?;

        let mut points = Vec::new();
        for row in rows {
            let (recorded_at, price) = row?;
            points.push(PricePoint::new(parse_timestamp(&recorded_at)?, price));
        }
        Ok(points)
    }

    fn product(&self, name: &str) -> Result<Option<ProductRecord>, StoreError> {
        let record = self
            .conn
            .query_row(
                "SELECT id, name, url, created_at, updated_at
                 FROM products WHERE name = ?1",
                [name],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        match record {
            Some((id, name, url, created_at, updated_at)) => Ok(Some(ProductRecord {
                id,
                name,
                url,
                created_at: parse_timestamp(&created_at)?,
                updated_at: parse_timestamp(&updated_at)?,
            })),
            None => Ok(None),
        }
    }

    fn all_product_names(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM products ORDER BY name")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut names = Vec::new();
        for row in rows {
            names.push(row?);
        }
        Ok(names)
    }

    fn all_products(&self) -> Result<Vec<ProductRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, url, created_at, updated_at FROM products ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut products = Vec::new();
        for row in rows {
            let (id, name, url, created_at, updated_at) = row?;
            products.push(ProductRecord {
                id,
                name,
                url,
                created_at: parse_timestamp(&created_at)?,
                updated_at: parse_timestamp(&updated_at)?,
            });
        }
        Ok(products)
    }

    fn delete_product(&self, name: &str) -> Result<bool, StoreError> {
        let product_id = match self.product_id(name)? {
            Some(id) => id,
            None => return Ok(false),
        };
        // Observations first, then the product row.
        self.conn.execute(
            "DELETE FROM price_history WHERE product_id = ?1",
            [product_id],
        )?;
        self.conn
            .execute("DELETE FROM products WHERE id = ?1", [product_id])?;
        debug!(product = %name, "deleted product and history");
        Ok(true)
    }

    fn purge_observations_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let deleted = self.conn.execute(
            "DELETE FROM price_history WHERE recorded_at < ?1",
            [cutoff.to_rfc3339()],
        )?;
        debug!(deleted, "purged old observations");
        Ok(deleted)
    }
}
