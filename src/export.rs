//! CSV and JSON export of a product's price history, plus CSV import
//! for migrating data captured elsewhere.
//!
//! Rows use the `Date,Time,Price` layout the scrape logs have always
//! used, with dates as `YYYY-MM-DD` and times as `HH:MM:SS` (UTC).

use crate::price_series::{PriceStore, StoreError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};

/// One exported history row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HistoryRow {
    pub date: String,
    pub time: String,
    pub price: f64,
}

/// Top-level JSON export document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryDocument {
    pub product_name: String,
    pub export_date: String,
    pub record_count: usize,
    pub data: Vec<HistoryRow>,
}

/// Errors produced by export and import operations.
#[derive(Debug)]
pub enum ExportError {
    /// Product has no observations to export
    NoData(String),
    /// CSV read/write failure
    Csv(String),
    /// JSON serialization failure
    Json(String),
    /// Imported row could not be parsed
    Malformed(String),
    /// Fault propagated from the storage layer
    Store(StoreError),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::NoData(name) => write!(f, "No data found for product: {}", name),
            ExportError::Csv(msg) => write!(f, "CSV error: {}", msg),
            ExportError::Json(msg) => write!(f, "JSON error: {}", msg),
            ExportError::Malformed(msg) => write!(f, "Malformed row: {}", msg),
            ExportError::Store(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for ExportError {}

impl From<StoreError> for ExportError {
    fn from(err: StoreError) -> Self {
        ExportError::Store(err)
    }
}

impl From<csv::Error> for ExportError {
    fn from(err: csv::Error) -> Self {
        ExportError::Csv(err.to_string())
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        ExportError::Json(err.to_string())
    }
}

fn history_rows<S: PriceStore>(store: &S, name: &str) -> Result<Vec<HistoryRow>, ExportError> {
    let points = store.history(name, None)?;
    if points.is_empty() {
        return Err(ExportError::NoData(name.to_string()));
    }
    Ok(points
        .iter()
        .map(|p| HistoryRow {
            date: p.recorded_at.format("%Y-%m-%d").to_string(),
            time: p.recorded_at.format("%H:%M:%S").to_string(),
            price: p.price,
        })
        .collect())
}

/// Writes a product's full history as CSV. Returns the row count.
///
/// # Errors
/// `NoData` when the product has no observations; `Csv` on write
/// failures; store faults propagate as `Store`.
pub fn export_history_csv<S: PriceStore, W: Write>(
    store: &S,
    name: &str,
    writer: W,
) -> Result<usize, ExportError> {
    let rows = history_rows(store, name)?;
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in &rows {
        csv_writer.serialize(row)?;
    }
    csv_writer
        .flush()
        .map_err(|e| ExportError::Csv(e.to_string()))?;
    Ok(rows.len())
}

/// Writes a product's full history as a JSON document. Returns the row
/// count.
///
/// # Errors
/// As `export_history_csv`, with `Json` for serialization failures.
pub fn export_history_json<S: PriceStore, W: Write>(
    store: &S,
    name: &str,
    writer: W,
) -> Result<usize, ExportError> {
    let rows = history_rows(store, name)?;
    let document = HistoryDocument {
        product_name: name.to_string(),
        export_date: Utc::now().to_rfc3339(),
        record_count: rows.len(),
        data: rows,
    };
    serde_json::to_writer_pretty(writer, &document)?;
    Ok(document.record_count)
}

/// Reads `Date,Time,Price` rows from CSV and appends them as
/// observations of `name`, registering the product under `url` first.
/// Returns the number of rows imported.
///
/// # Errors
/// `Malformed` for unparseable dates or times; `Csv` for reader
/// failures; store faults propagate as `Store`.
pub fn import_history_csv<S: PriceStore, R: Read>(
    store: &S,
    name: &str,
    url: &str,
    reader: R,
) -> Result<usize, ExportError> {
    store.upsert_product(name, url)?;

    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut imported = 0;
    for result in csv_reader.deserialize::<HistoryRow>() {
        let row = result?;
        let recorded_at = parse_row_timestamp(&row)?;
        store.append_observation(name, row.price, None, Some(recorded_at))?;
        imported += 1;
    }
    Ok(imported)
}

fn parse_row_timestamp(row: &HistoryRow) -> Result<DateTime<Utc>, ExportError> {
    let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d")
        .map_err(|e| ExportError::Malformed(format!("Bad date '{}': {}", row.date, e)))?;
    let time = NaiveTime::parse_from_str(&row.time, "%H:%M:%S")
        .map_err(|e| ExportError::Malformed(format!("Bad time '{}': {}", row.time, e)))?;
    Ok(Utc.from_utc_datetime(&NaiveDateTime::new(date, time)))
}
