use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A tracked product as stored in the `products` table.
///
/// The `name` is the natural key: at most one product exists per distinct
/// name, and all store lookups are keyed by it. The `url` is an opaque
/// source locator and is not validated here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Surrogate id assigned on first insert
    pub id: i64,
    /// Unique human-readable name (natural key)
    pub name: String,
    /// Source locator the price was scraped from
    pub url: String,
    /// When the product was first registered
    pub created_at: DateTime<Utc>,
    /// Refreshed on every new observation
    pub updated_at: DateTime<Utc>,
}

/// Validates a product name before it reaches the store.
///
/// Rejects empty and whitespace-only names; anything else is allowed since
/// names come straight from scraped listings.
///
/// # Errors
/// Returns `ProductNameError::Empty` if the name has no visible characters.
pub fn validate_product_name(name: &str) -> Result<(), ProductNameError> {
    if name.trim().is_empty() {
        return Err(ProductNameError::Empty);
    }
    Ok(())
}

/// Errors produced by product name validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductNameError {
    /// Name is empty or whitespace-only
    Empty,
}

impl fmt::Display for ProductNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductNameError::Empty => write!(f, "Product name must not be empty"),
        }
    }
}

impl std::error::Error for ProductNameError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_product_name() {
        assert!(validate_product_name("Sony WH-1000XM5").is_ok());
        assert!(validate_product_name("Widget (Black, 64 GB)").is_ok());
    }

    #[test]
    fn test_empty_product_name_rejected() {
        assert_eq!(validate_product_name(""), Err(ProductNameError::Empty));
        assert_eq!(validate_product_name("   "), Err(ProductNameError::Empty));
    }
}
