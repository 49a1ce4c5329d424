//! Catalog products and paged listings.

use serde::{Deserialize, Serialize};

use crate::types::{CategoryId, Price, ProductId};

/// A product category as the backend reports it.
///
/// Older endpoints send just the category name; newer ones embed the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryRef {
    Name(String),
    Record {
        id: Option<CategoryId>,
        name: String,
    },
}

impl CategoryRef {
    /// Display name of the category.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) | Self::Record { name, .. } => name,
        }
    }
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Price,
    #[serde(default, alias = "stock")]
    pub stock_quantity: i64,
    #[serde(default, alias = "image")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category: Option<CategoryRef>,
}

impl Product {
    /// Whether at least one unit is available.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock_quantity > 0
    }
}

/// One page of a paged backend listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub content: Vec<T>,
    #[serde(default)]
    pub total_elements: u64,
    #[serde(default)]
    pub total_pages: u32,
    /// Zero-based page index.
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub size: u32,
}

impl<T> Page<T> {
    /// Whether a later page exists.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.number + 1 < self.total_pages
    }
}

/// Paging and search parameters for `GET /api/products`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductQuery {
    pub page: u32,
    pub size: u32,
    pub query: Option<String>,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            page: 0,
            size: 20,
            query: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_product_accepts_category_name_or_record() {
        let by_name: Product = serde_json::from_value(serde_json::json!({
            "id": 1, "name": "Bananas", "price": 1.99, "stockQuantity": 40,
            "category": "Fruit"
        }))
        .unwrap();
        assert_eq!(by_name.category.unwrap().name(), "Fruit");

        let by_record: Product = serde_json::from_value(serde_json::json!({
            "id": 2, "name": "Milk", "price": "2.49",
            "category": {"id": 3, "name": "Dairy"}
        }))
        .unwrap();
        assert_eq!(by_record.category.as_ref().unwrap().name(), "Dairy");
        assert!(!by_record.in_stock());
    }

    #[test]
    fn test_page_has_next() {
        let page: Page<Product> = serde_json::from_value(serde_json::json!({
            "content": [], "totalElements": 45, "totalPages": 3, "number": 1, "size": 20
        }))
        .unwrap();
        assert!(page.has_next());

        let last = Page::<Product> {
            number: 2,
            ..page
        };
        assert!(!last.has_next());
    }
}
