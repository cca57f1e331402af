use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PricebookEntryId(pub String);

/// Catalog item as returned by a search. Only ever lives inside a session's
/// search window or is copied into a cart line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub family: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub size: String,
    pub price: Decimal,
    pub pricebook_entry_id: PricebookEntryId,
    #[serde(default)]
    pub image_url: String,
}

impl Product {
    /// First `max_words` words of the description, used for one-line listings.
    pub fn short_description(&self, max_words: usize) -> String {
        self.description.split_whitespace().take(max_words).collect::<Vec<_>>().join(" ")
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogFilters {
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub color: Option<String>,
    pub family: Option<String>,
    pub size: Option<String>,
}

impl CatalogFilters {
    pub fn is_empty(&self) -> bool {
        self.min_price.is_none()
            && self.max_price.is_none()
            && self.color.is_none()
            && self.family.is_none()
            && self.size.is_none()
    }

    pub fn matches(&self, product: &Product) -> bool {
        if let Some(min_price) = self.min_price {
            if product.price < min_price {
                return false;
            }
        }
        if let Some(max_price) = self.max_price {
            if product.price > max_price {
                return false;
            }
        }
        if let Some(color) = &self.color {
            if !contains_ignore_case(&product.color, color) {
                return false;
            }
        }
        if let Some(family) = &self.family {
            if !product.family.eq_ignore_ascii_case(family) {
                return false;
            }
        }
        if let Some(size) = &self.size {
            if !contains_ignore_case(&product.size, size) {
                return false;
            }
        }
        true
    }
}

/// Storefront listing request. `term` follows the same every-word rule as
/// catalog search; `limit` is applied after filtering.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListingQuery {
    pub term: Option<String>,
    pub filters: CatalogFilters,
    pub limit: usize,
}

/// Distinct filter values present in a set of products, sorted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CatalogFacets {
    pub categories: Vec<String>,
    pub colors: Vec<String>,
    pub sizes: Vec<String>,
    pub min_price: Decimal,
    pub max_price: Decimal,
}

impl CatalogFacets {
    pub fn from_products(products: &[Product]) -> Self {
        Self {
            categories: distinct(products, |product| &product.family),
            colors: distinct(products, |product| &product.color),
            sizes: distinct(products, |product| &product.size),
            min_price: products.iter().map(|product| product.price).min().unwrap_or_default(),
            max_price: products.iter().map(|product| product.price).max().unwrap_or_default(),
        }
    }
}

fn distinct(products: &[Product], field: fn(&Product) -> &str) -> Vec<String> {
    let values: BTreeSet<&str> =
        products.iter().map(field).filter(|value| !value.trim().is_empty()).collect();
    values.into_iter().map(str::to_owned).collect()
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
