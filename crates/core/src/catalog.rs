use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::product::{
    CatalogFilters, ListingQuery, PricebookEntryId, Product, ProductId,
};
use crate::ports::{
    CatalogSearch, PortError, ProductListing, MAX_CATALOG_RESULTS, MAX_LISTING_RESULTS,
};

/// Catalog held in memory. Every whitespace-separated term must appear in the
/// product name or description; results are sorted by name.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCatalog {
    products: Vec<Product>,
}

impl InMemoryCatalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    pub fn demo() -> Self {
        Self::new(demo_products())
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    fn matches_terms(product: &Product, terms: &[String]) -> bool {
        let name = product.name.to_lowercase();
        let description = product.description.to_lowercase();
        terms.iter().all(|term| name.contains(term.as_str()) || description.contains(term.as_str()))
    }

    fn matching(&self, term: &str, filters: &CatalogFilters, limit: usize) -> Vec<Product> {
        let terms: Vec<String> = term.split_whitespace().map(str::to_lowercase).collect();
        let mut found: Vec<Product> = self
            .products
            .iter()
            .filter(|product| Self::matches_terms(product, &terms) && filters.matches(product))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found.truncate(limit);
        found
    }
}

#[async_trait]
impl CatalogSearch for InMemoryCatalog {
    async fn search(
        &self,
        term: &str,
        filters: &CatalogFilters,
    ) -> Result<Vec<Product>, PortError> {
        Ok(self.matching(term, filters, MAX_CATALOG_RESULTS))
    }
}

#[async_trait]
impl ProductListing for InMemoryCatalog {
    async fn list_products(&self, query: &ListingQuery) -> Result<Vec<Product>, PortError> {
        let limit = query.limit.clamp(1, MAX_LISTING_RESULTS);
        Ok(self.matching(query.term.as_deref().unwrap_or_default(), &query.filters, limit))
    }

    async fn product(&self, id: &ProductId) -> Result<Option<Product>, PortError> {
        Ok(self.products.iter().find(|product| &product.id == id).cloned())
    }
}

struct Seed {
    key: &'static str,
    name: &'static str,
    description: &'static str,
    family: &'static str,
    color: &'static str,
    size: &'static str,
    cents: i64,
}

const DEMO_SEEDS: &[Seed] = &[
    Seed {
        key: "wch-classic-silver",
        name: "Classic Silver Watch",
        description: "Stainless steel case with sapphire crystal and a brushed silver bracelet",
        family: "Watches",
        color: "Silver",
        size: "40mm",
        cents: 12_999,
    },
    Seed {
        key: "wch-diver-silver",
        name: "Silver Diver Watch",
        description: "Water resistant to 200m with a rotating bezel and luminous hands",
        family: "Watches",
        color: "Silver",
        size: "42mm",
        cents: 18_900,
    },
    Seed {
        key: "wch-chrono-black",
        name: "Midnight Chronograph Watch",
        description: "Matte black chronograph with tachymeter scale and rubber strap",
        family: "Watches",
        color: "Black",
        size: "44mm",
        cents: 14_900,
    },
    Seed {
        key: "wch-dress-gold",
        name: "Gold Dress Watch",
        description: "Slim gold tone case on an Italian leather strap for formal wear",
        family: "Watches",
        color: "Gold",
        size: "38mm",
        cents: 24_900,
    },
    Seed {
        key: "wch-field-navy",
        name: "Navy Field Watch",
        description: "Rugged field watch with a navy dial and canvas strap",
        family: "Watches",
        color: "Navy",
        size: "40mm",
        cents: 9_900,
    },
    Seed {
        key: "ftw-oxford-brown",
        name: "Brown Leather Oxford Shoes",
        description: "Full grain leather oxfords with a cushioned insole",
        family: "Footwear",
        color: "Brown",
        size: "US 10",
        cents: 11_900,
    },
    Seed {
        key: "ftw-sneaker-white",
        name: "White Canvas Sneaker Shoes",
        description: "Lightweight canvas sneakers for everyday wear",
        family: "Footwear",
        color: "White",
        size: "US 9",
        cents: 6_900,
    },
    Seed {
        key: "ftw-runner-black",
        name: "Black Running Shoes",
        description: "Breathable mesh running shoes with responsive foam",
        family: "Footwear",
        color: "Black",
        size: "US 10",
        cents: 8_900,
    },
    Seed {
        key: "ftw-loafer-tan",
        name: "Tan Suede Loafer Shoes",
        description: "Soft suede loafers with a flexible rubber sole",
        family: "Footwear",
        color: "Tan",
        size: "US 11",
        cents: 10_900,
    },
    Seed {
        key: "acc-belt-brown",
        name: "Brown Leather Belt",
        description: "Full grain leather belt with a brushed nickel buckle",
        family: "Accessories",
        color: "Brown",
        size: "34",
        cents: 3_900,
    },
    Seed {
        key: "acc-belt-black",
        name: "Black Reversible Belt",
        description: "Reversible black and brown belt with a rotating buckle",
        family: "Accessories",
        color: "Black",
        size: "36",
        cents: 4_500,
    },
    Seed {
        key: "acc-wallet-tan",
        name: "Tan Bifold Wallet",
        description: "Classic bifold wallet with six card slots and a cash sleeve",
        family: "Accessories",
        color: "Tan",
        size: "",
        cents: 4_900,
    },
    Seed {
        key: "acc-wallet-black",
        name: "Black Slim Wallet",
        description: "Minimal slim wallet that holds up to eight cards",
        family: "Accessories",
        color: "Black",
        size: "",
        cents: 3_500,
    },
    Seed {
        key: "acc-wallet-red",
        name: "Red Card Wallet",
        description: "Compact card wallet in pebbled red leather",
        family: "Accessories",
        color: "Red",
        size: "",
        cents: 2_900,
    },
];

/// Demo fixture of watches, footwear and accessories.
pub fn demo_products() -> Vec<Product> {
    DEMO_SEEDS
        .iter()
        .map(|seed| Product {
            id: ProductId(format!("prod-{}", seed.key)),
            sku: seed.key.to_ascii_uppercase(),
            name: seed.name.to_owned(),
            description: seed.description.to_owned(),
            family: seed.family.to_owned(),
            color: seed.color.to_owned(),
            size: seed.size.to_owned(),
            price: Decimal::new(seed.cents, 2),
            pricebook_entry_id: PricebookEntryId(format!("pbe-{}", seed.key)),
            image_url: format!("https://images.cartline.example/{}.jpg", seed.key),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::product::{CatalogFilters, ListingQuery, ProductId};
    use crate::ports::{CatalogSearch, ProductListing};

    use super::InMemoryCatalog;

    #[tokio::test]
    async fn search_matches_name_or_description_and_sorts_by_name() {
        let catalog = InMemoryCatalog::demo();
        let results = catalog.search("watch", &CatalogFilters::default()).await.expect("search");

        assert_eq!(results.len(), 5);
        let names: Vec<_> = results.iter().map(|p| p.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[tokio::test]
    async fn every_term_must_match() {
        let catalog = InMemoryCatalog::demo();
        let results =
            catalog.search("slim wallet", &CatalogFilters::default()).await.expect("search");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "Black Slim Wallet");
    }

    #[tokio::test]
    async fn filters_apply_after_term_match() {
        let catalog = InMemoryCatalog::demo();
        let filters = CatalogFilters {
            max_price: Some(Decimal::new(150, 0)),
            color: Some("silver".to_owned()),
            ..CatalogFilters::default()
        };
        let results = catalog.search("watch", &filters).await.expect("search");

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "Classic Silver Watch");
    }

    #[tokio::test]
    async fn unknown_terms_return_nothing() {
        let catalog = InMemoryCatalog::demo();
        let results =
            catalog.search("umbrella", &CatalogFilters::default()).await.expect("search");
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn listing_is_not_held_to_the_search_cap() {
        let catalog = InMemoryCatalog::demo();
        let all = catalog
            .list_products(&ListingQuery { limit: 200, ..ListingQuery::default() })
            .await
            .expect("list");
        assert_eq!(all.len(), catalog.products().len());

        let footwear = catalog
            .list_products(&ListingQuery {
                filters: CatalogFilters {
                    family: Some("footwear".to_owned()),
                    ..CatalogFilters::default()
                },
                limit: 2,
                ..ListingQuery::default()
            })
            .await
            .expect("list");
        assert_eq!(footwear.len(), 2);
        assert!(footwear.iter().all(|product| product.family == "Footwear"));
    }

    #[tokio::test]
    async fn products_are_found_by_id() {
        let catalog = InMemoryCatalog::demo();
        let wallet = catalog
            .product(&ProductId("prod-acc-wallet-red".to_owned()))
            .await
            .expect("lookup")
            .expect("known product");
        assert_eq!(wallet.name, "Red Card Wallet");
        let missing = catalog.product(&ProductId("prod-missing".to_owned())).await.expect("lookup");
        assert!(missing.is_none());
    }
}
