use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::cart::Cart;
use crate::domain::money::round_cents;
use crate::domain::product::PricebookEntryId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerIdentity {
    pub name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub pricebook_entry_id: PricebookEntryId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub customer: CustomerIdentity,
    pub items: Vec<OrderItem>,
    pub source: String,
}

impl OrderRequest {
    pub fn from_cart(customer: CustomerIdentity, cart: &Cart, source: impl Into<String>) -> Self {
        let items = cart
            .lines()
            .iter()
            .map(|line| OrderItem {
                pricebook_entry_id: line.pricebook_entry_id.clone(),
                product_name: line.name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .collect();
        Self { customer, items, source: source.into() }
    }

    pub fn total(&self) -> Decimal {
        round_cents(
            self.items.iter().map(|item| item.unit_price * Decimal::from(item.quantity)).sum(),
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedOrder {
    pub order_number: String,
    pub order_id: String,
    pub total_amount: Decimal,
}

/// Outcome of an order submission that reached the backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OrderPlacement {
    Placed(PlacedOrder),
    Rejected { reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderQuery {
    ByNumber(String),
    ByEmail(String),
}

impl OrderQuery {
    /// Order number wins when both identifiers are present.
    pub fn from_parts(order_number: Option<String>, email: Option<String>) -> Option<Self> {
        order_number.map(Self::ByNumber).or_else(|| email.map(Self::ByEmail))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedItem {
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusReport {
    pub order_number: String,
    pub status: String,
    pub order_date: String,
    pub total_amount: Decimal,
    pub items: Vec<OrderedItem>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OrderLookup {
    Found(OrderStatusReport),
    NotFound,
}
