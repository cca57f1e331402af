use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::money::round_cents;
use crate::domain::product::{PricebookEntryId, Product, ProductId};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub pricebook_entry_id: PricebookEntryId,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub size: String,
}

impl CartLine {
    pub fn from_product(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id.clone(),
            name: product.name.clone(),
            unit_price: product.price,
            quantity: quantity.max(1),
            pricebook_entry_id: product.pricebook_entry_id.clone(),
            image_url: product.image_url.clone(),
            color: product.color.clone(),
            size: product.size.clone(),
        }
    }

    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CartAddition {
    Added,
    Incremented { quantity: u32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuantityUpdate {
    Updated { quantity: u32 },
    Removed,
    NotFound,
}

/// Ordered cart, one line per product id. Lines keep insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    #[serde(default)]
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Adds one unit of `product`, incrementing an existing line for the same id.
    pub fn add_product(&mut self, product: &Product) -> CartAddition {
        self.merge_line(CartLine::from_product(product, 1))
    }

    pub fn merge_line(&mut self, line: CartLine) -> CartAddition {
        let added = line.quantity.max(1);
        match self.lines.iter_mut().find(|existing| existing.product_id == line.product_id) {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(added);
                CartAddition::Incremented { quantity: existing.quantity }
            }
            None => {
                self.lines.push(CartLine { quantity: added, ..line });
                CartAddition::Added
            }
        }
    }

    /// 1-based lookup matching the order lines are rendered in.
    pub fn line_at(&self, position: usize) -> Result<&CartLine, DomainError> {
        position
            .checked_sub(1)
            .and_then(|index| self.lines.get(index))
            .ok_or(DomainError::InvalidPosition { position, available: self.lines.len() })
    }

    pub fn remove(&mut self, product_id: &ProductId) -> Option<CartLine> {
        let index = self.lines.iter().position(|line| &line.product_id == product_id)?;
        Some(self.lines.remove(index))
    }

    /// Sets an absolute quantity; zero or less drops the line.
    pub fn set_quantity(&mut self, product_id: &ProductId, quantity: i64) -> QuantityUpdate {
        let Some(index) = self.lines.iter().position(|line| &line.product_id == product_id) else {
            return QuantityUpdate::NotFound;
        };
        if quantity <= 0 {
            self.lines.remove(index);
            return QuantityUpdate::Removed;
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        self.lines[index].quantity = quantity;
        QuantityUpdate::Updated { quantity }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Sum of line subtotals, recomputed on every call.
    pub fn total(&self) -> Decimal {
        round_cents(self.lines.iter().map(CartLine::subtotal).sum())
    }

    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }
}
