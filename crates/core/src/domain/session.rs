use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::cart::Cart;
use crate::domain::product::Product;
use crate::errors::DomainError;

/// Number of search results kept for positional references ("option 3").
pub const SEARCH_WINDOW: usize = 5;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Fresh id of the form `session-<12 hex>`.
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(format!("session-{}", &hex[..12]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationMode {
    #[default]
    Browsing,
    Cart,
    CheckoutPending,
    Tracking,
}

impl ConversationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Browsing => "browsing",
            Self::Cart => "cart",
            Self::CheckoutPending => "checkout_pending",
            Self::Tracking => "tracking",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContactField {
    Name,
    Email,
    Phone,
}

impl ContactField {
    pub fn label(self) -> &'static str {
        match self {
            Self::Name => "Full Name",
            Self::Email => "Email Address",
            Self::Phone => "Phone Number",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

impl ContactDraft {
    pub fn missing_fields(&self) -> Vec<ContactField> {
        let mut missing = Vec::new();
        if self.name.trim().is_empty() {
            missing.push(ContactField::Name);
        }
        if self.email.trim().is_empty() {
            missing.push(ContactField::Email);
        }
        if self.phone.trim().is_empty() {
            missing.push(ContactField::Phone);
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Sticky identifiers of the most recent order; overwritten, never cleared.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderMemory {
    pub last_order_number: Option<String>,
    pub last_order_email: Option<String>,
}

impl OrderMemory {
    pub fn remember(&mut self, order_number: impl Into<String>, email: impl Into<String>) {
        self.last_order_number = Some(order_number.into());
        self.last_order_email = Some(email.into());
    }

    pub fn has_any(&self) -> bool {
        self.last_order_number.is_some() || self.last_order_email.is_some()
    }
}

/// Per-conversation state, replaced as a whole snapshot at the end of each turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    #[serde(default)]
    pub cart: Cart,
    #[serde(default)]
    last_search_results: Vec<Product>,
    #[serde(default)]
    pub contact: ContactDraft,
    #[serde(default)]
    pub mode: ConversationMode,
    #[serde(default)]
    pub order_memory: OrderMemory,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            cart: Cart::default(),
            last_search_results: Vec::new(),
            contact: ContactDraft::default(),
            mode: ConversationMode::Browsing,
            order_memory: OrderMemory::default(),
            updated_at: Utc::now(),
        }
    }

    pub fn search_results(&self) -> &[Product] {
        &self.last_search_results
    }

    /// Replaces the whole window with the first `SEARCH_WINDOW` products.
    pub fn replace_search_results<I>(&mut self, products: I)
    where
        I: IntoIterator<Item = Product>,
    {
        self.last_search_results = products.into_iter().take(SEARCH_WINDOW).collect();
    }

    pub fn clear_search_results(&mut self) {
        self.last_search_results.clear();
    }

    /// Resolves a 1-based option number against the current window.
    pub fn search_result(&self, position: usize) -> Result<&Product, DomainError> {
        position.checked_sub(1).and_then(|index| self.last_search_results.get(index)).ok_or(
            DomainError::InvalidPosition { position, available: self.last_search_results.len() },
        )
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::product::{PricebookEntryId, Product, ProductId};
    use crate::errors::DomainError;

    use super::{ContactDraft, ContactField, ConversationMode, Session, SessionId, SEARCH_WINDOW};

    fn products(count: usize, prefix: &str) -> Vec<Product> {
        (1..=count)
            .map(|n| Product {
                id: ProductId(format!("{prefix}-{n}")),
                sku: format!("{prefix}-{n}"),
                name: format!("{prefix} {n}"),
                description: String::new(),
                family: "Watches".to_owned(),
                color: "Black".to_owned(),
                size: String::new(),
                price: Decimal::new(100, 0),
                pricebook_entry_id: PricebookEntryId(format!("pbe-{prefix}-{n}")),
                image_url: String::new(),
            })
            .collect()
    }

    #[test]
    fn generated_ids_have_session_prefix_and_twelve_hex_chars() {
        let id = SessionId::generate();
        let suffix = id.as_str().strip_prefix("session-").expect("prefix");
        assert_eq!(suffix.len(), 12);
        assert!(suffix.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn search_window_is_replaced_and_capped() {
        let mut session = Session::new(SessionId::from("s-1"));
        session.replace_search_results(products(8, "first"));
        assert_eq!(session.search_results().len(), SEARCH_WINDOW);

        session.replace_search_results(products(2, "second"));
        let ids: Vec<_> = session.search_results().iter().map(|p| p.id.0.as_str()).collect();
        assert_eq!(ids, vec!["second-1", "second-2"]);
    }

    #[test]
    fn search_result_is_one_based() {
        let mut session = Session::new(SessionId::from("s-1"));
        session.replace_search_results(products(3, "p"));

        assert_eq!(session.search_result(1).expect("first").id.0, "p-1");
        assert_eq!(
            session.search_result(4).expect_err("out of range"),
            DomainError::InvalidPosition { position: 4, available: 3 }
        );
    }

    #[test]
    fn contact_draft_reports_missing_fields_in_order() {
        let draft = ContactDraft { email: "a@b.com".to_owned(), ..ContactDraft::default() };
        assert_eq!(draft.missing_fields(), vec![ContactField::Name, ContactField::Phone]);
        assert!(!draft.is_complete());
    }

    #[test]
    fn session_snapshot_survives_json_round_trip() {
        let mut session = Session::new(SessionId::from("s-9"));
        session.mode = ConversationMode::CheckoutPending;
        session.order_memory.remember("00000101", "jane@example.com");
        session.replace_search_results(products(1, "p"));

        let raw = serde_json::to_string(&session).expect("serialize");
        assert!(raw.contains("\"checkout_pending\""));
        let restored: Session = serde_json::from_str(&raw).expect("deserialize");
        assert_eq!(restored, session);
    }
}
