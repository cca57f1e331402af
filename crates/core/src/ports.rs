//! Collaborator contracts consumed by the conversation engine.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::cart::Cart;
use crate::domain::order::{
    OrderLookup, OrderPlacement, OrderQuery, OrderRequest, OrderStatusReport,
};
use crate::domain::product::{CatalogFilters, ListingQuery, Product, ProductId};
use crate::domain::session::{Session, SessionId};
use crate::errors::ApplicationError;

/// Upper bound on products returned by a single catalog search.
pub const MAX_CATALOG_RESULTS: usize = 10;

/// Upper bound on products returned by one storefront listing.
pub const MAX_LISTING_RESULTS: usize = 500;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PortError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    #[error("collaborator timed out: {0}")]
    Timeout(String),
    #[error("unexpected collaborator response: {0}")]
    Protocol(String),
}

impl From<PortError> for ApplicationError {
    fn from(value: PortError) -> Self {
        match value {
            PortError::Timeout(message) => Self::Timeout(message),
            other => Self::Integration(other.to_string()),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),
    #[error("stored session `{session_id}` is unreadable: {reason}")]
    Corrupt { session_id: String, reason: String },
}

impl From<StoreError> for ApplicationError {
    fn from(value: StoreError) -> Self {
        Self::Persistence(value.to_string())
    }
}

#[async_trait]
pub trait CatalogSearch: Send + Sync {
    async fn search(
        &self,
        term: &str,
        filters: &CatalogFilters,
    ) -> Result<Vec<Product>, PortError>;
}

/// Browsing side of the catalog behind the web storefront.
#[async_trait]
pub trait ProductListing: Send + Sync {
    async fn list_products(&self, query: &ListingQuery) -> Result<Vec<Product>, PortError>;
    async fn product(&self, id: &ProductId) -> Result<Option<Product>, PortError>;
}

#[async_trait]
pub trait OrderGateway: Send + Sync {
    async fn create_order(&self, request: &OrderRequest) -> Result<OrderPlacement, PortError>;
    async fn lookup_order(&self, query: &OrderQuery) -> Result<OrderLookup, PortError>;

    /// Every order placed under `email`, newest first. Gateways without a
    /// history query report the latest order only.
    async fn order_history(&self, email: &str) -> Result<Vec<OrderStatusReport>, PortError> {
        match self.lookup_order(&OrderQuery::ByEmail(email.to_owned())).await? {
            OrderLookup::Found(report) => Ok(vec![report]),
            OrderLookup::NotFound => Ok(Vec::new()),
        }
    }
}

/// Whole-snapshot session persistence. `load` yields a fresh session for
/// unknown ids and fails rather than fabricating one when the store is down.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &SessionId) -> Result<Session, StoreError>;
    async fn save(&self, session: &Session) -> Result<(), StoreError>;
}

/// Best-effort copy of the authoritative cart into the web-facing cart.
#[async_trait]
pub trait CartMirror: Send + Sync {
    async fn sync(&self, session_id: &SessionId, cart: &Cart) -> Result<(), PortError>;
}
