pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod links;
pub mod orders;
pub mod ports;
pub mod transcript;

pub use catalog::{demo_products, InMemoryCatalog};
pub use domain::cart::{Cart, CartAddition, CartLine, QuantityUpdate};
pub use domain::money::{format_money, round_cents};
pub use domain::order::{
    CustomerIdentity, OrderItem, OrderLookup, OrderPlacement, OrderQuery, OrderRequest,
    OrderStatusReport, OrderedItem, PlacedOrder,
};
pub use domain::product::{
    CatalogFacets, CatalogFilters, ListingQuery, PricebookEntryId, Product, ProductId,
};
pub use domain::session::{
    ContactDraft, ContactField, ConversationMode, OrderMemory, Session, SessionId, SEARCH_WINDOW,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use links::{PendingLink, PendingLinkRegistry};
pub use orders::InMemoryOrderGateway;
pub use ports::{
    CartMirror, CatalogSearch, OrderGateway, PortError, ProductListing, SessionStore, StoreError,
};
pub use transcript::{InMemoryTranscriptStore, TranscriptEntry, TranscriptSender, TranscriptStore};
