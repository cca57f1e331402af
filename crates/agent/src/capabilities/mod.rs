//! The four shopping capabilities. Each one reads and mutates the session it
//! is handed and always resolves to user-facing text; collaborator failures
//! are logged and turned into apologetic replies here.

pub mod cart;
pub mod checkout;
pub mod search;
pub mod tracking;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use cartline_core::domain::session::Session;
use cartline_core::ports::{CatalogSearch, OrderGateway};
use thiserror::Error;
use tracing::debug;

use crate::llm::LlmClient;

pub const DEFAULT_CHECKOUT_SOURCE: &str = "WhatsApp Bot";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    Search,
    Cart,
    Checkout,
    Tracking,
}

impl CapabilityKind {
    pub const ALL: [Self; 4] = [Self::Search, Self::Cart, Self::Checkout, Self::Tracking];

    /// Action name exposed to the planner.
    pub fn action_name(self) -> &'static str {
        match self {
            Self::Search => "search_products",
            Self::Cart => "manage_cart",
            Self::Checkout => "checkout_order",
            Self::Tracking => "track_order",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Search => {
                "Search for products. Input: search query like 'watches' or 'silver watches under $150'"
            }
            Self::Cart => {
                "Manage cart. Input: 'add option 1' or 'add 1' to add first product, 'view' to see cart, 'remove 2' to remove item"
            }
            Self::Checkout => {
                "Handle checkout. Input: 'checkout' to start, 'Name, email, phone' for details, 'confirm' or 'yes' to finalize"
            }
            Self::Tracking => {
                "Track order status. Input: order number, email, or just 'track order' to check most recent order"
            }
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.action_name())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown capability `{0}`")]
pub struct UnknownCapability(pub String);

impl FromStr for CapabilityKind {
    type Err = UnknownCapability;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().trim_matches(|c| c == '`' || c == '"').to_ascii_lowercase();
        match normalized.as_str() {
            "search_products" | "search" => Ok(Self::Search),
            "manage_cart" | "cart" => Ok(Self::Cart),
            "checkout_order" | "checkout" => Ok(Self::Checkout),
            "track_order" | "tracking" => Ok(Self::Tracking),
            _ => Err(UnknownCapability(value.trim().to_owned())),
        }
    }
}

/// Collaborators shared by every capability invocation.
#[derive(Clone)]
pub struct Capabilities {
    catalog: Arc<dyn CatalogSearch>,
    orders: Arc<dyn OrderGateway>,
    listing_writer: Option<Arc<dyn LlmClient>>,
    checkout_source: String,
}

impl Capabilities {
    pub fn new(catalog: Arc<dyn CatalogSearch>, orders: Arc<dyn OrderGateway>) -> Self {
        Self {
            catalog,
            orders,
            listing_writer: None,
            checkout_source: DEFAULT_CHECKOUT_SOURCE.to_owned(),
        }
    }

    /// Lets a language model word search listings; the plain listing is the fallback.
    pub fn with_listing_writer(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.listing_writer = Some(llm);
        self
    }

    pub fn with_checkout_source(mut self, source: impl Into<String>) -> Self {
        self.checkout_source = source.into();
        self
    }

    pub async fn invoke(
        &self,
        kind: CapabilityKind,
        input: &str,
        session: &mut Session,
        correlation_id: &str,
    ) -> String {
        debug!(
            event_name = "agent.capability.invoked",
            correlation_id,
            session_id = %session.id,
            capability = %kind,
            mode = session.mode.as_str(),
            "invoking capability"
        );

        match kind {
            CapabilityKind::Search => {
                search::run(
                    self.catalog.as_ref(),
                    self.listing_writer.as_deref(),
                    input,
                    session,
                    correlation_id,
                )
                .await
            }
            CapabilityKind::Cart => cart::run(input, session),
            CapabilityKind::Checkout => {
                checkout::run(
                    self.orders.as_ref(),
                    &self.checkout_source,
                    input,
                    session,
                    correlation_id,
                )
                .await
            }
            CapabilityKind::Tracking => {
                tracking::run(self.orders.as_ref(), input, session, correlation_id).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CapabilityKind;

    #[test]
    fn parses_action_names_and_short_names() {
        for kind in CapabilityKind::ALL {
            assert_eq!(kind.action_name().parse::<CapabilityKind>(), Ok(kind));
        }
        assert_eq!(" `checkout` ".parse::<CapabilityKind>(), Ok(CapabilityKind::Checkout));
        assert!("refund_order".parse::<CapabilityKind>().is_err());
    }
}
