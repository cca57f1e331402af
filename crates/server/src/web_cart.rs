use std::collections::HashMap;

use async_trait::async_trait;
use cartline_core::domain::cart::{Cart, CartAddition, CartLine, QuantityUpdate};
use cartline_core::domain::product::ProductId;
use cartline_core::domain::session::SessionId;
use cartline_core::ports::{CartMirror, PortError};
use tokio::sync::RwLock;

/// Key-value cart behind the web API. The conversation engine overwrites a
/// session's entry after every turn; web edits land here only.
#[derive(Default)]
pub struct WebCartStore {
    carts: RwLock<HashMap<SessionId, Cart>>,
}

impl WebCartStore {
    /// Current cart, empty for sessions the store has never seen.
    pub async fn snapshot(&self, session_id: &SessionId) -> Cart {
        self.carts.read().await.get(session_id).cloned().unwrap_or_default()
    }

    pub async fn add_line(&self, session_id: &SessionId, line: CartLine) -> (CartAddition, Cart) {
        let mut carts = self.carts.write().await;
        let cart = carts.entry(session_id.clone()).or_default();
        let addition = cart.merge_line(line);
        (addition, cart.clone())
    }

    /// `None` when the session is unknown.
    pub async fn set_quantity(
        &self,
        session_id: &SessionId,
        product_id: &ProductId,
        quantity: i64,
    ) -> Option<(QuantityUpdate, Cart)> {
        let mut carts = self.carts.write().await;
        let cart = carts.get_mut(session_id)?;
        let update = cart.set_quantity(product_id, quantity);
        Some((update, cart.clone()))
    }

    /// `None` when either the session or the line is unknown.
    pub async fn remove_line(
        &self,
        session_id: &SessionId,
        product_id: &ProductId,
    ) -> Option<(CartLine, Cart)> {
        let mut carts = self.carts.write().await;
        let cart = carts.get_mut(session_id)?;
        let removed = cart.remove(product_id)?;
        Some((removed, cart.clone()))
    }

    pub async fn clear(&self, session_id: &SessionId) {
        self.carts.write().await.remove(session_id);
    }
}

#[async_trait]
impl CartMirror for WebCartStore {
    async fn sync(&self, session_id: &SessionId, cart: &Cart) -> Result<(), PortError> {
        self.carts.write().await.insert(session_id.clone(), cart.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use cartline_core::catalog::demo_products;
    use cartline_core::domain::cart::{Cart, CartAddition, CartLine, QuantityUpdate};
    use cartline_core::domain::session::SessionId;
    use cartline_core::ports::CartMirror;
    use rust_decimal::Decimal;

    use super::WebCartStore;

    #[tokio::test]
    async fn unknown_sessions_read_as_empty_carts() {
        let store = WebCartStore::default();
        let cart = store.snapshot(&SessionId::from("nobody")).await;

        assert!(cart.is_empty());
        assert!(store.carts.read().await.is_empty());
    }

    #[tokio::test]
    async fn adding_the_same_product_twice_merges_quantities() {
        let store = WebCartStore::default();
        let session = SessionId::from("web-1");
        let belt = CartLine::from_product(&demo_products()[9], 1);

        let (first, _) = store.add_line(&session, belt.clone()).await;
        let (second, cart) = store.add_line(&session, CartLine { quantity: 2, ..belt }).await;

        assert_eq!(first, CartAddition::Added);
        assert_eq!(second, CartAddition::Incremented { quantity: 3 });
        assert_eq!(cart.total(), Decimal::new(11_700, 2));
    }

    #[tokio::test]
    async fn set_quantity_distinguishes_unknown_session_from_unknown_item() {
        let store = WebCartStore::default();
        let session = SessionId::from("web-2");
        let product = &demo_products()[0];

        assert!(store.set_quantity(&session, &product.id, 2).await.is_none());

        store.add_line(&session, CartLine::from_product(product, 1)).await;
        let (update, _) =
            store.set_quantity(&session, &demo_products()[1].id, 2).await.expect("known session");
        assert_eq!(update, QuantityUpdate::NotFound);

        let (update, cart) = store.set_quantity(&session, &product.id, 0).await.expect("known");
        assert_eq!(update, QuantityUpdate::Removed);
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn mirror_sync_replaces_the_whole_cart() {
        let store = WebCartStore::default();
        let session = SessionId::from("web-3");
        store.add_line(&session, CartLine::from_product(&demo_products()[3], 4)).await;

        let mut authoritative = Cart::default();
        authoritative.add_product(&demo_products()[12]);
        store.sync(&session, &authoritative).await.expect("sync");

        assert_eq!(store.snapshot(&session).await, authoritative);
    }
}
