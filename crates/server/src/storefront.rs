//! Catalog browsing and order endpoints for the web storefront.
//!
//! - `GET  /api/products`                 - active products (`?category=`, `?limit=`)
//! - `POST /api/products/search`          - term and filter search
//! - `GET  /api/products/{product_id}`    - one product
//! - `GET  /api/categories`               - distinct families
//! - `GET  /api/colors`                   - distinct colors
//! - `GET  /api/sizes`                    - distinct sizes
//! - `GET  /api/price-range`              - cheapest and dearest price
//! - `POST /api/orders`                   - place an order (`?session_id=` clears that web cart)
//! - `GET  /api/orders/customer/{email}`  - order history, newest first

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use cartline_core::domain::order::{
    CustomerIdentity, OrderItem, OrderPlacement, OrderRequest, OrderStatusReport,
};
use cartline_core::domain::product::{
    CatalogFacets, CatalogFilters, ListingQuery, PricebookEntryId, Product, ProductId,
};
use cartline_core::domain::session::SessionId;
use cartline_core::errors::ApplicationError;
use cartline_core::ports::{OrderGateway, PortError, ProductListing, MAX_LISTING_RESULTS};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::{bad_request, correlation_id, interface_error, not_found, ApiError, ApiResult};
use crate::web_cart::WebCartStore;

const DEFAULT_LISTING_LIMIT: usize = 200;
const WEB_CHECKOUT_SOURCE: &str = "Web";

#[derive(Clone)]
pub struct StorefrontState {
    pub products: Arc<dyn ProductListing>,
    pub orders: Arc<dyn OrderGateway>,
    pub web_carts: Arc<WebCartStore>,
}

#[derive(Debug, Serialize)]
pub struct ProductView {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    pub description: String,
    pub color: String,
    pub size: String,
    pub product_code: String,
    pub category: String,
    pub image_url: String,
    pub pricebook_entry_id: String,
}

impl From<Product> for ProductView {
    fn from(product: Product) -> Self {
        Self {
            id: product.id.0,
            name: product.name,
            price: product.price,
            description: product.description,
            color: product.color,
            size: product.size,
            product_code: product.sku,
            category: product.family,
            image_url: product.image_url,
            pricebook_entry_id: product.pricebook_entry_id.0,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListingParams {
    pub category: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub price_min: Option<Decimal>,
    #[serde(default)]
    pub price_max: Option<Decimal>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
}

impl SearchRequest {
    fn into_listing(self) -> ListingQuery {
        let present = |value: Option<String>| {
            value.map(|value| value.trim().to_owned()).filter(|value| !value.is_empty())
        };
        ListingQuery {
            term: present(self.query),
            filters: CatalogFilters {
                min_price: self.price_min,
                max_price: self.price_max,
                color: present(self.color),
                family: present(self.category),
                size: present(self.size),
            },
            limit: MAX_LISTING_RESULTS,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CategoriesResponse {
    pub categories: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ColorsResponse {
    pub colors: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SizesResponse {
    pub sizes: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PriceRangeResponse {
    pub min: Decimal,
    pub max: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CustomerInfo {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OrderLineRequest {
    pub pricebook_entry_id: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    #[serde(default, alias = "name")]
    pub product_name: String,
}

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    pub customer: CustomerInfo,
    pub items: Vec<OrderLineRequest>,
    #[serde(default)]
    pub checkout_source: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlaceOrderParams {
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PlaceOrderResponse {
    pub success: bool,
    pub order_number: String,
    pub order_id: String,
    pub total_amount: Decimal,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct OrderHistoryResponse {
    pub orders: Vec<OrderStatusReport>,
    pub count: usize,
}

pub fn router(state: StorefrontState) -> Router {
    Router::new()
        .route("/api/products", get(list_products))
        .route("/api/products/search", post(search_products))
        .route("/api/products/{product_id}", get(product_detail))
        .route("/api/categories", get(categories))
        .route("/api/colors", get(colors))
        .route("/api/sizes", get(sizes))
        .route("/api/price-range", get(price_range))
        .route("/api/orders", post(place_order))
        .route("/api/orders/customer/{email}", get(customer_orders))
        .with_state(state)
}

fn port_error(
    error: PortError,
    operation: &'static str,
    correlation_id: &str,
) -> (StatusCode, Json<ApiError>) {
    warn!(
        event_name = "http.storefront.backend_failed",
        correlation_id,
        operation,
        error = %error,
        "storefront backend call failed"
    );
    interface_error(ApplicationError::from(error).into_interface(correlation_id))
}

async fn listing(
    state: &StorefrontState,
    query: ListingQuery,
    operation: &'static str,
    correlation_id: &str,
) -> Result<Vec<Product>, (StatusCode, Json<ApiError>)> {
    state
        .products
        .list_products(&query)
        .await
        .map_err(|error| port_error(error, operation, correlation_id))
}

async fn facets(
    state: &StorefrontState,
    operation: &'static str,
) -> Result<CatalogFacets, (StatusCode, Json<ApiError>)> {
    let correlation_id = correlation_id();
    let query = ListingQuery { limit: MAX_LISTING_RESULTS, ..ListingQuery::default() };
    let products = listing(state, query, operation, &correlation_id).await?;
    Ok(CatalogFacets::from_products(&products))
}

async fn list_products(
    State(state): State<StorefrontState>,
    Query(params): Query<ListingParams>,
) -> ApiResult<Vec<ProductView>> {
    let correlation_id = correlation_id();
    let limit = params.limit.unwrap_or(DEFAULT_LISTING_LIMIT);
    if limit == 0 || limit > MAX_LISTING_RESULTS {
        return Err(bad_request("limit must be in range 1..=500", &correlation_id));
    }

    let family = params.category.map(|category| category.trim().to_owned());
    let query = ListingQuery {
        filters: CatalogFilters {
            family: family.filter(|family| !family.is_empty()),
            ..CatalogFilters::default()
        },
        limit,
        ..ListingQuery::default()
    };
    let products = listing(&state, query, "list", &correlation_id).await?;
    Ok(Json(products.into_iter().map(ProductView::from).collect()))
}

async fn search_products(
    State(state): State<StorefrontState>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<Vec<ProductView>> {
    let correlation_id = correlation_id();
    if let (Some(min), Some(max)) = (request.price_min, request.price_max) {
        if min > max {
            return Err(bad_request("price_min must not exceed price_max", &correlation_id));
        }
    }

    let products = listing(&state, request.into_listing(), "search", &correlation_id).await?;
    Ok(Json(products.into_iter().map(ProductView::from).collect()))
}

async fn product_detail(
    Path(product_id): Path<String>,
    State(state): State<StorefrontState>,
) -> ApiResult<ProductView> {
    let correlation_id = correlation_id();
    let product = state
        .products
        .product(&ProductId(product_id))
        .await
        .map_err(|error| port_error(error, "detail", &correlation_id))?
        .ok_or_else(|| not_found("product not found", &correlation_id))?;
    Ok(Json(product.into()))
}

async fn categories(State(state): State<StorefrontState>) -> ApiResult<CategoriesResponse> {
    let facets = facets(&state, "categories").await?;
    Ok(Json(CategoriesResponse { categories: facets.categories }))
}

async fn colors(State(state): State<StorefrontState>) -> ApiResult<ColorsResponse> {
    let facets = facets(&state, "colors").await?;
    Ok(Json(ColorsResponse { colors: facets.colors }))
}

async fn sizes(State(state): State<StorefrontState>) -> ApiResult<SizesResponse> {
    let facets = facets(&state, "sizes").await?;
    Ok(Json(SizesResponse { sizes: facets.sizes }))
}

async fn price_range(State(state): State<StorefrontState>) -> ApiResult<PriceRangeResponse> {
    let facets = facets(&state, "price_range").await?;
    Ok(Json(PriceRangeResponse { min: facets.min_price, max: facets.max_price }))
}

fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !email.contains(char::is_whitespace)
        && domain.rsplit_once('.').is_some_and(|(host, tld)| !host.is_empty() && tld.len() >= 2)
}

impl PlaceOrderRequest {
    fn validate(&self) -> Result<(), &'static str> {
        let name = self.customer.name.trim().chars().count();
        if !(2..=100).contains(&name) {
            return Err("customer name must be 2 to 100 characters");
        }
        if !looks_like_email(self.customer.email.trim()) {
            return Err("customer email is not a valid address");
        }
        if self.customer.phone.as_deref().is_some_and(|phone| phone.chars().count() > 20) {
            return Err("customer phone must be at most 20 characters");
        }
        if self.items.is_empty() {
            return Err("order must contain items");
        }
        if self.items.iter().any(|item| item.quantity == 0 || item.unit_price < Decimal::ZERO) {
            return Err("order items need a positive quantity and a non-negative price");
        }
        Ok(())
    }

    fn into_order(self) -> OrderRequest {
        let source = self
            .checkout_source
            .map(|source| source.trim().to_owned())
            .filter(|source| !source.is_empty())
            .unwrap_or_else(|| WEB_CHECKOUT_SOURCE.to_owned());
        OrderRequest {
            customer: CustomerIdentity {
                name: self.customer.name.trim().to_owned(),
                email: self.customer.email.trim().to_owned(),
                phone: self.customer.phone.unwrap_or_default().trim().to_owned(),
            },
            items: self
                .items
                .into_iter()
                .map(|item| OrderItem {
                    pricebook_entry_id: PricebookEntryId(item.pricebook_entry_id),
                    product_name: item.product_name,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                })
                .collect(),
            source,
        }
    }
}

async fn place_order(
    State(state): State<StorefrontState>,
    Query(params): Query<PlaceOrderParams>,
    Json(request): Json<PlaceOrderRequest>,
) -> ApiResult<PlaceOrderResponse> {
    let correlation_id = correlation_id();
    if let Err(reason) = request.validate() {
        return Err(bad_request(reason, &correlation_id));
    }

    let order = request.into_order();
    let placement = state
        .orders
        .create_order(&order)
        .await
        .map_err(|error| port_error(error, "place_order", &correlation_id))?;

    let placed = match placement {
        OrderPlacement::Placed(placed) => placed,
        OrderPlacement::Rejected { reason } => {
            info!(
                event_name = "http.orders.rejected",
                correlation_id = %correlation_id,
                reason = %reason,
                "web order rejected by the backend"
            );
            return Err(bad_request(&reason, &correlation_id));
        }
    };

    let session_id = params.session_id.map(|id| id.trim().to_owned()).filter(|id| !id.is_empty());
    if let Some(session_id) = &session_id {
        state.web_carts.clear(&SessionId::from(session_id.as_str())).await;
    }
    info!(
        event_name = "http.orders.placed",
        correlation_id = %correlation_id,
        session_id = session_id.as_deref().unwrap_or("none"),
        order_number = %placed.order_number,
        source = %order.source,
        "web order placed"
    );

    Ok(Json(PlaceOrderResponse {
        success: true,
        order_number: placed.order_number,
        order_id: placed.order_id,
        total_amount: placed.total_amount,
        message: "Order placed successfully".to_owned(),
    }))
}

async fn customer_orders(
    Path(email): Path<String>,
    State(state): State<StorefrontState>,
) -> ApiResult<OrderHistoryResponse> {
    let correlation_id = correlation_id();
    let email = email.trim();
    if !looks_like_email(email) {
        return Err(bad_request("email is not a valid address", &correlation_id));
    }

    let orders = state
        .orders
        .order_history(email)
        .await
        .map_err(|error| port_error(error, "order_history", &correlation_id))?;
    Ok(Json(OrderHistoryResponse { count: orders.len(), orders }))
}
