//! JSON API for the web storefront.
//!
//! - `GET    /api/cart/{session_id}`                       - cart, total, item count
//! - `POST   /api/cart/{session_id}/add`                   - merge a line by product id
//! - `PUT    /api/cart/{session_id}/item/{product_id}`     - set quantity (`?quantity=N`)
//! - `DELETE /api/cart/{session_id}/item/{product_id}`     - drop one line
//! - `DELETE /api/cart/{session_id}`                       - drop the cart
//! - `POST   /api/whatsapp/prepare-session`                - announce a web session
//! - `GET    /api/whatsapp/pending-sessions`               - live announcements
//! - `DELETE /api/whatsapp/pending-sessions/{session_id}`  - withdraw an announcement
//! - `POST   /api/whatsapp/link-session`                   - bind a phone to a session
//! - `GET    /api/whatsapp/session/{phone}`                - session bound to a phone
//! - `POST   /api/chat`                                    - run one web chat turn
//! - `GET    /conversation/{phone}`                        - transcript, newest first

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use cartline_agent::AgentRuntime;
use cartline_core::domain::cart::{Cart, CartLine, QuantityUpdate};
use cartline_core::domain::product::{PricebookEntryId, ProductId};
use cartline_core::domain::session::SessionId;
use cartline_core::errors::{ApplicationError, InterfaceError};
use cartline_core::links::{PendingLink, PendingLinkRegistry};
use cartline_core::transcript::{TranscriptEntry, TranscriptStore, DEFAULT_HISTORY_LIMIT};
use cartline_db::{PhoneLinkRepository, RepositoryError};
use cartline_whatsapp::inbound::normalize_phone;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::web_cart::WebCartStore;

#[derive(Clone)]
pub struct ApiState {
    pub runtime: Arc<AgentRuntime>,
    pub web_carts: Arc<WebCartStore>,
    pub pending_links: Arc<PendingLinkRegistry>,
    pub phone_links: Arc<dyn PhoneLinkRepository>,
    pub transcripts: Arc<dyn TranscriptStore>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub correlation_id: String,
}

pub(crate) type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub session_id: SessionId,
    pub cart: Vec<CartLine>,
    pub total: Decimal,
    pub item_count: u32,
}

impl CartResponse {
    fn new(session_id: SessionId, cart: &Cart) -> Self {
        Self {
            session_id,
            cart: cart.lines().to_vec(),
            total: cart.total(),
            item_count: cart.item_count(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: String,
    pub name: String,
    pub price: Decimal,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub pricebook_entry_id: Option<String>,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub size: String,
}

fn default_quantity() -> u32 {
    1
}

impl AddItemRequest {
    fn into_line(self) -> CartLine {
        let pricebook_entry_id =
            self.pricebook_entry_id.unwrap_or_else(|| format!("pbe-{}", self.product_id));
        CartLine {
            product_id: ProductId(self.product_id),
            name: self.name,
            unit_price: self.price,
            quantity: self.quantity.max(1),
            pricebook_entry_id: PricebookEntryId(pricebook_entry_id),
            image_url: self.image_url,
            color: self.color,
            size: self.size,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct QuantityQuery {
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct PrepareSessionRequest {
    pub session_id: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PendingSessionsResponse {
    pub sessions: Vec<PendingLink>,
}

#[derive(Debug, Deserialize)]
pub struct LinkSessionRequest {
    pub phone: String,
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct PhoneLinkResponse {
    pub phone: String,
    pub session_id: SessionId,
    pub linked_at: String,
    pub last_seen_at: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: SessionId,
    pub reply: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub phone: String,
    pub messages: Vec<TranscriptEntry>,
}

#[derive(Debug, Serialize)]
pub struct Acknowledged {
    pub success: bool,
    pub message: String,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/cart/{session_id}", get(get_cart).delete(clear_cart))
        .route("/api/cart/{session_id}/add", post(add_to_cart))
        .route(
            "/api/cart/{session_id}/item/{product_id}",
            axum::routing::put(update_item).delete(remove_item),
        )
        .route("/api/whatsapp/prepare-session", post(prepare_session))
        .route("/api/whatsapp/pending-sessions", get(list_pending_sessions))
        .route("/api/whatsapp/pending-sessions/{session_id}", delete(withdraw_pending_session))
        .route("/api/whatsapp/link-session", post(link_session))
        .route("/api/whatsapp/session/{phone}", get(session_for_phone))
        .route("/api/chat", post(chat))
        .route("/conversation/{phone}", get(conversation_history))
        .with_state(state)
}

pub(crate) fn correlation_id() -> String {
    format!("req-{}", Uuid::new_v4().simple())
}

pub(crate) fn interface_error(error: InterfaceError) -> (StatusCode, Json<ApiError>) {
    let status = match error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ApiError {
            error: error.user_message().to_owned(),
            correlation_id: error.correlation_id().to_owned(),
        }),
    )
}

pub(crate) fn not_found(message: &str, correlation_id: &str) -> (StatusCode, Json<ApiError>) {
    interface_error(InterfaceError::not_found(message, correlation_id))
}

pub(crate) fn bad_request(message: &str, correlation_id: &str) -> (StatusCode, Json<ApiError>) {
    interface_error(InterfaceError::BadRequest {
        message: message.to_owned(),
        correlation_id: correlation_id.to_owned(),
    })
}

fn repository_error(error: RepositoryError, correlation_id: &str) -> (StatusCode, Json<ApiError>) {
    warn!(
        event_name = "http.repository.failed",
        correlation_id,
        error = %error,
        "repository call failed"
    );
    interface_error(ApplicationError::Persistence(error.to_string()).into_interface(correlation_id))
}

async fn get_cart(
    Path(session_id): Path<String>,
    State(state): State<ApiState>,
) -> Json<CartResponse> {
    let session_id = SessionId(session_id);
    let cart = state.web_carts.snapshot(&session_id).await;
    Json(CartResponse::new(session_id, &cart))
}

async fn add_to_cart(
    Path(session_id): Path<String>,
    State(state): State<ApiState>,
    Json(request): Json<AddItemRequest>,
) -> ApiResult<CartResponse> {
    let correlation_id = correlation_id();
    if request.product_id.trim().is_empty() {
        return Err(bad_request("product_id must not be empty", &correlation_id));
    }
    if request.price < Decimal::ZERO {
        return Err(bad_request("price must not be negative", &correlation_id));
    }

    let session_id = SessionId(session_id);
    let (addition, cart) = state.web_carts.add_line(&session_id, request.into_line()).await;
    info!(
        event_name = "http.cart.item_added",
        correlation_id = %correlation_id,
        session_id = %session_id,
        addition = ?addition,
        "web cart line added"
    );
    Ok(Json(CartResponse::new(session_id, &cart)))
}

async fn update_item(
    Path((session_id, product_id)): Path<(String, String)>,
    State(state): State<ApiState>,
    Query(query): Query<QuantityQuery>,
) -> ApiResult<CartResponse> {
    let correlation_id = correlation_id();
    let session_id = SessionId(session_id);
    let Some((update, cart)) =
        state.web_carts.set_quantity(&session_id, &ProductId(product_id), query.quantity).await
    else {
        return Err(not_found("cart not found", &correlation_id));
    };
    if update == QuantityUpdate::NotFound {
        return Err(not_found("item not found in cart", &correlation_id));
    }

    info!(
        event_name = "http.cart.quantity_set",
        correlation_id = %correlation_id,
        session_id = %session_id,
        update = ?update,
        "web cart quantity updated"
    );
    Ok(Json(CartResponse::new(session_id, &cart)))
}

async fn remove_item(
    Path((session_id, product_id)): Path<(String, String)>,
    State(state): State<ApiState>,
) -> ApiResult<CartResponse> {
    let correlation_id = correlation_id();
    let session_id = SessionId(session_id);
    let Some((removed, cart)) =
        state.web_carts.remove_line(&session_id, &ProductId(product_id)).await
    else {
        return Err(not_found("item not found in cart", &correlation_id));
    };

    info!(
        event_name = "http.cart.item_removed",
        correlation_id = %correlation_id,
        session_id = %session_id,
        product_id = %removed.product_id.0,
        "web cart line removed"
    );
    Ok(Json(CartResponse::new(session_id, &cart)))
}

async fn clear_cart(
    Path(session_id): Path<String>,
    State(state): State<ApiState>,
) -> Json<CartResponse> {
    let session_id = SessionId(session_id);
    state.web_carts.clear(&session_id).await;
    Json(CartResponse::new(session_id, &Cart::default()))
}

async fn prepare_session(
    State(state): State<ApiState>,
    Json(request): Json<PrepareSessionRequest>,
) -> ApiResult<PendingLink> {
    let correlation_id = correlation_id();
    let session_id = request.session_id.trim();
    if session_id.is_empty() {
        return Err(bad_request("session_id must not be empty", &correlation_id));
    }

    let pending = state.pending_links.prepare(SessionId::from(session_id), request.timestamp);
    info!(
        event_name = "http.links.session_prepared",
        correlation_id = %correlation_id,
        session_id = %pending.session_id,
        "web session waiting for a phone"
    );
    Ok(Json(pending))
}

async fn list_pending_sessions(State(state): State<ApiState>) -> Json<PendingSessionsResponse> {
    Json(PendingSessionsResponse { sessions: state.pending_links.pending() })
}

async fn withdraw_pending_session(
    Path(session_id): Path<String>,
    State(state): State<ApiState>,
) -> ApiResult<Acknowledged> {
    let correlation_id = correlation_id();
    if !state.pending_links.remove(&SessionId(session_id.clone())) {
        return Err(not_found("pending session not found", &correlation_id));
    }
    Ok(Json(Acknowledged { success: true, message: format!("session {session_id} withdrawn") }))
}

async fn link_session(
    State(state): State<ApiState>,
    Json(request): Json<LinkSessionRequest>,
) -> ApiResult<PhoneLinkResponse> {
    let correlation_id = correlation_id();
    let phone = normalize_phone(&request.phone);
    let session_id = request.session_id.trim();
    if phone.is_empty() || session_id.is_empty() {
        return Err(bad_request("phone and session_id are required", &correlation_id));
    }

    let session_id = SessionId::from(session_id);
    let link = state
        .phone_links
        .link(&phone, &session_id)
        .await
        .map_err(|error| repository_error(error, &correlation_id))?;
    state.pending_links.remove(&session_id);

    info!(
        event_name = "http.links.phone_linked",
        correlation_id = %correlation_id,
        session_id = %session_id,
        "phone linked to session"
    );
    Ok(Json(PhoneLinkResponse {
        phone: link.phone,
        session_id: link.session_id,
        linked_at: link.linked_at.to_rfc3339(),
        last_seen_at: link.last_seen_at.to_rfc3339(),
    }))
}

async fn session_for_phone(
    Path(phone): Path<String>,
    State(state): State<ApiState>,
) -> ApiResult<PhoneLinkResponse> {
    let correlation_id = correlation_id();
    let phone = normalize_phone(&phone);
    let link = state
        .phone_links
        .find_by_phone(&phone)
        .await
        .map_err(|error| repository_error(error, &correlation_id))?
        .ok_or_else(|| not_found("no session linked to this phone", &correlation_id))?;

    Ok(Json(PhoneLinkResponse {
        phone: link.phone,
        session_id: link.session_id,
        linked_at: link.linked_at.to_rfc3339(),
        last_seen_at: link.last_seen_at.to_rfc3339(),
    }))
}

async fn chat(
    State(state): State<ApiState>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<ChatResponse> {
    let correlation_id = correlation_id();
    let message = request.message.trim();
    if message.is_empty() {
        return Err(bad_request("message must not be empty", &correlation_id));
    }

    let session_id = request
        .session_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map_or_else(SessionId::generate, SessionId::from);

    match state.runtime.handle_turn(&session_id, message, &correlation_id).await {
        Ok(reply) => Ok(Json(ChatResponse { session_id, reply: reply.text })),
        Err(error) => {
            warn!(
                event_name = "http.chat.turn_failed",
                correlation_id = %correlation_id,
                session_id = %session_id,
                retryable = error.is_retryable(),
                error = %error,
                "web chat turn failed"
            );
            Err(interface_error(ApplicationError::from(error).into_interface(&correlation_id)))
        }
    }
}

async fn conversation_history(
    Path(phone): Path<String>,
    State(state): State<ApiState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<HistoryResponse> {
    let correlation_id = correlation_id();
    let phone = normalize_phone(&phone);
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, 500);
    let messages = state.transcripts.history(&phone, limit).await.map_err(|error| {
        warn!(
            event_name = "http.transcript.read_failed",
            correlation_id = %correlation_id,
            error = %error,
            "transcript history read failed"
        );
        interface_error(ApplicationError::from(error).into_interface(&correlation_id))
    })?;

    Ok(Json(HistoryResponse { phone, messages }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
        Router,
    };
    use async_trait::async_trait;
    use cartline_agent::{
        AgentRuntime, BoundedPlanner, Capabilities, KeywordSelector, RuntimeSettings,
    };
    use cartline_core::domain::session::{Session, SessionId};
    use cartline_core::links::PendingLinkRegistry;
    use cartline_core::ports::{SessionStore, StoreError};
    use cartline_core::transcript::{
        InMemoryTranscriptStore, TranscriptEntry, TranscriptSender, TranscriptStore,
    };
    use cartline_core::{InMemoryCatalog, InMemoryOrderGateway};
    use cartline_db::{InMemoryPhoneLinkRepository, InMemorySessionStore};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::{router, ApiState};
    use crate::web_cart::WebCartStore;

    struct OfflineStore;

    #[async_trait]
    impl SessionStore for OfflineStore {
        async fn load(&self, _id: &SessionId) -> Result<Session, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_owned()))
        }

        async fn save(&self, _session: &Session) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".to_owned()))
        }
    }

    fn state_with_store(store: Arc<dyn SessionStore>) -> (ApiState, InMemoryTranscriptStore) {
        let web_carts = Arc::new(WebCartStore::default());
        let capabilities = Capabilities::new(
            Arc::new(InMemoryCatalog::demo()),
            Arc::new(InMemoryOrderGateway::default()),
        );
        let runtime = AgentRuntime::new(
            store,
            capabilities,
            BoundedPlanner::new(Arc::new(KeywordSelector), 2),
            RuntimeSettings::default(),
        )
        .with_cart_mirror(web_carts.clone());
        let transcripts = InMemoryTranscriptStore::default();

        let state = ApiState {
            runtime: Arc::new(runtime),
            web_carts,
            pending_links: Arc::new(PendingLinkRegistry::default()),
            phone_links: Arc::new(InMemoryPhoneLinkRepository::default()),
            transcripts: Arc::new(transcripts.clone()),
        };
        (state, transcripts)
    }

    fn app() -> Router {
        router(state_with_store(Arc::new(InMemorySessionStore::default())).0)
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };
        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }

    fn belt() -> Value {
        json!({
            "product_id": "prod-acc-belt-brown",
            "name": "Brown Leather Belt",
            "price": "39.00",
        })
    }

    #[tokio::test]
    async fn unknown_cart_is_empty_not_missing() {
        let (status, body) = send(&app(), Method::GET, "/api/cart/web-1", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cart"], json!([]));
        assert_eq!(body["item_count"], 0);
    }

    #[tokio::test]
    async fn adding_twice_merges_and_totals_are_recomputed() {
        let app = app();
        send(&app, Method::POST, "/api/cart/web-1/add", Some(belt())).await;
        let (status, body) = send(&app, Method::POST, "/api/cart/web-1/add", Some(belt())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cart"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["item_count"], 2);
        assert_eq!(body["total"], "78.00");
    }

    #[tokio::test]
    async fn quantity_updates_remove_at_zero_and_404_on_unknowns() {
        let app = app();
        let (status, _) =
            send(&app, Method::PUT, "/api/cart/web-1/item/prod-acc-belt-brown?quantity=2", None)
                .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        send(&app, Method::POST, "/api/cart/web-1/add", Some(belt())).await;
        let (status, body) =
            send(&app, Method::PUT, "/api/cart/web-1/item/prod-acc-belt-brown?quantity=3", None)
                .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["item_count"], 3);
        assert_eq!(body["total"], "117.00");

        let (status, _) =
            send(&app, Method::PUT, "/api/cart/web-1/item/prod-unknown?quantity=1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) =
            send(&app, Method::PUT, "/api/cart/web-1/item/prod-acc-belt-brown?quantity=0", None)
                .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cart"], json!([]));
    }

    #[tokio::test]
    async fn delete_item_and_clear_cart() {
        let app = app();
        send(&app, Method::POST, "/api/cart/web-1/add", Some(belt())).await;

        let (status, _) =
            send(&app, Method::DELETE, "/api/cart/web-1/item/prod-missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) =
            send(&app, Method::DELETE, "/api/cart/web-1/item/prod-acc-belt-brown", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["item_count"], 0);

        send(&app, Method::POST, "/api/cart/web-1/add", Some(belt())).await;
        let (status, body) = send(&app, Method::DELETE, "/api/cart/web-1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cart"], json!([]));
    }

    #[tokio::test]
    async fn pending_sessions_can_be_prepared_listed_and_withdrawn() {
        let app = app();
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/whatsapp/prepare-session",
            Some(json!({"session_id": "web-42", "timestamp": "1730000000"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&app, Method::GET, "/api/whatsapp/pending-sessions", None).await;
        assert_eq!(body["sessions"][0]["session_id"], "web-42");

        let (status, _) =
            send(&app, Method::DELETE, "/api/whatsapp/pending-sessions/web-42", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) =
            send(&app, Method::DELETE, "/api/whatsapp/pending-sessions/web-42", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn linking_a_phone_strips_the_channel_prefix() {
        let app = app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/whatsapp/link-session",
            Some(json!({"phone": "whatsapp:+15550001111", "session_id": "web-7"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phone"], "+15550001111");

        let (status, body) =
            send(&app, Method::GET, "/api/whatsapp/session/+15550001111", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session_id"], "web-7");

        let (status, _) = send(&app, Method::GET, "/api/whatsapp/session/+19990000000", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn chat_assigns_a_session_and_keeps_it_across_turns() {
        let app = app();
        let (status, body) =
            send(&app, Method::POST, "/api/chat", Some(json!({"message": "hello"}))).await;
        assert_eq!(status, StatusCode::OK);
        let session_id = body["session_id"].as_str().expect("session id").to_owned();
        assert!(session_id.starts_with("session-"));
        assert!(!body["reply"].as_str().unwrap_or_default().is_empty());

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/chat",
            Some(json!({"session_id": session_id, "message": "show my cart"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session_id"], session_id.as_str());
    }

    #[tokio::test]
    async fn chat_reports_store_outage_as_service_unavailable() {
        let app = router(state_with_store(Arc::new(OfflineStore)).0);
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/chat",
            Some(json!({"session_id": "web-1", "message": "show me watches"})),
        )
        .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            body["error"],
            "The service is temporarily unavailable. Please retry shortly."
        );
        assert!(!body["error"].as_str().unwrap_or_default().contains("connection refused"));
    }

    #[tokio::test]
    async fn empty_chat_message_is_a_bad_request() {
        let (status, _) =
            send(&app(), Method::POST, "/api/chat", Some(json!({"message": "   "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn conversation_history_is_newest_first() {
        let (state, transcripts) = state_with_store(Arc::new(InMemorySessionStore::default()));
        for message in ["first", "second"] {
            let mut entry =
                TranscriptEntry::new("+15550001111", None, TranscriptSender::User, message);
            if message == "second" {
                entry.recorded_at += chrono::Duration::seconds(1);
            }
            transcripts.append(&entry).await.expect("append");
        }

        let (status, body) =
            send(&router(state), Method::GET, "/conversation/+15550001111?limit=1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["messages"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["messages"][0]["message"], "second");
    }
}
