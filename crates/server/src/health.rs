use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use cartline_db::DbPool;
use chrono::Utc;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    pub db_pool: DbPool,
    pub whatsapp_enabled: bool,
    pub crm_enabled: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub whatsapp: HealthCheck,
    pub catalog: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

/// Only the session database decides readiness; the other checks report
/// which collaborators this process was wired with.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let ready = database.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "cartline-server accepting turns".to_string(),
        },
        database,
        whatsapp: wiring_check(state.whatsapp_enabled, "twilio sender", "webhook disabled"),
        catalog: wiring_check(state.crm_enabled, "salesforce", "in-memory demo catalog"),
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn wiring_check(enabled: bool, when_enabled: &str, when_disabled: &str) -> HealthCheck {
    if enabled {
        HealthCheck { status: "ready", detail: when_enabled.to_string() }
    } else {
        HealthCheck { status: "disabled", detail: when_disabled.to_string() }
    }
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    let query = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM conversation_session");
    match query.fetch_one(pool).await {
        Ok(count) => HealthCheck { status: "ready", detail: format!("{count} stored session(s)") },
        Err(error) => HealthCheck {
            status: "degraded",
            detail: format!("session store query failed: {error}"),
        },
    }
}
