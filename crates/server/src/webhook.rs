use std::sync::Arc;

use axum::{
    extract::{Form, State},
    http::header,
    response::IntoResponse,
    routing::post,
    Router,
};
use cartline_agent::{AgentRuntime, TurnReply};
use cartline_core::domain::session::SessionId;
use cartline_core::links::PendingLinkRegistry;
use cartline_core::transcript::{TranscriptEntry, TranscriptSender, TranscriptStore};
use cartline_db::{PhoneLinkRepository, RepositoryError};
use cartline_whatsapp::{
    DeliveryError, DeliveryReport, Deliverer, InboundMessage, WebhookForm, EMPTY_TWIML,
    TURN_FAILURE_MESSAGE,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct WebhookState {
    pub runtime: Arc<AgentRuntime>,
    pub pending_links: Arc<PendingLinkRegistry>,
    pub phone_links: Arc<dyn PhoneLinkRepository>,
    pub transcripts: Arc<dyn TranscriptStore>,
    pub deliverer: Arc<Deliverer>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionSource {
    ClaimedPending,
    ExistingLink,
    Created,
}

impl SessionSource {
    fn as_str(self) -> &'static str {
        match self {
            Self::ClaimedPending => "claimed_pending",
            Self::ExistingLink => "existing_link",
            Self::Created => "created",
        }
    }
}

pub fn router(state: WebhookState) -> Router {
    Router::new().route("/webhook", post(receive)).with_state(state)
}

/// Acknowledges at once; the turn and the reply run in a background task.
async fn receive(
    State(state): State<WebhookState>,
    Form(form): Form<WebhookForm>,
) -> impl IntoResponse {
    let correlation_id = format!("wa-{}", Uuid::new_v4().simple());
    match InboundMessage::try_from(form) {
        Ok(message) => {
            info!(
                event_name = "ingress.whatsapp.received",
                correlation_id = %correlation_id,
                message_sid = message.message_sid.as_deref().unwrap_or("unknown"),
                "inbound whatsapp message accepted"
            );
            tokio::spawn(async move {
                if let Err(error) = process_inbound(&state, message, &correlation_id).await {
                    debug!(
                        event_name = "ingress.whatsapp.unanswered",
                        correlation_id = %correlation_id,
                        error = %error,
                        "inbound message left unanswered"
                    );
                }
            });
        }
        Err(error) => {
            warn!(
                event_name = "ingress.whatsapp.ignored",
                correlation_id = %correlation_id,
                error = %error,
                "inbound whatsapp payload ignored"
            );
        }
    }

    ([(header::CONTENT_TYPE, "application/xml")], EMPTY_TWIML)
}

/// Oldest pending web session first, then the phone's existing link, then a
/// brand new session.
pub async fn resolve_session(
    state: &WebhookState,
    phone: &str,
) -> Result<(SessionId, SessionSource), RepositoryError> {
    if let Some(session_id) = state.pending_links.claim_oldest() {
        state.phone_links.link(phone, &session_id).await?;
        return Ok((session_id, SessionSource::ClaimedPending));
    }

    if let Some(link) = state.phone_links.find_by_phone(phone).await? {
        state.phone_links.touch(phone).await?;
        return Ok((link.session_id, SessionSource::ExistingLink));
    }

    let session_id = SessionId::generate();
    state.phone_links.link(phone, &session_id).await?;
    Ok((session_id, SessionSource::Created))
}

/// Runs one inbound message end to end. Every path ends in an outbound
/// message attempt; transcript failures are logged and otherwise ignored.
pub async fn process_inbound(
    state: &WebhookState,
    message: InboundMessage,
    correlation_id: &str,
) -> Result<DeliveryReport, DeliveryError> {
    let to = message.reply_address();
    let session_id = match resolve_session(state, &message.phone).await {
        Ok((session_id, source)) => {
            info!(
                event_name = "ingress.whatsapp.session_resolved",
                correlation_id,
                session_id = %session_id,
                source = source.as_str(),
                "inbound message mapped to session"
            );
            session_id
        }
        Err(error) => {
            warn!(
                event_name = "ingress.whatsapp.session_unresolved",
                correlation_id,
                error = %error,
                "could not map phone to a session"
            );
            let entry = TranscriptEntry::new(
                &message.phone,
                None,
                TranscriptSender::System,
                "session lookup failed",
            )
            .with_metadata("error", error.to_string());
            record(state, entry, correlation_id).await;
            return state.deliverer.deliver(&to, TURN_FAILURE_MESSAGE, correlation_id).await;
        }
    };

    let mut user_entry = TranscriptEntry::new(
        &message.phone,
        Some(session_id.clone()),
        TranscriptSender::User,
        &message.body,
    );
    if let Some(message_sid) = &message.message_sid {
        user_entry = user_entry.with_metadata("message_sid", message_sid);
    }
    record(state, user_entry, correlation_id).await;

    let text = match state.runtime.handle_turn(&session_id, &message.body, correlation_id).await {
        Ok(TurnReply { text, capability, shortcut_used }) => {
            let mut entry = TranscriptEntry::new(
                &message.phone,
                Some(session_id.clone()),
                TranscriptSender::Assistant,
                &text,
            )
            .with_metadata("shortcut_used", shortcut_used.to_string());
            if let Some(capability) = capability {
                entry = entry.with_metadata("capability", capability.action_name());
            }
            record(state, entry, correlation_id).await;
            text
        }
        Err(error) => {
            warn!(
                event_name = "ingress.whatsapp.turn_failed",
                correlation_id,
                session_id = %session_id,
                error = %error,
                "turn failed; sending apology"
            );
            record(
                state,
                TranscriptEntry::new(
                    &message.phone,
                    Some(session_id.clone()),
                    TranscriptSender::System,
                    "turn failed",
                )
                .with_metadata("error", error.to_string()),
                correlation_id,
            )
            .await;
            TURN_FAILURE_MESSAGE.to_owned()
        }
    };

    let outcome = state.deliverer.deliver(&to, &text, correlation_id).await;
    match &outcome {
        Ok(DeliveryReport::FellBack { error, .. }) => {
            record(
                state,
                TranscriptEntry::new(
                    &message.phone,
                    Some(session_id.clone()),
                    TranscriptSender::System,
                    "full reply undeliverable; fallback sent",
                )
                .with_metadata("error", error.to_string()),
                correlation_id,
            )
            .await;
        }
        Ok(DeliveryReport::Delivered { .. }) => {}
        Err(error) => {
            warn!(
                event_name = "egress.whatsapp.undeliverable",
                correlation_id,
                session_id = %session_id,
                error = %error,
                "reply and fallback both failed"
            );
            record(
                state,
                TranscriptEntry::new(
                    &message.phone,
                    Some(session_id),
                    TranscriptSender::System,
                    "reply undeliverable",
                )
                .with_metadata("error", error.to_string()),
                correlation_id,
            )
            .await;
        }
    }
    outcome
}

async fn record(state: &WebhookState, entry: TranscriptEntry, correlation_id: &str) {
    if let Err(error) = state.transcripts.append(&entry).await {
        warn!(
            event_name = "transcript.append_failed",
            correlation_id,
            sender = entry.sender.as_str(),
            error = %error,
            "transcript entry dropped"
        );
    }
}
