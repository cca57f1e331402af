use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cartline_core::config::AgentConfig;
use cartline_core::domain::session::{ConversationMode, Session, SessionId};
use cartline_core::errors::ApplicationError;
use cartline_core::ports::{CartMirror, SessionStore, StoreError};
use thiserror::Error;
use tracing::{info, warn};

use crate::capabilities::{Capabilities, CapabilityKind};
use crate::planner::BoundedPlanner;
use crate::shortcuts::{Shortcut, ShortcutResolver};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnReply {
    pub text: String,
    pub shortcut_used: bool,
    pub capability: Option<CapabilityKind>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TurnError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("turn exceeded {after_secs}s and was abandoned")]
    TimedOut { after_secs: u64 },
}

impl TurnError {
    /// Both failures leave the stored session untouched, so a resend is safe.
    pub fn is_retryable(&self) -> bool {
        true
    }
}

impl From<TurnError> for ApplicationError {
    fn from(value: TurnError) -> Self {
        match value {
            TurnError::Store(error) => error.into(),
            TurnError::TimedOut { after_secs } => {
                Self::Timeout(format!("turn exceeded {after_secs}s and was abandoned"))
            }
        }
    }
}

/// One async mutex per session id. Idle entries are pruned on access.
#[derive(Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<SessionId, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionLocks {
    pub fn handle(&self, session_id: &SessionId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(session_id.clone()).or_default())
    }

    pub fn len(&self) -> usize {
        match self.locks.lock() {
            Ok(locks) => locks.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

const CART_MIRROR_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub turn_timeout: Duration,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self { turn_timeout: Duration::from_secs(30) }
    }
}

impl From<&AgentConfig> for RuntimeSettings {
    fn from(config: &AgentConfig) -> Self {
        Self { turn_timeout: Duration::from_secs(config.turn_timeout_secs.max(1)) }
    }
}

pub struct AgentRuntime {
    store: Arc<dyn SessionStore>,
    capabilities: Capabilities,
    planner: BoundedPlanner,
    shortcuts: ShortcutResolver,
    locks: SessionLocks,
    cart_mirror: Option<Arc<dyn CartMirror>>,
    settings: RuntimeSettings,
}

impl AgentRuntime {
    pub fn new(
        store: Arc<dyn SessionStore>,
        capabilities: Capabilities,
        planner: BoundedPlanner,
        settings: RuntimeSettings,
    ) -> Self {
        Self {
            store,
            capabilities,
            planner,
            shortcuts: ShortcutResolver,
            locks: SessionLocks::default(),
            cart_mirror: None,
            settings,
        }
    }

    pub fn with_cart_mirror(mut self, mirror: Arc<dyn CartMirror>) -> Self {
        self.cart_mirror = Some(mirror);
        self
    }

    /// Runs one turn under the session's lock: load, shortcut or plan, save.
    pub async fn handle_turn(
        &self,
        session_id: &SessionId,
        utterance: &str,
        correlation_id: &str,
    ) -> Result<TurnReply, TurnError> {
        let lock = self.locks.handle(session_id);
        let _guard = lock.lock().await;

        let mut session = self.store.load(session_id).await.map_err(|error| {
            warn!(
                event_name = "agent.turn.load_failed",
                correlation_id,
                session_id = %session_id,
                error = %error,
                "session load failed; turn aborted"
            );
            TurnError::Store(error)
        })?;

        let reply = match tokio::time::timeout(
            self.settings.turn_timeout,
            self.dispatch(utterance, &mut session, correlation_id),
        )
        .await
        {
            Ok(reply) => reply,
            Err(_) => {
                let after_secs = self.settings.turn_timeout.as_secs();
                warn!(
                    event_name = "agent.turn.timed_out",
                    correlation_id,
                    session_id = %session_id,
                    after_secs,
                    "turn timed out; working snapshot discarded"
                );
                return Err(TurnError::TimedOut { after_secs });
            }
        };

        session.touch();
        self.store.save(&session).await.map_err(|error| {
            warn!(
                event_name = "agent.turn.save_failed",
                correlation_id,
                session_id = %session_id,
                error = %error,
                "session save failed"
            );
            TurnError::Store(error)
        })?;
        self.mirror_cart(&session, correlation_id).await;
        drop(_guard);

        info!(
            event_name = "agent.turn.completed",
            correlation_id,
            session_id = %session_id,
            shortcut_used = reply.shortcut_used,
            capability = reply.capability.map(CapabilityKind::action_name).unwrap_or("none"),
            mode = session.mode.as_str(),
            "turn completed"
        );
        Ok(reply)
    }

    async fn dispatch(
        &self,
        utterance: &str,
        session: &mut Session,
        correlation_id: &str,
    ) -> TurnReply {
        match self.shortcuts.resolve(utterance, session) {
            Some(Shortcut::Invoke(capability)) => {
                let text =
                    self.capabilities.invoke(capability, utterance, session, correlation_id).await;
                TurnReply { text, shortcut_used: true, capability: Some(capability) }
            }
            Some(Shortcut::Reply(canned)) => {
                if canned.resets_mode() {
                    session.mode = ConversationMode::Browsing;
                }
                TurnReply { text: canned.text().to_owned(), shortcut_used: true, capability: None }
            }
            None => {
                let outcome =
                    self.planner.run(utterance, session, &self.capabilities, correlation_id).await;
                TurnReply {
                    text: outcome.text,
                    shortcut_used: false,
                    capability: outcome.capability,
                }
            }
        }
    }

    /// Pushes the saved cart to the mirror while the session lock is held, so
    /// mirrored snapshots land in turn order. Failures never fail the turn.
    async fn mirror_cart(&self, session: &Session, correlation_id: &str) {
        let Some(mirror) = self.cart_mirror.as_ref() else {
            return;
        };

        match tokio::time::timeout(CART_MIRROR_TIMEOUT, mirror.sync(&session.id, &session.cart))
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(error)) => warn!(
                event_name = "agent.cart_mirror.failed",
                correlation_id,
                session_id = %session.id,
                error = %error,
                "web cart mirror failed"
            ),
            Err(_) => warn!(
                event_name = "agent.cart_mirror.timed_out",
                correlation_id,
                session_id = %session.id,
                after_ms = CART_MIRROR_TIMEOUT.as_millis() as u64,
                "web cart mirror timed out"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cartline_core::domain::session::SessionId;

    use super::{SessionLocks, TurnError};
    use cartline_core::errors::ApplicationError;
    use cartline_core::ports::StoreError;

    #[test]
    fn same_session_shares_a_lock_and_idle_locks_are_pruned() {
        let locks = SessionLocks::default();
        let a = SessionId::from("session-a");

        let first = locks.handle(&a);
        let second = locks.handle(&a);
        assert!(Arc::ptr_eq(&first, &second));

        drop(first);
        drop(second);
        let _other = locks.handle(&SessionId::from("session-b"));
        assert_eq!(locks.len(), 1);
    }

    #[test]
    fn turn_errors_map_to_retryable_application_errors() {
        let store: ApplicationError =
            TurnError::Store(StoreError::Unavailable("pool closed".to_owned())).into();
        let timeout: ApplicationError = TurnError::TimedOut { after_secs: 30 }.into();

        assert!(matches!(store, ApplicationError::Persistence(_)));
        assert!(matches!(timeout, ApplicationError::Timeout(_)));
        assert!(store.is_retryable() && timeout.is_retryable());
    }
}
