use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Error as JsonError;
use thiserror::Error;

use cartline_core::domain::session::SessionId;
use cartline_core::ports::{PortError, StoreError};

pub mod link;
pub mod memory;
pub mod session;
pub mod transcript;

pub use link::SqlPhoneLinkRepository;
pub use memory::{InMemoryPhoneLinkRepository, InMemorySessionStore};
pub use session::SqlSessionStore;
pub use transcript::SqlTranscriptStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<JsonError> for RepositoryError {
    fn from(value: JsonError) -> Self {
        Self::Decode(value.to_string())
    }
}

impl From<RepositoryError> for StoreError {
    fn from(value: RepositoryError) -> Self {
        Self::Unavailable(value.to_string())
    }
}

impl From<RepositoryError> for PortError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Database(error) => Self::Unavailable(error.to_string()),
            RepositoryError::Decode(message) => Self::Protocol(message),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhoneLink {
    pub phone: String,
    pub session_id: SessionId,
    pub linked_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// Durable phone number to session mapping.
#[async_trait]
pub trait PhoneLinkRepository: Send + Sync {
    async fn find_by_phone(&self, phone: &str) -> Result<Option<PhoneLink>, RepositoryError>;
    /// Points `phone` at `session_id`, replacing any previous link.
    async fn link(&self, phone: &str, session_id: &SessionId)
        -> Result<PhoneLink, RepositoryError>;
    async fn touch(&self, phone: &str) -> Result<(), RepositoryError>;
}

/// Fixed-width UTC timestamps so text ordering matches time ordering.
pub(crate) fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("{column}: {error}")))
}
