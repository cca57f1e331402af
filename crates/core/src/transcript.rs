use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::session::SessionId;
use crate::ports::PortError;

pub const DEFAULT_HISTORY_LIMIT: usize = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptSender {
    User,
    Assistant,
    System,
}

impl TranscriptSender {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl FromStr for TranscriptSender {
    type Err = PortError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            other => Err(PortError::Protocol(format!("unknown transcript sender `{other}`"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub entry_id: String,
    pub phone: String,
    pub session_id: Option<SessionId>,
    pub sender: TranscriptSender,
    pub message: String,
    pub metadata: BTreeMap<String, String>,
    pub recorded_at: DateTime<Utc>,
}

impl TranscriptEntry {
    pub fn new(
        phone: impl Into<String>,
        session_id: Option<SessionId>,
        sender: TranscriptSender,
        message: impl Into<String>,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4().to_string(),
            phone: phone.into(),
            session_id,
            sender,
            message: message.into(),
            metadata: BTreeMap::new(),
            recorded_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Append-only per-phone message log.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    async fn append(&self, entry: &TranscriptEntry) -> Result<(), PortError>;
    /// Newest first, at most `limit` entries.
    async fn history(&self, phone: &str, limit: usize) -> Result<Vec<TranscriptEntry>, PortError>;
}

#[derive(Clone, Default)]
pub struct InMemoryTranscriptStore {
    entries: Arc<Mutex<Vec<TranscriptEntry>>>,
}

impl InMemoryTranscriptStore {
    pub fn entries(&self) -> Vec<TranscriptEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl TranscriptStore for InMemoryTranscriptStore {
    async fn append(&self, entry: &TranscriptEntry) -> Result<(), PortError> {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry.clone()),
            Err(poisoned) => poisoned.into_inner().push(entry.clone()),
        }
        Ok(())
    }

    async fn history(&self, phone: &str, limit: usize) -> Result<Vec<TranscriptEntry>, PortError> {
        let mut matching: Vec<_> =
            self.entries().into_iter().filter(|entry| entry.phone == phone).collect();
        matching.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        matching.truncate(limit);
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::domain::session::SessionId;

    use super::{InMemoryTranscriptStore, TranscriptEntry, TranscriptSender, TranscriptStore};

    #[tokio::test]
    async fn history_is_per_phone_newest_first_and_limited() {
        let store = InMemoryTranscriptStore::default();
        let base = Utc::now();
        for (offset, message) in ["hi", "show me watches", "add option 1"].iter().enumerate() {
            let mut entry = TranscriptEntry::new(
                "+15550001111",
                Some(SessionId::from("session-abc")),
                TranscriptSender::User,
                *message,
            );
            entry.recorded_at = base + Duration::seconds(offset as i64);
            store.append(&entry).await.expect("append");
        }
        store
            .append(&TranscriptEntry::new("+15559999999", None, TranscriptSender::User, "other"))
            .await
            .expect("append other phone");

        let history = store.history("+15550001111", 2).await.expect("history");
        let messages: Vec<_> = history.iter().map(|entry| entry.message.as_str()).collect();
        assert_eq!(messages, vec!["add option 1", "show me watches"]);
    }

    #[test]
    fn sender_round_trips_through_its_tag() {
        let senders =
            [TranscriptSender::User, TranscriptSender::Assistant, TranscriptSender::System];
        for sender in senders {
            assert_eq!(sender.as_str().parse::<TranscriptSender>(), Ok(sender));
        }
        assert!("bot".parse::<TranscriptSender>().is_err());
    }

    #[test]
    fn metadata_is_attached_to_entry() {
        let entry = TranscriptEntry::new("+1555", None, TranscriptSender::System, "send failed")
            .with_metadata("error", "timeout");
        assert_eq!(entry.metadata.get("error").map(String::as_str), Some("timeout"));
    }
}
