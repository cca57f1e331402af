use std::collections::BTreeMap;

use sqlx::Row;

use cartline_core::domain::session::SessionId;
use cartline_core::ports::PortError;
use cartline_core::transcript::{TranscriptEntry, TranscriptStore};

use super::{format_timestamp, parse_timestamp, RepositoryError};
use crate::DbPool;

pub struct SqlTranscriptStore {
    pool: DbPool,
}

impl SqlTranscriptStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<TranscriptEntry, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());
    let entry_id: String = row.try_get("id").map_err(decode)?;
    let phone: String = row.try_get("phone").map_err(decode)?;
    let session_id: Option<String> = row.try_get("session_id").map_err(decode)?;
    let sender: String = row.try_get("sender").map_err(decode)?;
    let message: String = row.try_get("message").map_err(decode)?;
    let metadata_json: String = row.try_get("metadata_json").map_err(decode)?;
    let recorded_at: String = row.try_get("recorded_at").map_err(decode)?;

    let metadata: BTreeMap<String, String> = serde_json::from_str(&metadata_json)?;

    Ok(TranscriptEntry {
        entry_id,
        phone,
        session_id: session_id.map(SessionId),
        sender: sender.parse().map_err(|e: PortError| RepositoryError::Decode(e.to_string()))?,
        message,
        metadata,
        recorded_at: parse_timestamp("recorded_at", &recorded_at)?,
    })
}

#[async_trait::async_trait]
impl TranscriptStore for SqlTranscriptStore {
    async fn append(&self, entry: &TranscriptEntry) -> Result<(), PortError> {
        let metadata_json = serde_json::to_string(&entry.metadata).map_err(RepositoryError::from)?;
        sqlx::query(
            "INSERT INTO transcript_message
                 (id, phone, session_id, sender, message, metadata_json, recorded_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.entry_id)
        .bind(&entry.phone)
        .bind(entry.session_id.as_ref().map(SessionId::as_str))
        .bind(entry.sender.as_str())
        .bind(&entry.message)
        .bind(metadata_json)
        .bind(format_timestamp(&entry.recorded_at))
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn history(&self, phone: &str, limit: usize) -> Result<Vec<TranscriptEntry>, PortError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(
            "SELECT id, phone, session_id, sender, message, metadata_json, recorded_at
             FROM transcript_message
             WHERE phone = ?
             ORDER BY recorded_at DESC
             LIMIT ?",
        )
        .bind(phone)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        rows.iter()
            .map(row_to_entry)
            .collect::<Result<Vec<_>, _>>()
            .map_err(PortError::from)
    }
}
