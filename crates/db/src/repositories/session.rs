use sqlx::Row;

use cartline_core::domain::session::{Session, SessionId};
use cartline_core::ports::{SessionStore, StoreError};

use super::{format_timestamp, RepositoryError};
use crate::DbPool;

/// Stores each session as one JSON snapshot row, replaced whole on save.
pub struct SqlSessionStore {
    pool: DbPool,
}

impl SqlSessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, id: &SessionId) -> Result<Option<String>, RepositoryError> {
        let row = sqlx::query("SELECT snapshot_json FROM conversation_session WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| row.try_get::<String, _>("snapshot_json"))
            .transpose()
            .map_err(|error| RepositoryError::Decode(error.to_string()))
    }
}

#[async_trait::async_trait]
impl SessionStore for SqlSessionStore {
    async fn load(&self, id: &SessionId) -> Result<Session, StoreError> {
        let Some(snapshot) = self.fetch(id).await? else {
            return Ok(Session::new(id.clone()));
        };
        serde_json::from_str::<Session>(&snapshot).map_err(|error| StoreError::Corrupt {
            session_id: id.to_string(),
            reason: error.to_string(),
        })
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        let snapshot = serde_json::to_string(session).map_err(RepositoryError::from)?;
        let updated_at = format_timestamp(&session.updated_at);

        sqlx::query(
            "INSERT INTO conversation_session (id, mode, snapshot_json, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 mode = excluded.mode,
                 snapshot_json = excluded.snapshot_json,
                 updated_at = excluded.updated_at",
        )
        .bind(session.id.as_str())
        .bind(session.mode.as_str())
        .bind(snapshot)
        .bind(&updated_at)
        .bind(&updated_at)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(())
    }
}
