use chrono::Utc;
use sqlx::Row;

use cartline_core::domain::session::SessionId;

use super::{format_timestamp, parse_timestamp, PhoneLink, PhoneLinkRepository, RepositoryError};
use crate::DbPool;

pub struct SqlPhoneLinkRepository {
    pool: DbPool,
}

impl SqlPhoneLinkRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_link(row: &sqlx::sqlite::SqliteRow) -> Result<PhoneLink, RepositoryError> {
    let phone: String = row.try_get("phone").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let session_id: String =
        row.try_get("session_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let linked_at: String =
        row.try_get("linked_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let last_seen_at: String =
        row.try_get("last_seen_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(PhoneLink {
        phone,
        session_id: SessionId(session_id),
        linked_at: parse_timestamp("linked_at", &linked_at)?,
        last_seen_at: parse_timestamp("last_seen_at", &last_seen_at)?,
    })
}

#[async_trait::async_trait]
impl PhoneLinkRepository for SqlPhoneLinkRepository {
    async fn find_by_phone(&self, phone: &str) -> Result<Option<PhoneLink>, RepositoryError> {
        let row = sqlx::query(
            "SELECT phone, session_id, linked_at, last_seen_at
             FROM phone_session_link WHERE phone = ?",
        )
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_link).transpose()
    }

    async fn link(
        &self,
        phone: &str,
        session_id: &SessionId,
    ) -> Result<PhoneLink, RepositoryError> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO phone_session_link (phone, session_id, linked_at, last_seen_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(phone) DO UPDATE SET
                 session_id = excluded.session_id,
                 linked_at = excluded.linked_at,
                 last_seen_at = excluded.last_seen_at",
        )
        .bind(phone)
        .bind(session_id.as_str())
        .bind(format_timestamp(&now))
        .bind(format_timestamp(&now))
        .execute(&self.pool)
        .await?;

        Ok(PhoneLink {
            phone: phone.to_owned(),
            session_id: session_id.clone(),
            linked_at: now,
            last_seen_at: now,
        })
    }

    async fn touch(&self, phone: &str) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE phone_session_link SET last_seen_at = ? WHERE phone = ?")
            .bind(format_timestamp(&Utc::now()))
            .bind(phone)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use cartline_core::domain::session::SessionId;

    use super::SqlPhoneLinkRepository;
    use crate::repositories::PhoneLinkRepository;
    use crate::{connect_with_settings, migrations};

    async fn repo() -> SqlPhoneLinkRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlPhoneLinkRepository::new(pool)
    }

    #[tokio::test]
    async fn link_then_find_round_trip() {
        let repo = repo().await;
        assert!(repo.find_by_phone("+15550001111").await.expect("find").is_none());

        repo.link("+15550001111", &SessionId::from("session-web")).await.expect("link");
        let found = repo.find_by_phone("+15550001111").await.expect("find").expect("linked");

        assert_eq!(found.session_id.as_str(), "session-web");
    }

    #[tokio::test]
    async fn relinking_replaces_session() {
        let repo = repo().await;
        repo.link("+15550001111", &SessionId::from("session-a")).await.expect("first");
        repo.link("+15550001111", &SessionId::from("session-b")).await.expect("second");
        repo.touch("+15550001111").await.expect("touch");

        let found = repo.find_by_phone("+15550001111").await.expect("find").expect("linked");
        assert_eq!(found.session_id.as_str(), "session-b");
        assert!(found.last_seen_at >= found.linked_at);
    }
}
