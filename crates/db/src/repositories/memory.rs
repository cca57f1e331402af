use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use cartline_core::domain::session::{Session, SessionId};
use cartline_core::ports::{SessionStore, StoreError};

use super::{PhoneLink, PhoneLinkRepository, RepositoryError};

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, id: &SessionId) -> Result<Session, StoreError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(id.as_str()).cloned().unwrap_or_else(|| Session::new(id.clone())))
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.0.clone(), session.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryPhoneLinkRepository {
    links: RwLock<HashMap<String, PhoneLink>>,
}

#[async_trait::async_trait]
impl PhoneLinkRepository for InMemoryPhoneLinkRepository {
    async fn find_by_phone(&self, phone: &str) -> Result<Option<PhoneLink>, RepositoryError> {
        let links = self.links.read().await;
        Ok(links.get(phone).cloned())
    }

    async fn link(
        &self,
        phone: &str,
        session_id: &SessionId,
    ) -> Result<PhoneLink, RepositoryError> {
        let now = Utc::now();
        let link = PhoneLink {
            phone: phone.to_owned(),
            session_id: session_id.clone(),
            linked_at: now,
            last_seen_at: now,
        };
        let mut links = self.links.write().await;
        links.insert(phone.to_owned(), link.clone());
        Ok(link)
    }

    async fn touch(&self, phone: &str) -> Result<(), RepositoryError> {
        let mut links = self.links.write().await;
        if let Some(link) = links.get_mut(phone) {
            link.last_seen_at = Utc::now();
        }
        Ok(())
    }
}
