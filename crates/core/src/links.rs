//! Short-lived registry of web sessions waiting to be claimed by a phone.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::session::SessionId;

pub const DEFAULT_PENDING_TTL_SECS: u64 = 300;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingLink {
    pub session_id: SessionId,
    pub prepared_at: DateTime<Utc>,
    pub client_timestamp: Option<String>,
}

#[derive(Debug)]
pub struct PendingLinkRegistry {
    ttl: Duration,
    entries: Mutex<BTreeMap<SessionId, PendingLink>>,
}

impl Default for PendingLinkRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_PENDING_TTL_SECS)
    }
}

impl PendingLinkRegistry {
    pub fn new(ttl_secs: u64) -> Self {
        let ttl = Duration::seconds(i64::try_from(ttl_secs).unwrap_or(i64::MAX / 1_000));
        Self { ttl, entries: Mutex::new(BTreeMap::new()) }
    }

    pub fn prepare(&self, session_id: SessionId, client_timestamp: Option<String>) -> PendingLink {
        self.prepare_at(session_id, client_timestamp, Utc::now())
    }

    pub fn prepare_at(
        &self,
        session_id: SessionId,
        client_timestamp: Option<String>,
        now: DateTime<Utc>,
    ) -> PendingLink {
        let link =
            PendingLink { session_id: session_id.clone(), prepared_at: now, client_timestamp };
        self.with_entries(|entries| {
            entries.insert(session_id, link.clone());
        });
        link
    }

    /// Live entries, oldest first. Expired entries are dropped as a side effect.
    pub fn pending(&self) -> Vec<PendingLink> {
        self.pending_at(Utc::now())
    }

    pub fn pending_at(&self, now: DateTime<Utc>) -> Vec<PendingLink> {
        let ttl = self.ttl;
        self.with_entries(|entries| {
            entries.retain(|_, link| now - link.prepared_at < ttl);
            let mut live: Vec<_> = entries.values().cloned().collect();
            live.sort_by(|a, b| a.prepared_at.cmp(&b.prepared_at));
            live
        })
    }

    pub fn remove(&self, session_id: &SessionId) -> bool {
        self.with_entries(|entries| entries.remove(session_id).is_some())
    }

    /// Takes the oldest live entry out of the registry.
    pub fn claim_oldest(&self) -> Option<SessionId> {
        self.claim_oldest_at(Utc::now())
    }

    pub fn claim_oldest_at(&self, now: DateTime<Utc>) -> Option<SessionId> {
        let oldest = self.pending_at(now).into_iter().next()?;
        self.remove(&oldest.session_id).then_some(oldest.session_id)
    }

    fn with_entries<T>(&self, f: impl FnOnce(&mut BTreeMap<SessionId, PendingLink>) -> T) -> T {
        match self.entries.lock() {
            Ok(mut entries) => f(&mut entries),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}
