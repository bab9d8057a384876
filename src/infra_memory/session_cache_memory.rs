use crate::domain_model::*;
use crate::domain_port::*;
use dashmap::DashMap;
use std::time::{Duration, Instant};

struct CachedRecord {
    record: SessionRecord,
    expires_at: Instant,
}

/// In-process stand-in for the distributed cache tier, honoring per-entry
/// TTLs. Backs the `memory` backend selection and the test suites.
#[derive(Default)]
pub struct MemorySessionCache {
    entries: DashMap<SessionId, CachedRecord>,
}

impl MemorySessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait::async_trait]
impl SessionCache for MemorySessionCache {
    async fn get(&self, id: &SessionId) -> Result<Option<SessionRecord>, CacheError> {
        match self.entries.get(id) {
            Some(entry) if Instant::now() < entry.expires_at => {
                Ok(Some(entry.record.clone()))
            }
            Some(entry) => {
                drop(entry);
                self.entries.remove(id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, record: &SessionRecord, ttl: Duration) -> Result<(), CacheError> {
        self.entries.insert(
            record.session_id.clone(),
            CachedRecord {
                record: record.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn del(&self, id: &SessionId) -> Result<(), CacheError> {
        self.entries.remove(id);
        Ok(())
    }
}
