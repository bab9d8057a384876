use crate::domain_model::*;
use dashmap::DashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct HotCacheConfig {
    /// Cap on the working set; the least-recently-used entry is dropped
    /// when exceeded.
    pub capacity: usize,
}

impl Default for HotCacheConfig {
    fn default() -> Self {
        HotCacheConfig { capacity: 100 }
    }
}

struct HotEntry {
    record: SessionRecord,
    expires_at: Instant,
    last_accessed: Instant,
}

/// In-process tier for the worker's most recently seen sessions. No I/O,
/// never blocks on the request path; the only failure mode is a miss.
///
/// Entries self-expire on a wall-clock TTL (shorter than the distributed
/// tier's) so staleness against the store stays bounded even without
/// capacity pressure. Eviction is purely a capacity decision; an evicted
/// entry just becomes a miss on the next lookup.
pub struct HotCache {
    entries: DashMap<SessionId, HotEntry>,
    capacity: usize,
}

impl HotCache {
    pub fn new(config: HotCacheConfig) -> Self {
        HotCache {
            entries: DashMap::new(),
            capacity: config.capacity,
        }
    }

    pub fn get(&self, id: &SessionId) -> Option<SessionRecord> {
        {
            let mut entry = self.entries.get_mut(id)?;
            if Instant::now() < entry.expires_at {
                entry.last_accessed = Instant::now();
                return Some(entry.record.clone());
            }
        }
        // aged out on the internal clock; drop it so lookups fall through
        self.entries.remove(id);
        None
    }

    /// Overwrites any existing entry for the same session.
    pub fn put(&self, record: SessionRecord, ttl: Duration) {
        let now = Instant::now();
        self.entries.insert(
            record.session_id.clone(),
            HotEntry {
                record,
                expires_at: now + ttl,
                last_accessed: now,
            },
        );
        self.evict_over_capacity();
    }

    pub fn remove(&self, id: &SessionId) {
        self.entries.remove(id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_over_capacity(&self) {
        while self.entries.len() > self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.value().last_accessed)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}
