use crate::domain_model::*;
use crate::domain_port::*;
use dashmap::DashMap;

/// In-process stand-in for the durable store. Backs the `memory` backend
/// selection and the test suites.
#[derive(Default)]
pub struct MemorySessionStore {
    records: DashMap<SessionId, SessionRecord>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Seed a record directly, the way the external login flow would.
    pub fn insert(&self, record: SessionRecord) {
        self.records.insert(record.session_id.clone(), record);
    }
}

#[async_trait::async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, id: &SessionId) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.records.get(id).map(|entry| entry.value().clone()))
    }

    async fn put(&self, record: &SessionRecord) -> Result<(), StoreError> {
        self.records
            .insert(record.session_id.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<(), StoreError> {
        self.records.remove(id);
        Ok(())
    }
}
