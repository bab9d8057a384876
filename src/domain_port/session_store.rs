use crate::domain_model::*;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store error: {0}")]
    Store(String),
    #[error("store timed out")]
    Timeout,
}

/// Durable source of truth for sessions. Network round-trip; may fail or be
/// slow, so callers wrap every call in a timeout.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: &SessionId) -> Result<Option<SessionRecord>, StoreError>;
    async fn put(&self, record: &SessionRecord) -> Result<(), StoreError>;
    async fn delete(&self, id: &SessionId) -> Result<(), StoreError>;
}
