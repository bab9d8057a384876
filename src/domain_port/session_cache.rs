use crate::domain_model::*;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache error: {0}")]
    Cache(String),
    #[error("cache timed out")]
    Timeout,
}

/// Shared cross-process cache tier (Redis-like). Any failure here degrades to
/// a miss at the call site; it must never surface as an authentication error.
#[async_trait::async_trait]
pub trait SessionCache: Send + Sync {
    async fn get(&self, id: &SessionId) -> Result<Option<SessionRecord>, CacheError>;
    async fn set(&self, record: &SessionRecord, ttl: Duration) -> Result<(), CacheError>;
    async fn del(&self, id: &SessionId) -> Result<(), CacheError>;
}
