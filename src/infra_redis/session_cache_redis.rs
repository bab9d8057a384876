use crate::domain_model::*;
use crate::domain_port::*;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::Duration;

/// Distributed cache tier over Redis. Records travel as JSON under
/// prefix-spaced keys; every failure maps to [`CacheError`] and the caller
/// degrades it to a miss.
pub struct RedisSessionCache {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisSessionCache {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisSessionCache {
            conn,
            prefix: prefix.into(),
        }
    }

    fn key(&self, id: &SessionId) -> String {
        format!("{}:{}", self.prefix, id)
    }
}

#[async_trait::async_trait]
impl SessionCache for RedisSessionCache {
    async fn get(&self, id: &SessionId) -> Result<Option<SessionRecord>, CacheError> {
        let key = self.key(id);
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| CacheError::Cache(e.to_string()))?;
        match raw {
            Some(json) => {
                let record = serde_json::from_str(&json)
                    .map_err(|e| CacheError::Cache(format!("corrupt cache entry: {}", e)))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, record: &SessionRecord, ttl: Duration) -> Result<(), CacheError> {
        let key = self.key(&record.session_id);
        let json =
            serde_json::to_string(record).map_err(|e| CacheError::Cache(e.to_string()))?;
        let ttl_secs = ttl.as_secs().max(1);
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(&key, json, ttl_secs)
            .await
            .map_err(|e| CacheError::Cache(e.to_string()))?;
        Ok(())
    }

    async fn del(&self, id: &SessionId) -> Result<(), CacheError> {
        let key = self.key(id);
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(&key)
            .await
            .map_err(|e| CacheError::Cache(e.to_string()))?;
        Ok(())
    }
}
