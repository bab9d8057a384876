use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};
use uuid::Uuid;

/// Durable session store over MySQL.
///
/// Expected schema:
///
/// ```sql
/// CREATE TABLE session (
///     session_id      VARCHAR(64)  NOT NULL PRIMARY KEY,
///     user_id         BINARY(16)   NOT NULL,
///     tenant_id       VARCHAR(128) NULL,
///     issued_at       DATETIME(3)  NOT NULL,
///     last_rotated_at DATETIME(3)  NOT NULL,
///     expires_at      DATETIME(3)  NOT NULL,
///     principal       JSON         NOT NULL
/// );
/// ```
pub struct MySqlSessionStore {
    pool: MySqlPool,
}

impl MySqlSessionStore {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlSessionStore { pool }
    }

    #[inline]
    fn uid_as_bytes(id: &UserId) -> &[u8] {
        id.0.as_bytes()
    }

    #[inline]
    fn uid_from_bytes(id: &[u8]) -> Result<UserId, StoreError> {
        Ok(UserId(
            Uuid::from_slice(id).map_err(|e| StoreError::Store(e.to_string()))?,
        ))
    }

    fn row_to_record(row: MySqlRow) -> Result<SessionRecord, StoreError> {
        let session_id: String = row
            .try_get("session_id")
            .map_err(|e| StoreError::Store(e.to_string()))?;

        let user_id_bytes: Vec<u8> = row
            .try_get("user_id")
            .map_err(|e| StoreError::Store(e.to_string()))?;
        let user_id = Self::uid_from_bytes(&user_id_bytes)?;

        let tenant_id: Option<String> = row
            .try_get("tenant_id")
            .map_err(|e| StoreError::Store(e.to_string()))?;

        let issued_at: DateTime<Utc> = row
            .try_get("issued_at")
            .map_err(|e| StoreError::Store(e.to_string()))?;
        let last_rotated_at: DateTime<Utc> = row
            .try_get("last_rotated_at")
            .map_err(|e| StoreError::Store(e.to_string()))?;
        let expires_at: DateTime<Utc> = row
            .try_get("expires_at")
            .map_err(|e| StoreError::Store(e.to_string()))?;

        let principal_json: String = row
            .try_get("principal")
            .map_err(|e| StoreError::Store(e.to_string()))?;
        let principal = serde_json::from_str(&principal_json)
            .map_err(|e| StoreError::Store(format!("corrupt principal payload: {}", e)))?;

        Ok(SessionRecord {
            session_id: SessionId(session_id),
            user_id,
            tenant_id: tenant_id.map(TenantId),
            issued_at,
            last_rotated_at,
            expires_at,
            principal,
        })
    }
}

#[async_trait::async_trait]
impl SessionStore for MySqlSessionStore {
    async fn get(&self, id: &SessionId) -> Result<Option<SessionRecord>, StoreError> {
        let row = sqlx::query(
            r#"
SELECT session_id, user_id, tenant_id, issued_at, last_rotated_at, expires_at, principal
FROM session
WHERE session_id = ?
"#,
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Store(e.to_string()))?;

        row.map(Self::row_to_record).transpose()
    }

    async fn put(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let principal = serde_json::to_string(&record.principal)
            .map_err(|e| StoreError::Store(e.to_string()))?;

        sqlx::query(
            r#"
INSERT INTO session (session_id, user_id, tenant_id, issued_at, last_rotated_at, expires_at, principal)
VALUES (?, ?, ?, ?, ?, ?, ?)
ON DUPLICATE KEY UPDATE
    last_rotated_at = VALUES(last_rotated_at),
    expires_at = VALUES(expires_at),
    principal = VALUES(principal)
"#,
        )
        .bind(&record.session_id.0)
        .bind(Self::uid_as_bytes(&record.user_id))
        .bind(record.tenant_id.as_ref().map(|t| t.0.as_str()))
        .bind(record.issued_at)
        .bind(record.last_rotated_at)
        .bind(record.expires_at)
        .bind(principal)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Store(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM session WHERE session_id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Store(e.to_string()))?;

        Ok(())
    }
}
