use super::TenantId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

#[derive(
    Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct UserId(pub uuid::Uuid);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::from_str(s).map(UserId)
    }
}

/// Opaque bearer credential presented by the client, usually via cookie.
/// Never used as a storage key directly; see [`SessionId::derive`].
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionToken(pub String);

impl SessionToken {
    const TOKEN_LEN: usize = 32;

    pub fn generate() -> Self {
        SessionToken(nanoid::nanoid!({ Self::TOKEN_LEN }))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Stable session identifier: hex SHA-256 of the token. All three tiers key
/// by this, so a raw token never appears in cache or store keys.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn derive(token: &SessionToken) -> Self {
        let digest = Sha256::digest(token.0.as_bytes());
        SessionId(hex::encode(digest))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Durable representation of an authenticated session. The store is the sole
/// writer of record; cache tiers only ever hold copies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub tenant_id: Option<TenantId>,
    pub issued_at: DateTime<Utc>,
    pub last_rotated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Roles, permissions, display attributes. Opaque to this crate.
    pub principal: serde_json::Value,
}

impl SessionRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// A session is only valid for a request when it is global (no tenant)
    /// or issued under exactly the request's tenant.
    pub fn allows_tenant(&self, request_tenant: Option<&TenantId>) -> bool {
        match &self.tenant_id {
            None => true,
            Some(owner) => request_tenant == Some(owner),
        }
    }
}
