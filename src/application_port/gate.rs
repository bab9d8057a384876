use crate::domain_model::*;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// The durable store failed on the final fallback. It is ambiguous
    /// whether the user is logged in, so this must surface as a 5xx rather
    /// than a silent logout.
    #[error("session store unavailable: {0}")]
    StoreUnavailable(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedSession {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub tenant_id: Option<TenantId>,
    pub expires_at: DateTime<Utc>,
    pub principal: serde_json::Value,
}

impl From<&SessionRecord> for AuthenticatedSession {
    fn from(record: &SessionRecord) -> Self {
        AuthenticatedSession {
            session_id: record.session_id.clone(),
            user_id: record.user_id,
            tenant_id: record.tenant_id.clone(),
            expires_at: record.expires_at,
            principal: record.principal.clone(),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RejectReason {
    /// The session was issued under one tenant and presented to another.
    /// Treated as a security event, not as "please log in".
    TenantMismatch {
        session_tenant: TenantId,
        request_tenant: Option<TenantId>,
    },
}

#[derive(Debug)]
pub enum AuthOutcome {
    Authenticated(AuthenticatedSession),
    Unauthenticated,
    Rejected(RejectReason),
}

/// What the HTTP boundary must do to the response's session cookie.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum CookieDirective {
    Keep,
    Set {
        token: SessionToken,
        expires_at: DateTime<Utc>,
    },
    Clear,
}

#[derive(Debug)]
pub struct AuthDecision {
    pub outcome: AuthOutcome,
    pub cookie: CookieDirective,
}

impl AuthDecision {
    pub fn unauthenticated(cookie: CookieDirective) -> Self {
        AuthDecision {
            outcome: AuthOutcome::Unauthenticated,
            cookie,
        }
    }
}

/// Single entry point of the authentication path: token in, decision out.
/// Implementations own the tier fallback, tenant isolation and rotation.
#[async_trait::async_trait]
pub trait SessionGate: Send + Sync {
    async fn authenticate(
        &self,
        token: Option<&SessionToken>,
        tenant: &TenantContext,
    ) -> Result<AuthDecision, GateError>;

    /// Explicit logout: remove the session from every tier.
    async fn logout(&self, token: &SessionToken) -> Result<(), GateError>;
}
