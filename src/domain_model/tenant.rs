use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        TenantId(s.to_string())
    }
}

/// Per-request tenancy, derived from the request's hostname. Never persisted.
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub tenant_id: Option<TenantId>,
    pub hostname: String,
}

impl TenantContext {
    pub fn global(hostname: impl Into<String>) -> Self {
        TenantContext {
            tenant_id: None,
            hostname: hostname.into(),
        }
    }

    pub fn for_tenant(tenant: impl Into<TenantId>, hostname: impl Into<String>) -> Self {
        TenantContext {
            tenant_id: Some(tenant.into()),
            hostname: hostname.into(),
        }
    }
}

impl From<String> for TenantId {
    fn from(s: String) -> Self {
        TenantId(s)
    }
}
