use crate::domain_model::*;
use std::collections::HashMap;

/// Static tenant-identification ruleset, normally loaded from settings.
#[derive(Debug, Clone, Default)]
pub struct TenantRules {
    /// Exact hostname to tenant mapping, checked first.
    pub hosts: HashMap<String, String>,
    /// When set, `<tenant>.<base_domain>` resolves to `<tenant>`.
    pub base_domain: Option<String>,
    /// Fallback for unknown hosts. `None` means single-tenant deployment.
    pub default_tenant: Option<String>,
}

/// Derives the tenant for a request from its hostname. Pure function over a
/// memoized ruleset; unknown hosts resolve to the default tenant rather than
/// failing closed.
pub struct TenantResolver {
    hosts: HashMap<String, TenantId>,
    base_domain: Option<String>,
    default_tenant: Option<TenantId>,
}

impl TenantResolver {
    pub fn new(rules: TenantRules) -> Self {
        TenantResolver {
            hosts: rules
                .hosts
                .into_iter()
                .map(|(host, tenant)| (host.to_ascii_lowercase(), TenantId(tenant)))
                .collect(),
            base_domain: rules.base_domain.map(|d| d.to_ascii_lowercase()),
            default_tenant: rules.default_tenant.map(TenantId),
        }
    }

    pub fn resolve(&self, hostname: &str) -> TenantContext {
        let host = Self::normalize(hostname);
        let tenant_id = self
            .hosts
            .get(&host)
            .cloned()
            .or_else(|| self.subdomain_tenant(&host))
            .or_else(|| self.default_tenant.clone());
        TenantContext {
            tenant_id,
            hostname: host,
        }
    }

    fn subdomain_tenant(&self, host: &str) -> Option<TenantId> {
        let base = self.base_domain.as_deref()?;
        let prefix = host.strip_suffix(base)?.strip_suffix('.')?;
        // the label immediately left of the base domain names the tenant
        let label = prefix.rsplit('.').next()?;
        if label.is_empty() {
            return None;
        }
        Some(TenantId(label.to_string()))
    }

    fn normalize(hostname: &str) -> String {
        let host = hostname.rsplit_once(':').map_or(hostname, |(h, _)| h);
        host.trim_end_matches('.').to_ascii_lowercase()
    }
}
