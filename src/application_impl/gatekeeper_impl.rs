use crate::application_impl::{HotCache, RotationScheduler};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct GateConfig {
    /// TTL used when back-filling the in-process tier.
    pub hot_ttl: Duration,
    /// TTL used when back-filling the distributed tier.
    pub distributed_ttl: Duration,
    /// Budget for each distributed-cache or store round-trip. A timeout on
    /// a cache tier is a miss; on the store it is fatal.
    pub io_timeout: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        GateConfig {
            hot_ttl: Duration::from_secs(60),
            distributed_ttl: Duration::from_secs(300),
            io_timeout: Duration::from_millis(150),
        }
    }
}

/// Tier-walking gatekeeper: HotCache, then the distributed cache, then the
/// durable store. Higher tiers are strictly cheaper, so the fallback is
/// sequential and a hit short-circuits the rest.
pub struct RealSessionGate {
    hot: Arc<HotCache>,
    cache: Arc<dyn SessionCache>,
    store: Arc<dyn SessionStore>,
    rotation: Arc<RotationScheduler>,
    metrics: Arc<dyn AuthMetrics>,
    config: GateConfig,
}

impl RealSessionGate {
    pub fn new(
        hot: Arc<HotCache>,
        cache: Arc<dyn SessionCache>,
        store: Arc<dyn SessionStore>,
        rotation: Arc<RotationScheduler>,
        metrics: Arc<dyn AuthMetrics>,
        config: GateConfig,
    ) -> Self {
        RealSessionGate {
            hot,
            cache,
            store,
            rotation,
            metrics,
            config,
        }
    }

    async fn lookup(
        &self,
        id: &SessionId,
    ) -> Result<Option<(SessionRecord, CacheTier)>, GateError> {
        if let Some(record) = self.hot.get(id) {
            self.metrics.tier_hit(CacheTier::Hot);
            return Ok(Some((record, CacheTier::Hot)));
        }
        self.metrics.tier_miss(CacheTier::Hot);

        // any distributed-tier failure degrades to a miss, never to an
        // authentication error
        match timeout(self.config.io_timeout, self.cache.get(id)).await {
            Ok(Ok(Some(record))) => {
                self.metrics.tier_hit(CacheTier::Distributed);
                return Ok(Some((record, CacheTier::Distributed)));
            }
            Ok(Ok(None)) => self.metrics.tier_miss(CacheTier::Distributed),
            Ok(Err(e)) => {
                warn!("distributed cache degraded: {}", e);
                self.metrics.tier_miss(CacheTier::Distributed);
            }
            Err(_) => {
                warn!("distributed cache timed out");
                self.metrics.tier_miss(CacheTier::Distributed);
            }
        }

        match timeout(self.config.io_timeout, self.store.get(id)).await {
            Ok(Ok(Some(record))) => {
                self.metrics.tier_hit(CacheTier::Store);
                Ok(Some((record, CacheTier::Store)))
            }
            Ok(Ok(None)) => {
                self.metrics.tier_miss(CacheTier::Store);
                Ok(None)
            }
            Ok(Err(e)) => Err(GateError::StoreUnavailable(e.to_string())),
            Err(_) => Err(GateError::StoreUnavailable("store timed out".to_string())),
        }
    }

    /// Lazy cleanup for an expired session: best-effort deletes across all
    /// tiers. The request is already decided, so nothing here escalates.
    async fn purge(&self, id: &SessionId) {
        self.hot.remove(id);
        if let Err(e) = self.cache_del(id).await {
            debug!("expiry cleanup: distributed delete failed for {}: {}", id, e);
        }
        match timeout(self.config.io_timeout, self.store.delete(id)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("expiry cleanup: store delete failed for {}: {}", id, e),
            Err(_) => warn!("expiry cleanup: store delete timed out for {}", id),
        }
    }

    async fn cache_del(&self, id: &SessionId) -> Result<(), CacheError> {
        match timeout(self.config.io_timeout, self.cache.del(id)).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout),
        }
    }

    async fn back_fill(&self, record: &SessionRecord, hit_tier: CacheTier) {
        match hit_tier {
            CacheTier::Hot => {}
            CacheTier::Distributed => {
                self.hot.put(record.clone(), self.config.hot_ttl);
            }
            CacheTier::Store => {
                let set = self.cache.set(record, self.config.distributed_ttl);
                match timeout(self.config.io_timeout, set).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => debug!("back-fill to distributed cache failed: {}", e),
                    Err(_) => debug!("back-fill to distributed cache timed out"),
                }
                self.hot.put(record.clone(), self.config.hot_ttl);
            }
        }
    }
}

#[async_trait::async_trait]
impl SessionGate for RealSessionGate {
    async fn authenticate(
        &self,
        token: Option<&SessionToken>,
        tenant: &TenantContext,
    ) -> Result<AuthDecision, GateError> {
        let Some(token) = token else {
            // no token: nothing to validate, no tier touched
            return Ok(AuthDecision::unauthenticated(CookieDirective::Keep));
        };
        let id = SessionId::derive(token);

        let Some((record, tier)) = self.lookup(&id).await? else {
            self.metrics.unauthenticated();
            return Ok(AuthDecision::unauthenticated(CookieDirective::Clear));
        };

        if record.is_expired(Utc::now()) {
            self.purge(&id).await;
            self.metrics.unauthenticated();
            return Ok(AuthDecision::unauthenticated(CookieDirective::Clear));
        }

        // isolation check before any cache write: a mismatched hit must not
        // be re-populated anywhere
        if let Some(owner) = &record.tenant_id {
            if tenant.tenant_id.as_ref() != Some(owner) {
                self.metrics.rejected();
                warn!(
                    "tenant isolation violation: session of {} presented to {:?} (host {})",
                    owner, tenant.tenant_id, tenant.hostname
                );
                return Ok(AuthDecision {
                    outcome: AuthOutcome::Rejected(RejectReason::TenantMismatch {
                        session_tenant: owner.clone(),
                        request_tenant: tenant.tenant_id.clone(),
                    }),
                    cookie: CookieDirective::Clear,
                });
            }
        }

        self.back_fill(&record, tier).await;

        if let Some((new_token, new_record)) = self.rotation.maybe_rotate(&record).await {
            // the rotated session carries the same rights under a new token
            return Ok(AuthDecision {
                outcome: AuthOutcome::Authenticated(AuthenticatedSession::from(&new_record)),
                cookie: CookieDirective::Set {
                    token: new_token,
                    expires_at: new_record.expires_at,
                },
            });
        }

        Ok(AuthDecision {
            outcome: AuthOutcome::Authenticated(AuthenticatedSession::from(&record)),
            cookie: CookieDirective::Keep,
        })
    }

    async fn logout(&self, token: &SessionToken) -> Result<(), GateError> {
        let id = SessionId::derive(token);
        self.hot.remove(&id);
        if let Err(e) = self.cache_del(&id).await {
            debug!("logout: distributed delete failed for {}: {}", id, e);
        }
        match timeout(self.config.io_timeout, self.store.delete(&id)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(GateError::StoreUnavailable(e.to_string())),
            Err(_) => Err(GateError::StoreUnavailable("store timed out".to_string())),
        }
    }
}
