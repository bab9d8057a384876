/// Lookup tiers, ordered cheapest to most durable.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CacheTier {
    Hot,
    Distributed,
    Store,
}

/// Event sink for the observability collaborator. The gatekeeper emits,
/// collectors aggregate elsewhere.
pub trait AuthMetrics: Send + Sync {
    fn tier_hit(&self, tier: CacheTier);
    fn tier_miss(&self, tier: CacheTier);
    fn unauthenticated(&self);
    fn rejected(&self);
    fn rotation_attempted(&self);
    fn rotation_succeeded(&self);
    fn rotation_failed(&self);
    fn rotation_throttled(&self);
}

#[derive(Debug, Default)]
pub struct NoopMetrics;

impl AuthMetrics for NoopMetrics {
    fn tier_hit(&self, _tier: CacheTier) {}
    fn tier_miss(&self, _tier: CacheTier) {}
    fn unauthenticated(&self) {}
    fn rejected(&self) {}
    fn rotation_attempted(&self) {}
    fn rotation_succeeded(&self) {}
    fn rotation_failed(&self) {}
    fn rotation_throttled(&self) {}
}
