use chrono::{Duration as ChronoDuration, Utc};
use gatehouse::application_impl::*;
use gatehouse::application_port::*;
use gatehouse::domain_model::*;
use gatehouse::domain_port::*;
use gatehouse::infra_memory::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ---- instrumented tier fakes ----------------------------------------------

#[derive(Default)]
struct CountingStore {
    inner: MemorySessionStore,
    get_calls: AtomicUsize,
    put_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    fail_gets: AtomicBool,
    fail_puts: AtomicBool,
    slow_gets: AtomicBool,
}

impl CountingStore {
    fn seed(&self, record: SessionRecord) {
        self.inner.insert(record);
    }

    fn gets(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    fn puts(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    fn deletes(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SessionStore for CountingStore {
    async fn get(&self, id: &SessionId) -> Result<Option<SessionRecord>, StoreError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.slow_gets.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(400)).await;
        }
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(StoreError::Store("injected store outage".into()));
        }
        self.inner.get(id).await
    }

    async fn put(&self, record: &SessionRecord) -> Result<(), StoreError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StoreError::Store("injected store outage".into()));
        }
        self.inner.put(record).await
    }

    async fn delete(&self, id: &SessionId) -> Result<(), StoreError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(id).await
    }
}

#[derive(Default)]
struct CountingCache {
    inner: MemorySessionCache,
    get_calls: AtomicUsize,
    set_calls: AtomicUsize,
    del_calls: AtomicUsize,
    fail_all: AtomicBool,
}

impl CountingCache {
    async fn seed(&self, record: SessionRecord) {
        self.inner
            .set(&record, Duration::from_secs(300))
            .await
            .expect("memory cache never fails");
    }

    fn gets(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    fn sets(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }

    fn dels(&self) -> usize {
        self.del_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SessionCache for CountingCache {
    async fn get(&self, id: &SessionId) -> Result<Option<SessionRecord>, CacheError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(CacheError::Cache("injected cache outage".into()));
        }
        self.inner.get(id).await
    }

    async fn set(&self, record: &SessionRecord, ttl: Duration) -> Result<(), CacheError> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(CacheError::Cache("injected cache outage".into()));
        }
        self.inner.set(record, ttl).await
    }

    async fn del(&self, id: &SessionId) -> Result<(), CacheError> {
        self.del_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(CacheError::Cache("injected cache outage".into()));
        }
        self.inner.del(id).await
    }
}

// ---- harness ---------------------------------------------------------------

struct Harness {
    hot: Arc<HotCache>,
    cache: Arc<CountingCache>,
    store: Arc<CountingStore>,
    gate: Arc<RealSessionGate>,
}

fn harness(rotation: RotationConfig) -> Harness {
    let hot = Arc::new(HotCache::new(HotCacheConfig::default()));
    let store = Arc::new(CountingStore::default());
    let cache = Arc::new(CountingCache::default());
    let store_dyn: Arc<dyn SessionStore> = store.clone();
    let cache_dyn: Arc<dyn SessionCache> = cache.clone();
    let metrics: Arc<dyn AuthMetrics> = Arc::new(NoopMetrics);

    let (reaper, reaper_worker) = session_reaper(
        Arc::clone(&hot),
        Arc::clone(&cache_dyn),
        Arc::clone(&store_dyn),
        CancellationToken::new(),
    );
    tokio::spawn(reaper_worker.run());

    let ttls = TierTtls {
        hot: Duration::from_secs(60),
        distributed: Duration::from_secs(300),
    };
    let scheduler = Arc::new(RotationScheduler::new(
        rotation,
        ttls,
        Arc::clone(&hot),
        Arc::clone(&cache_dyn),
        Arc::clone(&store_dyn),
        Arc::clone(&metrics),
        reaper,
    ));
    let gate = Arc::new(RealSessionGate::new(
        Arc::clone(&hot),
        cache_dyn,
        store_dyn,
        scheduler,
        metrics,
        GateConfig::default(),
    ));

    Harness {
        hot,
        cache,
        store,
        gate,
    }
}

fn no_rotation() -> RotationConfig {
    RotationConfig {
        interval: Duration::from_secs(3600),
        ..RotationConfig::default()
    }
}

fn session(
    tenant: Option<&str>,
    expires_in: ChronoDuration,
    rotated_ago: ChronoDuration,
) -> (SessionToken, SessionRecord) {
    let token = SessionToken::generate();
    let record = SessionRecord {
        session_id: SessionId::derive(&token),
        user_id: UserId(uuid::Uuid::new_v4()),
        tenant_id: tenant.map(TenantId::from),
        issued_at: Utc::now() - rotated_ago,
        last_rotated_at: Utc::now() - rotated_ago,
        expires_at: Utc::now() + expires_in,
        principal: serde_json::json!({ "roles": ["member"] }),
    };
    (token, record)
}

fn acme() -> TenantContext {
    TenantContext::for_tenant("acme", "acme.example.com")
}

// ---- tier precedence and back-fill -----------------------------------------

#[tokio::test]
async fn hot_hit_never_touches_lower_tiers() {
    let h = harness(no_rotation());
    let (token, record) = session(Some("acme"), ChronoDuration::hours(1), ChronoDuration::zero());
    h.hot.put(record.clone(), Duration::from_secs(60));
    h.cache.seed(record.clone()).await;
    h.store.seed(record);

    let decision = h
        .gate
        .authenticate(Some(&token), &acme())
        .await
        .expect("gate should decide");

    assert!(matches!(decision.outcome, AuthOutcome::Authenticated(_)));
    assert_eq!(h.cache.gets(), 0);
    assert_eq!(h.store.gets(), 0);
}

#[tokio::test]
async fn store_hit_back_fills_both_cache_tiers() {
    let h = harness(no_rotation());
    let (token, record) = session(Some("acme"), ChronoDuration::hours(1), ChronoDuration::zero());
    let user_id = record.user_id;
    h.store.seed(record);

    let first = h
        .gate
        .authenticate(Some(&token), &acme())
        .await
        .expect("gate should decide");
    match first.outcome {
        AuthOutcome::Authenticated(session) => assert_eq!(session.user_id, user_id),
        other => panic!("expected Authenticated, got {:?}", other),
    }
    assert_eq!(h.store.gets(), 1);
    assert_eq!(h.cache.sets(), 1);

    // next lookup is served from the hot tier without any further I/O
    let second = h
        .gate
        .authenticate(Some(&token), &acme())
        .await
        .expect("gate should decide");
    assert!(matches!(second.outcome, AuthOutcome::Authenticated(_)));
    assert_eq!(h.store.gets(), 1);
    assert_eq!(h.cache.gets(), 1);
}

#[tokio::test]
async fn distributed_hit_back_fills_hot_only() {
    let h = harness(no_rotation());
    let (token, record) = session(None, ChronoDuration::hours(1), ChronoDuration::zero());
    let id = record.session_id.clone();
    h.cache.seed(record).await;

    let decision = h
        .gate
        .authenticate(Some(&token), &TenantContext::global("example.com"))
        .await
        .expect("gate should decide");

    assert!(matches!(decision.outcome, AuthOutcome::Authenticated(_)));
    assert_eq!(h.store.gets(), 0);
    assert_eq!(h.cache.sets(), 0);
    assert!(h.hot.get(&id).is_some());
}

// ---- expiry ----------------------------------------------------------------

#[tokio::test]
async fn expired_session_is_treated_as_absent_and_purged() {
    let h = harness(no_rotation());
    let (token, record) = session(
        Some("acme"),
        ChronoDuration::minutes(-5),
        ChronoDuration::zero(),
    );
    h.hot.put(record.clone(), Duration::from_secs(60));
    h.store.seed(record);

    let decision = h
        .gate
        .authenticate(Some(&token), &acme())
        .await
        .expect("gate should decide");

    assert!(matches!(decision.outcome, AuthOutcome::Unauthenticated));
    assert_eq!(decision.cookie, CookieDirective::Clear);
    assert_eq!(h.cache.dels(), 1);
    assert_eq!(h.store.deletes(), 1);
    assert!(h.hot.is_empty());
}

// ---- tenant isolation ------------------------------------------------------

#[tokio::test]
async fn cross_tenant_token_is_rejected_with_no_cache_writes() {
    let h = harness(no_rotation());
    let (token, record) = session(Some("acme"), ChronoDuration::hours(1), ChronoDuration::zero());
    h.store.seed(record);

    let beta = TenantContext::for_tenant("beta", "beta.example.com");
    let decision = h
        .gate
        .authenticate(Some(&token), &beta)
        .await
        .expect("gate should decide");

    match decision.outcome {
        AuthOutcome::Rejected(RejectReason::TenantMismatch {
            session_tenant,
            request_tenant,
        }) => {
            assert_eq!(session_tenant, TenantId::from("acme"));
            assert_eq!(request_tenant, Some(TenantId::from("beta")));
        }
        other => panic!("expected Rejected, got {:?}", other),
    }
    assert_eq!(decision.cookie, CookieDirective::Clear);
    assert_eq!(h.cache.sets(), 0);
    assert!(h.hot.is_empty());
}

#[tokio::test]
async fn tenantless_request_cannot_use_tenant_session() {
    let h = harness(no_rotation());
    let (token, record) = session(Some("acme"), ChronoDuration::hours(1), ChronoDuration::zero());
    h.store.seed(record);

    let decision = h
        .gate
        .authenticate(Some(&token), &TenantContext::global("example.com"))
        .await
        .expect("gate should decide");

    assert!(matches!(decision.outcome, AuthOutcome::Rejected(_)));
}

#[tokio::test]
async fn global_session_is_valid_for_any_tenant() {
    let h = harness(no_rotation());
    let (token, record) = session(None, ChronoDuration::hours(1), ChronoDuration::zero());
    h.store.seed(record);

    let decision = h
        .gate
        .authenticate(Some(&token), &acme())
        .await
        .expect("gate should decide");

    assert!(matches!(decision.outcome, AuthOutcome::Authenticated(_)));
}

// ---- misses and degraded tiers ---------------------------------------------

#[tokio::test]
async fn missing_token_touches_no_tier() {
    let h = harness(no_rotation());

    let decision = h
        .gate
        .authenticate(None, &acme())
        .await
        .expect("gate should decide");

    assert!(matches!(decision.outcome, AuthOutcome::Unauthenticated));
    assert_eq!(decision.cookie, CookieDirective::Keep);
    assert_eq!(h.cache.gets(), 0);
    assert_eq!(h.store.gets(), 0);
}

#[tokio::test]
async fn unknown_token_clears_the_stale_cookie() {
    let h = harness(no_rotation());
    let token = SessionToken::generate();

    let decision = h
        .gate
        .authenticate(Some(&token), &acme())
        .await
        .expect("gate should decide");

    assert!(matches!(decision.outcome, AuthOutcome::Unauthenticated));
    assert_eq!(decision.cookie, CookieDirective::Clear);
    assert_eq!(h.store.gets(), 1);
}

#[tokio::test]
async fn cache_outage_degrades_to_store_fallback() {
    let h = harness(no_rotation());
    let (token, record) = session(Some("acme"), ChronoDuration::hours(1), ChronoDuration::zero());
    h.store.seed(record);
    h.cache.fail_all.store(true, Ordering::SeqCst);

    let decision = h
        .gate
        .authenticate(Some(&token), &acme())
        .await
        .expect("cache outage must not fail the request");

    assert!(matches!(decision.outcome, AuthOutcome::Authenticated(_)));
    assert_eq!(h.store.gets(), 1);
}

#[tokio::test]
async fn store_outage_on_cold_path_is_fatal() {
    let h = harness(no_rotation());
    let token = SessionToken::generate();
    h.store.fail_gets.store(true, Ordering::SeqCst);

    let result = h.gate.authenticate(Some(&token), &acme()).await;

    assert!(matches!(result, Err(GateError::StoreUnavailable(_))));
}

#[tokio::test]
async fn store_timeout_on_cold_path_is_fatal() {
    let h = harness(no_rotation());
    let token = SessionToken::generate();
    h.store.slow_gets.store(true, Ordering::SeqCst);

    let result = h.gate.authenticate(Some(&token), &acme()).await;

    assert!(matches!(result, Err(GateError::StoreUnavailable(_))));
}

// ---- rotation --------------------------------------------------------------

#[tokio::test]
async fn due_session_rotates_once_from_a_cold_cache() {
    let h = harness(RotationConfig::default());
    let (token, record) = session(
        Some("acme"),
        ChronoDuration::hours(1),
        ChronoDuration::minutes(20),
    );
    let old_id = record.session_id.clone();
    let user_id = record.user_id;
    h.store.seed(record);

    let decision = h
        .gate
        .authenticate(Some(&token), &acme())
        .await
        .expect("gate should decide");

    assert_eq!(h.store.gets(), 1);
    assert_eq!(h.store.puts(), 1);

    let new_token = match decision.cookie {
        CookieDirective::Set { token: t, .. } => t,
        other => panic!("expected a rotated cookie, got {:?}", other),
    };
    assert_ne!(new_token, token);

    match decision.outcome {
        AuthOutcome::Authenticated(session) => {
            assert_eq!(session.user_id, user_id);
            assert_eq!(session.tenant_id, Some(TenantId::from("acme")));
            assert_ne!(session.session_id, old_id);
        }
        other => panic!("expected Authenticated, got {:?}", other),
    }

    // the superseded token is gone (grace is zero by default)
    let stale = h
        .gate
        .authenticate(Some(&token), &acme())
        .await
        .expect("gate should decide");
    assert!(matches!(stale.outcome, AuthOutcome::Unauthenticated));

    // the new token is served straight from the hot tier
    let store_gets = h.store.gets();
    let fresh = h
        .gate
        .authenticate(Some(&new_token), &acme())
        .await
        .expect("gate should decide");
    assert!(matches!(fresh.outcome, AuthOutcome::Authenticated(_)));
    assert_eq!(h.store.gets(), store_gets);
}

#[tokio::test]
async fn concurrent_validations_rotate_exactly_once() {
    let h = harness(RotationConfig {
        grace: Duration::from_secs(5),
        ..RotationConfig::default()
    });
    let (token, record) = session(
        Some("acme"),
        ChronoDuration::hours(1),
        ChronoDuration::minutes(20),
    );
    h.hot.put(record.clone(), Duration::from_secs(60));
    h.cache.seed(record.clone()).await;
    h.store.seed(record);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let gate = Arc::clone(&h.gate);
        let token = token.clone();
        handles.push(tokio::spawn(async move {
            gate.authenticate(Some(&token), &acme()).await
        }));
    }

    for handle in handles {
        let decision = handle
            .await
            .expect("task should not panic")
            .expect("gate should decide");
        // losers of the guard race keep the still-valid old session
        assert!(matches!(decision.outcome, AuthOutcome::Authenticated(_)));
    }
    assert_eq!(h.store.puts(), 1);
}

#[tokio::test]
async fn failed_rotation_leaves_the_old_session_valid() {
    let h = harness(RotationConfig::default());
    let (token, record) = session(
        Some("acme"),
        ChronoDuration::hours(1),
        ChronoDuration::minutes(20),
    );
    let old_id = record.session_id.clone();
    h.store.seed(record);
    h.store.fail_puts.store(true, Ordering::SeqCst);

    let decision = h
        .gate
        .authenticate(Some(&token), &acme())
        .await
        .expect("rotation failure must not fail the request");
    match decision.outcome {
        AuthOutcome::Authenticated(session) => assert_eq!(session.session_id, old_id),
        other => panic!("expected Authenticated, got {:?}", other),
    }
    assert_eq!(decision.cookie, CookieDirective::Keep);

    // the guard was released: once the store recovers, rotation goes through
    h.store.fail_puts.store(false, Ordering::SeqCst);
    let decision = h
        .gate
        .authenticate(Some(&token), &acme())
        .await
        .expect("gate should decide");
    assert!(matches!(decision.cookie, CookieDirective::Set { .. }));
}

#[tokio::test]
async fn throttled_rotation_still_authenticates() {
    let h = harness(RotationConfig {
        max_per_minute: 0,
        ..RotationConfig::default()
    });
    let (token, record) = session(
        Some("acme"),
        ChronoDuration::hours(1),
        ChronoDuration::minutes(20),
    );
    h.store.seed(record);

    let decision = h
        .gate
        .authenticate(Some(&token), &acme())
        .await
        .expect("gate should decide");

    assert!(matches!(decision.outcome, AuthOutcome::Authenticated(_)));
    assert_eq!(decision.cookie, CookieDirective::Keep);
    assert_eq!(h.store.puts(), 0);
}

// ---- logout ----------------------------------------------------------------

#[tokio::test]
async fn logout_removes_the_session_from_every_tier() {
    let h = harness(no_rotation());
    let (token, record) = session(Some("acme"), ChronoDuration::hours(1), ChronoDuration::zero());
    h.hot.put(record.clone(), Duration::from_secs(60));
    h.cache.seed(record.clone()).await;
    h.store.seed(record);

    h.gate.logout(&token).await.expect("logout should succeed");

    assert_eq!(h.cache.dels(), 1);
    assert_eq!(h.store.deletes(), 1);
    let decision = h
        .gate
        .authenticate(Some(&token), &acme())
        .await
        .expect("gate should decide");
    assert!(matches!(decision.outcome, AuthOutcome::Unauthenticated));
}
