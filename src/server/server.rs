use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::Settings;
use sqlx::{MySql, Pool};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Explicitly constructed service graph. Everything the request path needs
/// is injected here; there is no module-level global state.
pub struct Server {
    pub gate: Arc<dyn SessionGate>,
    pub tenant_resolver: Arc<TenantResolver>,
    pub cookie_name: String,
    reaper_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    pool: Option<Pool<MySql>>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let hot = Arc::new(HotCache::new(HotCacheConfig {
            capacity: settings.hot_cache.capacity,
        }));

        let mut pool = None;
        let store: Arc<dyn SessionStore> = match settings.store.backend.as_str() {
            "memory" => Arc::new(MemorySessionStore::new()),
            "mysql" => {
                let dsn = settings.store.mysql_dsn.as_deref().ok_or_else(|| {
                    anyhow::anyhow!("store.mysql_dsn is required for the mysql backend")
                })?;
                let mysql_pool = Pool::<MySql>::connect(dsn).await?;
                pool = Some(mysql_pool.clone());
                Arc::new(MySqlSessionStore::new(mysql_pool))
            }
            other => return Err(anyhow::anyhow!("Unknown store backend: {}", other)),
        };

        let cache: Arc<dyn SessionCache> = match settings.cache.backend.as_str() {
            "memory" => Arc::new(MemorySessionCache::new()),
            "redis" => {
                let url = settings.cache.redis_url.as_deref().ok_or_else(|| {
                    anyhow::anyhow!("cache.redis_url is required for the redis backend")
                })?;
                let redis_client = redis::Client::open(url)?;
                let redis_manager = redis_client.get_connection_manager().await?;
                Arc::new(RedisSessionCache::new(
                    redis_manager,
                    settings.cache.prefix.clone(),
                ))
            }
            other => return Err(anyhow::anyhow!("Unknown cache backend: {}", other)),
        };

        let metrics: Arc<dyn AuthMetrics> = Arc::new(NoopMetrics);

        let cancel = CancellationToken::new();
        let (reaper, reaper_worker) = session_reaper(
            Arc::clone(&hot),
            Arc::clone(&cache),
            Arc::clone(&store),
            cancel.clone(),
        );
        let reaper_handle = tokio::spawn(reaper_worker.run());

        let ttls = TierTtls {
            hot: Duration::from_secs(settings.hot_cache.ttl_secs),
            distributed: Duration::from_secs(settings.cache.ttl_secs),
        };
        let rotation = Arc::new(RotationScheduler::new(
            RotationConfig {
                interval: Duration::from_secs(settings.rotation.interval_secs),
                max_per_minute: settings.rotation.max_per_minute,
                grace: Duration::from_secs(settings.rotation.grace_secs),
            },
            ttls.clone(),
            Arc::clone(&hot),
            Arc::clone(&cache),
            Arc::clone(&store),
            Arc::clone(&metrics),
            reaper,
        ));

        let gate: Arc<dyn SessionGate> = Arc::new(RealSessionGate::new(
            hot,
            cache,
            store,
            rotation,
            metrics,
            GateConfig {
                hot_ttl: ttls.hot,
                distributed_ttl: ttls.distributed,
                io_timeout: Duration::from_millis(settings.cache.io_timeout_ms),
            },
        ));

        let tenant_resolver = Arc::new(TenantResolver::new(TenantRules {
            hosts: settings.tenancy.hosts.clone(),
            base_domain: settings.tenancy.base_domain.clone(),
            default_tenant: settings.tenancy.default_tenant.clone(),
        }));

        info!("server started");

        Ok(Self {
            gate,
            tenant_resolver,
            cookie_name: settings.auth.cookie_name.clone(),
            reaper_handle: Mutex::new(Some(reaper_handle)),
            cancel,
            pool,
        })
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        self.cancel.cancel();

        if let Ok(mut lock) = self.reaper_handle.lock() {
            if let Some(handle) = lock.take() {
                let r = handle.await;
                info!("session reaper handle dropped: {:?}", r);
            }
        }

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
