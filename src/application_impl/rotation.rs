use crate::application_impl::{HotCache, SessionReaper};
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RotationConfig {
    /// A session becomes due once this long has passed since its last
    /// rotation.
    pub interval: Duration,
    /// Global cap on rotation attempts per one-minute window. Throttled
    /// requests skip rotation and proceed with the current session.
    pub max_per_minute: u32,
    /// How long the superseded session stays valid after rotation. Zero
    /// deletes it inline.
    pub grace: Duration,
}

impl Default for RotationConfig {
    fn default() -> Self {
        RotationConfig {
            interval: Duration::from_secs(15 * 60),
            max_per_minute: 100,
            grace: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TierTtls {
    pub hot: Duration,
    pub distributed: Duration,
}

struct RateWindow {
    started: Instant,
    attempts: u32,
}

/// Per-session rotation state. `Rotated` is terminal for the old session id:
/// it stays as a tombstone through the grace window so a request still
/// holding the superseded record cannot rotate it a second time.
enum RotationSlot {
    InFlight,
    Rotated { at: Instant },
}

/// Won by at most one request per session. An aborted attempt releases the
/// slot on drop; `complete` turns it into a tombstone instead.
struct RotationGuard {
    slots: Arc<DashMap<SessionId, RotationSlot>>,
    id: SessionId,
    completed: bool,
}

impl RotationGuard {
    fn complete(mut self) {
        self.slots
            .insert(self.id.clone(), RotationSlot::Rotated { at: Instant::now() });
        self.completed = true;
    }
}

impl Drop for RotationGuard {
    fn drop(&mut self) {
        if !self.completed {
            self.slots.remove(&self.id);
        }
    }
}

/// Replaces long-lived tokens periodically without ever leaving the client
/// unauthenticated. At most one rotation is in flight per session; the
/// losers of the guard race keep using the still-valid old session.
pub struct RotationScheduler {
    config: RotationConfig,
    ttls: TierTtls,
    hot: Arc<HotCache>,
    cache: Arc<dyn SessionCache>,
    store: Arc<dyn SessionStore>,
    metrics: Arc<dyn AuthMetrics>,
    reaper: SessionReaper,
    slots: Arc<DashMap<SessionId, RotationSlot>>,
    window: Mutex<RateWindow>,
}

impl RotationScheduler {
    pub fn new(
        config: RotationConfig,
        ttls: TierTtls,
        hot: Arc<HotCache>,
        cache: Arc<dyn SessionCache>,
        store: Arc<dyn SessionStore>,
        metrics: Arc<dyn AuthMetrics>,
        reaper: SessionReaper,
    ) -> Self {
        RotationScheduler {
            config,
            ttls,
            hot,
            cache,
            store,
            metrics,
            reaper,
            slots: Arc::new(DashMap::new()),
            window: Mutex::new(RateWindow {
                started: Instant::now(),
                attempts: 0,
            }),
        }
    }

    pub fn is_due(&self, record: &SessionRecord, now: DateTime<Utc>) -> bool {
        (now - record.last_rotated_at)
            .to_std()
            .map(|elapsed| elapsed >= self.config.interval)
            .unwrap_or(false)
    }

    /// Rotate the session if it is due, the rate limit admits it and no
    /// other request is already rotating it. Returns the fresh token and
    /// record on success; `None` always means "carry on with the old
    /// session" -- rotation never invalidates a session it failed to
    /// replace.
    pub async fn maybe_rotate(
        &self,
        record: &SessionRecord,
    ) -> Option<(SessionToken, SessionRecord)> {
        let now = Utc::now();
        if !self.is_due(record, now) {
            return None;
        }
        if !self.admit() {
            self.metrics.rotation_throttled();
            debug!("rotation throttled for {}", record.session_id);
            return None;
        }
        let guard = self.try_begin(record.session_id.clone())?;
        self.metrics.rotation_attempted();

        let token = SessionToken::generate();
        let new_record = SessionRecord {
            session_id: SessionId::derive(&token),
            user_id: record.user_id,
            tenant_id: record.tenant_id.clone(),
            issued_at: record.issued_at,
            last_rotated_at: now,
            expires_at: record.expires_at,
            principal: record.principal.clone(),
        };

        if let Err(e) = self.store.put(&new_record).await {
            // abort: the old session stays fully valid
            warn!("rotation aborted for {}: {}", record.session_id, e);
            self.metrics.rotation_failed();
            return None;
        }

        if let Err(e) = self.cache.set(&new_record, self.ttls.distributed).await {
            debug!(
                "rotation: distributed back-fill failed for {}: {}",
                new_record.session_id, e
            );
        }
        self.hot.put(new_record.clone(), self.ttls.hot);

        self.retire(&record.session_id).await;
        guard.complete();
        self.sweep_tombstones();
        self.metrics.rotation_succeeded();
        debug!(
            "rotated session {} -> {} for user {}",
            record.session_id, new_record.session_id, record.user_id
        );
        Some((token, new_record))
    }

    async fn retire(&self, old: &SessionId) {
        if self.config.grace.is_zero() {
            self.hot.remove(old);
            if let Err(e) = self.cache.del(old).await {
                debug!("rotation: distributed delete failed for {}: {}", old, e);
            }
            if let Err(e) = self.store.delete(old).await {
                warn!("rotation: store delete failed for {}: {}", old, e);
            }
        } else {
            self.reaper.schedule(old.clone(), self.config.grace);
        }
    }

    fn try_begin(&self, id: SessionId) -> Option<RotationGuard> {
        match self.slots.entry(id.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(RotationSlot::InFlight);
                Some(RotationGuard {
                    slots: Arc::clone(&self.slots),
                    id,
                    completed: false,
                })
            }
        }
    }

    /// Tombstones only matter while the superseded record can still be
    /// served from a tier, so anything older than grace plus a minute of
    /// slack can go.
    fn sweep_tombstones(&self) {
        let keep_for = self.config.grace + Duration::from_secs(60);
        self.slots.retain(|_, slot| match slot {
            RotationSlot::InFlight => true,
            RotationSlot::Rotated { at } => at.elapsed() < keep_for,
        });
    }

    fn admit(&self) -> bool {
        let Ok(mut window) = self.window.lock() else {
            return false;
        };
        if window.started.elapsed() >= Duration::from_secs(60) {
            window.started = Instant::now();
            window.attempts = 0;
        }
        if window.attempts >= self.config.max_per_minute {
            return false;
        }
        window.attempts += 1;
        true
    }
}
