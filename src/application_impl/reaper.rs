use crate::application_impl::HotCache;
use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug)]
struct ReapRequest {
    session_id: SessionId,
    not_before: Instant,
}

/// Handle for scheduling grace-delayed deletion of superseded sessions.
/// Rotation uses this so in-flight requests still carrying the old token
/// keep working for a short window.
#[derive(Clone)]
pub struct SessionReaper {
    tx: mpsc::UnboundedSender<ReapRequest>,
}

impl SessionReaper {
    pub fn schedule(&self, session_id: SessionId, delay: Duration) {
        let request = ReapRequest {
            session_id,
            not_before: Instant::now() + delay,
        };
        if self.tx.send(request).is_err() {
            warn!("session reaper is gone; deferred deletion dropped");
        }
    }
}

/// Background worker draining the reap queue. Spawned by the server at
/// startup and cancelled on shutdown.
pub struct ReaperWorker {
    rx: mpsc::UnboundedReceiver<ReapRequest>,
    hot: Arc<HotCache>,
    cache: Arc<dyn SessionCache>,
    store: Arc<dyn SessionStore>,
    cancel: CancellationToken,
}

pub fn session_reaper(
    hot: Arc<HotCache>,
    cache: Arc<dyn SessionCache>,
    store: Arc<dyn SessionStore>,
    cancel: CancellationToken,
) -> (SessionReaper, ReaperWorker) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        SessionReaper { tx },
        ReaperWorker {
            rx,
            hot,
            cache,
            store,
            cancel,
        },
    )
}

impl ReaperWorker {
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                request = self.rx.recv() => match request {
                    Some(request) => self.reap(request).await,
                    None => break,
                },
            }
        }
        debug!("session reaper stopped");
    }

    async fn reap(&self, request: ReapRequest) {
        tokio::select! {
            _ = self.cancel.cancelled() => return,
            _ = tokio::time::sleep_until(request.not_before) => {}
        }

        let id = &request.session_id;
        self.hot.remove(id);
        if let Err(e) = self.cache.del(id).await {
            debug!("reaper: distributed delete failed for {}: {}", id, e);
        }
        if let Err(e) = self.store.delete(id).await {
            // the record still carries its expiry, so a failed delete only
            // delays cleanup until lazy expiry catches it
            warn!("reaper: store delete failed for {}: {}", id, e);
        }
    }
}
