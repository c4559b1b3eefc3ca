//! Background observer that reports newly stored records.
//!
//! The monitor is the single intended consumer of the repository's "new
//! since last read" cursors. It polls entity counts on a fixed period and
//! only drains the cursors when something grew.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::repository::Repository;
use crate::store::{EntityCounts, NewEntities};

pub const DEFAULT_MONITOR_PERIOD: Duration = Duration::from_millis(200);

struct Running {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Start/stop handle around the polling task. Can be restarted after
/// [`Monitor::stop`].
pub struct Monitor {
    repo: Arc<Repository>,
    period: Duration,
    running: Mutex<Option<Running>>,
}

impl Monitor {
    pub fn new(repo: Arc<Repository>, period: Duration) -> Self {
        Self {
            repo,
            period: period.max(Duration::from_millis(1)),
            running: Mutex::new(None),
        }
    }

    /// Spawn the polling task. It stops when `parent` is cancelled or on
    /// [`Monitor::stop`]. Returns false if it is already running.
    pub fn start(&self, parent: &CancellationToken) -> bool {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return false;
        }

        let token = parent.child_token();
        // Baseline taken now so records saved right after start are reported
        let baseline = self.repo.entity_counts();
        let handle = tokio::spawn(poll_loop(
            Arc::clone(&self.repo),
            self.period,
            baseline,
            token.clone(),
        ));
        *running = Some(Running { token, handle });
        tracing::info!(period = ?self.period, "Entity monitor started");
        true
    }

    /// Cancel the polling task and wait for it to exit.
    pub async fn stop(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(Running { token, handle }) = running {
            token.cancel();
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Entity monitor task failed");
            }
            tracing::info!("Entity monitor stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }
}

async fn poll_loop(
    repo: Arc<Repository>,
    period: Duration,
    mut last: EntityCounts,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = ticker.tick() => {
                last = observe(&repo, last);
            }
        }
    }
}

/// One polling step. Returns the counts to compare against next time.
fn observe(repo: &Repository, last: EntityCounts) -> EntityCounts {
    let current = repo.entity_counts();
    if current.grew_since(&last) {
        let fresh = repo.new_entities();
        tracing::debug!(count = fresh.len(), "Catalog grew");
        report(&fresh);
    }
    // Reconciliation can shrink the album count; track it either way
    current
}

fn report(fresh: &NewEntities) {
    for photo in &fresh.photos {
        tracing::info!(kind = "photo", id = photo.id, name = %photo.name, "New record");
    }
    for album in &fresh.albums {
        tracing::info!(kind = "album", id = album.id, name = %album.name, "New record");
    }
    for tag in &fresh.tags {
        tracing::info!(kind = "tag", id = tag.id, name = %tag.name, "New record");
    }
}
