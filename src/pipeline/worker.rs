//! Channel consumers that batch entities by kind and hand them to the
//! repository.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::models::{Entity, EntityKind};
use crate::repository::{Repository, RepositoryError};

/// What one worker managed to store.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub photos: usize,
    pub albums: usize,
    pub tags: usize,
    /// Set when a batch save failed and the worker gave up on the rest of
    /// its local batches.
    pub failed: bool,
}

/// Per-kind batches collected by one worker.
#[derive(Debug, Default)]
struct LocalBatches {
    photos: Vec<Entity>,
    albums: Vec<Entity>,
    tags: Vec<Entity>,
}

impl LocalBatches {
    fn push(&mut self, entity: Entity) {
        match entity.kind() {
            EntityKind::Photo => self.photos.push(entity),
            EntityKind::Album => self.albums.push(entity),
            EntityKind::Tag => self.tags.push(entity),
        }
    }

    fn into_ordered(self) -> [(EntityKind, Vec<Entity>); 3] {
        [
            (EntityKind::Photo, self.photos),
            (EntityKind::Album, self.albums),
            (EntityKind::Tag, self.tags),
        ]
    }
}

/// Drain `rx` until it closes, then save each non-empty kind batch.
///
/// `save_lock` is held only around each `save_entities` call. A failed save
/// stops this worker's remaining batches; batches already saved stay saved.
pub async fn run_worker(
    worker_id: usize,
    rx: async_channel::Receiver<Entity>,
    repo: Arc<Repository>,
    save_lock: Arc<Mutex<()>>,
) -> WorkerReport {
    let mut batches = LocalBatches::default();
    while let Ok(entity) = rx.recv().await {
        tracing::debug!(
            worker_id,
            kind = %entity.kind(),
            id = entity.id(),
            "Received entity"
        );
        batches.push(entity);
    }

    let mut report = WorkerReport {
        worker_id,
        ..Default::default()
    };

    for (kind, batch) in batches.into_ordered() {
        if batch.is_empty() {
            continue;
        }
        let count = batch.len();

        let result: Result<(), RepositoryError> = {
            let _guard = save_lock.lock().await;
            repo.save_entities(batch).await
        };

        if let Err(e) = result {
            tracing::error!(worker_id, kind = %kind, count, error = %e, "Batch save failed");
            report.failed = true;
            break;
        }

        match kind {
            EntityKind::Photo => report.photos += count,
            EntityKind::Album => report.albums += count,
            EntityKind::Tag => report.tags += count,
        }
        tracing::debug!(worker_id, kind = %kind, count, "Batch saved");
    }

    report
}
