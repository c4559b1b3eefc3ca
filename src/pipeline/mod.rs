//! Generation pipeline: one producer, a fixed pool of batching consumers.
//!
//! The generator pushes the seed batch through a bounded channel; each
//! worker drains the channel until it closes, groups what it received by
//! kind and saves each group with one repository call.

pub mod generator;
pub mod worker;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::repository::{Repository, RepositoryError};

pub use worker::WorkerReport;

/// Consumers per pipeline run.
pub const WORKER_COUNT: usize = 3;
/// Buffer between the generator and the workers.
pub const CHANNEL_CAPACITY: usize = 100;
/// Period of [`EntityService::run_scheduled`] when none is configured.
pub const DEFAULT_GENERATE_INTERVAL: Duration = Duration::from_secs(30);

/// Totals for one pipeline run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    pub albums: usize,
    pub tags: usize,
    pub photos: usize,
    pub failed_batches: usize,
}

impl PipelineStats {
    fn absorb(&mut self, report: &WorkerReport) {
        self.albums += report.albums;
        self.tags += report.tags;
        self.photos += report.photos;
        if report.failed {
            self.failed_batches += 1;
        }
    }
}

pub struct EntityService {
    repo: Arc<Repository>,
    /// Serialises batch saves across workers.
    save_lock: Arc<Mutex<()>>,
}

impl EntityService {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self {
            repo,
            save_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn repository(&self) -> &Arc<Repository> {
        &self.repo
    }

    /// Run the pipeline once.
    ///
    /// Cancellation is checked only on entry; a started run finishes.
    /// Worker failures are logged and counted in the returned stats, not
    /// returned as errors.
    pub async fn generate_and_save(
        &self,
        cancel: &CancellationToken,
    ) -> Result<PipelineStats, RepositoryError> {
        if cancel.is_cancelled() {
            return Err(RepositoryError::Cancelled);
        }
        let started = Instant::now();

        let (tx, rx) = async_channel::bounded(CHANNEL_CAPACITY);

        let mut workers = JoinSet::new();
        for worker_id in 0..WORKER_COUNT {
            workers.spawn(worker::run_worker(
                worker_id,
                rx.clone(),
                Arc::clone(&self.repo),
                Arc::clone(&self.save_lock),
            ));
        }
        // Workers hold the only receivers now; the channel closes when the
        // generator drops its sender.
        drop(rx);

        let generated = generator::run_generator(tx).await;

        let mut stats = PipelineStats::default();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(report) => stats.absorb(&report),
                Err(e) => {
                    tracing::error!(error = %e, "Worker task panicked");
                    stats.failed_batches += 1;
                }
            }
        }

        let counts = self.repo.entity_counts();
        tracing::info!(
            generated,
            saved_albums = stats.albums,
            saved_tags = stats.tags,
            saved_photos = stats.photos,
            failed_batches = stats.failed_batches,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Generation pipeline finished"
        );
        tracing::info!(
            photos = counts.photos,
            albums = counts.albums,
            tags = counts.tags,
            "Catalog totals"
        );

        Ok(stats)
    }

    /// Run the pipeline now and then every `period` until `cancel` fires.
    pub async fn run_scheduled(&self, cancel: CancellationToken, period: Duration) {
        let mut ticker = tokio::time::interval(period.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.generate_and_save(&cancel).await {
                        tracing::debug!(error = %e, "Scheduled generation skipped");
                    }
                }
            }
        }
        tracing::debug!("Scheduled generation stopped");
    }
}
