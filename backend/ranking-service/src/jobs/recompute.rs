use crate::config::RecomputeConfig;
use crate::models::{CompanyId, ListingId, RecomputeJob, RecomputeReason, RegionId};
use crate::redis_client::SharedRedis;
use crate::services::ranking::{PositionRequest, RankingService};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

/// Fire-and-forget hand-off of recompute jobs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: RecomputeJob) -> Result<()>;
}

/// In-process queue backed by a bounded channel.
///
/// Enqueue never waits for room: a full queue rejects the job, and the next
/// mutation of the listing schedules it again.
#[derive(Clone)]
pub struct TokioJobQueue {
    sender: mpsc::Sender<RecomputeJob>,
}

impl TokioJobQueue {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<RecomputeJob>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    pub fn from_config(config: &RecomputeConfig) -> (Self, mpsc::Receiver<RecomputeJob>) {
        Self::channel(config.queue_capacity)
    }
}

#[async_trait]
impl JobQueue for TokioJobQueue {
    async fn enqueue(&self, job: RecomputeJob) -> Result<()> {
        self.sender.try_send(job).map_err(|e| match e {
            TrySendError::Full(job) => {
                anyhow!("recompute queue is full, job {} rejected", job.job_id)
            }
            TrySendError::Closed(_) => anyhow!("recompute queue is closed"),
        })
    }
}

/// Pushes JSON job descriptors onto a Redis list for an external worker pool
#[derive(Clone)]
pub struct RedisJobQueue {
    redis: SharedRedis,
    queue_key: String,
}

impl RedisJobQueue {
    pub fn new(redis: SharedRedis, queue_key: impl Into<String>) -> Self {
        Self {
            redis,
            queue_key: queue_key.into(),
        }
    }

    pub fn from_config(redis: SharedRedis, config: &RecomputeConfig) -> Self {
        Self::new(redis, config.redis_queue_key.clone())
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, job: RecomputeJob) -> Result<()> {
        let payload = serde_json::to_string(&job).context("failed to encode recompute job")?;

        let mut conn = self.redis.lock().await;
        conn.lpush::<_, _, ()>(&self.queue_key, payload)
            .await
            .context("failed to push recompute job")?;
        Ok(())
    }
}

/// Schedules deferred position recomputation after listing mutations
pub struct AsyncRecomputeTrigger {
    queue: Arc<dyn JobQueue>,
}

impl AsyncRecomputeTrigger {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self { queue }
    }

    /// Enqueue a recompute job. Never blocks on the recomputation and never fails
    /// the caller; an enqueue error is only logged.
    pub async fn trigger(
        &self,
        listing_id: ListingId,
        company_id: CompanyId,
        region_id: Option<RegionId>,
        reason: RecomputeReason,
    ) {
        let job = RecomputeJob::new(listing_id, company_id, region_id, reason);
        let job_id = job.job_id;

        match self.queue.enqueue(job).await {
            Ok(()) => debug!(
                job_id = %job_id,
                listing_id = listing_id,
                reason = reason.as_str(),
                "Recompute job enqueued"
            ),
            Err(e) => warn!(
                job_id = %job_id,
                listing_id = listing_id,
                error = %e,
                "Failed to enqueue recompute job"
            ),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecomputeStats {
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub jobs_received: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub total_duration_ms: u64,
}

impl RecomputeStats {
    fn record(&mut self, joined: std::result::Result<bool, JoinError>) {
        match joined {
            Ok(true) => self.jobs_succeeded += 1,
            Ok(false) => self.jobs_failed += 1,
            Err(e) => {
                error!(error = %e, "Recompute task panicked");
                self.jobs_failed += 1;
            }
        }
    }

    pub fn jobs_finished(&self) -> u64 {
        self.jobs_succeeded + self.jobs_failed
    }
}

/// Drains an in-process queue with bounded concurrency
pub struct RecomputeWorker {
    ranking: Arc<RankingService>,
    concurrency: usize,
    progress: Option<watch::Sender<RecomputeStats>>,
}

impl RecomputeWorker {
    pub fn new(ranking: Arc<RankingService>, concurrency: usize) -> Self {
        Self {
            ranking,
            concurrency: concurrency.max(1),
            progress: None,
        }
    }

    /// Publish running totals after every finished job
    pub fn with_progress(mut self, progress: watch::Sender<RecomputeStats>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn from_config(ranking: Arc<RankingService>, config: &RecomputeConfig) -> Self {
        Self::new(ranking, config.concurrency)
    }

    /// Run until every sender is dropped and the queue is empty
    pub async fn run(self, mut receiver: mpsc::Receiver<RecomputeJob>) -> RecomputeStats {
        let start_time = Instant::now();
        let mut stats = RecomputeStats {
            started_at: Some(Utc::now()),
            ..Default::default()
        };

        info!(concurrency = self.concurrency, "Recompute worker started");

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        // Finished tasks are reaped as they complete, so the set never holds
        // more than `concurrency` entries plus the ones awaiting collection.
        loop {
            tokio::select! {
                biased;

                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    stats.record(joined);
                    self.publish(&stats);
                }
                maybe_job = receiver.recv() => {
                    let Some(job) = maybe_job else { break };
                    stats.jobs_received += 1;

                    let permit = match semaphore.clone().acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => break,
                    };
                    let ranking = self.ranking.clone();

                    tasks.spawn(async move {
                        let _permit = permit;
                        process_job(&ranking, job).await
                    });
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            stats.record(joined);
            self.publish(&stats);
        }

        stats.completed_at = Some(Utc::now());
        stats.total_duration_ms = start_time.elapsed().as_millis() as u64;

        info!(
            received = stats.jobs_received,
            succeeded = stats.jobs_succeeded,
            failed = stats.jobs_failed,
            duration_ms = stats.total_duration_ms,
            "Recompute worker stopped"
        );

        self.publish(&stats);
        stats
    }

    fn publish(&self, stats: &RecomputeStats) {
        if let Some(progress) = &self.progress {
            progress.send_replace(stats.clone());
        }
    }
}

async fn process_job(ranking: &RankingService, job: RecomputeJob) -> bool {
    let request = PositionRequest::for_listing(job.listing_id, job.company_id, job.region_id);

    match ranking.compute_position(&request).await {
        Ok(result) => {
            debug!(
                job_id = %job.job_id,
                listing_id = job.listing_id,
                position = result.position,
                "Recompute job finished"
            );
            true
        }
        Err(e) => {
            error!(
                job_id = %job.job_id,
                listing_id = job.listing_id,
                reason = job.reason.as_str(),
                error = %e,
                "Recompute job failed"
            );
            false
        }
    }
}
