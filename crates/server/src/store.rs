//! In-memory store of finished batches awaiting download.
//!
//! Converted bytes only live here between the convert request and the
//! downloads that follow it. Nothing is written to disk.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use convertino_core::{ConversionBatch, RetentionConfig};

use crate::metrics::{BATCHES_EVICTED, BATCHES_STORED};

/// A finished batch held for download.
#[derive(Debug)]
pub struct StoredBatch {
    pub batch: ConversionBatch,
    pub created_at: DateTime<Utc>,
    stored_at: Instant,
}

impl StoredBatch {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() >= ttl
    }
}

/// Bounded, expiring store of finished batches.
///
/// Batches are kept in insertion order. Inserting past `max_batches` drops
/// the oldest; a batch older than `ttl` is treated as gone.
#[derive(Debug)]
pub struct BatchStore {
    batches: RwLock<Vec<Arc<StoredBatch>>>,
    ttl: Duration,
    max_batches: usize,
}

impl BatchStore {
    /// Create a new store. A `max_batches` of 0 is treated as 1.
    pub fn new(ttl: Duration, max_batches: usize) -> Self {
        Self {
            batches: RwLock::new(Vec::new()),
            ttl,
            max_batches: max_batches.max(1),
        }
    }

    pub fn from_config(config: &RetentionConfig) -> Self {
        Self::new(Duration::from_secs(config.ttl_secs), config.max_batches)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store a finished batch, replacing any batch with the same id.
    pub async fn insert(&self, batch: ConversionBatch) -> Arc<StoredBatch> {
        let stored = Arc::new(StoredBatch {
            batch,
            created_at: Utc::now(),
            stored_at: Instant::now(),
        });

        let mut batches = self.batches.write().await;
        Self::drop_expired(&mut batches, self.ttl);
        batches.retain(|b| b.batch.id != stored.batch.id);
        batches.push(Arc::clone(&stored));

        while batches.len() > self.max_batches {
            let evicted = batches.remove(0);
            BATCHES_EVICTED.with_label_values(&["capacity"]).inc();
            debug!(batch_id = %evicted.batch.id, "Evicted batch at capacity");
        }

        BATCHES_STORED.set(batches.len() as i64);
        stored
    }

    /// Get a batch by id, unless it has expired.
    pub async fn get(&self, id: Uuid) -> Option<Arc<StoredBatch>> {
        self.batches
            .read()
            .await
            .iter()
            .find(|b| b.batch.id == id && !b.is_expired(self.ttl))
            .cloned()
    }

    /// Discard a batch. Returns whether it was present.
    pub async fn remove(&self, id: Uuid) -> bool {
        let mut batches = self.batches.write().await;
        let before = batches.len();
        batches.retain(|b| b.batch.id != id);
        let removed = batches.len() < before;
        if removed {
            BATCHES_EVICTED.with_label_values(&["deleted"]).inc();
        }
        BATCHES_STORED.set(batches.len() as i64);
        removed
    }

    /// Drop every expired batch. Returns how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let mut batches = self.batches.write().await;
        let purged = Self::drop_expired(&mut batches, self.ttl);
        BATCHES_STORED.set(batches.len() as i64);
        purged
    }

    pub async fn len(&self) -> usize {
        self.batches.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.batches.read().await.is_empty()
    }

    /// Spawn a task that purges expired batches every `every`.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let purged = store.purge_expired().await;
                if purged > 0 {
                    info!(purged, "Purged expired batches");
                }
            }
        })
    }

    fn drop_expired(batches: &mut Vec<Arc<StoredBatch>>, ttl: Duration) -> usize {
        let before = batches.len();
        batches.retain(|b| !b.is_expired(ttl));
        let purged = before - batches.len();
        if purged > 0 {
            BATCHES_EVICTED
                .with_label_values(&["expired"])
                .inc_by(purged as u64);
        }
        purged
    }
}
