//! Run statistics
//!
//! Counters are updated by the coordinator while a run is in progress; a
//! background task logs them periodically and a summary is printed at the end.

use crate::extract::Outcome;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Live counters for one run
#[derive(Debug)]
pub struct CrawlStats {
    started_at: DateTime<Utc>,
    pages_fetched: AtomicU64,
    fetch_failures: AtomicU64,
    records_emitted: AtomicU64,
    records_discarded: AtomicU64,
    passes_abandoned: AtomicU64,
    records_incomplete: AtomicU64,
    status_codes: DashMap<u16, u64>,
}

/// Point-in-time copy of [`CrawlStats`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub started_at: DateTime<Utc>,
    pub pages_fetched: u64,
    pub fetch_failures: u64,
    pub records_emitted: u64,
    pub records_discarded: u64,
    pub passes_abandoned: u64,
    pub records_incomplete: u64,
    pub status_codes: BTreeMap<u16, u64>,
}

impl Default for CrawlStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CrawlStats {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            pages_fetched: AtomicU64::new(0),
            fetch_failures: AtomicU64::new(0),
            records_emitted: AtomicU64::new(0),
            records_discarded: AtomicU64::new(0),
            passes_abandoned: AtomicU64::new(0),
            records_incomplete: AtomicU64::new(0),
            status_codes: DashMap::new(),
        }
    }

    /// Records an HTTP response status
    pub fn record_status(&self, status: u16) {
        *self.status_codes.entry(status).or_insert(0) += 1;
        if (200..300).contains(&status) {
            self.pages_fetched.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records a fetch that produced no response
    pub fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the outcome of an extraction pass
    pub fn record_outcome(&self, outcome: &Outcome) {
        let counter = match outcome {
            Outcome::Emitted(_) => &self.records_emitted,
            Outcome::Discarded => &self.records_discarded,
            Outcome::Abandoned(_) => &self.passes_abandoned,
            Outcome::Pending => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a pass lost to a panicking task
    pub fn record_abandoned(&self) {
        self.passes_abandoned.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a record still incomplete when the run ended
    pub fn record_incomplete(&self) {
        self.records_incomplete.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a straggler emitted by the end-of-run sweep
    pub fn record_emitted(&self) {
        self.records_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn records_emitted(&self) -> u64 {
        self.records_emitted.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            started_at: self.started_at,
            pages_fetched: self.pages_fetched.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            records_emitted: self.records_emitted.load(Ordering::Relaxed),
            records_discarded: self.records_discarded.load(Ordering::Relaxed),
            passes_abandoned: self.passes_abandoned.load(Ordering::Relaxed),
            records_incomplete: self.records_incomplete.load(Ordering::Relaxed),
            status_codes: self
                .status_codes
                .iter()
                .map(|entry| (*entry.key(), *entry.value()))
                .collect(),
        }
    }
}

/// Spawns a task logging the crawl count and status codes every `every`
///
/// The caller aborts the returned handle when the run ends.
pub fn spawn_periodic_logger(stats: Arc<CrawlStats>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            let snapshot = stats.snapshot();
            tracing::info!("[CrawlCount] | {}", snapshot.records_emitted);
            tracing::info!("[StatusCodeCounts] | {:?}", snapshot.status_codes);
        }
    })
}

/// Logs the end-of-run summary
pub fn log_summary(snapshot: &StatsSnapshot) {
    let elapsed = Utc::now() - snapshot.started_at;

    tracing::info!(
        "Run finished in {}s: {} pages fetched, {} fetch failures",
        elapsed.num_seconds(),
        snapshot.pages_fetched,
        snapshot.fetch_failures
    );
    tracing::info!(
        "Records: {} emitted, {} discarded, {} incomplete, {} passes abandoned",
        snapshot.records_emitted,
        snapshot.records_discarded,
        snapshot.records_incomplete,
        snapshot.passes_abandoned
    );
    tracing::info!("[StatusCodeCounts] | {:?}", snapshot.status_codes);
}
