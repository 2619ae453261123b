//! Crawler coordinator - main dispatch loop
//!
//! This module contains the loop that coordinates a run:
//! - Seeding the frontier with the job's base URL and root schema
//! - Spawning one task per fetch, bounded by the frontier's permits
//! - Running the extractor on every fetched document
//! - Queuing produced links and handing completed records to the sink
//! - Sweeping records still incomplete when the frontier drains

use crate::config::{Config, IncompletePolicy};
use crate::crawler::fetcher::{FetchResult, Fetcher};
use crate::crawler::scheduler::{FetchTask, Frontier, ScheduledFetch};
use crate::extract::{Document, Extraction, Extractor, Outcome};
use crate::output::{log_summary, spawn_periodic_logger, CrawlStats, RecordSink, StatsSnapshot};
use crate::schema::{Group, JobDefinition};
use crate::state::{has_data, AccumulatorStore, Record};
use crate::url::canonicalize_url;
use crate::TrawlError;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use url::Url;

/// What a fetch task reports back to the coordinator
struct TaskReport {
    url: Url,
    status: Option<u16>,
    extraction: Option<Extraction>,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    job: Arc<JobDefinition>,
    fetcher: Arc<Fetcher>,
    extractor: Extractor,
    frontier: Frontier,
    sink: Box<dyn RecordSink>,
    stats: Arc<CrawlStats>,
    max_records: Option<u64>,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `job` - The compiled job definition
    /// * `sink` - Receives every completed record
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(TrawlError)` - Failed to build the HTTP clients
    pub fn new(
        config: Config,
        job: JobDefinition,
        sink: Box<dyn RecordSink>,
    ) -> Result<Self, TrawlError> {
        let fetcher = Fetcher::new(&config.crawler, &job.cookies)?;
        let frontier = Frontier::new(config.crawler.concurrency as usize);

        Ok(Self {
            config: Arc::new(config),
            job: Arc::new(job),
            fetcher: Arc::new(fetcher),
            extractor: Extractor::new(Arc::new(AccumulatorStore::new())),
            frontier,
            sink,
            stats: Arc::new(CrawlStats::new()),
            max_records: None,
        })
    }

    /// Stops the run once `limit` records have been emitted
    pub fn with_max_records(mut self, limit: u64) -> Self {
        self.max_records = Some(limit);
        self
    }

    /// The accumulator shared by every extraction pass of this run
    pub fn store(&self) -> &Arc<AccumulatorStore> {
        self.extractor.store()
    }

    pub fn stats(&self) -> Arc<CrawlStats> {
        Arc::clone(&self.stats)
    }

    /// Runs the dispatch loop until the frontier drains
    ///
    /// 1. Seed the frontier with the base URL and root schema
    /// 2. Spawn fetch tasks while permits are free
    /// 3. For each finished task, queue its links and settle its record
    /// 4. Sweep incomplete records per the `on-incomplete` policy
    /// 5. Finish the sink and log the summary
    ///
    /// Only sink failures end the run early with an error.
    pub async fn run(&mut self) -> Result<StatsSnapshot, TrawlError> {
        tracing::info!(
            "Starting job '{}' at {} (job digest: {})",
            self.job.job_id,
            self.job.base_url,
            self.job.digest
        );

        let logger = spawn_periodic_logger(
            Arc::clone(&self.stats),
            Duration::from_secs(self.config.crawler.stats_interval),
        );

        let result = self.dispatch().await;
        logger.abort();

        let stopped_early = result?;
        if !stopped_early {
            self.sweep_incomplete()?;
        }
        self.sink.finish()?;

        let snapshot = self.stats.snapshot();
        log_summary(&snapshot);
        Ok(snapshot)
    }

    /// Returns true if the run stopped on the record limit
    async fn dispatch(&mut self) -> Result<bool, TrawlError> {
        self.frontier.push(FetchTask::seed(
            self.job.base_url.clone(),
            Arc::clone(&self.job.schema),
        ));

        let mut tasks = JoinSet::new();

        loop {
            while let Some(scheduled) = self.frontier.try_next() {
                let fetcher = Arc::clone(&self.fetcher);
                let extractor = self.extractor.clone();
                tasks.spawn(process_task(fetcher, extractor, scheduled));
            }

            let Some(joined) = tasks.join_next().await else {
                tracing::info!("Frontier is empty, run complete");
                return Ok(false);
            };

            match joined {
                Ok(report) => self.handle_report(report)?,
                Err(e) => {
                    tracing::error!("Extraction task failed: {}", e);
                    self.stats.record_abandoned();
                }
            }

            if self.limit_reached() {
                tracing::info!("Record limit reached, stopping run");
                tasks.abort_all();
                return Ok(true);
            }
        }
    }

    fn handle_report(&mut self, report: TaskReport) -> Result<(), TrawlError> {
        match report.status {
            Some(status) => self.stats.record_status(status),
            None => self.stats.record_fetch_failure(),
        }

        let Some(extraction) = report.extraction else {
            return Ok(());
        };

        let mut queued = 0;
        for request in extraction.follow {
            if self.frontier.push(FetchTask::from(request)) {
                queued += 1;
            }
        }
        if queued > 0 {
            tracing::debug!("Queued {} links from {}", queued, report.url);
        }

        self.stats.record_outcome(&extraction.outcome);
        if let Outcome::Emitted(record) = &extraction.outcome {
            self.sink.emit(record)?;
        }

        Ok(())
    }

    fn limit_reached(&self) -> bool {
        self.max_records
            .map_or(false, |limit| self.stats.records_emitted() >= limit)
    }

    /// Drains records that never became complete
    fn sweep_incomplete(&mut self) -> Result<(), TrawlError> {
        let stragglers = self.store().drain();
        if stragglers.is_empty() {
            return Ok(());
        }

        tracing::warn!("{} records never became complete", stragglers.len());

        for (identity, record) in stragglers {
            self.stats.record_incomplete();
            tracing::warn!(
                identity = %identity,
                fields = ?field_names(&record),
                "Record never completed"
            );

            if self.config.crawler.on_incomplete == IncompletePolicy::Emit && has_data(&record) {
                self.sink.emit(&record)?;
                self.stats.record_emitted();
            }
        }

        Ok(())
    }
}

fn field_names(record: &Record) -> Vec<&str> {
    record.keys().map(String::as_str).collect()
}

async fn process_task(
    fetcher: Arc<Fetcher>,
    extractor: Extractor,
    scheduled: ScheduledFetch,
) -> TaskReport {
    let ScheduledFetch { task, permit } = scheduled;
    tracing::debug!("Processing URL: {}", task.url);

    let report = match fetcher.fetch(&task.url).await {
        FetchResult::Success {
            final_url,
            status_code,
            body,
        } => TaskReport {
            extraction: extract_document(&extractor, &task.schema, final_url, &body),
            url: task.url,
            status: Some(status_code),
        },
        FetchResult::HttpError { status_code } => {
            tracing::warn!("HTTP {} for {}", status_code, task.url);
            TaskReport {
                url: task.url,
                status: Some(status_code),
                extraction: None,
            }
        }
        FetchResult::NetworkError { error } => {
            tracing::warn!("Failed to fetch {}: {}", task.url, error);
            TaskReport {
                url: task.url,
                status: None,
                extraction: None,
            }
        }
    };

    drop(permit);
    report
}

/// Parses the body and runs one extraction pass over it
///
/// Kept synchronous so the parsed document never lives across an await.
fn extract_document(
    extractor: &Extractor,
    schema: &Arc<Group>,
    final_url: Url,
    body: &str,
) -> Option<Extraction> {
    let identity = match canonicalize_url(final_url.clone()) {
        Ok(identity) => identity.to_string(),
        Err(e) => {
            tracing::warn!("Cannot derive identity for {}: {}", final_url, e);
            return None;
        }
    };

    let document = Document::parse(body, final_url);
    Some(extractor.extract(&document, schema, &identity))
}

/// Runs a complete job
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use trawl::config::load_config;
/// use trawl::crawler::run_job;
/// use trawl::output::build_sink;
/// use trawl::schema::load_job;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("trawl.toml"))?;
/// let job = load_job(&config.job, "catalog").await?;
/// let sink = build_sink(&config.output)?;
/// run_job(config, job, sink).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_job(
    config: Config,
    job: JobDefinition,
    sink: Box<dyn RecordSink>,
) -> Result<StatsSnapshot, TrawlError> {
    let mut coordinator = Coordinator::new(config, job, sink)?;
    coordinator.run().await
}
