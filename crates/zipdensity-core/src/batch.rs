//! Batch orchestration: normalize → validate → fetch → extract → classify.
//!
//! Runs a fixed pool of workers over one shared input cursor. Every worker
//! owns its own [`RateLimiter`] and writes each finished record into the
//! result slot matching the input's position, so the returned
//! [`BatchResult`] is ordered by input regardless of completion order.
//! A pool of one is the sequential mode.
//!
//! No failure inside a record escapes it: invalid codes, transport errors
//! and extraction misses all end as a terminal [`RecordStatus`].

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::extract::DensityExtractor;
use crate::models::{DensityRecord, RecordStatus};
use crate::throttle::{RateLimitConfig, RateLimiter};
use crate::traits::PageFetcher;
use crate::zipcode::{ZipCode, normalize};

/// Upper bound on concurrent workers against the reference host.
pub const MAX_CONCURRENCY: usize = 5;

/// Status message for inputs that fail validation.
pub const INVALID_ZIP_MESSAGE: &str = "invalid zip code";

/// Status message for inputs never started because the batch was cancelled.
pub const CANCELLED_MESSAGE: &str = "cancelled";

/// Marks error messages for failures a later re-run could clear.
pub const TRANSIENT_SUFFIX: &str = "transient";

/// A batch of raw zip code inputs and how to process them.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub inputs: Vec<String>,
    pub concurrency: usize,
    pub rate_limit: RateLimitConfig,
}

impl BatchJob {
    /// Sequential job with the default one-second spacing.
    pub fn new<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            concurrency: 1,
            rate_limit: RateLimitConfig::default(),
        }
    }

    /// Set the worker count. Must be within `1..=MAX_CONCURRENCY`.
    pub fn with_concurrency(mut self, concurrency: usize) -> Result<Self, AppError> {
        if !(1..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(AppError::ConfigError(format!(
                "concurrency must be between 1 and {MAX_CONCURRENCY}, got {concurrency}"
            )));
        }
        self.concurrency = concurrency;
        Ok(self)
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

/// Counts of terminal states over a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub found: usize,
    pub not_found: usize,
    pub error: usize,
}

impl BatchSummary {
    pub fn from_records(records: &[DensityRecord]) -> Self {
        let mut summary = Self {
            total: records.len(),
            ..Self::default()
        };
        for record in records {
            match record.status {
                RecordStatus::Found => summary.found += 1,
                RecordStatus::NotFound => summary.not_found += 1,
                RecordStatus::Error(_) => summary.error += 1,
            }
        }
        summary
    }

    fn percent(&self, count: usize) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            count as f64 * 100.0 / self.total as f64
        }
    }

    pub fn found_percent(&self) -> f64 {
        self.percent(self.found)
    }

    pub fn not_found_percent(&self) -> f64 {
        self.percent(self.not_found)
    }

    pub fn error_percent(&self) -> f64 {
        self.percent(self.error)
    }
}

/// Records aligned with [`BatchJob::inputs`], plus summary counts.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub records: Vec<DensityRecord>,
    pub summary: BatchSummary,
}

impl BatchResult {
    fn new(records: Vec<DensityRecord>) -> Self {
        let summary = BatchSummary::from_records(&records);
        Self { records, summary }
    }
}

/// Events emitted while a batch runs.
#[derive(Debug, Clone)]
pub enum BatchEvent<'a> {
    Started {
        total: usize,
        workers: usize,
    },
    /// One per finished record, in completion order.
    RecordCompleted {
        index: usize,
        completed: usize,
        total: usize,
        input: &'a str,
        record: &'a DensityRecord,
    },
    Cancelled {
        unprocessed: usize,
    },
    Finished {
        summary: &'a BatchSummary,
        elapsed_ms: u128,
    },
}

/// Receives batch progress (decoupled from any presentation layer).
pub trait BatchReporter: Send + Sync {
    fn report(&self, event: BatchEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl BatchReporter for NullReporter {}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingBatchReporter;

impl BatchReporter for TracingBatchReporter {
    fn report(&self, event: BatchEvent<'_>) {
        match event {
            BatchEvent::Started { total, workers } => {
                tracing::info!(%total, %workers, "Batch started");
            }
            BatchEvent::RecordCompleted {
                index,
                completed,
                total,
                input,
                record,
            } => {
                let percent = completed * 100 / total.max(1);
                match &record.status {
                    RecordStatus::Found => tracing::info!(
                        %index,
                        zipcode = %record.zipcode,
                        density = ?record.density,
                        "Processed {completed} of {total} zip codes ({percent}%)"
                    ),
                    RecordStatus::NotFound => tracing::warn!(
                        %index,
                        zipcode = %record.zipcode,
                        "No density figure found ({completed} of {total}, {percent}%)"
                    ),
                    RecordStatus::Error(message) => tracing::warn!(
                        %index,
                        %input,
                        error = %message,
                        "Lookup failed ({completed} of {total}, {percent}%)"
                    ),
                }
            }
            BatchEvent::Cancelled { unprocessed } => {
                tracing::warn!(%unprocessed, "Batch cancelled");
            }
            BatchEvent::Finished {
                summary,
                elapsed_ms,
            } => {
                tracing::info!(
                    total = summary.total,
                    found = summary.found,
                    not_found = summary.not_found,
                    error = summary.error,
                    %elapsed_ms,
                    "Batch finished"
                );
            }
        }
    }
}

/// Resolves density figures for single codes or whole batches.
///
/// Generic over the fetcher so tests can substitute a stub for the network.
pub struct BatchProcessor<F>
where
    F: PageFetcher,
{
    fetcher: F,
    extractor: DensityExtractor,
}

impl<F> BatchProcessor<F>
where
    F: PageFetcher,
{
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            extractor: DensityExtractor::default(),
        }
    }

    pub fn with_extractor(fetcher: F, extractor: DensityExtractor) -> Self {
        Self { fetcher, extractor }
    }

    /// Resolve a single raw zip code without any rate limiting.
    pub async fn lookup(&self, raw: &str) -> DensityRecord {
        let zip = match ZipCode::parse(raw) {
            Ok(zip) => zip,
            Err(_) => return DensityRecord::error(normalize(raw), INVALID_ZIP_MESSAGE),
        };
        self.fetch_and_extract(&zip).await
    }

    /// Run a batch to completion.
    pub async fn run<R: BatchReporter>(&self, job: &BatchJob, reporter: &R) -> BatchResult {
        self.run_with_cancel(job, &CancellationToken::new(), reporter)
            .await
    }

    /// Run a batch, stopping early once `cancel` fires.
    ///
    /// Workers check the token between records and while waiting on their
    /// rate limiter; an in-flight fetch is allowed to finish. Inputs never
    /// started end as `Error("cancelled")`, so the result stays aligned.
    pub async fn run_with_cancel<R: BatchReporter>(
        &self,
        job: &BatchJob,
        cancel: &CancellationToken,
        reporter: &R,
    ) -> BatchResult {
        let started = Instant::now();
        let total = job.inputs.len();
        let workers = job.concurrency.clamp(1, MAX_CONCURRENCY).min(total.max(1));

        reporter.report(BatchEvent::Started { total, workers });

        let cursor = AtomicUsize::new(0);
        let completed = AtomicUsize::new(0);
        let slots: Mutex<Vec<Option<DensityRecord>>> = Mutex::new(vec![None; total]);

        let (cursor, completed, slots_ref) = (&cursor, &completed, &slots);
        let pool = (0..workers).map(move |worker| {
            async move {
                let mut limiter = RateLimiter::new(job.rate_limit.clone());
                loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let index = cursor.fetch_add(1, Ordering::SeqCst);
                    let Some(input) = job.inputs.get(index) else {
                        break;
                    };

                    tracing::debug!(%worker, %index, %input, "Resolving zip code");
                    let record = self.resolve(input, &mut limiter, cancel).await;
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    reporter.report(BatchEvent::RecordCompleted {
                        index,
                        completed: done,
                        total,
                        input,
                        record: &record,
                    });

                    slots_ref
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())[index] = Some(record);
                }
            }
        });
        futures::future::join_all(pool).await;

        let slots = slots.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
        let unprocessed = slots.iter().filter(|slot| slot.is_none()).count();
        if unprocessed > 0 {
            reporter.report(BatchEvent::Cancelled { unprocessed });
        }

        let records = slots
            .into_iter()
            .zip(&job.inputs)
            .map(|(slot, input)| {
                slot.unwrap_or_else(|| DensityRecord::error(normalize(input), CANCELLED_MESSAGE))
            })
            .collect();

        let result = BatchResult::new(records);
        reporter.report(BatchEvent::Finished {
            summary: &result.summary,
            elapsed_ms: started.elapsed().as_millis(),
        });
        result
    }

    /// One record's full state machine, with the worker's rate limiter
    /// applied before the fetch.
    async fn resolve(
        &self,
        raw: &str,
        limiter: &mut RateLimiter,
        cancel: &CancellationToken,
    ) -> DensityRecord {
        let zip = match ZipCode::parse(raw) {
            Ok(zip) => zip,
            Err(_) => return DensityRecord::error(normalize(raw), INVALID_ZIP_MESSAGE),
        };

        tokio::select! {
            () = limiter.wait() => {}
            () = cancel.cancelled() => {
                return DensityRecord::error(zip.as_str(), CANCELLED_MESSAGE);
            }
        }

        self.fetch_and_extract(&zip).await
    }

    async fn fetch_and_extract(&self, zip: &ZipCode) -> DensityRecord {
        let page = match self.fetcher.fetch(zip).await {
            Ok(page) => page,
            Err(e) if e.is_not_found() => {
                return DensityRecord::error(
                    zip.as_str(),
                    format!("zip code not recognized by source ({e})"),
                );
            }
            Err(e) if e.is_transient() => {
                tracing::warn!(zipcode = %zip, error = %e, "Transient fetch failure");
                return DensityRecord::error(zip.as_str(), format!("{e} ({TRANSIENT_SUFFIX})"));
            }
            Err(e) => {
                tracing::debug!(zipcode = %zip, error = %e, "Fetch failed");
                return DensityRecord::error(zip.as_str(), e.to_string());
            }
        };

        let decoded = page.decode();
        if decoded.lossy {
            tracing::debug!(zipcode = %zip, "Page decoded with replacement characters");
        }

        match self.extractor.find(&decoded.text) {
            Some(found) => DensityRecord::found(zip.as_str(), found),
            None => DensityRecord::not_found(zip.as_str()),
        }
    }
}
