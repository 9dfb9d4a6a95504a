//! Test utilities: a stub fetcher and a recording reporter.
//!
//! Handwritten mocks for dependency injection in unit tests. Both use
//! `Arc<Mutex<_>>` so clones share state and tests can assert on what
//! was recorded.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use crate::batch::{BatchEvent, BatchReporter};
use crate::error::FetchError;
use crate::models::{FetchOutcome, FetchedPage};
use crate::traits::PageFetcher;
use crate::zipcode::ZipCode;

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Stub fetcher answering per zip code.
///
/// Codes without a configured response get a page with no density figure.
#[derive(Clone, Default)]
pub struct MockFetcher {
    responses: Arc<Mutex<HashMap<String, Result<Vec<u8>, FetchError>>>>,
    latency: Arc<Mutex<HashMap<String, Duration>>>,
    requested: Arc<Mutex<Vec<String>>>,
    started_at: Arc<Mutex<Vec<(String, Instant)>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, zip: &str, html: &str) -> Self {
        self.with_bytes(zip, html.as_bytes().to_vec())
    }

    pub fn with_bytes(self, zip: &str, bytes: Vec<u8>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(zip.to_string(), Ok(bytes));
        self
    }

    pub fn with_error(self, zip: &str, error: FetchError) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(zip.to_string(), Err(error));
        self
    }

    /// Delay the response for `zip` (real time).
    pub fn with_latency(self, zip: &str, latency: Duration) -> Self {
        self.latency
            .lock()
            .unwrap()
            .insert(zip.to_string(), latency);
        self
    }

    /// Zip codes fetched so far, in call order.
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    /// Start instant of every fetch on the tokio clock, in call order.
    pub fn started_at(&self) -> Vec<(String, Instant)> {
        self.started_at.lock().unwrap().clone()
    }
}

impl PageFetcher for MockFetcher {
    async fn fetch(&self, zip: &ZipCode) -> FetchOutcome {
        self.requested.lock().unwrap().push(zip.to_string());
        self.started_at
            .lock()
            .unwrap()
            .push((zip.to_string(), Instant::now()));

        let latency = self.latency.lock().unwrap().get(zip.as_str()).copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let url = format!("https://example.com/zip-code/{zip}/zip-code-{zip}.asp");
        let response = self.responses.lock().unwrap().get(zip.as_str()).cloned();
        match response {
            Some(Ok(bytes)) => Ok(FetchedPage::new(url, bytes)),
            Some(Err(e)) => Err(e),
            None => Ok(FetchedPage::new(url, b"<html><body>default</body></html>".to_vec())),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// Reporter that records the progress events it receives.
#[derive(Clone, Default)]
pub struct RecordingReporter {
    completed: Arc<Mutex<Vec<(usize, usize)>>>,
    cancelled: Arc<Mutex<Option<usize>>>,
    finished: Arc<Mutex<usize>>,
}

impl RecordingReporter {
    /// Input indices in the order their records completed.
    pub fn completed_indices(&self) -> Vec<usize> {
        self.completed.lock().unwrap().iter().map(|(i, _)| *i).collect()
    }

    /// The running `completed` counter from each progress event.
    pub fn completed_counts(&self) -> Vec<usize> {
        self.completed.lock().unwrap().iter().map(|(_, c)| *c).collect()
    }

    pub fn cancelled(&self) -> Option<usize> {
        *self.cancelled.lock().unwrap()
    }

    pub fn finished(&self) -> usize {
        *self.finished.lock().unwrap()
    }
}

impl BatchReporter for RecordingReporter {
    fn report(&self, event: BatchEvent<'_>) {
        match event {
            BatchEvent::RecordCompleted {
                index, completed, ..
            } => self.completed.lock().unwrap().push((index, completed)),
            BatchEvent::Cancelled { unprocessed } => {
                *self.cancelled.lock().unwrap() = Some(unprocessed);
            }
            BatchEvent::Finished { .. } => *self.finished.lock().unwrap() += 1,
            BatchEvent::Started { .. } => {}
        }
    }
}
