use std::future::Future;

use crate::models::FetchOutcome;
use crate::zipcode::ZipCode;

/// Retrieves the reference page for a validated zip code.
///
/// One unauthenticated GET per call, no retries. Transport problems come back
/// as `Err(FetchError)`, never as a panic.
pub trait PageFetcher: Send + Sync + Clone {
    fn fetch(&self, zip: &ZipCode) -> impl Future<Output = FetchOutcome> + Send;
}
