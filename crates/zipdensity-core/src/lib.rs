pub mod batch;
pub mod decode;
pub mod error;
pub mod extract;
pub mod models;
pub mod table;
pub mod throttle;
pub mod traits;
pub mod zipcode;

#[cfg(test)]
pub(crate) mod testutil;

pub use batch::{BatchJob, BatchProcessor, BatchReporter, BatchResult, BatchSummary};
pub use error::{AppError, FetchError};
pub use extract::{DensityExtractor, extract, find_density};
pub use models::{DensityMatch, DensityRecord, FetchOutcome, FetchedPage, RecordStatus};
pub use table::{Table, aggregate};
pub use traits::PageFetcher;
pub use zipcode::{ZipCode, is_valid, normalize};
