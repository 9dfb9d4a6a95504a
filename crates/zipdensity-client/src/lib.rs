pub mod fetcher;

pub use fetcher::{ClientConfig, DEFAULT_BASE_URL, DEFAULT_USER_AGENT, ReqwestFetcher};
