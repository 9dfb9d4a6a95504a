use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, HeaderMap, HeaderValue};
use url::Url;
use zipdensity_core::decode::charset_from_content_type;
use zipdensity_core::error::{AppError, FetchError};
use zipdensity_core::models::{FetchOutcome, FetchedPage};
use zipdensity_core::traits::PageFetcher;
use zipdensity_core::zipcode::ZipCode;

/// Host serving one page per zip code.
pub const DEFAULT_BASE_URL: &str = "https://www.zip-codes.com";

/// Static desktop browser identity; the source rejects obvious bots.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Settings for [`ReqwestFetcher`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
    /// Honour `HTTP_PROXY`/`HTTPS_PROXY` from the environment.
    pub use_system_proxy: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            use_system_proxy: true,
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn without_proxy(mut self) -> Self {
        self.use_system_proxy = false;
        self
    }
}

/// HTTP fetcher for the reference source using reqwest.
///
/// Issues a single GET per zip code with a browser-like header set and a
/// bounded timeout. Never retries.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self, AppError> {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Result<Self, AppError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| AppError::ConfigError(format!("Invalid base URL '{}': {e}", config.base_url)))?;
        match base_url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(AppError::ConfigError(format!(
                    "URL scheme '{scheme}' is not allowed (only http/https)"
                )));
            }
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let mut builder = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(config.timeout);
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            timeout: config.timeout,
        })
    }

    /// `<base>/zip-code/<zip>/zip-code-<zip>.asp`
    pub fn page_url(&self, zip: &ZipCode) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/zip-code/{zip}/zip-code-{zip}.asp")
    }

    fn map_transport_error(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else if e.is_connect() {
            FetchError::Network(format!("Connection failed: {e}"))
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

impl PageFetcher for ReqwestFetcher {
    async fn fetch(&self, zip: &ZipCode) -> FetchOutcome {
        let url = self.page_url(zip);
        tracing::debug!(zipcode = %zip, %url, "Fetching page");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }

        let declared_charset = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(charset_from_content_type)
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        tracing::debug!(zipcode = %zip, bytes = bytes.len(), "Fetched page");

        let page = FetchedPage::new(url, bytes.to_vec());
        Ok(match declared_charset {
            Some(charset) => page.with_declared_charset(charset),
            None => page,
        })
    }
}
