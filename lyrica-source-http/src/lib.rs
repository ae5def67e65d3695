use async_trait::async_trait;
use lyrica_core::{CoreError, SourceReader};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

const LOG_TARGET: &str = "lyrica::source::http";

/// Default timeout for HTTP requests (10 seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Default connect timeout (5 seconds)
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
/// Default number of retry attempts
const DEFAULT_MAX_RETRIES: u32 = 3;

const USER_AGENT: &str = concat!("Lyrica/", env!("CARGO_PKG_VERSION"));

/// Fetches LRC text over HTTP(S)
pub struct HttpSource {
    client: ClientWithMiddleware,
}

impl HttpSource {
    /// Create an HTTP source with a 10-second timeout and 3 retries.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self, CoreError> {
        Self::with_settings(Duration::from_secs(DEFAULT_TIMEOUT_SECS), DEFAULT_MAX_RETRIES)
    }

    /// Create an HTTP source with a custom request timeout and retry count.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_settings(timeout: Duration, max_retries: u32) -> Result<Self, CoreError> {
        // Base client with timeout
        let base_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CoreError::SourceFetch {
                location: String::new(),
                reason: format!("could not build HTTP client: {e}"),
            })?;

        // Wrap with retry middleware (exponential backoff)
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);
        let client = ClientBuilder::new(base_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self { client })
    }

    /// Whether `location` is something this source can fetch.
    #[must_use]
    pub fn handles(location: &str) -> bool {
        parse_location(location).is_ok()
    }
}

fn parse_location(location: &str) -> Result<Url, CoreError> {
    let url = Url::parse(location).map_err(|e| CoreError::SourceFetch {
        location: location.to_string(),
        reason: format!("invalid URL: {e}"),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(CoreError::SourceFetch {
            location: location.to_string(),
            reason: format!("unsupported scheme {scheme:?}"),
        }),
    }
}

#[async_trait]
impl SourceReader for HttpSource {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch_text(&self, location: &str) -> Result<String, CoreError> {
        let url = parse_location(location)?;
        debug!(target: LOG_TARGET, "GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CoreError::SourceFetch {
                location: location.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(target: LOG_TARGET, "{} returned status: {}", location, status);
            return Err(CoreError::SourceStatus {
                location: location.to_string(),
                status: status.as_u16(),
            });
        }

        let text = response.text().await.map_err(|e| CoreError::SourceFetch {
            location: location.to_string(),
            reason: e.to_string(),
        })?;
        info!(target: LOG_TARGET, "Fetched {} bytes from {}", text.len(), location);
        Ok(text)
    }
}
