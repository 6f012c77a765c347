//! HTTP client for the challenge server with rate limiting and error handling
//!
//! Thin wrapper over reqwest that keeps a cookie jar, enforces a request rate
//! and turns non-2xx answers into typed errors.

use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use reqwest::{Client, Response, multipart::Form};
use std::num::NonZeroU32;
use std::time::Duration;

use crate::infrastructure::config::ChallengeConfig;
use crate::infrastructure::error::{SolverError, SolverResult};

/// HTTP client configuration
#[derive(Debug, Clone, serde::Serialize)]
pub struct HttpClientConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_requests_per_second: u32,
    pub follow_redirects: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            user_agent: crate::infrastructure::config::defaults::USER_AGENT.to_string(),
            timeout_seconds: 30,
            max_requests_per_second: 4,
            follow_redirects: true,
        }
    }
}

impl HttpClientConfig {
    /// Create HttpClientConfig from the challenge section
    #[must_use]
    pub fn from_challenge_config(challenge: &ChallengeConfig) -> Self {
        Self {
            user_agent: challenge.user_agent.clone(),
            timeout_seconds: challenge.request_timeout_seconds,
            follow_redirects: challenge.follow_redirects,
            ..Self::default()
        }
    }
}

/// reqwest client behind a direct rate limiter
pub struct HttpClient {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    config: HttpClientConfig,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration
    pub fn new(config: HttpClientConfig) -> SolverResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .cookie_store(true)
            .gzip(true)
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            })
            .build()
            .map_err(|e| SolverError::configuration("http_client", e.to_string()))?;

        let per_second = NonZeroU32::new(config.max_requests_per_second).ok_or_else(|| {
            SolverError::configuration("http_client.max_requests_per_second", "must be greater than 0")
        })?;
        let rate_limiter = RateLimiter::direct(Quota::per_second(per_second));

        Ok(Self {
            client,
            rate_limiter,
            config,
        })
    }

    /// GET `url` and return the body as text
    pub async fn get_text(&self, url: &str) -> SolverResult<String> {
        self.rate_limiter.until_ready().await;

        tracing::debug!("Fetching URL: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SolverError::transport(url, &e))?;

        Self::read_body(url, response).await
    }

    /// POST a multipart form to `url` and return the body as text
    pub async fn post_multipart(&self, url: &str, form: Form) -> SolverResult<String> {
        self.rate_limiter.until_ready().await;

        tracing::debug!("Posting multipart form to: {}", url);

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| SolverError::transport(url, &e))?;

        Self::read_body(url, response).await
    }

    async fn read_body(url: &str, response: Response) -> SolverResult<String> {
        let status = response.status();
        if !status.is_success() {
            return Err(SolverError::HttpRequestFailed {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| SolverError::transport(url, &e))?;

        tracing::debug!("Successfully fetched: {} ({} chars)", url, text.len());
        Ok(text)
    }

    /// Get the configuration
    pub const fn config(&self) -> &HttpClientConfig {
        &self.config
    }
}
