//! REST facade for the request/response API.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::{
    config::ApiConfig,
    error::{FinlightError, FinlightResult},
    models::ArticlesPage,
};

/// Client-version label sent on every surface.
pub(crate) const CLIENT_VERSION: &str = concat!("finlight-client-rust/", env!("CARGO_PKG_VERSION"));

/// Status codes that are retried with exponential backoff.
const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Query parameters for article search.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetArticlesParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Inclusive lower publish-date bound, ISO-8601.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Inclusive upper publish-date bound, ISO-8601.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

/// HTTP client for the REST API.
#[derive(Clone, Debug)]
pub struct RestClient {
    config: ApiConfig,
    http: reqwest::Client,
}

impl RestClient {
    /// Create a new REST client.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the underlying
    /// HTTP client cannot be built.
    pub fn new(config: ApiConfig) -> FinlightResult<Self> {
        config.validate().map_err(FinlightError::config)?;

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "x-api-key",
            reqwest::header::HeaderValue::from_str(&config.api_key)
                .map_err(|_| FinlightError::config("API key is not a valid header value"))?,
        );
        headers.insert(
            "x-client-version",
            reqwest::header::HeaderValue::from_static(CLIENT_VERSION),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(CLIENT_VERSION)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { config, http })
    }

    /// Fetch one page of articles.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails after retries or the response
    /// body cannot be decoded.
    pub async fn get_articles(&self, params: &GetArticlesParams) -> FinlightResult<ArticlesPage> {
        self.get_json("/v2/articles", params).await
    }

    /// Issue a GET with query parameters, retrying transient failures.
    async fn get_json<T, Q>(&self, path: &str, query: &Q) -> FinlightResult<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let url = join_url(&self.config.base_url, path);
        let mut attempt = 1u32;

        loop {
            let response = self.http.get(&url).query(query).send().await?;
            let status = response.status();

            if status.is_success() {
                return Ok(response.json().await?);
            }

            if is_retryable(status) && attempt < self.config.retry_attempts {
                let delay = retry_delay(self.config.retry_base_delay, attempt);
                warn!(
                    %status,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying REST request"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            let retry_after = parse_retry_after(&response);
            let body = response.text().await.unwrap_or_default();
            debug!(%status, body, "REST request failed");

            return if status == StatusCode::TOO_MANY_REQUESTS {
                Err(FinlightError::rate_limited(retry_after))
            } else {
                Err(FinlightError::api(status, body))
            };
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    RETRYABLE_STATUSES.contains(&status.as_u16())
}

/// Delay before retry `attempt` (1-based): base × 2^(attempt − 1).
fn retry_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
}

fn parse_retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}
