//! REST client for the strategy backend
//!
//! - `GET/POST {base}/api/strategies/`
//! - `GET/DELETE {base}/api/strategies/{id}/`
//!
//! Reads are retried with exponential backoff on transient failures. Writes
//! are sent once.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::{StoreError, StrategyStore, GENERIC_STORE_ERROR};
use crate::strategy::{SavedStrategy, StrategyConfiguration, StrategySummary};
use crate::types::StrategyId;

/// Backend used when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// HTTP store configuration
#[derive(Debug, Clone)]
pub struct HttpStoreConfig {
    pub base_url: String,
    /// Bearer credential attached to every request
    pub token: Option<String>,
    pub timeout: Duration,
    /// Extra attempts for idempotent reads
    pub max_retries: u32,
    /// Wait before the first retry; doubled for each further attempt
    pub retry_delay: Duration,
}

impl Default for HttpStoreConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl HttpStoreConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

#[derive(Serialize)]
struct CreateRequest<'a> {
    name: &'a str,
    configuration: &'a StrategyConfiguration,
}

/// Strategy store backed by the REST API
#[derive(Debug, Clone)]
pub struct HttpStrategyStore {
    http_client: Client,
    base_url: String,
    token: Option<String>,
    max_retries: u32,
    retry_delay: Duration,
}

impl HttpStrategyStore {
    pub fn new(config: HttpStoreConfig) -> Result<Self, StoreError> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| StoreError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token,
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self) -> String {
        format!("{}/api/strategies/", self.base_url)
    }

    fn item_url(&self, id: StrategyId) -> String {
        format!("{}/api/strategies/{}/", self.base_url, id)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn execute_with_retry<F, Fut, T>(&self, operation: F) -> Result<T, StoreError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, StoreError>>,
    {
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                // 1s, 2s, 4s, ... with the default delay
                let delay = self.retry_delay * 2u32.pow(attempt - 1);
                debug!("Retrying after {}ms", delay.as_millis());
                sleep(delay).await;
            }

            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    warn!(
                        "Request failed (attempt {}/{}): {}",
                        attempt + 1,
                        self.max_retries + 1,
                        e
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
        id: Option<StrategyId>,
    ) -> Result<T, StoreError> {
        let response = self
            .authorize(self.http_client.get(url))
            .send()
            .await
            .map_err(network_error)?;
        read_json(response, id).await
    }
}

impl StrategyStore for HttpStrategyStore {
    async fn create(
        &self,
        name: &str,
        configuration: &StrategyConfiguration,
    ) -> Result<SavedStrategy, StoreError> {
        let body = CreateRequest {
            name,
            configuration,
        };
        let response = self
            .authorize(self.http_client.post(self.collection_url()))
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;

        let saved: SavedStrategy = read_json(response, None).await?;
        info!("Created strategy {} ({})", saved.name, saved.id);
        Ok(saved)
    }

    async fn list(&self) -> Result<Vec<StrategySummary>, StoreError> {
        let url = self.collection_url();
        let strategies: Vec<StrategySummary> =
            self.execute_with_retry(|| self.fetch_json(&url, None)).await?;
        debug!("Fetched {} strategy summaries", strategies.len());
        Ok(strategies)
    }

    async fn get(&self, id: StrategyId) -> Result<SavedStrategy, StoreError> {
        let url = self.item_url(id);
        self.execute_with_retry(|| self.fetch_json(&url, Some(id)))
            .await
    }

    async fn delete(&self, id: StrategyId) -> Result<(), StoreError> {
        let response = self
            .authorize(self.http_client.delete(self.item_url(id)))
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(error_from_response(status, &text, Some(id)));
        }
        info!("Deleted strategy {}", id);
        Ok(())
    }
}

fn network_error(err: reqwest::Error) -> StoreError {
    StoreError::Network(err.to_string())
}

async fn read_json<T: DeserializeOwned>(
    response: Response,
    id: Option<StrategyId>,
) -> Result<T, StoreError> {
    let status = response.status();
    let text = response.text().await.map_err(network_error)?;

    if !status.is_success() {
        return Err(error_from_response(status, &text, id));
    }

    serde_json::from_str(&text).map_err(StoreError::from)
}

/// Map a failed response to a store error, preferring the server's own
/// explanation
fn error_from_response(status: StatusCode, body: &str, id: Option<StrategyId>) -> StoreError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .and_then(extract_error_message)
        .unwrap_or_else(|| GENERIC_STORE_ERROR.to_string());

    match status {
        StatusCode::NOT_FOUND => match id {
            Some(id) => StoreError::NotFound(id),
            None => StoreError::Rejected {
                status: status.as_u16(),
                message,
            },
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Unauthorized(message),
        StatusCode::CONFLICT => StoreError::Conflict(message),
        _ if parsed.as_ref().is_some_and(is_name_collision) => StoreError::Conflict(message),
        _ => StoreError::Rejected {
            status: status.as_u16(),
            message,
        },
    }
}

/// First human readable message in a structured error body.
///
/// Looks at `detail`, `error`, `message`, then `non_field_errors`, then the
/// first field with a list of errors (reported as `field: message`).
fn extract_error_message(body: &Value) -> Option<String> {
    let non_empty = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    };

    match body {
        Value::String(s) => non_empty(s),
        Value::Array(items) => items.iter().find_map(|item| item.as_str().and_then(non_empty)),
        Value::Object(fields) => {
            for key in ["detail", "error", "message"] {
                if let Some(message) = fields.get(key).and_then(Value::as_str).and_then(non_empty) {
                    return Some(message);
                }
            }
            if let Some(message) = fields
                .get("non_field_errors")
                .and_then(first_string)
                .and_then(|s| non_empty(&s))
            {
                return Some(message);
            }
            fields.iter().find_map(|(field, errors)| {
                first_string(errors)
                    .and_then(|s| non_empty(&s))
                    .map(|message| format!("{}: {}", field, message))
            })
        }
        _ => None,
    }
}

fn first_string(value: &Value) -> Option<String> {
    value
        .as_array()?
        .iter()
        .find_map(|item| item.as_str().map(str::to_string))
}

fn is_name_collision(body: &Value) -> bool {
    body.get("name")
        .and_then(first_string)
        .map(|message| {
            let message = message.to_lowercase();
            message.contains("exist") || message.contains("unique")
        })
        .unwrap_or(false)
}
