//! HTTP client for the agent orchestration service

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use log::debug;
use reqwest::{Client as HttpClient, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::api::{ThreadReadApi, ThreadWriteApi};
use super::models::{Run, RunCommand, Scope, StatePatch, Thread, ThreadFilter, ThreadState};
use crate::error::{ApiError, ApiResult};

/// Client-side request ceiling per second
const RATE_LIMIT_PER_SECOND: NonZeroU32 = NonZeroU32::new(10).unwrap();

/// Transport-level timeout; the sync layer applies tighter per-call budgets.
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Orchestration service API client
pub struct LangGraphClient {
    http: HttpClient,
    base_url: String,
    token: Option<String>,
    rate_limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl LangGraphClient {
    /// Create a client for one deployment
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> ApiResult<Self> {
        let http = HttpClient::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let quota = Quota::per_second(RATE_LIMIT_PER_SECOND);

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn request<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> ApiResult<T> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);

        let mut request = self.http.request(method, &url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(ApiError::from)?;

        let status = response.status();
        match status {
            status if status.is_success() => {
                if status == StatusCode::NO_CONTENT {
                    return serde_json::from_value(Value::Null).map_err(|e| {
                        ApiError::InvalidResponse(format!("Empty response body: {}", e))
                    });
                }
                response.json::<T>().await.map_err(|e| {
                    ApiError::InvalidResponse(format!("Failed to parse response: {}", e))
                })
            }
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
            StatusCode::FORBIDDEN => Err(ApiError::Forbidden),
            StatusCode::NOT_FOUND => {
                let error_msg = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Resource not found".to_string());
                Err(ApiError::NotFound(error_msg))
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                Err(ApiError::RateLimit(Duration::from_secs(retry_after)))
            }
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                let error_msg = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Bad request".to_string());
                Err(ApiError::BadRequest(error_msg))
            }
            status if status.is_server_error() => {
                let error_msg = response
                    .text()
                    .await
                    .unwrap_or_else(|_| format!("Server error: {}", status));
                Err(ApiError::ServerError(error_msg))
            }
            _ => Err(ApiError::InvalidResponse(format!(
                "Unexpected status code: {}",
                status
            ))),
        }
    }
}

/// Body of `POST /threads/search`
fn search_body(scope: &Scope, filter: &ThreadFilter) -> Value {
    let mut body = json!({
        "metadata": { "assistant_id": scope.agent_id },
        "limit": filter.limit,
        "offset": filter.offset,
    });
    if let Some(status) = filter.status() {
        body["status"] = json!(status.as_str());
    }
    body
}

#[async_trait]
impl ThreadReadApi for LangGraphClient {
    async fn search_threads(
        &self,
        scope: &Scope,
        filter: &ThreadFilter,
    ) -> ApiResult<Vec<Thread>> {
        let body = search_body(scope, filter);
        self.request(Method::POST, "/threads/search", Some(&body))
            .await
    }

    async fn get_thread(&self, thread_id: &str) -> ApiResult<Thread> {
        let path = format!("/threads/{}", thread_id);
        self.request::<_, ()>(Method::GET, &path, None).await
    }

    async fn get_thread_state(&self, thread_id: &str) -> ApiResult<ThreadState> {
        let path = format!("/threads/{}/state", thread_id);
        self.request::<_, ()>(Method::GET, &path, None).await
    }
}

#[async_trait]
impl ThreadWriteApi for LangGraphClient {
    async fn update_thread_state(&self, thread_id: &str, patch: &StatePatch) -> ApiResult<()> {
        let path = format!("/threads/{}/state", thread_id);
        // The service echoes the new checkpoint; nothing in it is needed here.
        let _: Value = self.request(Method::POST, &path, Some(patch)).await?;
        Ok(())
    }

    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
        command: &RunCommand,
    ) -> ApiResult<Run> {
        let path = format!("/threads/{}/runs", thread_id);
        let body = json!({
            "assistant_id": assistant_id,
            "command": command,
        });
        self.request(Method::POST, &path, Some(&body)).await
    }
}
