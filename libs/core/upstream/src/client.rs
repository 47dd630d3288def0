use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use core_config::upstream::UpstreamConfig;
use database::common::{RetryConfig, retry_with_policy};
use observability::UpstreamMetrics;
use observability::portal::UpstreamOutcome;
use reqwest::header::RETRY_AFTER;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::breaker::CircuitBreaker;
use crate::error::{UpstreamError, UpstreamResult};

/// JSON-over-HTTP client for one upstream, gated by its breaker.
///
/// Every attempt runs `before_call`, the request, then exactly one of
/// `on_success`/`on_failure` before the outcome reaches the retry loop.
#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    config: UpstreamConfig,
    breaker: Arc<CircuitBreaker>,
    retry: RetryConfig,
}

impl UpstreamClient {
    pub fn new(config: UpstreamConfig, breaker: Arc<CircuitBreaker>) -> UpstreamResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| UpstreamError::Unavailable {
                service: config.name.clone(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        let retry = RetryConfig::new()
            .with_max_retries(config.max_retries)
            .with_initial_delay(config.backoff.as_millis() as u64)
            .with_max_delay(config.backoff.as_millis() as u64 * 16);

        Ok(Self {
            http,
            config,
            breaker,
            retry,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    /// POST `body` to `path`, retrying transient failures.
    pub async fn post_json<Req, Resp>(&self, operation: &str, path: &str, body: &Req) -> UpstreamResult<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = self.url(path);
        let attempts = AtomicU32::new(0);

        retry_with_policy(
            || {
                if attempts.fetch_add(1, Ordering::Relaxed) > 0 {
                    UpstreamMetrics::record_retry(self.name());
                }
                self.attempt(operation, &url, body)
            },
            self.retry.clone(),
            UpstreamError::retry_decision,
        )
        .await
    }

    async fn attempt<Req, Resp>(&self, operation: &str, url: &str, body: &Req) -> UpstreamResult<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        self.admit(operation)?;

        let started = Instant::now();
        let result = self.exchange(url, body).await;
        self.settle(operation, started.elapsed(), &result);
        result
    }

    /// Sends the request and parses the whole body; the breaker sees the
    /// outcome only once the body is in.
    async fn exchange<Req, Resp>(&self, url: &str, body: &Req) -> UpstreamResult<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let response = self.send(url, body).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::from_reqwest(self.name(), e))?;

        serde_json::from_slice(&bytes).map_err(|e| UpstreamError::InvalidResponse {
            service: self.name().to_string(),
            status: None,
            reason: e.to_string(),
        })
    }

    /// One gated request without retries; used directly by streaming calls.
    ///
    /// Records success once the status line is 2xx, so a stream that later
    /// breaks does not count against the breaker.
    pub async fn connect<Req>(&self, operation: &str, url: &str, body: &Req) -> UpstreamResult<reqwest::Response>
    where
        Req: Serialize + Sync,
    {
        self.admit(operation)?;

        let started = Instant::now();
        let result = self.send(url, body).await;
        self.settle(operation, started.elapsed(), &result);
        result
    }

    fn admit(&self, operation: &str) -> UpstreamResult<()> {
        self.breaker.before_call().inspect_err(|_| {
            UpstreamMetrics::record_call(self.name(), operation, UpstreamOutcome::Rejected, Duration::ZERO);
        })
    }

    /// Reports exactly one outcome for an admitted call.
    fn settle<T>(&self, operation: &str, elapsed: Duration, result: &UpstreamResult<T>) {
        match result {
            Ok(_) => {
                self.breaker.on_success();
                UpstreamMetrics::record_call(self.name(), operation, UpstreamOutcome::Success, elapsed);
            }
            Err(err) => {
                self.breaker.on_failure();
                UpstreamMetrics::record_call(self.name(), operation, UpstreamOutcome::Error, elapsed);
                debug!(service = %self.name(), operation, error = %err, "Upstream attempt failed");
            }
        }
    }

    /// `connect` for a path relative to the base URL.
    pub async fn connect_path<Req>(&self, operation: &str, path: &str, body: &Req) -> UpstreamResult<reqwest::Response>
    where
        Req: Serialize + Sync,
    {
        let url = self.url(path);
        self.connect(operation, &url, body).await
    }

    async fn send<Req>(&self, url: &str, body: &Req) -> UpstreamResult<reqwest::Response>
    where
        Req: Serialize + Sync,
    {
        let mut request = self.http.post(url).json(body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(self.name(), e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let text = response.text().await.unwrap_or_default();

        Err(UpstreamError::from_status(self.name(), status.as_u16(), retry_after, text))
    }
}

#[cfg(test)]
pub(crate) mod test_server {
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Serve `app` on an ephemeral port until the returned sender is dropped.
    pub async fn spawn(app: axum::Router) -> (String, oneshot::Sender<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = server.await;
        });
        (format!("http://{}", addr), shutdown_tx)
    }
}
