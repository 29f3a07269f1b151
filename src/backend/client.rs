//! HTTP client for the grid bot service
//!
//! Every call goes through a circuit breaker. Read-only calls may be retried
//! with exponential backoff when `max_retries > 0`; the challenge and stop
//! calls are never retried since a challenge is single-use.
//!
//! # Example
//!
//! ```no_run
//! use grid_sync::backend::{GridBotBackend, GridBotClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = GridBotClient::new("http://localhost:8080")?;
//!     let response = client.get_user_grid_strategies("acct-1").await?;
//!     println!("success: {}", response.success);
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::breaker::CircuitBreaker;
use super::GridBotBackend;
use crate::config::BackendConfig;
use crate::error::{BackendError, BackendResult};
use crate::types::{
    Challenge, ChallengeResponse, ProfitReportResponse, StopRequest, StopResponse,
    StrategiesResponse,
};

const STRATEGIES_PATH: &str = "/api/grid/strategies";
const CHALLENGE_PATH: &str = "/api/grid/challenge";
const STOP_PATH: &str = "/api/grid/stop";
const PROFIT_REPORT_PATH: &str = "/api/grid/profit-report";

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Retries for read-only calls
    pub max_retries: u32,
    pub timeout: Duration,
    /// Consecutive failures before the breaker opens
    pub breaker_threshold: u32,
    pub breaker_cooldown: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            timeout: Duration::from_secs(30),
            breaker_threshold: 5,
            breaker_cooldown: Duration::from_secs(60),
        }
    }
}

impl ClientConfig {
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_breaker(mut self, threshold: u32, cooldown: Duration) -> Self {
        self.breaker_threshold = threshold;
        self.breaker_cooldown = cooldown;
        self
    }
}

impl From<&BackendConfig> for ClientConfig {
    fn from(config: &BackendConfig) -> Self {
        ClientConfig::default()
            .with_max_retries(config.max_retries)
            .with_timeout(Duration::from_secs(config.timeout_secs))
            .with_breaker(
                config.circuit_breaker_threshold,
                Duration::from_secs(config.circuit_breaker_cooldown_secs),
            )
    }
}

/// HTTP client for the grid bot service
#[derive(Clone)]
pub struct GridBotClient {
    base_url: String,
    http_client: Client,
    breaker: Arc<Mutex<CircuitBreaker>>,
    max_retries: u32,
}

impl GridBotClient {
    pub fn new(base_url: impl Into<String>) -> BackendResult<Self> {
        Self::with_config(base_url, ClientConfig::default())
    }

    pub fn with_config(base_url: impl Into<String>, config: ClientConfig) -> BackendResult<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
            breaker: Arc::new(Mutex::new(CircuitBreaker::new(
                config.breaker_threshold,
                config.breaker_cooldown,
            ))),
            max_retries: config.max_retries,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Run `operation` behind the breaker, retrying up to `retries` times.
    async fn guarded<F, Fut, T>(&self, retries: u32, operation: F) -> BackendResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = BackendResult<T>>,
    {
        if !self.breaker.lock().await.can_attempt() {
            return Err(BackendError::CircuitOpen);
        }

        let mut attempt = 0;
        loop {
            if attempt > 0 {
                let delay = backoff_delay(attempt);
                debug!("Retrying after {}ms", delay.as_millis());
                sleep(delay).await;
            }

            match operation().await {
                Ok(result) => {
                    self.breaker.lock().await.record_success();
                    return Ok(result);
                }
                Err(err) if attempt < retries => {
                    warn!(
                        "Request failed (attempt {}/{}): {}",
                        attempt + 1,
                        retries + 1,
                        err
                    );
                    attempt += 1;
                }
                Err(err) => {
                    self.breaker.lock().await.record_failure();
                    return Err(err);
                }
            }
        }
    }

    async fn get_json<R>(&self, path: &str, query: &[(&str, &str)]) -> BackendResult<R>
    where
        R: DeserializeOwned,
    {
        let response = self
            .http_client
            .get(self.url(path))
            .query(query)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        decode(status, &text)
    }

    async fn post_json<T, R>(&self, path: &str, body: &T) -> BackendResult<R>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .http_client
            .post(self.url(path))
            .json(body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        decode(status, &text)
    }
}

fn decode<R: DeserializeOwned>(status: StatusCode, text: &str) -> BackendResult<R> {
    if !status.is_success() {
        return Err(BackendError::Api {
            status: status.as_u16(),
            body: text.to_string(),
        });
    }
    Ok(serde_json::from_str(text)?)
}

#[async_trait]
impl GridBotBackend for GridBotClient {
    async fn get_user_grid_strategies(&self, account_id: &str) -> BackendResult<StrategiesResponse> {
        self.guarded(self.max_retries, move || async move {
            self.get_json(STRATEGIES_PATH, &[("account_id", account_id)])
                .await
        })
        .await
    }

    async fn get_challenge(&self) -> BackendResult<Challenge> {
        let response: ChallengeResponse = self
            .guarded(0, move || async move { self.get_json(CHALLENGE_PATH, &[]).await })
            .await?;
        Ok(response.data)
    }

    async fn stop_grid(&self, request: &StopRequest) -> BackendResult<StopResponse> {
        self.guarded(0, move || async move { self.post_json(STOP_PATH, request).await })
            .await
    }

    async fn get_profit_report(&self, session_id: &str) -> BackendResult<ProfitReportResponse> {
        self.guarded(self.max_retries, move || async move {
            self.get_json(PROFIT_REPORT_PATH, &[("session_id", session_id)])
                .await
        })
        .await
    }
}

/// Delay before retry `attempt` (1-based): 1s, 2s, 4s... capped at 64s.
fn backoff_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
    Duration::from_secs(1u64 << exponent)
}

const MAX_BACKOFF_EXPONENT: u32 = 6;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_strips_trailing_slash() {
        let client = GridBotClient::new("http://localhost:8080/").unwrap();
        assert_eq!(
            client.url(STRATEGIES_PATH),
            "http://localhost:8080/api/grid/strategies"
        );
    }

    #[test]
    fn test_decode_success_envelope() {
        let body = r#"{"success":true,"data":{"strategies":[{"session_id":"s-1","ticker":"BTC","is_running":true}]}}"#;
        let response: StrategiesResponse = decode(StatusCode::OK, body).unwrap();
        assert!(response.success);
        assert_eq!(response.data.unwrap().strategies[0].session_id, "s-1");
    }

    #[test]
    fn test_decode_http_error() {
        let err = decode::<StopResponse>(StatusCode::UNAUTHORIZED, "bad signature").unwrap_err();
        assert!(matches!(err, BackendError::Api { status: 401, .. }));
    }

    #[test]
    fn test_decode_malformed_body() {
        let err = decode::<ChallengeResponse>(StatusCode::OK, "{not json").unwrap_err();
        assert!(matches!(err, BackendError::Parse(_)));
    }

    #[test]
    fn test_config_from_backend_section() {
        let backend = BackendConfig {
            max_retries: 2,
            timeout_secs: 5,
            ..Default::default()
        };
        let config = ClientConfig::from(&backend);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_rejects_after_failures() {
        let client = GridBotClient::with_config(
            "http://localhost:1",
            ClientConfig::default().with_breaker(1, Duration::from_secs(60)),
        )
        .unwrap();

        let first: BackendResult<()> = client
            .guarded(0, || async { Err(BackendError::Network("refused".to_string())) })
            .await;
        assert!(matches!(first, Err(BackendError::Network(_))));

        let second: BackendResult<()> = client.guarded(0, || async { Ok(()) }).await;
        assert!(matches!(second, Err(BackendError::CircuitOpen)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_read_calls() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let client = GridBotClient::new("http://localhost:1").unwrap();
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: BackendResult<u32> = client
            .guarded(2, move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(BackendError::Network("timeout".to_string()))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_backoff_delay_is_capped() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(3), Duration::from_secs(4));
        assert_eq!(backoff_delay(7), Duration::from_secs(64));
        assert_eq!(backoff_delay(100), Duration::from_secs(64));
        assert_eq!(backoff_delay(u32::MAX), Duration::from_secs(64));
    }
}
