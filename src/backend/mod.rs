//! Grid bot service collaborator
//!
//! [`GridBotBackend`] is the seam the sync layer depends on; [`GridBotClient`]
//! is the HTTP implementation used by the binary.

pub mod breaker;
pub mod client;

use async_trait::async_trait;

use crate::error::BackendResult;
use crate::types::{Challenge, ProfitReportResponse, StopRequest, StopResponse, StrategiesResponse};

pub use breaker::{BreakerState, CircuitBreaker};
pub use client::{ClientConfig, GridBotClient};

#[async_trait]
pub trait GridBotBackend: Send + Sync {
    /// All strategies the service knows for `account_id`, running or not
    async fn get_user_grid_strategies(&self, account_id: &str) -> BackendResult<StrategiesResponse>;

    /// A fresh single-use challenge
    async fn get_challenge(&self) -> BackendResult<Challenge>;

    async fn stop_grid(&self, request: &StopRequest) -> BackendResult<StopResponse>;

    async fn get_profit_report(&self, session_id: &str) -> BackendResult<ProfitReportResponse>;
}
