//! Wire-level data types exchanged with the grid bot service

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::aggregate::parse_decimal_or_zero;

/// One grid bot instance as reported by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridStrategy {
    pub session_id: String,
    pub ticker: String,
    /// Client-reported running flag
    #[serde(default)]
    pub is_running: bool,
    #[serde(default)]
    pub status: StrategyStatus,
}

impl GridStrategy {
    /// A strategy is shown only when both the client and the server agree it runs.
    pub fn is_active(&self) -> bool {
        self.is_running && self.status.is_running
    }
}

/// Server-side view of a strategy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyStatus {
    #[serde(default)]
    pub is_running: bool,
    #[serde(default)]
    pub active_orders_count: u32,
    #[serde(default)]
    pub profit_statistics: ProfitStatistics,
}

/// Profit figures as decimal strings; absent or malformed values count as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfitStatistics {
    #[serde(default, deserialize_with = "decimal_string")]
    pub grid_profit: Option<String>,
    #[serde(default, deserialize_with = "decimal_string")]
    pub total_margin_used: Option<String>,
    #[serde(default, deserialize_with = "decimal_string")]
    pub capital_utilization: Option<String>,
    #[serde(default, deserialize_with = "decimal_string")]
    pub current_position_qty: Option<String>,
}

impl ProfitStatistics {
    pub fn grid_profit(&self) -> Decimal {
        parse_decimal_or_zero(self.grid_profit.as_deref())
    }

    pub fn total_margin_used(&self) -> Decimal {
        parse_decimal_or_zero(self.total_margin_used.as_deref())
    }

    pub fn capital_utilization(&self) -> Decimal {
        parse_decimal_or_zero(self.capital_utilization.as_deref())
    }

    pub fn current_position_qty(&self) -> Decimal {
        parse_decimal_or_zero(self.current_position_qty.as_deref())
    }
}

/// Accepts `"12.5"`, `12.5` or `null` and keeps the textual form.
fn decimal_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Envelope returned by the strategy list endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategiesResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<StrategiesData>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategiesData {
    #[serde(default)]
    pub strategies: Vec<GridStrategy>,
}

impl StrategiesResponse {
    pub fn ok(strategies: Vec<GridStrategy>) -> Self {
        Self {
            success: true,
            data: Some(StrategiesData { strategies }),
            message: None,
        }
    }
}

/// One-time authorization challenge. Consumed by the next signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    #[serde(default)]
    pub message: Option<String>,
    pub timestamp: i64,
    pub nonce: String,
}

impl Challenge {
    /// Text handed to the wallet; falls back to `"{timestamp}-{nonce}"`.
    pub fn signing_message(&self) -> String {
        match &self.message {
            Some(message) => message.clone(),
            None => format!("{}-{}", self.timestamp, self.nonce),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChallengeResponse {
    pub data: Challenge,
}

/// Signed request to stop a running strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopRequest {
    pub session_id: String,
    pub user_sig: String,
    pub timestamp: i64,
    pub nonce: String,
}

impl StopRequest {
    /// Timestamp and nonce are taken verbatim from the challenge that was signed.
    pub fn new(session_id: impl Into<String>, user_sig: String, challenge: &Challenge) -> Self {
        Self {
            session_id: session_id.into(),
            user_sig,
            timestamp: challenge.timestamp,
            nonce: challenge.nonce.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StopResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Historical performance of one strategy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfitReport {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub ticker: String,
    #[serde(default, deserialize_with = "decimal_string")]
    pub grid_profit: Option<String>,
    #[serde(default, deserialize_with = "decimal_string")]
    pub unrealized_pnl: Option<String>,
    #[serde(default, deserialize_with = "decimal_string")]
    pub total_fees: Option<String>,
    #[serde(default, deserialize_with = "decimal_string")]
    pub total_margin_used: Option<String>,
    #[serde(default)]
    pub filled_orders_count: u32,
    #[serde(default)]
    pub runtime_secs: u64,
}

impl ProfitReport {
    /// Grid profit plus unrealized PnL, net of fees.
    pub fn net_profit(&self) -> Decimal {
        parse_decimal_or_zero(self.grid_profit.as_deref())
            .saturating_add(parse_decimal_or_zero(self.unrealized_pnl.as_deref()))
            .saturating_sub(parse_decimal_or_zero(self.total_fees.as_deref()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfitReportResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<ProfitReport>,
    #[serde(default)]
    pub message: Option<String>,
}
