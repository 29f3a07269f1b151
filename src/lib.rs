//! Grid Bot Sync
//!
//! Keeps a local view of an account's running grid-trading bots in sync with
//! the grid bot service, authorizes stop requests through a
//! challenge/sign/submit handshake, and validates new grid configurations
//! before they are submitted.

pub mod aggregate;
pub mod authorization;
pub mod backend;
pub mod bounds;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod notice;
pub mod service;
pub mod session;
pub mod signer;
pub mod types;

pub use aggregate::{AggregatedSnapshot, Aggregator, SymbolSummary};
pub use authorization::{AuthorizationFlow, MutationState, StopOutcome};
pub use backend::{GridBotBackend, GridBotClient};
pub use bounds::{Direction, GridConfig, GridDraft, GridType};
pub use cache::StrategyCache;
pub use config::Config;
pub use coordinator::{FetchCoordinator, FetchStatus, FetchTicket, RefreshOutcome};
pub use error::{BackendError, SignerError, SyncError};
pub use notice::{Notice, NoticeLevel, Notifier};
pub use service::GridSync;
pub use session::{Account, SessionHandle, SessionProvider};
pub use signer::{ChainType, HmacSigner, WalletSigner};
pub use types::*;
