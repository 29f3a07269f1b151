//! Wiring for the sync layer
//!
//! [`GridSync`] owns one cache, its coordinator and the stop flow, and runs two
//! background tasks once started: a session watcher that re-keys the cache on
//! account changes, and an optional visibility-gated poller.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::aggregate::AggregatedSnapshot;
use crate::authorization::{AuthorizationFlow, MutationState, StopOutcome};
use crate::backend::GridBotBackend;
use crate::cache::StrategyCache;
use crate::config::SyncConfig;
use crate::coordinator::{FetchCoordinator, FetchStatus, FetchTicket, RefreshOutcome};
use crate::error::{BackendError, SyncError};
use crate::notice::{Notice, Notifier};
use crate::session::SessionHandle;
use crate::signer::WalletSigner;
use crate::types::{GridStrategy, ProfitReport};

/// Grid bot synchronization for one connected wallet.
///
/// Owns the cache, the fetch coordinator and the stop flow, plus the
/// background tasks that follow account changes and poll while visible.
/// Dropping it aborts those tasks.
pub struct GridSync {
    backend: Arc<dyn GridBotBackend>,
    cache: Arc<StrategyCache>,
    coordinator: FetchCoordinator,
    flow: AuthorizationFlow,
    notifier: Notifier,
    session: SessionHandle,
    poll_interval: Option<Duration>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl GridSync {
    pub fn new(
        backend: Arc<dyn GridBotBackend>,
        signer: Arc<dyn WalletSigner>,
        session: SessionHandle,
        config: &SyncConfig,
    ) -> Self {
        let cache = Arc::new(StrategyCache::new(config.ttl(), config.debounce()));
        let coordinator = FetchCoordinator::new(
            backend.clone(),
            cache.clone(),
            session.clone(),
            config.debounce(),
        );
        let notifier = Notifier::new(config.notice_capacity);
        let flow = AuthorizationFlow::new(
            backend.clone(),
            signer,
            coordinator.clone(),
            session.clone(),
            notifier.clone(),
        );

        Self {
            backend,
            cache,
            coordinator,
            flow,
            notifier,
            session,
            poll_interval: config.poll_interval(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the background tasks and request the initial fetch.
    pub fn start(&self) -> RefreshOutcome {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if tasks.is_empty() {
            tasks.push(self.spawn_session_watcher());
            if let Some(period) = self.poll_interval {
                info!(every_secs = period.as_secs(), "Polling while visible");
                tasks.push(self.spawn_poller(period));
            }
        }
        drop(tasks);
        self.coordinator.refresh(false)
    }

    fn spawn_session_watcher(&self) -> JoinHandle<()> {
        let mut session = self.session.clone();
        let coordinator = self.coordinator.clone();
        tokio::spawn(async move {
            while let Some(account) = session.changed().await {
                let account_id = account.as_ref().map(|a| a.account_id.as_str());
                info!(account = account_id.unwrap_or("none"), "Active account changed");
                coordinator.on_account_changed();
            }
            debug!("Session provider closed");
        })
    }

    fn spawn_poller(&self, period: Duration) -> JoinHandle<()> {
        let coordinator = self.coordinator.clone();
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let outcome = coordinator.refresh_on_visibility();
                debug!(?outcome, "Poll tick");
            }
        })
    }

    pub fn coordinator(&self) -> &FetchCoordinator {
        &self.coordinator
    }

    pub fn cache(&self) -> &Arc<StrategyCache> {
        &self.cache
    }

    /// Totals and per-symbol summaries over the cached strategies
    pub fn snapshot(&self) -> AggregatedSnapshot {
        self.cache.snapshot()
    }

    pub fn strategies(&self) -> Vec<GridStrategy> {
        self.cache.get()
    }

    /// Bumped on every cache change
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.cache.subscribe()
    }

    /// See [`FetchCoordinator::refresh`]
    pub fn refresh(&self, force: bool) -> RefreshOutcome {
        self.coordinator.refresh(force)
    }

    pub async fn settled(&self, ticket: FetchTicket) {
        self.coordinator.settled(ticket).await;
    }

    pub fn set_visible(&self, visible: bool) -> Option<RefreshOutcome> {
        self.coordinator.set_visible(visible)
    }

    pub fn status(&self) -> FetchStatus {
        self.coordinator.status()
    }

    /// Stop a running strategy with a wallet signature. Never returns an error;
    /// failures are published as notices and reported in the outcome.
    pub async fn stop_strategy(&self, session_id: &str) -> StopOutcome {
        self.flow.stop_strategy(session_id).await
    }

    pub fn is_stopping(&self, session_id: &str) -> bool {
        self.flow.is_stopping(session_id)
    }

    pub fn mutation_state(&self, session_id: &str) -> Option<MutationState> {
        self.flow.mutation_state(session_id)
    }

    /// Subscribe to success and error notices
    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notifier.subscribe()
    }

    /// Performance report for one strategy, running or not.
    pub async fn profit_report(&self, session_id: &str) -> Result<ProfitReport, SyncError> {
        let result = self
            .backend
            .get_profit_report(session_id)
            .await
            .and_then(|response| {
                if !response.success {
                    let reason = response
                        .message
                        .unwrap_or_else(|| "service reported failure".to_string());
                    return Err(BackendError::Rejected(reason));
                }
                response
                    .data
                    .ok_or_else(|| BackendError::Parse("profit report has no data".to_string()))
            })
            .map_err(SyncError::Fetch);

        if let Err(err) = &result {
            warn!(session_id, error = %err, "Profit report unavailable");
            self.notifier
                .error("Failed to load profit report", err.to_string());
        }
        result
    }

    /// Stop background tasks and cancel any pending fetch.
    pub fn shutdown(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        for task in tasks.drain(..) {
            task.abort();
        }
        self.coordinator.shutdown();
    }
}

impl Drop for GridSync {
    fn drop(&mut self) {
        self.shutdown();
    }
}
