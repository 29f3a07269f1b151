//! Fetch coordination for the strategy cache
//!
//! Decides whether and when a refresh reaches the grid bot service. Guards,
//! in order:
//!
//! 1. no account: the cache is dropped and nothing is fetched
//! 2. a fetch already on the wire absorbs unforced requests (single-flight)
//! 3. an account switch resets the cache before freshness is judged
//! 4. a fresh cache absorbs unforced requests (TTL)
//! 5. otherwise the fetch is debounced: any pending timer is replaced
//!
//! Every scheduled fetch carries a generation number. Only the task whose
//! generation still owns the slot may write to the cache, so a superseded
//! fetch can never overwrite newer data.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::backend::GridBotBackend;
use crate::cache::StrategyCache;
use crate::error::{BackendError, SyncError};
use crate::session::SessionHandle;
use crate::types::{GridStrategy, StrategiesResponse};

/// Handle for one scheduled fetch, used to wait for it with [`FetchCoordinator::settled`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
}

impl FetchTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// What a refresh request resulted in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// No account connected; nothing fetched
    NoAccount,
    /// A fetch for this account is already running
    InFlight,
    /// Data younger than the TTL; no request sent
    CacheHit,
    /// Page hidden; visibility-driven request dropped
    Suppressed,
    /// Coordinator torn down
    Closed,
    /// A debounced fetch was (re)armed
    Scheduled(FetchTicket),
}

impl RefreshOutcome {
    /// Ticket to pass to `settled`, if a fetch was scheduled
    pub fn ticket(&self) -> Option<FetchTicket> {
        match self {
            RefreshOutcome::Scheduled(ticket) => Some(*ticket),
            _ => None,
        }
    }
}

/// User-facing state of the last fetch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchStatus {
    /// A fetch is pending or running
    pub loading: bool,
    /// Message from the last failed fetch, cleared on success
    pub error: Option<String>,
    pub last_success: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchPhase {
    Debouncing,
    Fetching,
}

#[derive(Debug)]
struct FetchTask {
    generation: u64,
    phase: FetchPhase,
    handle: JoinHandle<()>,
}

#[derive(Debug, Default)]
struct FetchState {
    generation: u64,
    task: Option<FetchTask>,
    status: FetchStatus,
    closed: bool,
}

struct Inner {
    backend: Arc<dyn GridBotBackend>,
    cache: Arc<StrategyCache>,
    session: SessionHandle,
    debounce: Duration,
    visible: AtomicBool,
    state: Mutex<FetchState>,
    /// Highest generation that has finished, failed or been cancelled
    settled: watch::Sender<u64>,
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, FetchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mark_settled(&self, generation: u64) {
        self.settled.send_if_modified(|done| {
            if generation > *done {
                *done = generation;
                true
            } else {
                false
            }
        });
    }

    /// Abort the pending or in-flight task without announcing it as settled;
    /// used when a newer task takes its place.
    fn abort_task(&self, state: &mut FetchState) {
        if let Some(task) = state.task.take() {
            task.handle.abort();
            state.status.loading = false;
            debug!(
                generation = task.generation,
                phase = ?task.phase,
                "Superseded strategy fetch"
            );
        }
    }

    /// Abort with no replacement. Waiters are released.
    fn cancel_task(&self, state: &mut FetchState) {
        // Bump so a fetch already past its last await cannot claim the slot
        state.generation += 1;
        self.abort_task(state);
        self.mark_settled(state.generation);
    }

    async fn run_fetch(self: Arc<Self>, generation: u64, account_id: String) {
        {
            let mut state = self.lock_state();
            match state.task.as_mut() {
                Some(task) if task.generation == generation => task.phase = FetchPhase::Fetching,
                _ => return,
            }
            state.status.loading = true;
        }

        debug!(account = %account_id, generation, "Fetching grid strategies");
        let result = self
            .backend
            .get_user_grid_strategies(&account_id)
            .await
            .map_err(SyncError::Fetch)
            .and_then(running_strategies);

        {
            let mut state = self.lock_state();
            let owns_slot = state
                .task
                .as_ref()
                .is_some_and(|task| task.generation == generation);
            if !owns_slot || state.closed {
                debug!(generation, "Discarding result of superseded fetch");
                return;
            }
            state.task = None;
            state.status.loading = false;

            if self.cache.account_id().as_deref() != Some(account_id.as_str()) {
                debug!(account = %account_id, "Account changed during fetch, discarding result");
            } else {
                match result {
                    Ok(strategies) => {
                        info!(
                            account = %account_id,
                            running = strategies.len(),
                            "Strategy cache refreshed"
                        );
                        let now = Instant::now();
                        self.cache.store(&account_id, strategies, now);
                        state.status.error = None;
                        state.status.last_success = Some(now);
                    }
                    Err(err) => {
                        warn!(account = %account_id, error = %err, "Strategy fetch failed");
                        self.cache.clear();
                        state.status.error = Some(err.to_string());
                    }
                }
            }
        }

        self.mark_settled(generation);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = state.task.take() {
            task.handle.abort();
        }
    }
}

/// Keep only strategies both sides agree are running.
fn running_strategies(response: StrategiesResponse) -> Result<Vec<GridStrategy>, SyncError> {
    if !response.success {
        let reason = response
            .message
            .unwrap_or_else(|| "service reported failure".to_string());
        return Err(SyncError::Fetch(BackendError::Rejected(reason)));
    }
    Ok(response
        .data
        .map(|data| data.strategies)
        .unwrap_or_default()
        .into_iter()
        .filter(|strategy| strategy.is_active())
        .collect())
}

/// Decides when the strategy list is fetched and who may write the result.
///
/// One task at a time, owned by a generation number. Debounced requests
/// replace each other; an account switch or a local mutation cancels the
/// task, and a cancelled task never writes to the cache. Cheap to clone.
#[derive(Clone)]
pub struct FetchCoordinator {
    inner: Arc<Inner>,
}

impl FetchCoordinator {
    /// Build a coordinator. The page starts visible.
    pub fn new(
        backend: Arc<dyn GridBotBackend>,
        cache: Arc<StrategyCache>,
        session: SessionHandle,
        debounce: Duration,
    ) -> Self {
        let (settled, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                backend,
                cache,
                session,
                debounce,
                visible: AtomicBool::new(true),
                state: Mutex::new(FetchState::default()),
                settled,
            }),
        }
    }

    pub fn cache(&self) -> &Arc<StrategyCache> {
        &self.inner.cache
    }

    /// Request a cache refill. Must be called from within a tokio runtime.
    pub fn refresh(&self, force: bool) -> RefreshOutcome {
        let inner = &self.inner;
        let mut state = inner.lock_state();
        if state.closed {
            return RefreshOutcome::Closed;
        }

        let Some(account) = inner.session.current() else {
            inner.cancel_task(&mut state);
            inner.cache.forget();
            return RefreshOutcome::NoAccount;
        };

        let fetching = state
            .task
            .as_ref()
            .is_some_and(|task| task.phase == FetchPhase::Fetching);
        if fetching && !force {
            debug!("Strategy fetch already in flight");
            return RefreshOutcome::InFlight;
        }

        if inner.cache.account_id().as_deref() != Some(account.account_id.as_str()) {
            inner.cache.reset_for(&account.account_id);
        }

        if !force && inner.cache.is_fresh(Instant::now()) {
            debug!("Strategy cache fresh, skipping fetch");
            return RefreshOutcome::CacheHit;
        }

        inner.abort_task(&mut state);
        state.generation += 1;
        let generation = state.generation;

        let weak = Arc::downgrade(inner);
        let delay = inner.debounce;
        let account_id = account.account_id;
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.run_fetch(generation, account_id).await;
            }
        });

        state.task = Some(FetchTask {
            generation,
            phase: FetchPhase::Debouncing,
            handle,
        });
        debug!(generation, force, "Scheduled strategy fetch");
        RefreshOutcome::Scheduled(FetchTicket { generation })
    }

    /// React to the session provider announcing a different account (or none).
    ///
    /// Anything scheduled for the previous account is cancelled and the cache
    /// is emptied before the new fetch is scheduled.
    pub fn on_account_changed(&self) -> RefreshOutcome {
        {
            let inner = &self.inner;
            let mut state = inner.lock_state();
            if state.closed {
                return RefreshOutcome::Closed;
            }
            inner.cancel_task(&mut state);
            match inner.session.current() {
                Some(account) => inner.cache.reset_for(&account.account_id),
                None => inner.cache.forget(),
            }
        }
        self.refresh(false)
    }

    /// Cancel any pending or in-flight fetch so it cannot write a list read
    /// before a local mutation. Waiters on its ticket are released.
    pub fn supersede_pending(&self) {
        let mut state = self.inner.lock_state();
        if state.task.is_some() {
            debug!(generation = state.generation, "Local mutation supersedes pending fetch");
            self.inner.cancel_task(&mut state);
        }
    }

    /// Record page visibility. Becoming visible requests an unforced refresh.
    pub fn set_visible(&self, visible: bool) -> Option<RefreshOutcome> {
        let was_visible = self.inner.visible.swap(visible, Ordering::SeqCst);
        if visible && !was_visible {
            debug!("Page became visible");
            return Some(self.refresh(false));
        }
        None
    }

    /// Last visibility reported through `set_visible`
    pub fn is_visible(&self) -> bool {
        self.inner.visible.load(Ordering::SeqCst)
    }

    /// Unforced refresh on behalf of a visibility-driven trigger (focus, polling).
    pub fn refresh_on_visibility(&self) -> RefreshOutcome {
        if !self.is_visible() {
            return RefreshOutcome::Suppressed;
        }
        self.refresh(false)
    }

    /// Wait until the ticket's fetch, or anything that replaced it, has finished.
    pub async fn settled(&self, ticket: FetchTicket) {
        let mut rx = self.inner.settled.subscribe();
        let _ = rx.wait_for(|done| *done >= ticket.generation).await;
    }

    /// Loading flag and last error, for display
    pub fn status(&self) -> FetchStatus {
        self.inner.lock_state().status.clone()
    }

    /// Cancel any pending timer or fetch; later refreshes are refused.
    pub fn shutdown(&self) {
        let mut state = self.inner.lock_state();
        if state.closed {
            return;
        }
        state.closed = true;
        self.inner.cancel_task(&mut state);
        debug!("Fetch coordinator shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendResult;
    use crate::session::{Account, SessionProvider};
    use crate::types::{
        Challenge, ProfitReportResponse, StopRequest, StopResponse, StrategyStatus,
    };
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    const TTL: Duration = Duration::from_secs(30);
    const DEBOUNCE: Duration = Duration::from_millis(500);

    fn strategy(id: &str, client_running: bool, server_running: bool) -> GridStrategy {
        GridStrategy {
            session_id: id.to_string(),
            ticker: "BTC".to_string(),
            is_running: client_running,
            status: StrategyStatus {
                is_running: server_running,
                ..Default::default()
            },
        }
    }

    #[derive(Default)]
    struct MockBackend {
        calls: AtomicUsize,
        accounts: Mutex<Vec<String>>,
        scripted: Mutex<VecDeque<(Duration, BackendResult<StrategiesResponse>)>>,
        fallback: Mutex<Vec<GridStrategy>>,
    }

    impl MockBackend {
        fn with_strategies(strategies: Vec<GridStrategy>) -> Self {
            Self {
                fallback: Mutex::new(strategies),
                ..Default::default()
            }
        }

        fn script(&self, delay: Duration, result: BackendResult<StrategiesResponse>) {
            self.scripted.lock().unwrap().push_back((delay, result));
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GridBotBackend for MockBackend {
        async fn get_user_grid_strategies(
            &self,
            account_id: &str,
        ) -> BackendResult<StrategiesResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.accounts.lock().unwrap().push(account_id.to_string());
            let scripted = self.scripted.lock().unwrap().pop_front();
            match scripted {
                Some((delay, result)) => {
                    sleep(delay).await;
                    result
                }
                None => Ok(StrategiesResponse::ok(
                    self.fallback.lock().unwrap().clone(),
                )),
            }
        }

        async fn get_challenge(&self) -> BackendResult<Challenge> {
            Err(BackendError::Network("not scripted".to_string()))
        }

        async fn stop_grid(&self, _request: &StopRequest) -> BackendResult<StopResponse> {
            Err(BackendError::Network("not scripted".to_string()))
        }

        async fn get_profit_report(&self, _session_id: &str) -> BackendResult<ProfitReportResponse> {
            Err(BackendError::Network("not scripted".to_string()))
        }
    }

    fn setup(backend: MockBackend) -> (FetchCoordinator, Arc<MockBackend>, SessionProvider) {
        let backend = Arc::new(backend);
        let provider = SessionProvider::new(Some(Account::new("acct-1", "0xabc")));
        let cache = Arc::new(StrategyCache::new(TTL, DEBOUNCE));
        let coordinator =
            FetchCoordinator::new(backend.clone(), cache, provider.handle(), DEBOUNCE);
        (coordinator, backend, provider)
    }

    async fn refresh_and_wait(coordinator: &FetchCoordinator, force: bool) {
        let ticket = coordinator.refresh(force).ticket().expect("fetch scheduled");
        coordinator.settled(ticket).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_keeps_only_running_strategies() {
        let (coordinator, backend, _provider) = setup(MockBackend::with_strategies(vec![
            strategy("a", true, true),
            strategy("b", true, false),
            strategy("c", false, true),
            strategy("d", true, true),
        ]));

        refresh_and_wait(&coordinator, false).await;

        let ids: Vec<_> = coordinator
            .cache()
            .get()
            .into_iter()
            .map(|s| s.session_id)
            .collect();
        assert_eq!(ids, vec!["a", "d"]);
        assert_eq!(backend.calls(), 1);
        assert!(coordinator.status().last_success.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_requests_are_debounced() {
        let (coordinator, backend, _provider) =
            setup(MockBackend::with_strategies(vec![strategy("a", true, true)]));

        coordinator.refresh(false);
        sleep(Duration::from_millis(200)).await;
        coordinator.refresh(false);
        sleep(Duration::from_millis(200)).await;
        let ticket = coordinator.refresh(false).ticket().unwrap();

        // Not fired yet: each request restarted the timer
        sleep(Duration::from_millis(400)).await;
        assert_eq!(backend.calls(), 0);

        coordinator.settled(ticket).await;
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_absorbs_unforced_refresh() {
        let (coordinator, backend, _provider) =
            setup(MockBackend::with_strategies(vec![strategy("a", true, true)]));

        refresh_and_wait(&coordinator, false).await;
        assert_eq!(coordinator.refresh(false), RefreshOutcome::CacheHit);

        tokio::time::advance(Duration::from_secs(29)).await;
        assert_eq!(coordinator.refresh(false), RefreshOutcome::CacheHit);
        assert_eq!(backend.calls(), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        refresh_and_wait(&coordinator, false).await;
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_bypasses_ttl() {
        let (coordinator, backend, _provider) =
            setup(MockBackend::with_strategies(vec![strategy("a", true, true)]));

        refresh_and_wait(&coordinator, false).await;
        refresh_and_wait(&coordinator, true).await;
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_flight_and_superseded_write() {
        let backend = MockBackend::default();
        backend.script(
            Duration::from_secs(5),
            Ok(StrategiesResponse::ok(vec![strategy("old", true, true)])),
        );
        backend.script(
            Duration::from_millis(100),
            Ok(StrategiesResponse::ok(vec![strategy("new", true, true)])),
        );
        let (coordinator, backend, _provider) = setup(backend);

        coordinator.refresh(false);
        // Past the debounce, the first fetch is now on the wire
        sleep(Duration::from_millis(600)).await;
        assert_eq!(backend.calls(), 1);
        assert_eq!(coordinator.refresh(false), RefreshOutcome::InFlight);
        assert!(coordinator.status().loading);

        refresh_and_wait(&coordinator, true).await;
        assert_eq!(backend.calls(), 2);

        // Let the first fetch's delay elapse; it must not overwrite
        sleep(Duration::from_secs(10)).await;
        let ids: Vec<_> = coordinator
            .cache()
            .get()
            .into_iter()
            .map(|s| s.session_id)
            .collect();
        assert_eq!(ids, vec!["new"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_account_switch_resets_before_fetch() {
        let (coordinator, backend, provider) =
            setup(MockBackend::with_strategies(vec![strategy("a", true, true)]));

        refresh_and_wait(&coordinator, false).await;
        assert_eq!(coordinator.cache().get().len(), 1);

        provider.set_account(Some(Account::new("acct-2", "0xdef")));
        let outcome = coordinator.on_account_changed();

        // Cleared and stale before the new fetch lands
        assert!(coordinator.cache().get().is_empty());
        let meta = coordinator.cache().meta();
        assert_eq!(meta.account_id.as_deref(), Some("acct-2"));
        assert_eq!(meta.last_fetch_time, None);

        coordinator.settled(outcome.ticket().unwrap()).await;
        assert_eq!(
            *backend.accounts.lock().unwrap(),
            vec!["acct-1".to_string(), "acct-2".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_account_switch_detected_by_plain_refresh() {
        let (coordinator, backend, provider) =
            setup(MockBackend::with_strategies(vec![strategy("a", true, true)]));

        refresh_and_wait(&coordinator, false).await;
        provider.set_account(Some(Account::new("acct-2", "0xdef")));

        // Within the TTL, but the account differs, so this is not a cache hit
        let outcome = coordinator.refresh(false);
        assert!(matches!(outcome, RefreshOutcome::Scheduled(_)));
        assert!(coordinator.cache().get().is_empty());

        coordinator.settled(outcome.ticket().unwrap()).await;
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_account_clears_without_fetch() {
        let (coordinator, backend, provider) =
            setup(MockBackend::with_strategies(vec![strategy("a", true, true)]));
        refresh_and_wait(&coordinator, false).await;

        provider.set_account(None);
        assert_eq!(coordinator.refresh(true), RefreshOutcome::NoAccount);
        assert!(coordinator.cache().get().is_empty());
        assert_eq!(coordinator.cache().account_id(), None);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_clears_and_does_not_retry() {
        let backend = MockBackend::with_strategies(vec![strategy("a", true, true)]);
        let (coordinator, backend, _provider) = setup(backend);
        refresh_and_wait(&coordinator, false).await;
        assert_eq!(coordinator.cache().get().len(), 1);

        backend.script(
            Duration::ZERO,
            Err(BackendError::Api {
                status: 500,
                body: "boom".to_string(),
            }),
        );
        refresh_and_wait(&coordinator, true).await;

        assert!(coordinator.cache().get().is_empty());
        let status = coordinator.status();
        assert!(!status.loading);
        assert!(status.error.unwrap().contains("boom"));

        sleep(Duration::from_secs(120)).await;
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_envelope_is_a_failure() {
        let backend = MockBackend::default();
        backend.script(
            Duration::ZERO,
            Ok(StrategiesResponse {
                success: false,
                data: None,
                message: Some("account locked".to_string()),
            }),
        );
        let (coordinator, _backend, _provider) = setup(backend);

        refresh_and_wait(&coordinator, false).await;
        assert!(coordinator
            .status()
            .error
            .unwrap()
            .contains("account locked"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_visibility_gates_unforced_requests() {
        let (coordinator, backend, _provider) =
            setup(MockBackend::with_strategies(vec![strategy("a", true, true)]));

        assert_eq!(coordinator.set_visible(false), None);
        assert_eq!(
            coordinator.refresh_on_visibility(),
            RefreshOutcome::Suppressed
        );
        assert_eq!(backend.calls(), 0);

        // Forced requests ignore visibility
        refresh_and_wait(&coordinator, true).await;
        assert_eq!(backend.calls(), 1);

        coordinator.cache().invalidate();
        let outcome = coordinator.set_visible(true).unwrap();
        coordinator.settled(outcome.ticket().unwrap()).await;
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending_timer() {
        let (coordinator, backend, _provider) =
            setup(MockBackend::with_strategies(vec![strategy("a", true, true)]));

        let ticket = coordinator.refresh(false).ticket().unwrap();
        coordinator.shutdown();
        coordinator.settled(ticket).await;

        sleep(Duration::from_secs(5)).await;
        assert_eq!(backend.calls(), 0);
        assert_eq!(coordinator.refresh(true), RefreshOutcome::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_coordinator_cancels_pending_timer() {
        let (coordinator, backend, _provider) =
            setup(MockBackend::with_strategies(vec![strategy("a", true, true)]));

        coordinator.refresh(false);
        drop(coordinator);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(backend.calls(), 0);
    }
}
