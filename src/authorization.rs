//! Stop flow for a running strategy
//!
//! challenge -> sign -> submit, strictly in that order. A successful submit
//! removes the strategy from the cache at once; any failure publishes a notice
//! and forces a refetch so the view converges on the service's state.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::backend::GridBotBackend;
use crate::coordinator::FetchCoordinator;
use crate::error::{BackendError, SyncError};
use crate::notice::Notifier;
use crate::session::SessionHandle;
use crate::signer::WalletSigner;
use crate::types::StopRequest;

/// Local view of one stop mutation
///
/// ```text
/// Optimistic -> Confirmed
/// Optimistic -> Reconciling -> Synced
/// ```
///
/// A flow that fails before anything was committed enters at `Reconciling`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    Optimistic,
    Confirmed,
    Reconciling,
    Synced,
}

impl MutationState {
    pub fn can_transition_to(self, next: MutationState) -> bool {
        use MutationState::*;
        matches!(
            (self, next),
            (Optimistic, Confirmed) | (Optimistic, Reconciling) | (Reconciling, Synced)
        )
    }

    /// States a new mutation may start in
    fn is_entry(self) -> bool {
        matches!(self, MutationState::Optimistic | MutationState::Reconciling)
    }

    pub fn is_settled(self) -> bool {
        matches!(self, MutationState::Confirmed | MutationState::Synced)
    }
}

impl fmt::Display for MutationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MutationState::Optimistic => "optimistic",
            MutationState::Confirmed => "confirmed",
            MutationState::Reconciling => "reconciling",
            MutationState::Synced => "synced",
        };
        f.write_str(name)
    }
}

/// Result of a stop request
#[derive(Debug)]
pub enum StopOutcome {
    Stopped,
    /// A stop for the same session is already running
    Busy,
    /// Notice published and view reconciled
    Failed(SyncError),
}

impl StopOutcome {
    pub fn is_stopped(&self) -> bool {
        matches!(self, StopOutcome::Stopped)
    }
}

/// Holds a session in the stopping set until dropped.
struct StoppingGuard<'a> {
    stopping: &'a Mutex<HashSet<String>>,
    session_id: String,
}

impl Drop for StoppingGuard<'_> {
    fn drop(&mut self) {
        self.stopping
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.session_id);
    }
}

/// Challenge, sign, submit and reconcile for a strategy stop.
///
/// At most one stop per session runs at a time. A successful stop removes
/// the session from the cache right away; any outcome ends with a forced
/// refetch so the view converges on the service's list.
pub struct AuthorizationFlow {
    backend: Arc<dyn GridBotBackend>,
    signer: Arc<dyn WalletSigner>,
    coordinator: FetchCoordinator,
    session: SessionHandle,
    notifier: Notifier,
    stopping: Mutex<HashSet<String>>,
    mutations: Mutex<HashMap<String, MutationState>>,
}

impl AuthorizationFlow {
    pub fn new(
        backend: Arc<dyn GridBotBackend>,
        signer: Arc<dyn WalletSigner>,
        coordinator: FetchCoordinator,
        session: SessionHandle,
        notifier: Notifier,
    ) -> Self {
        Self {
            backend,
            signer,
            coordinator,
            session,
            notifier,
            stopping: Mutex::new(HashSet::new()),
            mutations: Mutex::new(HashMap::new()),
        }
    }

    pub async fn stop_strategy(&self, session_id: &str) -> StopOutcome {
        let Some(_guard) = self.begin(session_id) else {
            debug!(session_id, "Stop already in progress");
            return StopOutcome::Busy;
        };
        self.prune_settled(session_id);

        match self.authorize_and_submit(session_id).await {
            Ok(()) => {
                self.commit(session_id);
                info!(session_id, "Grid strategy stopped");
                self.notifier
                    .success("Strategy stopped", format!("Grid bot {session_id} was stopped"));
                StopOutcome::Stopped
            }
            Err(err) => {
                warn!(session_id, error = %err, "Stop failed, reconciling");
                self.transition(session_id, MutationState::Reconciling);
                self.notifier.error("Failed to stop strategy", err.to_string());
                self.reconcile().await;
                self.transition(session_id, MutationState::Synced);
                StopOutcome::Failed(err)
            }
        }
    }

    /// Whether a stop for `session_id` is currently running
    pub fn is_stopping(&self, session_id: &str) -> bool {
        self.lock_stopping().contains(session_id)
    }

    /// Where the last stop of this session got to, if any
    pub fn mutation_state(&self, session_id: &str) -> Option<MutationState> {
        self.lock_mutations().get(session_id).copied()
    }

    fn begin(&self, session_id: &str) -> Option<StoppingGuard<'_>> {
        if !self.lock_stopping().insert(session_id.to_string()) {
            return None;
        }
        Some(StoppingGuard {
            stopping: &self.stopping,
            session_id: session_id.to_string(),
        })
    }

    async fn authorize_and_submit(&self, session_id: &str) -> Result<(), SyncError> {
        let account = self.session.current().ok_or(SyncError::NotAuthenticated)?;
        if !self.coordinator.cache().contains(session_id) {
            return Err(SyncError::UnknownStrategy(session_id.to_string()));
        }

        debug!(session_id, "Requesting stop challenge");
        let challenge = self
            .backend
            .get_challenge()
            .await
            .map_err(SyncError::Challenge)?;

        let chain = self.signer.detect_chain_type(&account.address);
        debug!(session_id, %chain, "Signing stop challenge");
        let signature = self
            .signer
            .sign_message(&challenge.signing_message(), chain)
            .await?;

        let request = StopRequest::new(session_id, signature, &challenge);
        debug!(session_id, nonce = %request.nonce, "Submitting stop request");
        let response = self
            .backend
            .stop_grid(&request)
            .await
            .map_err(SyncError::Submit)?;
        if !response.success {
            let reason = response
                .message
                .unwrap_or_else(|| "service reported failure".to_string());
            return Err(SyncError::Submit(BackendError::Rejected(reason)));
        }
        Ok(())
    }

    fn commit(&self, session_id: &str) {
        self.transition(session_id, MutationState::Optimistic);
        // A list fetched before the stop would bring the session back
        self.coordinator.supersede_pending();
        let cache = self.coordinator.cache();
        cache.remove(session_id);
        // Keep the TTL window from refetching over the removal
        cache.touch(Instant::now());
        self.transition(session_id, MutationState::Confirmed);
    }

    async fn reconcile(&self) {
        if let Some(ticket) = self.coordinator.refresh(true).ticket() {
            self.coordinator.settled(ticket).await;
        }
    }

    fn transition(&self, session_id: &str, next: MutationState) {
        let mut mutations = self.lock_mutations();
        let allowed = match mutations.get(session_id) {
            None => next.is_entry(),
            Some(current) => {
                current.can_transition_to(next) || (current.is_settled() && next.is_entry())
            }
        };
        if allowed {
            debug!(session_id, state = %next, "Mutation state");
            mutations.insert(session_id.to_string(), next);
        } else {
            warn!(session_id, to = %next, "Ignoring invalid mutation transition");
        }
    }

    /// Forget settled mutations of sessions the current view no longer lists.
    fn prune_settled(&self, keep: &str) {
        let listed: HashSet<String> = self
            .coordinator
            .cache()
            .get()
            .into_iter()
            .map(|strategy| strategy.session_id)
            .collect();
        let mut mutations = self.lock_mutations();
        let before = mutations.len();
        mutations.retain(|id, state| !state.is_settled() || id == keep || listed.contains(id));
        if mutations.len() < before {
            debug!(pruned = before - mutations.len(), "Pruned settled mutations");
        }
    }

    fn lock_stopping(&self) -> MutexGuard<'_, HashSet<String>> {
        self.stopping.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_mutations(&self) -> MutexGuard<'_, HashMap<String, MutationState>> {
        self.mutations.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
