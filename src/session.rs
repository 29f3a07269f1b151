//! Account/session provider
//!
//! The host application owns the [`SessionProvider`] and publishes the active
//! account on it; the sync layer only observes through [`SessionHandle`].

use tokio::sync::watch;
use tracing::info;

/// The authenticated account and its wallet address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub account_id: String,
    pub address: String,
}

impl Account {
    pub fn new(account_id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            address: address.into(),
        }
    }
}

/// Source of truth for the connected account
#[derive(Debug)]
pub struct SessionProvider {
    tx: watch::Sender<Option<Account>>,
}

impl SessionProvider {
    pub fn new(initial: Option<Account>) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Publish a sign-in, account switch or sign-out. Unchanged values are not re-announced.
    pub fn set_account(&self, account: Option<Account>) {
        self.tx.send_if_modified(|current| {
            if *current == account {
                return false;
            }
            info!(
                account = account.as_ref().map(|a| a.account_id.as_str()).unwrap_or("-"),
                "Active account changed"
            );
            *current = account;
            true
        });
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for SessionProvider {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Read side of a [`SessionProvider`]
#[derive(Debug, Clone)]
pub struct SessionHandle {
    rx: watch::Receiver<Option<Account>>,
}

impl SessionHandle {
    pub fn current(&self) -> Option<Account> {
        self.rx.borrow().clone()
    }

    /// Wait for the next account change. `None` once the provider is gone.
    pub async fn changed(&mut self) -> Option<Option<Account>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}
