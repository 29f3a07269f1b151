//! User-facing notices
//!
//! Failures inside the sync layer never propagate past a flow boundary; they
//! are published here for whatever front end is listening.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Toast-style message for the user
#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub detail: String,
    pub at: DateTime<Utc>,
}

/// Broadcasts notices to every subscriber. Sending with no subscriber is a no-op.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    pub fn success(&self, title: impl Into<String>, detail: impl Into<String>) {
        self.publish(NoticeLevel::Success, title.into(), detail.into());
    }

    pub fn error(&self, title: impl Into<String>, detail: impl Into<String>) {
        self.publish(NoticeLevel::Error, title.into(), detail.into());
    }

    fn publish(&self, level: NoticeLevel, title: String, detail: String) {
        // No listeners is fine
        let _ = self.tx.send(Notice {
            level,
            title,
            detail,
            at: Utc::now(),
        });
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(64)
    }
}
