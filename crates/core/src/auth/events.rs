//! Typed auth notifications
//!
//! Subscribers attach with [`AuthEvents::subscribe`] and detach by dropping
//! the receiver. Sending never blocks and never fails when nobody listens.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// Signed-in state flipped.
    ConnectionChanged { connected: bool },
    /// Credentials were replaced or cleared. Carries only the new expiry.
    TokensChanged { expires_at: Option<DateTime<Utc>> },
}

#[derive(Debug, Clone)]
pub struct AuthEvents {
    sender: broadcast::Sender<AuthEvent>,
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthEvents {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn emit(&self, event: AuthEvent) {
        // No receivers is fine.
        let _ = self.sender.send(event);
    }

    pub(crate) fn connected(&self, connected: bool) {
        self.emit(AuthEvent::ConnectionChanged { connected });
    }

    pub(crate) fn tokens_changed(&self, expires_at: Option<DateTime<Utc>>) {
        self.emit(AuthEvent::TokensChanged { expires_at });
    }
}
