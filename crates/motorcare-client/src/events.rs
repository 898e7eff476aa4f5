//! Auth lifecycle notifications.
//!
//! Multiple independent listeners (cache invalidation, forced navigation)
//! can subscribe; registration is additive, never last-wins.

use std::sync::{Arc, RwLock};

use motorcare_types::{ApiError, CredentialPair};

/// Observer for credential lifecycle events. Methods default to no-ops so
/// listeners only override what they care about.
pub trait AuthEvents: Send + Sync {
    /// A token refresh completed; the new pair is already persisted.
    fn credentials_refreshed(&self, _credentials: &CredentialPair) {}

    /// The session cannot be recovered; the application should force a
    /// logout.
    fn session_invalidated(&self, _reason: &ApiError) {}
}

/// Fan-out registry for [`AuthEvents`] listeners.
#[derive(Default)]
pub struct AuthEventBus {
    listeners: RwLock<Vec<Arc<dyn AuthEvents>>>,
}

impl AuthEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn AuthEvents>) {
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(listener);
    }

    pub(crate) fn emit_refreshed(&self, credentials: &CredentialPair) {
        for listener in self.listeners.read().unwrap_or_else(|e| e.into_inner()).iter() {
            listener.credentials_refreshed(credentials);
        }
    }

    pub(crate) fn emit_invalidated(&self, reason: &ApiError) {
        tracing::error!("Session invalidated: {}", reason);
        for listener in self.listeners.read().unwrap_or_else(|e| e.into_inner()).iter() {
            listener.session_invalidated(reason);
        }
    }
}
