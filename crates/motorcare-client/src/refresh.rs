//! Single-flight credential refresh.

use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};
use motorcare_types::{ApiError, CredentialPair};

use crate::events::AuthEventBus;
use crate::store::TokenStore;
use crate::transport::{RequestDescriptor, Transport};

type SharedRefresh = Shared<BoxFuture<'static, Result<CredentialPair, ApiError>>>;

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshPayload {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Serializes concurrent refresh demand into exactly one network call.
///
/// Every caller that hits a 401 while a refresh is outstanding awaits the
/// same shared future, so a one-time-use refresh token is only ever spent
/// once and all waiters of a cycle observe the same outcome. The slot is
/// cleared inside the future before it resolves; a caller arriving after
/// that starts a fresh cycle.
pub struct RefreshCoordinator {
    refresh_path: String,
    transport: Arc<dyn Transport>,
    store: Arc<TokenStore>,
    events: Arc<AuthEventBus>,
    inflight: Arc<Mutex<Option<SharedRefresh>>>,
}

impl RefreshCoordinator {
    pub(crate) fn new(
        refresh_path: String,
        transport: Arc<dyn Transport>,
        store: Arc<TokenStore>,
        events: Arc<AuthEventBus>,
    ) -> Self {
        Self {
            refresh_path,
            transport,
            store,
            events,
            inflight: Arc::new(Mutex::new(None)),
        }
    }

    /// Obtain a fresh credential pair, joining the in-flight refresh if one
    /// exists.
    pub async fn refresh(&self) -> Result<CredentialPair, ApiError> {
        let fut = {
            let mut slot = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(existing) = slot.as_ref() {
                tracing::debug!("Joining in-flight token refresh");
                existing.clone()
            } else {
                let fut = Self::run(
                    self.refresh_path.clone(),
                    self.transport.clone(),
                    self.store.clone(),
                    self.events.clone(),
                    self.inflight.clone(),
                )
                .boxed()
                .shared();
                *slot = Some(fut.clone());
                fut
            }
        };
        fut.await
    }

    async fn run(
        refresh_path: String,
        transport: Arc<dyn Transport>,
        store: Arc<TokenStore>,
        events: Arc<AuthEventBus>,
        inflight: Arc<Mutex<Option<SharedRefresh>>>,
    ) -> Result<CredentialPair, ApiError> {
        let result = Self::exchange(&refresh_path, transport.as_ref(), store.as_ref()).await;

        // Free the slot before resolving waiters so the next 401 starts a
        // fresh cycle instead of joining this finished one.
        *inflight.lock().unwrap_or_else(|e| e.into_inner()) = None;

        match &result {
            Ok(pair) => {
                tracing::debug!("Token refresh succeeded");
                // The pair is already persisted at this point.
                events.emit_refreshed(pair);
            }
            Err(err) => {
                tracing::error!("Token refresh failed: {}", err);
                store.clear();
                if err.is_account_gone() {
                    events.emit_invalidated(err);
                }
            }
        }
        result
    }

    async fn exchange(
        refresh_path: &str,
        transport: &dyn Transport,
        store: &TokenStore,
    ) -> Result<CredentialPair, ApiError> {
        let Some(refresh_token) = store.refresh_token() else {
            // Nothing to exchange. This is also what stops automatic refresh
            // attempts after an invalidated session cleared the store.
            return Err(ApiError::new(
                401,
                "unauthorized",
                "No refresh token available",
            ));
        };

        let request = RequestDescriptor::post(refresh_path)
            .json(serde_json::json!({ "refreshToken": refresh_token }));

        // Unauthenticated on purpose: attaching the dead access token here
        // would just bounce with another 401.
        let raw = transport.execute(&request, None).await?;
        if !raw.is_success() {
            return Err(ApiError::from_body(raw.status, &raw.body));
        }

        let payload: RefreshPayload = serde_json::from_value(
            raw.body
                .get("data")
                .cloned()
                .unwrap_or(serde_json::Value::Null),
        )
        .map_err(|e| ApiError::unexpected(format!("Malformed refresh response: {}", e)))?;

        // The server may rotate the refresh token; when it does not, the old
        // one stays valid and is reused.
        let pair = CredentialPair::new(
            payload.access_token,
            payload.refresh_token.unwrap_or(refresh_token),
        );
        store
            .set(pair.clone())
            .map_err(|e| ApiError::unexpected(format!("Failed to persist refreshed tokens: {}", e)))?;
        Ok(pair)
    }
}
