//! The API client: transport, token lifecycle, and 401 recovery.

use std::sync::Arc;

use motorcare_types::{ApiError, ApiResponse, CredentialPair, StorageError};
use serde::de::DeserializeOwned;

use crate::config::ClientConfig;
use crate::events::AuthEventBus;
use crate::refresh::RefreshCoordinator;
use crate::store::{TokenStorage, TokenStore};
use crate::transport::{HttpTransport, RawResponse, RequestDescriptor, Transport};

/// Explicitly constructed client instance owning its token store, refresh
/// coordinator, and transport. Every verb routes through [`ApiClient::send`].
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    store: Arc<TokenStore>,
    events: Arc<AuthEventBus>,
    refresh: RefreshCoordinator,
}

impl ApiClient {
    /// Client over a real HTTP transport.
    pub fn new(config: ClientConfig, storage: Box<dyn TokenStorage>) -> Result<Arc<Self>, ApiError> {
        let transport = Arc::new(HttpTransport::new(config.clone())?);
        Ok(Self::with_transport(config, transport, storage))
    }

    /// Client over any transport. This is the seam tests use to substitute a
    /// fake network.
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        storage: Box<dyn TokenStorage>,
    ) -> Arc<Self> {
        let store = Arc::new(TokenStore::new(storage));
        let events = Arc::new(AuthEventBus::new());
        let refresh = RefreshCoordinator::new(
            config.refresh_path,
            transport.clone(),
            store.clone(),
            events.clone(),
        );
        Arc::new(Self {
            transport,
            store,
            events,
            refresh,
        })
    }

    /// Store a freshly authenticated credential pair (login/signup).
    pub fn set_auth_tokens(&self, pair: CredentialPair) -> Result<(), StorageError> {
        self.store.set(pair)
    }

    /// Drop the credential pair (logout).
    pub fn clear_auth_tokens(&self) {
        self.store.clear()
    }

    pub fn access_token(&self) -> Option<String> {
        self.store.access_token()
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.is_authenticated()
    }

    /// Subscription point for credential lifecycle listeners.
    pub fn events(&self) -> &Arc<AuthEventBus> {
        &self.events
    }

    pub fn token_store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    /// Perform a request and normalize the outcome.
    ///
    /// Expected failures (4xx/5xx, timeout, offline, malformed body) all
    /// resolve to an [`ApiError`]; nothing in this path panics or leaks a
    /// transport error type.
    pub async fn send<T: DeserializeOwned>(
        &self,
        request: RequestDescriptor,
    ) -> Result<ApiResponse<T>, ApiError> {
        let raw = self.dispatch(&request).await?;
        if raw.is_success() {
            serde_json::from_value(raw.body)
                .map_err(|e| ApiError::unexpected(format!("Malformed response body: {}", e)))
        } else {
            Err(ApiError::from_body(raw.status, &raw.body))
        }
    }

    /// Execute with the current access token; on 401, refresh once (the
    /// coordinator collapses concurrent demand into a single network call)
    /// and resend the same descriptor with the new token. A request is never
    /// retried more than once, and a 401 on the retry is surfaced without
    /// another refresh attempt.
    async fn dispatch(&self, request: &RequestDescriptor) -> Result<RawResponse, ApiError> {
        let token = self.store.access_token();
        let raw = self.transport.execute(request, token.as_deref()).await?;
        if raw.status != 401 {
            return Ok(raw);
        }

        tracing::debug!("401 on {} {}, refreshing token", request.method, request.path);
        let pair = self.refresh.refresh().await?;

        let retried = self
            .transport
            .execute(request, Some(&pair.access_token))
            .await?;
        if retried.status == 401 {
            tracing::error!(
                "Still unauthorized after refresh: {} {}",
                request.method,
                request.path
            );
        }
        Ok(retried)
    }
}
