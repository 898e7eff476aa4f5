//! Single-shot fetch with caching, de-duplication, and retry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use motorcare_types::ApiError;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::ResponseCache;
use crate::events::AuthEventBus;

/// Observable state of a [`Fetcher`].
#[derive(Debug, Clone)]
pub struct FetchState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
        }
    }
}

/// Backoff shape between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed,
    Linear,
}

/// Client-side retry for transient failures only (offline, timeout, 5xx).
/// 401 belongs to the refresh path and other 4xx are final, so neither is
/// ever retried here.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(500),
            backoff: Backoff::Fixed,
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after the given failed attempt (1-based).
    fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Linear => self.delay.saturating_mul(attempt),
        }
    }
}

type Operation<A, T> = Arc<dyn Fn(A) -> BoxFuture<'static, Result<T, ApiError>> + Send + Sync>;
type SuccessCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&ApiError) + Send + Sync>;

/// Adapts one parameterized remote operation into `{data, loading, error}`
/// state with an [`execute`](Fetcher::execute) entry point.
///
/// Concurrency behavior:
/// - a second `execute` while one is in flight does not queue; it declines
///   to start and returns the last resolved value;
/// - the in-flight guard is released on every exit path, so a failed
///   operation cannot leave the fetcher permanently busy.
pub struct Fetcher<A, T> {
    name: String,
    operation: Operation<A, T>,
    cache_ttl: Duration,
    retry: Option<RetryPolicy>,
    cache: Arc<ResponseCache>,
    events: Option<Arc<AuthEventBus>>,
    on_success: Option<SuccessCallback<T>>,
    on_error: Option<ErrorCallback>,
    state: Mutex<FetchState<T>>,
    in_flight: AtomicBool,
}

/// Builder for [`Fetcher`].
pub struct FetcherBuilder<A, T> {
    name: String,
    operation: Operation<A, T>,
    cache_ttl: Duration,
    retry: Option<RetryPolicy>,
    cache: Arc<ResponseCache>,
    events: Option<Arc<AuthEventBus>>,
    on_success: Option<SuccessCallback<T>>,
    on_error: Option<ErrorCallback>,
}

impl<A, T> FetcherBuilder<A, T> {
    /// `name` is the operation identity used to build cache keys; keep it
    /// unique per logical endpoint.
    pub fn new<F>(name: impl Into<String>, operation: F) -> Self
    where
        F: Fn(A) -> BoxFuture<'static, Result<T, ApiError>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            operation: Arc::new(operation),
            cache_ttl: Duration::ZERO,
            retry: None,
            cache: ResponseCache::global(),
            events: None,
            on_success: None,
            on_error: None,
        }
    }

    /// Enable read-through caching with the given time-to-live. Zero (the
    /// default) disables caching.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Substitute the cache instance. Tests use this to avoid the shared
    /// process-wide cache.
    pub fn cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Wire the auth event bus so an unrecoverable 401 can trigger the
    /// application-wide logout.
    pub fn events(mut self, events: Arc<AuthEventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(callback));
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ApiError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub fn build(self) -> Fetcher<A, T> {
        Fetcher {
            name: self.name,
            operation: self.operation,
            cache_ttl: self.cache_ttl,
            retry: self.retry,
            cache: self.cache,
            events: self.events,
            on_success: self.on_success,
            on_error: self.on_error,
            state: Mutex::new(FetchState::default()),
            in_flight: AtomicBool::new(false),
        }
    }
}

/// Releases the de-duplication guard on drop, whatever the exit path.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<A, T> Fetcher<A, T>
where
    A: Serialize + Clone,
    T: Clone + Serialize + DeserializeOwned,
{
    /// Run the operation. Returns the payload on success, `None` on failure
    /// (the normalized message lands in [`state`](Fetcher::state)).
    pub async fn execute(&self, args: A) -> Option<T> {
        self.run(args, false).await
    }

    /// Like `execute`, but failures are only logged and state is left
    /// untouched. The polling wrapper uses this so a missed tick never
    /// clears previously-displayed data.
    pub async fn execute_quiet(&self, args: A) -> Option<T> {
        self.run(args, true).await
    }

    async fn run(&self, args: A, quiet: bool) -> Option<T> {
        let key = self.cache_key(&args);

        if !self.cache_ttl.is_zero() {
            if let Some(value) = self.cache.get(&key, self.cache_ttl) {
                match serde_json::from_value::<T>(value) {
                    Ok(data) => {
                        tracing::debug!("{}: cache hit", self.name);
                        self.store_success(&data);
                        return Some(data);
                    }
                    Err(e) => {
                        tracing::warn!("{}: discarding unreadable cache entry: {}", self.name, e);
                        self.cache.remove(&key);
                    }
                }
            }
        }

        // De-duplication: decline to start a second concurrent call and hand
        // back the last resolved value instead.
        if self.in_flight.swap(true, Ordering::AcqRel) {
            tracing::debug!("{}: call already in flight, skipping duplicate", self.name);
            return self.lock_state().data.clone();
        }
        let _guard = InFlightGuard(&self.in_flight);

        if !quiet {
            let mut state = self.lock_state();
            state.loading = true;
            state.error = None;
        }

        match self.run_with_retry(args).await {
            Ok(data) => {
                if !self.cache_ttl.is_zero() {
                    match serde_json::to_value(&data) {
                        Ok(value) => self.cache.put(key, value),
                        Err(e) => tracing::warn!("{}: failed to cache result: {}", self.name, e),
                    }
                }
                self.store_success(&data);
                Some(data)
            }
            Err(err) => {
                if quiet {
                    tracing::debug!("{}: quiet fetch failed: {}", self.name, err);
                    return None;
                }
                tracing::warn!("{}: fetch failed: {}", self.name, err);
                {
                    let mut state = self.lock_state();
                    state.loading = false;
                    // data intentionally retained
                    state.error = Some(err.message.clone());
                }
                if let Some(callback) = &self.on_error {
                    callback(&err);
                }
                if err.is_unauthorized() {
                    // The transport already spent its one refresh-and-retry;
                    // a 401 surfacing here means the session is gone.
                    if let Some(events) = &self.events {
                        events.emit_invalidated(&err);
                    }
                }
                None
            }
        }
    }

    async fn run_with_retry(&self, args: A) -> Result<T, ApiError> {
        let Some(policy) = &self.retry else {
            return (self.operation)(args).await;
        };

        let mut attempt = 1;
        loop {
            match (self.operation)(args.clone()).await {
                Ok(data) => return Ok(data),
                Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                    let wait = policy.delay_after(attempt);
                    tracing::debug!(
                        "{}: transient failure on attempt {}, retrying in {:?}: {}",
                        self.name,
                        attempt,
                        wait,
                        err
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn store_success(&self, data: &T) {
        {
            let mut state = self.lock_state();
            state.data = Some(data.clone());
            state.loading = false;
            state.error = None;
        }
        if let Some(callback) = &self.on_success {
            callback(data);
        }
    }

    fn cache_key(&self, args: &A) -> String {
        let serialized = serde_json::to_string(args).unwrap_or_else(|_| "?".to_string());
        format!("{}:{}", self.name, serialized)
    }

    /// Snapshot of the current `{data, loading, error}` state.
    pub fn state(&self) -> FetchState<T> {
        self.lock_state().clone()
    }

    /// Clear state without touching the cache.
    pub fn reset(&self) {
        *self.lock_state() = FetchState::default();
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, FetchState<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
