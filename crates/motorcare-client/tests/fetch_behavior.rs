#![allow(clippy::expect_used, reason = "integration tests assert by panicking")]

//! Single-fetch behavior: TTL caching, de-duplication, retry-with-backoff,
//! and the unrecoverable-401 side effect.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use motorcare_client::{AuthEventBus, AuthEvents, Backoff, FetcherBuilder, ResponseCache, RetryPolicy};
use motorcare_types::ApiError;

/// Operation that doubles its argument, counting calls and optionally
/// failing with a configurable error.
struct Op {
    calls: AtomicU32,
    failing: AtomicBool,
    error: ApiError,
    delay: Duration,
}

impl Op {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            failing: AtomicBool::new(false),
            error: ApiError::timeout(),
            delay: Duration::ZERO,
        })
    }

    fn with_error(error: ApiError) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            failing: AtomicBool::new(true),
            error,
            delay: Duration::ZERO,
        })
    }

    fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            failing: AtomicBool::new(false),
            error: ApiError::timeout(),
            delay,
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn closure(
        self: &Arc<Self>,
    ) -> impl Fn(u32) -> futures::future::BoxFuture<'static, Result<u32, ApiError>> + Send + Sync
    {
        let op = self.clone();
        move |args: u32| {
            let op = op.clone();
            async move {
                op.calls.fetch_add(1, Ordering::SeqCst);
                if !op.delay.is_zero() {
                    tokio::time::sleep(op.delay).await;
                }
                if op.failing.load(Ordering::SeqCst) {
                    Err(op.error.clone())
                } else {
                    Ok(args * 2)
                }
            }
            .boxed()
        }
    }
}

fn private_cache() -> Arc<ResponseCache> {
    Arc::new(ResponseCache::new())
}

#[tokio::test(start_paused = true)]
async fn test_cache_ttl_boundary() {
    let op = Op::new();
    let fetcher = FetcherBuilder::new("double", op.closure())
        .cache_ttl(Duration::from_secs(60))
        .cache(private_cache())
        .build();

    assert_eq!(fetcher.execute(21).await, Some(42));
    assert_eq!(op.calls(), 1);

    // Inside the TTL window: served from cache, no network call.
    tokio::time::advance(Duration::from_secs(59)).await;
    assert_eq!(fetcher.execute(21).await, Some(42));
    assert_eq!(op.calls(), 1);

    // At the TTL boundary the entry is stale and a new call goes out.
    tokio::time::advance(Duration::from_secs(1)).await;
    assert_eq!(fetcher.execute(21).await, Some(42));
    assert_eq!(op.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cache_key_includes_arguments() {
    let op = Op::new();
    let fetcher = FetcherBuilder::new("double", op.closure())
        .cache_ttl(Duration::from_secs(60))
        .cache(private_cache())
        .build();

    fetcher.execute(1).await;
    fetcher.execute(2).await;
    fetcher.execute(1).await;
    assert_eq!(op.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_executes_collapse_to_one_call() {
    let op = Op::with_delay(Duration::from_millis(20));
    let fetcher = FetcherBuilder::new("double", op.closure()).build();

    let (first, second) = tokio::join!(fetcher.execute(5), fetcher.execute(5));
    assert_eq!(op.calls(), 1);
    // The winner resolves normally; the declined call hands back whatever
    // had last resolved (nothing yet).
    assert_eq!(first, Some(10));
    assert_eq!(second, None);

    // The guard was released: a later call proceeds.
    assert_eq!(fetcher.execute(5).await, Some(10));
    assert_eq!(op.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_retry_recovers_from_transient_failures() {
    let op = Op::new();
    // Fail the first two attempts with a timeout, then succeed.
    op.failing.store(true, Ordering::SeqCst);
    let recover_after = 2;
    let op_for_closure = op.clone();
    let closure = move |args: u32| {
        let op = op_for_closure.clone();
        async move {
            let n = op.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= recover_after {
                Err(ApiError::timeout())
            } else {
                Ok(args * 2)
            }
        }
        .boxed()
    };
    let fetcher = FetcherBuilder::new("flaky", closure)
        .retry(RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_millis(100),
            backoff: Backoff::Linear,
        })
        .build();

    assert_eq!(fetcher.execute(3).await, Some(6));
    assert_eq!(op.calls(), 3);
    let state = fetcher.state();
    assert!(state.error.is_none());
    assert!(!state.loading);
}

#[tokio::test(start_paused = true)]
async fn test_validation_errors_are_not_retried() {
    let op = Op::with_error(ApiError::new(422, "error", "Plate number is required"));
    let fetcher = FetcherBuilder::new("create-vehicle", op.closure())
        .retry(RetryPolicy::default())
        .build();

    assert_eq!(fetcher.execute(1).await, None);
    assert_eq!(op.calls(), 1);
    assert_eq!(
        fetcher.state().error.as_deref(),
        Some("Plate number is required")
    );
}

#[tokio::test(start_paused = true)]
async fn test_unrecoverable_401_invalidates_session() {
    #[derive(Default)]
    struct Probe {
        invalidated: AtomicU32,
    }

    impl AuthEvents for Probe {
        fn session_invalidated(&self, _reason: &ApiError) {
            self.invalidated.fetch_add(1, Ordering::SeqCst);
        }
    }

    let events = Arc::new(AuthEventBus::new());
    let probe = Arc::new(Probe::default());
    events.subscribe(probe.clone());

    let op = Op::with_error(ApiError::new(401, "error", "Unauthorized"));
    let fetcher = FetcherBuilder::new("profile", op.closure())
        .events(events)
        .build();

    assert_eq!(fetcher.execute(1).await, None);
    assert_eq!(probe.invalidated.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failure_retains_previous_data() {
    let op = Op::new();
    let fetcher = FetcherBuilder::new("double", op.closure()).build();

    assert_eq!(fetcher.execute(4).await, Some(8));

    op.failing.store(true, Ordering::SeqCst);
    assert_eq!(fetcher.execute(4).await, None);

    let state = fetcher.state();
    assert_eq!(state.data, Some(8), "stale data stays displayable");
    assert!(state.error.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_quiet_failure_leaves_state_untouched() {
    let op = Op::new();
    let fetcher = FetcherBuilder::new("status", op.closure()).build();

    fetcher.execute(7).await;
    op.failing.store(true, Ordering::SeqCst);

    assert_eq!(fetcher.execute_quiet(7).await, None);
    let state = fetcher.state();
    assert_eq!(state.data, Some(14));
    assert!(state.error.is_none(), "quiet failures never surface");
}

#[tokio::test(start_paused = true)]
async fn test_reset_clears_state_but_not_cache() {
    let op = Op::new();
    let fetcher = FetcherBuilder::new("double", op.closure())
        .cache_ttl(Duration::from_secs(60))
        .cache(private_cache())
        .build();

    fetcher.execute(9).await;
    fetcher.reset();
    assert!(fetcher.state().data.is_none());

    // Still served from cache after the reset.
    assert_eq!(fetcher.execute(9).await, Some(18));
    assert_eq!(op.calls(), 1);
}
