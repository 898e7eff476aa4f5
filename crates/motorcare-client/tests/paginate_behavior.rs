#![allow(clippy::expect_used, reason = "integration tests assert by panicking")]

//! Paginated fetch behavior: accumulation, merge idempotence, `has_more`
//! accounting, and the refresh-vs-in-flight ordering guarantee.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use motorcare_client::{Identified, PagedFetcher};
use motorcare_types::ApiError;
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
struct Booking {
    id: String,
    #[serde(default)]
    status: String,
}

impl Identified for Booking {
    fn identity(&self) -> Option<&str> {
        Some(&self.id)
    }
}

/// Serves slices of a fixed 25-item collection wrapped in the standard
/// envelope, counting requests.
fn booking_server(calls: Arc<AtomicU32>) -> impl Fn(u32, u32, ()) -> futures::future::BoxFuture<'static, Result<Value, ApiError>> + Send + Sync
{
    move |page: u32, limit: u32, _params: ()| {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            let total = 25u32;
            let start = (page - 1) * limit;
            let end = (start + limit).min(total);
            let items: Vec<Value> = (start..end)
                .map(|n| json!({"id": format!("bk-{}", n), "status": "scheduled"}))
                .collect();
            Ok(json!({
                "success": true, "status": "success", "message": "",
                "data": items,
                "meta": {"pagination": {"page": page, "limit": limit, "total": total, "totalPages": 3}}
            }))
        }
        .boxed()
    }
}

#[tokio::test(start_paused = true)]
async fn test_accumulates_pages_and_tracks_has_more() {
    let calls = Arc::new(AtomicU32::new(0));
    let fetcher: PagedFetcher<(), Booking> =
        PagedFetcher::new("bookings", 10, booking_server(calls.clone()));

    fetcher.load_more(()).await;
    assert_eq!(fetcher.items().len(), 10);
    assert!(fetcher.has_more());

    fetcher.load_more(()).await;
    assert_eq!(fetcher.items().len(), 20);
    assert!(fetcher.has_more());

    fetcher.load_more(()).await;
    assert_eq!(fetcher.items().len(), 25);
    assert!(!fetcher.has_more(), "3 * 10 >= 25");

    // Exhausted: further calls are silent no-ops.
    fetcher.load_more(()).await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_pages_merge_idempotently() {
    // Every "page" returns the same overlapping window, as an unkeyed array.
    let op = |page: u32, _limit: u32, _params: ()| {
        async move {
            let items: Vec<Value> = (0..10)
                .map(|n| json!({"id": format!("bk-{}", n), "status": format!("seen-p{}", page)}))
                .collect();
            Ok(json!({"data": items, "total": 30}))
        }
        .boxed()
    };
    let fetcher: PagedFetcher<(), Booking> = PagedFetcher::new("bookings", 10, op);

    fetcher.load_more(()).await;
    fetcher.load_more(()).await;

    let items = fetcher.items();
    assert_eq!(items.len(), 10, "each identity appears exactly once");
    // Last occurrence wins: page 2's copy replaced page 1's.
    assert!(items.iter().all(|b| b.status == "seen-p2"));
}

#[tokio::test(start_paused = true)]
async fn test_refresh_waits_for_in_flight_load() {
    let calls = Arc::new(AtomicU32::new(0));
    let calls_in_op = calls.clone();
    let op = move |page: u32, limit: u32, _params: ()| {
        let calls = calls_in_op.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            // Slow load so the refresh genuinely has to wait.
            tokio::time::sleep(Duration::from_millis(100)).await;
            let items: Vec<Value> = (0..limit)
                .map(|n| json!({"id": format!("bk-{}-{}", page, n)}))
                .collect();
            Ok(json!({"data": items, "total": 40}))
        }
        .boxed()
    };
    let fetcher: PagedFetcher<(), Booking> = PagedFetcher::new("bookings", 10, op);

    tokio::join!(fetcher.load_more(()), fetcher.refresh(()));

    // The tail of the first load never lands on top of the fresh page 1:
    // refresh reset to page 1 and loaded it again.
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let state = fetcher.page_state();
    assert_eq!(state.page, 2);
    assert_eq!(fetcher.items().len(), 10);
    assert!(fetcher.items().iter().all(|b| b.id.starts_with("bk-1-")));
}

#[tokio::test(start_paused = true)]
async fn test_failed_load_releases_guard_and_preserves_state() {
    let calls = Arc::new(AtomicU32::new(0));
    let calls_in_op = calls.clone();
    let op = move |page: u32, limit: u32, _params: ()| {
        let calls = calls_in_op.clone();
        async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(ApiError::timeout());
            }
            let items: Vec<Value> = (0..limit)
                .map(|n| json!({"id": format!("bk-{}-{}", page, n)}))
                .collect();
            Ok(json!({"data": items, "total": 10}))
        }
        .boxed()
    };
    let fetcher: PagedFetcher<(), Booking> = PagedFetcher::new("bookings", 10, op);

    fetcher.load_more(()).await;
    assert!(fetcher.error().is_some());
    // Pagination state untouched by the failure.
    assert_eq!(fetcher.page_state().page, 1);
    assert!(fetcher.items().is_empty());

    // The in-flight guard was released; the same page is re-requested.
    fetcher.load_more(()).await;
    assert!(fetcher.error().is_none());
    assert_eq!(fetcher.items().len(), 10);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_reset_clears_without_requesting() {
    let calls = Arc::new(AtomicU32::new(0));
    let fetcher: PagedFetcher<(), Booking> =
        PagedFetcher::new("bookings", 10, booking_server(calls.clone()));

    fetcher.load_more(()).await;
    fetcher.reset();

    assert!(fetcher.items().is_empty());
    assert_eq!(fetcher.page_state().page, 1);
    assert!(fetcher.has_more());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_missing_identity_is_an_explicit_error() {
    let op = |_page: u32, _limit: u32, _params: ()| {
        async move { Ok(json!({"data": [{"status": "no id here"}], "total": 1})) }.boxed()
    };
    // Booking.id is mandatory in the JSON, so deserialization itself fails;
    // use a lenient row type to reach the identity check.
    #[derive(Debug, Clone, serde::Deserialize)]
    struct LooseRow {
        #[serde(default)]
        id: Option<String>,
    }
    impl Identified for LooseRow {
        fn identity(&self) -> Option<&str> {
            self.id.as_deref()
        }
    }

    let fetcher: PagedFetcher<(), LooseRow> = PagedFetcher::new("rows", 10, op);
    fetcher.load_more(()).await;

    let error = fetcher.error().expect("merge must fail loudly");
    assert!(error.contains("identity"));
    assert!(fetcher.items().is_empty());
}
