//! Fixed-interval polling on top of a [`Fetcher`].

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::fetch::Fetcher;

/// Handle to a running poll loop. Stopping (or dropping) it cancels the
/// loop; no further ticks occur.
pub struct PollHandle {
    task: tokio::task::JoinHandle<()>,
}

impl PollHandle {
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start polling: one immediate fetch, then one per interval tick. The
/// interval is constant, with no backoff on failures, so behavior stays
/// predictable for the caller. Tick failures are swallowed inside
/// [`Fetcher::execute_quiet`], leaving previously-displayed data intact.
pub fn start_polling<A, T>(fetcher: Arc<Fetcher<A, T>>, args: A, every: Duration) -> PollHandle
where
    A: Serialize + Clone + Send + Sync + 'static,
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            // The first tick completes immediately.
            interval.tick().await;
            let _ = fetcher.execute_quiet(args.clone()).await;
        }
    });
    PollHandle { task }
}
