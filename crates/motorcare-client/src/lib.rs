#![doc = include_str!("../README.md")]

pub mod cache;
pub mod client;
pub mod config;
pub mod events;
pub mod fetch;
pub mod paginate;
pub mod poll;
pub mod refresh;
pub mod store;
pub mod transport;

pub use cache::ResponseCache;
pub use client::ApiClient;
pub use config::ClientConfig;
pub use events::{AuthEventBus, AuthEvents};
pub use fetch::{Backoff, FetchState, Fetcher, FetcherBuilder, RetryPolicy};
pub use paginate::{DefaultNormalizer, Identified, ListNormalizer, PagedFetcher, RawPage};
pub use poll::{start_polling, PollHandle};
pub use refresh::RefreshCoordinator;
pub use store::{TokenStorage, TokenStore};
pub use transport::{HttpTransport, RawResponse, RequestDescriptor, Transport};

// Re-export the wire types so app code only needs one dependency.
pub use motorcare_types as types;
