//! # Motorcare Types
//!
//! Core wire types for the Motorcare remote-data access layer.
//!
//! - **`envelope`** - The response envelope every API call resolves to
//! - **`error`** - The normalized error every failure path resolves to
//! - **`credentials`** - Access/refresh token pair
//! - **`pagination`** - Page/limit/total accounting for list endpoints
//!
//! All types are designed to be:
//! - **Serializable** via serde for the wire contract
//! - **Clone** for cheap sharing across async boundaries
//! - **PartialEq** for testing and comparison

pub mod credentials;
pub mod envelope;
pub mod error;
pub mod pagination;

pub use credentials::CredentialPair;
pub use envelope::{ApiResponse, PaginationMeta, ResponseMeta};
pub use error::{ApiError, ErrorDetail, StorageError};
pub use pagination::PageState;
