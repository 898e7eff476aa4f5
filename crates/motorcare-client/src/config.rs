//! Client configuration.

/// Configuration for [`ApiClient`](crate::ApiClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every descriptor path is resolved against.
    pub base_url: String,
    /// Whole-request timeout. Expiry is classified as a 408.
    pub timeout_secs: u64,
    /// Sent as `x-client-version` on every request.
    pub client_version: String,
    /// Path POSTed with the refresh token to obtain a new access token.
    pub refresh_path: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.motorcare.app/api/v1".to_string(),
            timeout_secs: 30,
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            refresh_path: "/auth/refresh-token".to_string(),
        }
    }
}
