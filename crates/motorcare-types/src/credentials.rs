//! Credential pair data model.

use serde::{Deserialize, Serialize};

/// Access/refresh token pair.
///
/// Always written and cleared as a whole: no code path may persist or expose
/// one token without the other.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPair {
    /// Short-lived bearer token attached to every authorized request.
    pub access_token: String,
    /// Long-lived token exchanged for a new access token on 401.
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}
