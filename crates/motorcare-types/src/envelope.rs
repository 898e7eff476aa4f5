//! Response envelope types.

use serde::{Deserialize, Serialize};

/// The envelope every Motorcare API endpoint wraps its payload in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    /// Explicit success flag. Canonical outcome indicator.
    #[serde(default)]
    pub success: bool,
    /// Status string, usually `"success"` or an error category.
    #[serde(default)]
    pub status: String,
    /// Human-readable message for display.
    #[serde(default)]
    pub message: String,
    /// The domain payload. Opaque to this layer.
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

impl<T> ApiResponse<T> {
    /// Whether the call succeeded.
    ///
    /// The `success` boolean is canonical. Older deployments only set
    /// `status: "success"`, so that form is honored as a compatibility
    /// shim; either signal alone counts as success.
    pub fn is_success(&self) -> bool {
        self.success || self.status == "success"
    }

    /// Pagination metadata, if the endpoint returned any.
    pub fn pagination(&self) -> Option<&PaginationMeta> {
        self.meta.as_ref().and_then(|m| m.pagination.as_ref())
    }
}

/// Optional envelope metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_time: Option<String>,
}

/// Server-reported pagination block inside `meta`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_flag_is_canonical() {
        let resp: ApiResponse<serde_json::Value> = serde_json::from_str(
            r#"{"success": true, "status": "ok", "message": "", "data": null}"#,
        )
        .unwrap();
        assert!(resp.is_success());
    }

    #[test]
    fn test_status_string_shim() {
        // Older servers omit the boolean and only set status.
        let resp: ApiResponse<serde_json::Value> =
            serde_json::from_str(r#"{"status": "success", "message": "", "data": null}"#).unwrap();
        assert!(resp.is_success());
    }

    #[test]
    fn test_neither_signal_is_failure() {
        let resp: ApiResponse<serde_json::Value> =
            serde_json::from_str(r#"{"status": "error", "message": "nope", "data": null}"#)
                .unwrap();
        assert!(!resp.is_success());
    }

    #[test]
    fn test_meta_pagination_roundtrip() {
        let raw = r#"{
            "success": true, "status": "success", "message": "", "data": [],
            "meta": {"pagination": {"page": 2, "limit": 10, "total": 25, "totalPages": 3}}
        }"#;
        let resp: ApiResponse<Vec<serde_json::Value>> = serde_json::from_str(raw).unwrap();
        let p = resp.pagination().unwrap();
        assert_eq!(p.page, 2);
        assert_eq!(p.total_pages, 3);
    }
}
