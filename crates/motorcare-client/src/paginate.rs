//! Accumulating list fetch with pluggable response-shape normalization.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use motorcare_types::{ApiError, PageState};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Items mergeable by identity.
pub trait Identified {
    /// Stable identity used for de-duplication, `None` when the record is
    /// missing its identity field. A missing identity fails the merge with
    /// an explicit error rather than silently collapsing records.
    fn identity(&self) -> Option<&str>;
}

/// A page reduced to the two facts pagination needs.
#[derive(Debug, Clone)]
pub struct RawPage {
    pub items: Vec<Value>,
    pub total: Option<u64>,
}

/// Strategy converting a raw response body into items + total.
///
/// Upstream response shapes have historically been inconsistent, so this is
/// a pluggable seam rather than per-call-site probing.
pub trait ListNormalizer: Send + Sync {
    fn normalize(&self, raw: &Value) -> Result<RawPage, ApiError>;
}

/// Ordered shape-matching rules covering the shapes historical servers have
/// produced: a bare array, a `data` envelope (array or keyed object), or a
/// top-level domain list key.
pub struct DefaultNormalizer {
    list_keys: Vec<String>,
}

impl DefaultNormalizer {
    pub fn new() -> Self {
        Self::with_list_keys(
            ["items", "results", "bookings", "services", "offers"]
                .into_iter()
                .map(String::from)
                .collect(),
        )
    }

    pub fn with_list_keys(list_keys: Vec<String>) -> Self {
        Self { list_keys }
    }

    fn find_list<'a>(&self, obj: &'a serde_json::Map<String, Value>) -> Option<&'a Vec<Value>> {
        self.list_keys
            .iter()
            .find_map(|key| obj.get(key).and_then(Value::as_array))
    }
}

impl Default for DefaultNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ListNormalizer for DefaultNormalizer {
    fn normalize(&self, raw: &Value) -> Result<RawPage, ApiError> {
        // Rule 1: a bare array.
        if let Some(items) = raw.as_array() {
            return Ok(RawPage {
                items: items.clone(),
                total: None,
            });
        }

        let Some(obj) = raw.as_object() else {
            return Err(ApiError::unexpected("Unrecognized list response shape"));
        };
        let total = read_total(raw);

        // Rule 2: a `data` envelope holding the array directly or under a
        // known list key.
        if let Some(data) = obj.get("data") {
            if let Some(items) = data.as_array() {
                return Ok(RawPage {
                    items: items.clone(),
                    total,
                });
            }
            if let Some(inner) = data.as_object() {
                if let Some(items) = self.find_list(inner) {
                    let total = total.or_else(|| inner.get("total").and_then(Value::as_u64));
                    return Ok(RawPage {
                        items: items.clone(),
                        total,
                    });
                }
            }
        }

        // Rule 3: a known list key at the top level.
        if let Some(items) = self.find_list(obj) {
            return Ok(RawPage {
                items: items.clone(),
                total,
            });
        }

        Err(ApiError::unexpected("Unrecognized list response shape"))
    }
}

fn read_total(raw: &Value) -> Option<u64> {
    raw.pointer("/meta/pagination/total")
        .and_then(Value::as_u64)
        .or_else(|| raw.get("total").and_then(Value::as_u64))
}

/// Collapse repeated identities: first occurrence keeps its position, last
/// occurrence wins the value.
fn dedup_by_identity<T: Identified>(items: Vec<T>) -> Result<Vec<T>, ApiError> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(items.len());
    let mut merged: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        let Some(id) = item.identity().map(str::to_string) else {
            return Err(ApiError::unexpected("List item is missing its identity field")
                .with_code("MISSING_IDENTITY"));
        };
        match index.get(&id) {
            Some(&at) => merged[at] = item,
            None => {
                index.insert(id, merged.len());
                merged.push(item);
            }
        }
    }
    Ok(merged)
}

type PageOperation<A> =
    Arc<dyn Fn(u32, u32, A) -> BoxFuture<'static, Result<Value, ApiError>> + Send + Sync>;

struct Accumulated<T> {
    items: Vec<T>,
    page: PageState,
    error: Option<String>,
}

/// Accumulates successive pages of a listing operation into one deduplicated
/// ordered list, tracking whether more pages exist.
pub struct PagedFetcher<A, T> {
    name: String,
    operation: PageOperation<A>,
    normalizer: Arc<dyn ListNormalizer>,
    inner: Mutex<Accumulated<T>>,
    // Held for the duration of a page load; `refresh` awaits it so a stale
    // tail load can never land on top of a fresh first page.
    gate: tokio::sync::Mutex<()>,
}

impl<A, T> PagedFetcher<A, T>
where
    A: Clone,
    T: Identified + Clone + DeserializeOwned,
{
    /// `operation` receives `(page, limit, params)` and returns the raw
    /// response body; normalization happens here.
    pub fn new<F>(name: impl Into<String>, limit: u32, operation: F) -> Self
    where
        F: Fn(u32, u32, A) -> BoxFuture<'static, Result<Value, ApiError>> + Send + Sync + 'static,
    {
        Self::with_normalizer(name, limit, operation, Arc::new(DefaultNormalizer::new()))
    }

    pub fn with_normalizer<F>(
        name: impl Into<String>,
        limit: u32,
        operation: F,
        normalizer: Arc<dyn ListNormalizer>,
    ) -> Self
    where
        F: Fn(u32, u32, A) -> BoxFuture<'static, Result<Value, ApiError>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            operation: Arc::new(operation),
            normalizer,
            inner: Mutex::new(Accumulated {
                items: Vec::new(),
                page: PageState::new(limit),
                error: None,
            }),
            gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Load the next page. A call while another load is in flight, or when
    /// no more pages exist, is a silent no-op.
    pub async fn load_more(&self, params: A) {
        let Ok(_gate) = self.gate.try_lock() else {
            tracing::debug!("{}: load already in flight, skipping", self.name);
            return;
        };
        if !self.lock_inner().page.has_more {
            return;
        }
        self.load_page(params).await;
    }

    /// Reset to page 1 and reload. Waits for any in-flight load to finish
    /// before resetting.
    pub async fn refresh(&self, params: A) {
        let _gate = self.gate.lock().await;
        {
            let mut inner = self.lock_inner();
            inner.items.clear();
            inner.page.reset();
            inner.error = None;
        }
        self.load_page(params).await;
    }

    /// Clear accumulated items and pagination state without issuing a
    /// request.
    pub fn reset(&self) {
        let mut inner = self.lock_inner();
        inner.items.clear();
        inner.page.reset();
        inner.error = None;
    }

    async fn load_page(&self, params: A) {
        let (page, limit) = {
            let inner = self.lock_inner();
            (inner.page.page, inner.page.limit)
        };

        match (self.operation)(page, limit, params).await {
            Ok(raw) => {
                if let Err(err) = self.merge(&raw) {
                    tracing::warn!("{}: failed to merge page {}: {}", self.name, page, err);
                    self.lock_inner().error = Some(err.message);
                }
            }
            Err(err) => {
                // Pagination state is untouched, so the next attempt re-asks
                // for the same page.
                tracing::warn!("{}: failed to load page {}: {}", self.name, page, err);
                self.lock_inner().error = Some(err.message);
            }
        }
    }

    fn merge(&self, raw: &Value) -> Result<(), ApiError> {
        let page = self.normalizer.normalize(raw)?;
        let mut parsed: Vec<T> = Vec::with_capacity(page.items.len());
        for item in &page.items {
            parsed.push(
                serde_json::from_value(item.clone())
                    .map_err(|e| ApiError::unexpected(format!("Malformed list item: {}", e)))?,
            );
        }
        let fetched = parsed.len() as u64;

        let mut inner = self.lock_inner();
        let first_page = inner.page.page == 1;
        let mut combined: Vec<T> = if first_page {
            Vec::with_capacity(parsed.len())
        } else {
            inner.items.clone()
        };
        combined.extend(parsed);

        // The merge can still fail (missing identity), so `inner` is only
        // written once everything has been validated.
        let merged = dedup_by_identity(combined)?;
        let total = page.total.unwrap_or_else(|| {
            // No total anywhere in the response: a full page is taken as a
            // hint that more may exist, a short page ends pagination.
            let count = merged.len() as u64;
            if fetched >= u64::from(inner.page.limit) {
                count + 1
            } else {
                count
            }
        });

        inner.items = merged;
        inner.page.record_page(total);
        inner.error = None;
        Ok(())
    }

    /// Snapshot of the accumulated list.
    pub fn items(&self) -> Vec<T> {
        self.lock_inner().items.clone()
    }

    pub fn page_state(&self) -> PageState {
        self.lock_inner().page.clone()
    }

    pub fn has_more(&self) -> bool {
        self.lock_inner().page.has_more
    }

    pub fn error(&self) -> Option<String> {
        self.lock_inner().error.clone()
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, Accumulated<T>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
