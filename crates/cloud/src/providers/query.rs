//! Paginated query walker.
//!
//! Provider list APIs return results in pages delimited by an opaque
//! continuation marker, embedded at a service-specific path inside a nested
//! response structure. [`paginate_query`] abstracts over that: callers supply
//! one fetch operation plus a [`PageSpec`] describing where the marker and the
//! record list live, and get back the concatenation of all pages.

use std::future::Future;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::debug;

use super::traits::ProviderError;

/// Field paths describing how a provider operation paginates.
///
/// The path strings must match the provider's documented response shape
/// verbatim; a mismatch surfaces as
/// [`ProviderError::UnexpectedResponseShape`] rather than an empty result.
#[derive(Debug, Clone, Copy)]
pub struct PageSpec {
    /// Ordered keys locating the continuation marker in a response.
    pub marker_path: &'static [&'static str],
    /// Ordered keys locating the list of result records in a response.
    pub data_path: &'static [&'static str],
    /// Query parameter under which the next request passes the marker.
    pub marker_param: &'static str,
}

/// Overall cut-off for a multi-page collection.
///
/// Checked between pages, never mid-page: an in-flight request is always
/// allowed to complete.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    budget_secs: u64,
}

impl Deadline {
    /// Deadline expiring `budget` from now.
    #[must_use]
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget_secs: budget.as_secs(),
        }
    }

    /// Whether the deadline has passed.
    #[must_use]
    pub fn expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// The timeout error for this deadline.
    #[must_use]
    pub fn to_error(&self) -> ProviderError {
        ProviderError::Timeout(self.budget_secs)
    }
}

/// Walk every page of a marker-paginated provider operation.
///
/// `fetch` performs one network call. It receives the query parameters for
/// the page: empty on the first call, and exactly one
/// `(marker_param, marker)` pair on each subsequent call, carrying the marker
/// extracted from the previous page. Records are returned in page arrival
/// order; no deduplication is performed (marker correctness is the
/// provider's contract).
///
/// A missing or empty marker means the result set is exhausted - on the first
/// page as well as any later one. An empty record list is a valid page and
/// contributes nothing.
///
/// # Errors
///
/// Any `fetch` error is propagated as-is. An unresolvable `data_path`, or an
/// unresolvable intermediate key of `marker_path`, is
/// [`ProviderError::UnexpectedResponseShape`]. An expired `deadline` between
/// pages is [`ProviderError::Timeout`].
pub async fn paginate_query<F, Fut>(
    mut fetch: F,
    spec: &PageSpec,
    deadline: Option<Deadline>,
) -> Result<Vec<Value>, ProviderError>
where
    F: FnMut(Vec<(String, String)>) -> Fut,
    Fut: Future<Output = Result<Value, ProviderError>>,
{
    let mut records = Vec::new();
    let mut params: Vec<(String, String)> = Vec::new();
    let mut pages = 0u32;

    loop {
        let page = fetch(params).await?;
        pages += 1;
        records.extend(extract_records(&page, spec)?);

        let Some(marker) = extract_marker(&page, spec)? else {
            break;
        };

        if let Some(deadline) = deadline {
            if deadline.expired() {
                return Err(deadline.to_error());
            }
        }

        params = vec![(spec.marker_param.to_string(), marker)];
    }

    debug!(pages, records = records.len(), "Paginated query complete");
    Ok(records)
}

/// Resolve `data_path` to the page's record list.
fn extract_records(page: &Value, spec: &PageSpec) -> Result<Vec<Value>, ProviderError> {
    let mut node = page;
    for key in spec.data_path {
        node = node
            .get(key)
            .ok_or_else(|| ProviderError::bad_shape("record list", spec.data_path))?;
    }
    node.as_array()
        .cloned()
        .ok_or_else(|| ProviderError::bad_shape("record list", spec.data_path))
}

/// Resolve `marker_path` to the continuation marker, if any.
///
/// The final key being absent (or null, or empty) terminates pagination; an
/// absent intermediate key is a shape error, since it means the whole
/// response envelope moved.
fn extract_marker(page: &Value, spec: &PageSpec) -> Result<Option<String>, ProviderError> {
    let Some((last, parents)) = spec.marker_path.split_last() else {
        return Ok(None);
    };

    let mut node = page;
    for key in parents {
        node = node
            .get(key)
            .ok_or_else(|| ProviderError::bad_shape("marker", spec.marker_path))?;
    }

    match node.get(last) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ProviderError::bad_shape("marker", spec.marker_path)),
    }
}
