use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;

use crate::api::{ApiError, AppState};

/// Raw query string as ordered key/value pairs. Keys may repeat.
type QueryPairs = Vec<(String, String)>;

/// First value for `key`; later repeats are ignored.
fn first_value(pairs: QueryPairs, key: &str) -> Option<String> {
    pairs.into_iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

/// The path segment has already been percent-decoded, so `/a%2Fb` shows up
/// here as `a/b`.
fn queue_name(queue: String) -> Result<String, ApiError> {
    if queue.is_empty() || queue.contains('/') {
        return Err(ApiError::BadRequest("queue name must be a single path segment"));
    }
    Ok(queue)
}

#[derive(Debug, Default)]
pub struct ProduceParams {
    pub v: Option<String>,
}

impl From<QueryPairs> for ProduceParams {
    fn from(pairs: QueryPairs) -> Self {
        Self {
            v: first_value(pairs, "v"),
        }
    }
}

#[derive(Debug, Default)]
pub struct ConsumeParams {
    pub timeout: Option<String>,
}

impl From<QueryPairs> for ConsumeParams {
    fn from(pairs: QueryPairs) -> Self {
        Self {
            timeout: first_value(pairs, "timeout"),
        }
    }
}

impl ConsumeParams {
    /// The requested wait, if any.
    ///
    /// Anything that is not a base-10 integer means "don't wait". Negative
    /// values wait zero seconds; `cap` bounds the result.
    pub fn wait(&self, cap: Option<Duration>) -> Option<Duration> {
        let secs: i64 = self.timeout.as_deref()?.parse().ok()?;
        let wait = Duration::from_secs(secs.max(0).unsigned_abs());
        Some(match cap {
            Some(cap) => wait.min(cap),
            None => wait,
        })
    }
}

/// `PUT /{queue}?v=<message>`
pub async fn produce(
    State(state): State<AppState>,
    Path(queue): Path<String>,
    Query(pairs): Query<QueryPairs>,
) -> Result<StatusCode, ApiError> {
    let queue = queue_name(queue)?;
    let message = ProduceParams::from(pairs)
        .v
        .filter(|v| !v.is_empty())
        .ok_or(ApiError::BadRequest("missing message parameter `v`"))?;

    state.broker.produce(&queue, message);
    Ok(StatusCode::OK)
}

/// `GET /{queue}[?timeout=<secs>]`
pub async fn consume(
    State(state): State<AppState>,
    Path(queue): Path<String>,
    Query(pairs): Query<QueryPairs>,
) -> Result<String, ApiError> {
    let queue = queue_name(queue)?;
    let wait = ConsumeParams::from(pairs).wait(state.max_wait);
    state
        .broker
        .consume(&queue, wait)
        .await
        .ok_or(ApiError::NotFound)
}

pub async fn bad_request() -> ApiError {
    ApiError::BadRequest("expected GET or PUT on /{queue}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(timeout: &str) -> ConsumeParams {
        ConsumeParams {
            timeout: Some(timeout.to_string()),
        }
    }

    #[test]
    fn timeout_parsing() {
        assert_eq!(ConsumeParams::default().wait(None), None);
        assert_eq!(params("").wait(None), None);
        assert_eq!(params("1.5").wait(None), None);
        assert_eq!(params("abc").wait(None), None);
        assert_eq!(params("3").wait(None), Some(Duration::from_secs(3)));
        assert_eq!(params("+3").wait(None), Some(Duration::from_secs(3)));
        assert_eq!(params("-4").wait(None), Some(Duration::ZERO));
    }

    fn pairs(raw: &[(&str, &str)]) -> QueryPairs {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn repeated_keys_take_first_value() {
        let produce = ProduceParams::from(pairs(&[("x", "1"), ("v", "a"), ("v", "b")]));
        assert_eq!(produce.v.as_deref(), Some("a"));

        let consume = ConsumeParams::from(pairs(&[("timeout", "5"), ("timeout", "x")]));
        assert_eq!(consume.wait(None), Some(Duration::from_secs(5)));

        assert_eq!(ProduceParams::from(pairs(&[])).v, None);
    }

    #[test]
    fn queue_name_must_be_one_segment() {
        assert_eq!(queue_name("jobs".into()).unwrap(), "jobs");
        assert!(queue_name("a/b".into()).is_err());
        assert!(queue_name(String::new()).is_err());
    }

    #[test]
    fn timeout_is_capped() {
        let cap = Some(Duration::from_secs(10));
        assert_eq!(params("60").wait(cap), Some(Duration::from_secs(10)));
        assert_eq!(params("5").wait(cap), Some(Duration::from_secs(5)));
    }
}
