//! HTTP dispatch layer.
//!
//! - `PUT /{queue}?v=<message>` produces a message
//! - `GET /{queue}` consumes without waiting
//! - `GET /{queue}?timeout=<secs>` consumes, waiting up to `secs` seconds
//!
//! A found message is the response body; an empty queue answers `404`.
//! Any other path or method answers `400`.

pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use thiserror::Error;
use tracing::debug;

use crate::core::broker::Broker;

/// Shared state for the handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub broker: Arc<Broker>,
    /// Cap applied to requested waits.
    pub max_wait: Option<Duration>,
}

impl AppState {
    pub fn new(broker: Arc<Broker>, max_wait: Option<Duration>) -> Self {
        Self { broker, max_wait }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(&'static str),

    #[error("no message available")]
    NotFound,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        debug!(target: "pollmq::api", "{}", self);
        self.status_code().into_response()
    }
}

/// Builds the router with `state` attached.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/:queue",
            get(handlers::consume)
                .put(handlers::produce)
                // `get` also answers HEAD, which would pop a message and
                // throw the body away.
                .head(handlers::bad_request)
                .fallback(handlers::bad_request),
        )
        .fallback(handlers::bad_request)
        .with_state(state)
}
