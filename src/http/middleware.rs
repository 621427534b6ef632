//! Admission middleware installed ahead of every route.

use std::net::SocketAddr;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::future::BoxFuture;
use tower::{Layer, Service};
use tracing::trace;

use crate::admission::{AdmissionController, Decision, KeyExtractor};

/// Tower layer that wraps every route with the admission check.
#[derive(Clone)]
pub struct AdmissionLayer {
    controller: Arc<AdmissionController>,
    extractor: KeyExtractor,
}

impl AdmissionLayer {
    /// Create a layer over a shared controller. The key strategy comes from
    /// the controller's own configuration.
    pub fn new(controller: Arc<AdmissionController>) -> Self {
        let extractor = KeyExtractor::new(controller.config().key_strategy);
        Self {
            controller,
            extractor,
        }
    }
}

impl<S> Layer<S> for AdmissionLayer {
    type Service = AdmissionMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AdmissionMiddleware {
            inner,
            controller: self.controller.clone(),
            extractor: self.extractor,
        }
    }
}

/// The per-request admission service.
///
/// Produces either "forward unchanged" or a 429 short-circuit, never both.
/// Nothing on this path can fail: key extraction degrades to the global
/// sentinel and the check itself is infallible in-memory arithmetic, so an
/// inner fault can never abort request handling.
#[derive(Clone)]
pub struct AdmissionMiddleware<S> {
    inner: S,
    controller: Arc<AdmissionController>,
    extractor: KeyExtractor,
}

impl<S> Service<Request<Body>> for AdmissionMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let remote_addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0);
        let key = self.extractor.extract(remote_addr, request.headers());

        // Decided synchronously: the admission path never suspends.
        let decision = self.controller.check_and_consume(&key);

        // Take the service that was polled ready, leave the clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(async move {
            match decision {
                Decision::Allowed => inner.call(request).await,
                Decision::Denied { retry_after } => {
                    trace!(key = %key, "Short-circuiting with 429");
                    Ok(reject(retry_after))
                }
            }
        })
    }
}

/// Build the 429 rejection carrying the retry hint.
fn reject(retry_after: Duration) -> Response {
    let retry_after_secs = (retry_after.as_secs_f64().ceil() as u64).max(1);

    let body = serde_json::json!({
        "error": "too_many_requests",
        "message": "Request rate exceeded, retry later",
        "retry_after_secs": retry_after_secs,
    });

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
    response
}
