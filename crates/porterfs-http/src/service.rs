//! The hyper service tying the pipeline together.
//!
//! Per request: health-route interception, signature verification from the
//! request parts (the body stays untouched for streaming), routing through
//! the decision table, dispatch, and common response headers. Signature
//! failures are logged with their precise kind but always answered with the
//! same opaque 403.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use hyper::service::Service;
use tracing::{debug, info, warn};
use uuid::Uuid;

use porterfs_auth::{verify_sigv4, StaticCredentials, VerifyOptions};
use porterfs_model::S3Error;
use porterfs_store::FsStore;

use crate::body::{byte_stream, ResponseBody};
use crate::handlers::{dispatch, to_error_response};
use crate::response::add_common_headers;
use crate::router::resolve;

/// The unauthenticated diagnostic route. The `_` prefix cannot collide
/// with any valid bucket name.
const HEALTH_PATH: &str = "/_porterfs/health";

/// Shared state for all requests.
#[derive(Debug)]
pub struct AppState {
    /// The storage engine.
    pub store: Arc<FsStore>,
    /// The configured credential pair.
    pub credentials: StaticCredentials,
    /// Signature verification options.
    pub verify: VerifyOptions,
}

/// The PorterFS request service.
///
/// Generic over the request body type so tests can drive the full pipeline
/// with in-memory bodies while the server uses `hyper::body::Incoming`.
#[derive(Debug)]
pub struct PorterService {
    state: Arc<AppState>,
}

impl PorterService {
    /// Create a service over the shared state.
    #[must_use]
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

impl Clone for PorterService {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<B> Service<http::Request<B>> for PorterService
where
    B: http_body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>> + Send,
{
    type Response = http::Response<ResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<B>) -> Self::Future {
        let state = Arc::clone(&self.state);
        Box::pin(async move {
            let request_id = Uuid::new_v4().to_string();
            let is_head = req.method() == http::Method::HEAD;

            let response = process_request(&state, req, &request_id).await;
            let mut response = add_common_headers(response, &request_id);

            // HEAD answers carry headers only, even on errors.
            if is_head {
                *response.body_mut() = ResponseBody::empty();
            }

            Ok(response)
        })
    }
}

/// Run one request through the S3 pipeline.
async fn process_request<B>(
    state: &AppState,
    req: http::Request<B>,
    request_id: &str,
) -> http::Response<ResponseBody>
where
    B: http_body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>> + Send,
{
    let method = req.method().clone();
    let uri = req.uri().clone();
    debug!(%method, %uri, request_id, "processing request");

    if method == http::Method::GET && uri.path() == HEALTH_PATH {
        return health_response();
    }

    let (parts, body) = req.into_parts();

    // Authentication first: a pure function of the request parts. The body
    // is untouched, so uploads still stream.
    if let Err(kind) = verify_sigv4(&parts, &state.credentials, &state.verify) {
        warn!(%method, %uri, request_id, error = %kind, "signature verification failed");
        let err = S3Error::access_denied().with_resource(uri.path());
        return to_error_response(&err, request_id);
    }

    let ctx = match resolve(&parts.method, &parts.uri) {
        Ok(ctx) => ctx,
        Err(err) => {
            warn!(%method, %uri, request_id, error = %err, "unroutable request");
            return to_error_response(&err, request_id);
        }
    };

    info!(
        operation = %ctx.operation,
        bucket = ?ctx.bucket,
        key = ?ctx.key,
        request_id,
        "routed S3 request"
    );

    match dispatch(state, &parts, byte_stream(body), &ctx).await {
        Ok(response) => response,
        Err(err) => {
            debug!(request_id, error = %err, "operation returned error");
            to_error_response(&err, request_id)
        }
    }
}

/// The JSON health probe answer.
fn health_response() -> http::Response<ResponseBody> {
    http::Response::builder()
        .status(http::StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(ResponseBody::from_bytes(Bytes::from_static(
            br#"{"status":"ok","service":"porterfs"}"#,
        )))
        .expect("static health response should be valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_build_health_response() {
        let resp = health_response();
        assert_eq!(resp.status(), http::StatusCode::OK);
        assert_eq!(
            resp.headers()
                .get(http::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
            Some("application/json")
        );
    }
}
