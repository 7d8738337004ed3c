//! S3 request routing: path parsing and operation identification.
//!
//! PorterFS serves path-style URLs only: `/`, `/{bucket}`, and
//! `/{bucket}/{key...}` where the key may contain `/`. Several S3 verbs
//! overlap on the same method and path and differ only by selector query
//! parameters (`uploads`, `uploadId`, `partNumber`, `list-type`), so
//! identification is a single explicit decision table over
//! `(method, path shape, selector keys)` — the one source of routing truth,
//! testable without any I/O.

use http::Method;
use percent_encoding::percent_decode_str;

use porterfs_model::{S3Error, S3Operation};

/// The result of routing a request.
#[derive(Debug, Clone)]
pub struct RoutingContext {
    /// The bucket, when the path names one.
    pub bucket: Option<String>,
    /// The object key, when the path names one.
    pub key: Option<String>,
    /// The identified operation.
    pub operation: S3Operation,
    /// Decoded query parameters, in request order.
    pub query: Vec<(String, String)>,
}

impl RoutingContext {
    /// Look up a query parameter by name.
    #[must_use]
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Resolve a request's method and URI to an S3 operation.
///
/// # Errors
///
/// Returns `MethodNotAllowed` when no table row matches.
pub fn resolve(method: &Method, uri: &http::Uri) -> Result<RoutingContext, S3Error> {
    let (bucket, key) = parse_path(uri.path());
    let query = parse_query_params(uri.query().unwrap_or(""));

    let operation = identify_operation(method, bucket.is_some(), key.is_some(), &query)?;

    Ok(RoutingContext {
        bucket,
        key,
        operation,
        query,
    })
}

/// Split `/{bucket}/{key...}` into its components, percent-decoded.
fn parse_path(path: &str) -> (Option<String>, Option<String>) {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        return (None, None);
    }

    match trimmed.split_once('/') {
        Some((bucket, key)) if !key.is_empty() => {
            (Some(decode_component(bucket)), Some(decode_component(key)))
        }
        Some((bucket, _)) => (Some(decode_component(bucket)), None),
        None => (Some(decode_component(trimmed)), None),
    }
}

fn decode_component(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

/// Parse a raw query string into decoded key/value pairs.
fn parse_query_params(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (decode_component(k), decode_component(v)),
            None => (decode_component(pair), String::new()),
        })
        .collect()
}

fn has_key(params: &[(String, String)], name: &str) -> bool {
    params.iter().any(|(k, _)| k == name)
}

fn value<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

/// The routing decision table.
fn identify_operation(
    method: &Method,
    has_bucket: bool,
    has_object_key: bool,
    params: &[(String, String)],
) -> Result<S3Operation, S3Error> {
    match (method, has_bucket, has_object_key) {
        // Service level.
        (&Method::GET, false, false) => Ok(S3Operation::ListBuckets),
        (_, false, _) => Err(S3Error::method_not_allowed(method.as_str())),

        // Bucket level.
        (&Method::GET, true, false) => {
            if has_key(params, "uploads") {
                Ok(S3Operation::ListMultipartUploads)
            } else if value(params, "list-type") == Some("2") {
                Ok(S3Operation::ListObjectsV2)
            } else {
                Ok(S3Operation::ListObjects)
            }
        }
        (&Method::PUT, true, false) => Ok(S3Operation::CreateBucket),
        (&Method::DELETE, true, false) => Ok(S3Operation::DeleteBucket),
        (_, true, false) => Err(S3Error::method_not_allowed(method.as_str())),

        // Object level.
        (&Method::GET, true, true) => Ok(S3Operation::GetObject),
        (&Method::HEAD, true, true) => Ok(S3Operation::HeadObject),
        (&Method::PUT, true, true) => {
            if has_key(params, "uploadId") && has_key(params, "partNumber") {
                Ok(S3Operation::UploadPart)
            } else {
                Ok(S3Operation::PutObject)
            }
        }
        (&Method::POST, true, true) => {
            if has_key(params, "uploads") {
                Ok(S3Operation::InitiateMultipartUpload)
            } else if has_key(params, "uploadId") {
                Ok(S3Operation::CompleteMultipartUpload)
            } else {
                Err(S3Error::method_not_allowed(method.as_str()))
            }
        }
        (&Method::DELETE, true, true) => {
            if has_key(params, "uploadId") {
                Ok(S3Operation::AbortMultipartUpload)
            } else {
                Ok(S3Operation::DeleteObject)
            }
        }
        (_, true, true) => Err(S3Error::method_not_allowed(method.as_str())),
    }
}
