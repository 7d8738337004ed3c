//! Operation handlers: the bridge from routed requests to the storage
//! engine and back to HTTP responses.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use http::StatusCode;
use tracing::debug;

use porterfs_model::output::{
    BucketSummary, CompletedUpload, InitiatedUpload, ListAllMyBuckets, ListBucketPage,
    ListUploadsPage, ObjectSummary, Owner, UploadSummary,
};
use porterfs_model::{ByteStream, S3Error, S3ErrorCode, S3Operation};
use porterfs_store::{ListOptions, StoreError};
use porterfs_xml::{to_xml, ListBucketV1, ListBucketV2};

use crate::body::{self, ResponseBody};
use crate::response::{empty, error_response, object_headers, xml};
use crate::router::RoutingContext;
use crate::service::AppState;

/// Default and maximum `max-keys` for listings.
const DEFAULT_MAX_KEYS: u32 = 1000;

type HandlerResult = Result<http::Response<ResponseBody>, S3Error>;

/// Dispatch a routed request to its operation handler.
pub async fn dispatch(
    state: &AppState,
    parts: &http::request::Parts,
    request_body: ByteStream,
    ctx: &RoutingContext,
) -> HandlerResult {
    debug!(
        operation = %ctx.operation,
        bucket = ?ctx.bucket,
        key = ?ctx.key,
        "dispatching S3 operation"
    );

    let resource = parts.uri.path().to_owned();
    let result = match ctx.operation {
        S3Operation::ListBuckets => list_buckets(state).await,
        S3Operation::CreateBucket => create_bucket(state, ctx).await,
        S3Operation::DeleteBucket => delete_bucket(state, ctx).await,
        S3Operation::ListObjects => list_objects(state, ctx, ListVersion::V1).await,
        S3Operation::ListObjectsV2 => list_objects(state, ctx, ListVersion::V2).await,
        S3Operation::ListMultipartUploads => list_multipart_uploads(state, ctx).await,
        S3Operation::GetObject => get_object(state, parts, ctx).await,
        S3Operation::HeadObject => head_object(state, ctx).await,
        S3Operation::PutObject => put_object(state, parts, request_body, ctx).await,
        S3Operation::UploadPart => upload_part(state, parts, request_body, ctx).await,
        S3Operation::InitiateMultipartUpload => initiate_multipart(state, ctx).await,
        S3Operation::CompleteMultipartUpload => complete_multipart(state, request_body, ctx).await,
        S3Operation::AbortMultipartUpload => abort_multipart(state, ctx).await,
        S3Operation::DeleteObject => delete_object(state, ctx).await,
    };

    result.map_err(|err| {
        if err.resource.is_none() {
            err.with_resource(resource)
        } else {
            err
        }
    })
}

/// The two wire shapes of a bucket listing.
#[derive(Debug, Clone, Copy)]
enum ListVersion {
    V1,
    V2,
}

fn bucket_of(ctx: &RoutingContext) -> Result<&str, S3Error> {
    ctx.bucket
        .as_deref()
        .ok_or_else(|| S3Error::invalid_argument("bucket name required"))
}

fn key_of(ctx: &RoutingContext) -> Result<&str, S3Error> {
    ctx.key
        .as_deref()
        .ok_or_else(|| S3Error::invalid_argument("object key required"))
}

fn content_length(parts: &http::request::Parts) -> Option<u64> {
    parts
        .headers
        .get(http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

async fn list_buckets(state: &AppState) -> HandlerResult {
    let buckets = state.store.list_buckets().await.map_err(store_error)?;
    let document = ListAllMyBuckets {
        owner: Owner::default(),
        buckets: buckets
            .into_iter()
            .map(|b| BucketSummary {
                name: b.name,
                creation_date: b.created,
            })
            .collect(),
    };
    Ok(xml(encode_xml("ListAllMyBucketsResult", &document)?))
}

async fn create_bucket(state: &AppState, ctx: &RoutingContext) -> HandlerResult {
    let bucket = bucket_of(ctx)?;
    state.store.create_bucket(bucket).await.map_err(store_error)?;

    let response = http::Response::builder()
        .status(StatusCode::OK)
        .header(http::header::LOCATION, format!("/{bucket}"))
        .body(ResponseBody::empty())
        .map_err(|e| S3Error::internal_error(e.to_string()))?;
    Ok(response)
}

async fn delete_bucket(state: &AppState, ctx: &RoutingContext) -> HandlerResult {
    state
        .store
        .delete_bucket(bucket_of(ctx)?)
        .await
        .map_err(store_error)?;
    Ok(empty(StatusCode::NO_CONTENT))
}

async fn list_objects(state: &AppState, ctx: &RoutingContext, version: ListVersion) -> HandlerResult {
    let bucket = bucket_of(ctx)?;
    let prefix = ctx.query_value("prefix").unwrap_or("").to_owned();
    let delimiter = ctx
        .query_value("delimiter")
        .filter(|d| !d.is_empty())
        .map(ToOwned::to_owned);
    let max_keys = match ctx.query_value("max-keys") {
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|_| S3Error::invalid_argument("max-keys must be a non-negative integer"))?
            .min(DEFAULT_MAX_KEYS),
        None => DEFAULT_MAX_KEYS,
    };

    // Continuation tokens are opaque on the wire: base64 of the last item.
    let continuation_token = match version {
        ListVersion::V2 => ctx.query_value("continuation-token").map(ToOwned::to_owned),
        ListVersion::V1 => None,
    };
    let continuation = continuation_token
        .as_deref()
        .map(decode_continuation)
        .transpose()?;

    let opts = ListOptions {
        prefix: prefix.clone(),
        delimiter: delimiter.clone(),
        max_keys,
        continuation,
    };
    let page = state.store.list_objects(bucket, &opts).await.map_err(store_error)?;

    let document = ListBucketPage {
        bucket: bucket.to_owned(),
        prefix,
        delimiter,
        max_keys,
        is_truncated: page.is_truncated,
        contents: page
            .contents
            .into_iter()
            .map(|o| ObjectSummary {
                key: o.key,
                last_modified: o.last_modified,
                etag: o.etag,
                size: o.size,
            })
            .collect(),
        common_prefixes: page.common_prefixes,
        continuation_token,
        next_continuation_token: page.next_continuation.as_deref().map(encode_continuation),
    };

    let rendered = match version {
        ListVersion::V1 => encode_xml("ListBucketResult", &ListBucketV1(&document))?,
        ListVersion::V2 => encode_xml("ListBucketResult", &ListBucketV2(&document))?,
    };
    Ok(xml(rendered))
}

async fn list_multipart_uploads(state: &AppState, ctx: &RoutingContext) -> HandlerResult {
    let bucket = bucket_of(ctx)?;
    let uploads = state
        .store
        .list_multipart_uploads(bucket)
        .await
        .map_err(store_error)?;

    let document = ListUploadsPage {
        bucket: bucket.to_owned(),
        uploads: uploads
            .into_iter()
            .map(|u| UploadSummary {
                key: u.key,
                upload_id: u.upload_id,
                initiated: u.initiated,
            })
            .collect(),
    };
    Ok(xml(encode_xml("ListMultipartUploadsResult", &document)?))
}

async fn get_object(
    state: &AppState,
    parts: &http::request::Parts,
    ctx: &RoutingContext,
) -> HandlerResult {
    let bucket = bucket_of(ctx)?;
    let key = key_of(ctx)?;
    let range = parts
        .headers
        .get(http::header::RANGE)
        .and_then(|v| v.to_str().ok());

    let (reader, info) = state
        .store
        .get_object(bucket, key, range)
        .await
        .map_err(store_error)?;

    let status = if info.range.is_some() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };
    let builder = object_headers(http::Response::builder().status(status), &info);
    builder
        .body(ResponseBody::streaming(reader))
        .map_err(|e| S3Error::internal_error(e.to_string()))
}

async fn head_object(state: &AppState, ctx: &RoutingContext) -> HandlerResult {
    let info = state
        .store
        .head_object(bucket_of(ctx)?, key_of(ctx)?)
        .await
        .map_err(store_error)?;

    let builder = object_headers(http::Response::builder().status(StatusCode::OK), &info);
    builder
        .body(ResponseBody::empty())
        .map_err(|e| S3Error::internal_error(e.to_string()))
}

async fn put_object(
    state: &AppState,
    parts: &http::request::Parts,
    request_body: ByteStream,
    ctx: &RoutingContext,
) -> HandlerResult {
    let outcome = state
        .store
        .put_object(
            bucket_of(ctx)?,
            key_of(ctx)?,
            request_body,
            content_length(parts),
        )
        .await
        .map_err(store_error)?;

    let response = http::Response::builder()
        .status(StatusCode::OK)
        .header(http::header::ETAG, outcome.etag.as_str())
        .body(ResponseBody::empty())
        .map_err(|e| S3Error::internal_error(e.to_string()))?;
    Ok(response)
}

async fn upload_part(
    state: &AppState,
    parts: &http::request::Parts,
    request_body: ByteStream,
    ctx: &RoutingContext,
) -> HandlerResult {
    let bucket = bucket_of(ctx)?;
    let upload_id = ctx
        .query_value("uploadId")
        .ok_or_else(|| S3Error::invalid_argument("uploadId required"))?;
    let part_number: u32 = ctx
        .query_value("partNumber")
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| S3Error::invalid_argument("partNumber must be an integer"))?;

    let etag = state
        .store
        .upload_part(
            bucket,
            upload_id,
            part_number,
            request_body,
            content_length(parts),
        )
        .await
        .map_err(store_error)?;

    let response = http::Response::builder()
        .status(StatusCode::OK)
        .header(http::header::ETAG, etag)
        .body(ResponseBody::empty())
        .map_err(|e| S3Error::internal_error(e.to_string()))?;
    Ok(response)
}

async fn initiate_multipart(state: &AppState, ctx: &RoutingContext) -> HandlerResult {
    let bucket = bucket_of(ctx)?;
    let key = key_of(ctx)?;
    let upload_id = state
        .store
        .init_multipart(bucket, key)
        .await
        .map_err(store_error)?;

    let document = InitiatedUpload {
        bucket: bucket.to_owned(),
        key: key.to_owned(),
        upload_id,
    };
    Ok(xml(encode_xml("InitiateMultipartUploadResult", &document)?))
}

async fn complete_multipart(
    state: &AppState,
    request_body: ByteStream,
    ctx: &RoutingContext,
) -> HandlerResult {
    let bucket = bucket_of(ctx)?;
    let key = key_of(ctx)?;
    let upload_id = ctx
        .query_value("uploadId")
        .ok_or_else(|| S3Error::invalid_argument("uploadId required"))?;

    let raw = body::collect(request_body)
        .await
        .map_err(|e| S3Error::internal_error(format!("failed to read request body: {e}")))?;
    let parts = porterfs_xml::parse_complete_multipart_upload(&raw).map_err(|e| {
        S3Error::with_message(
            S3ErrorCode::InvalidRequest,
            format!("malformed CompleteMultipartUpload body: {e}"),
        )
    })?;
    if parts.is_empty() {
        return Err(S3Error::with_message(
            S3ErrorCode::InvalidRequest,
            "CompleteMultipartUpload requires at least one part",
        ));
    }

    let etag = state
        .store
        .complete_multipart(bucket, key, upload_id, &parts)
        .await
        .map_err(store_error)?;

    let document = CompletedUpload {
        location: format!("/{bucket}/{key}"),
        bucket: bucket.to_owned(),
        key: key.to_owned(),
        etag,
    };
    Ok(xml(encode_xml("CompleteMultipartUploadResult", &document)?))
}

async fn abort_multipart(state: &AppState, ctx: &RoutingContext) -> HandlerResult {
    let upload_id = ctx
        .query_value("uploadId")
        .ok_or_else(|| S3Error::invalid_argument("uploadId required"))?;
    state
        .store
        .abort_multipart(bucket_of(ctx)?, upload_id)
        .await
        .map_err(store_error)?;
    Ok(empty(StatusCode::NO_CONTENT))
}

async fn delete_object(state: &AppState, ctx: &RoutingContext) -> HandlerResult {
    state
        .store
        .delete_object(bucket_of(ctx)?, key_of(ctx)?)
        .await
        .map_err(store_error)?;
    Ok(empty(StatusCode::NO_CONTENT))
}

fn encode_xml<T: porterfs_xml::S3Serialize>(root: &str, value: &T) -> Result<Vec<u8>, S3Error> {
    to_xml(root, value).map_err(|e| S3Error::internal_error(format!("XML encoding failed: {e}")))
}

fn encode_continuation(item: &str) -> String {
    BASE64.encode(item)
}

fn decode_continuation(token: &str) -> Result<String, S3Error> {
    let bytes = BASE64
        .decode(token)
        .map_err(|_| S3Error::invalid_argument("invalid continuation-token"))?;
    String::from_utf8(bytes).map_err(|_| S3Error::invalid_argument("invalid continuation-token"))
}

/// The single mapping from storage errors to wire errors.
fn store_error(err: StoreError) -> S3Error {
    match err {
        StoreError::InvalidBucketName { name, reason } => S3Error::with_message(
            S3ErrorCode::InvalidBucketName,
            format!("invalid bucket name {name:?}: {reason}"),
        ),
        StoreError::InvalidKey { reason } => S3Error::invalid_argument(format!("invalid key: {reason}")),
        StoreError::BucketNotFound { bucket } => S3Error::no_such_bucket(&bucket),
        StoreError::ObjectNotFound { key } => S3Error::no_such_key(&key),
        StoreError::BucketNotEmpty { bucket } => S3Error::with_message(
            S3ErrorCode::BucketNotEmpty,
            format!("the bucket you tried to delete is not empty: {bucket}"),
        ),
        StoreError::BucketConflict { bucket } => S3Error::with_message(
            S3ErrorCode::BucketAlreadyExists,
            format!("the requested bucket name is not available: {bucket}"),
        ),
        StoreError::NoSuchUpload { upload_id } => S3Error::no_such_upload(&upload_id),
        StoreError::InvalidPart { part_number } => S3Error::with_message(
            S3ErrorCode::InvalidPart,
            format!("part {part_number} was not found or its ETag does not match"),
        ),
        StoreError::InvalidPartNumber { part_number } => S3Error::invalid_argument(format!(
            "part number {part_number} must be between 1 and 10000"
        )),
        StoreError::InvalidRange { spec, size } => S3Error::with_message(
            S3ErrorCode::InvalidRange,
            format!("the requested range {spec:?} is not satisfiable for a {size}-byte object"),
        ),
        StoreError::SizeMismatch { declared, actual } => S3Error::with_message(
            S3ErrorCode::InvalidRequest,
            format!("request body ended after {actual} of {declared} declared bytes"),
        ),
        StoreError::EntityTooLarge { declared, limit } => S3Error::with_message(
            S3ErrorCode::EntityTooLarge,
            format!("declared size {declared} exceeds the {limit}-byte limit"),
        ),
        StoreError::Io(e) => {
            tracing::error!(error = %e, "storage I/O failure");
            S3Error::internal_error("unexpected storage failure")
        }
    }
}

/// Render an error produced before or during dispatch.
pub fn to_error_response(err: &S3Error, request_id: &str) -> http::Response<ResponseBody> {
    error_response(err, request_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_map_store_errors_to_wire_codes() {
        let cases: Vec<(StoreError, S3ErrorCode, StatusCode)> = vec![
            (
                StoreError::BucketNotFound {
                    bucket: "b".into(),
                },
                S3ErrorCode::NoSuchBucket,
                StatusCode::NOT_FOUND,
            ),
            (
                StoreError::ObjectNotFound { key: "k".into() },
                S3ErrorCode::NoSuchKey,
                StatusCode::NOT_FOUND,
            ),
            (
                StoreError::BucketNotEmpty {
                    bucket: "b".into(),
                },
                S3ErrorCode::BucketNotEmpty,
                StatusCode::CONFLICT,
            ),
            (
                StoreError::BucketConflict {
                    bucket: "b".into(),
                },
                S3ErrorCode::BucketAlreadyExists,
                StatusCode::CONFLICT,
            ),
            (
                StoreError::NoSuchUpload {
                    upload_id: "u".into(),
                },
                S3ErrorCode::NoSuchUpload,
                StatusCode::NOT_FOUND,
            ),
            (
                StoreError::InvalidPart { part_number: 3 },
                S3ErrorCode::InvalidPart,
                StatusCode::BAD_REQUEST,
            ),
            (
                StoreError::InvalidRange {
                    spec: "bytes=9-5".into(),
                    size: 3,
                },
                S3ErrorCode::InvalidRange,
                StatusCode::RANGE_NOT_SATISFIABLE,
            ),
            (
                StoreError::InvalidKey {
                    reason: "escapes the storage root",
                },
                S3ErrorCode::InvalidArgument,
                StatusCode::BAD_REQUEST,
            ),
        ];

        for (store_err, code, status) in cases {
            let err = store_error(store_err);
            assert_eq!(err.code, code);
            assert_eq!(err.status_code, status);
        }
    }

    #[test]
    fn test_should_round_trip_continuation_tokens() {
        let token = encode_continuation("photos/2024/");
        assert_eq!(decode_continuation(&token).unwrap(), "photos/2024/");
        assert!(decode_continuation("!!!not-base64!!!").is_err());
    }
}
