//! Response construction helpers.
//!
//! Everything that turns storage results and errors into HTTP responses
//! lives here: status codes, object metadata headers, and the XML error
//! document shape.

use http::header::HeaderValue;
use http::StatusCode;

use porterfs_model::S3Error;
use porterfs_store::ObjectInfo;

use crate::body::ResponseBody;

/// An empty response with the given status.
pub fn empty(status: StatusCode) -> http::Response<ResponseBody> {
    http::Response::builder()
        .status(status)
        .body(ResponseBody::empty())
        .expect("static response should be valid")
}

/// A 200 response carrying an XML document.
pub fn xml(document: Vec<u8>) -> http::Response<ResponseBody> {
    http::Response::builder()
        .status(StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "application/xml")
        .body(ResponseBody::from_xml(document))
        .expect("static response should be valid")
}

/// Format a timestamp as an RFC 1123 HTTP date.
pub fn http_date(dt: &chrono::DateTime<chrono::Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Apply the object metadata headers shared by GetObject and HeadObject:
/// `Content-Type`, `Content-Length`, `ETag`, `Last-Modified`,
/// `Accept-Ranges`, and for range reads `Content-Range`.
pub fn object_headers(
    mut builder: http::response::Builder,
    info: &ObjectInfo,
) -> http::response::Builder {
    builder = builder
        .header(http::header::CONTENT_TYPE, info.content_type.as_str())
        .header(http::header::CONTENT_LENGTH, info.size)
        .header(http::header::ETAG, info.etag.as_str())
        .header(http::header::LAST_MODIFIED, http_date(&info.last_modified))
        .header(http::header::ACCEPT_RANGES, "bytes");

    if let Some(range) = &info.range {
        builder = builder.header(
            http::header::CONTENT_RANGE,
            format!("bytes {}-{}/{}", range.start, range.end, range.total),
        );
    }
    builder
}

/// Render an [`S3Error`] as its XML `Error` document response.
pub fn error_response(err: &S3Error, request_id: &str) -> http::Response<ResponseBody> {
    let document = porterfs_xml::error_to_xml(
        err.code.as_str(),
        &err.message,
        err.resource.as_deref(),
        request_id,
    );

    http::Response::builder()
        .status(err.status_code)
        .header(http::header::CONTENT_TYPE, "application/xml")
        .body(ResponseBody::from_xml(document))
        .unwrap_or_else(|_| empty(StatusCode::INTERNAL_SERVER_ERROR))
}

/// Add the headers every response carries.
pub fn add_common_headers(
    mut response: http::Response<ResponseBody>,
    request_id: &str,
) -> http::Response<ResponseBody> {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(request_id) {
        headers.insert("x-amz-request-id", value);
    }
    headers.insert("Server", HeaderValue::from_static("PorterFS"));
    response
}
