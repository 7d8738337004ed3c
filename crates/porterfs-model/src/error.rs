//! S3 wire error codes and the error type rendered into `Error` documents.

use std::fmt;

/// Well-known S3 error codes PorterFS produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum S3ErrorCode {
    /// Access denied; also the opaque answer to every signature failure.
    AccessDenied,
    /// The requested bucket name collides with an existing entry.
    BucketAlreadyExists,
    /// The bucket is not empty and cannot be deleted.
    BucketNotEmpty,
    /// The declared object size exceeds the configured cap.
    EntityTooLarge,
    /// Unexpected server-side failure.
    #[default]
    InternalError,
    /// A request argument is invalid (bad key, bad part number, bad token).
    InvalidArgument,
    /// The bucket name violates the naming rules.
    InvalidBucketName,
    /// A listed part is unknown or its ETag does not match the stored bytes.
    InvalidPart,
    /// The requested byte range cannot be satisfied.
    InvalidRange,
    /// The request is malformed (short body, bad XML).
    InvalidRequest,
    /// The HTTP method is not allowed against this resource.
    MethodNotAllowed,
    /// The specified bucket does not exist.
    NoSuchBucket,
    /// The specified key does not exist.
    NoSuchKey,
    /// The specified multipart upload does not exist.
    NoSuchUpload,
    /// The provided signature does not match.
    SignatureDoesNotMatch,
}

impl S3ErrorCode {
    /// Returns the error code string used in the `<Code>` element.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessDenied => "AccessDenied",
            Self::BucketAlreadyExists => "BucketAlreadyExists",
            Self::BucketNotEmpty => "BucketNotEmpty",
            Self::EntityTooLarge => "EntityTooLarge",
            Self::InternalError => "InternalError",
            Self::InvalidArgument => "InvalidArgument",
            Self::InvalidBucketName => "InvalidBucketName",
            Self::InvalidPart => "InvalidPart",
            Self::InvalidRange => "InvalidRange",
            Self::InvalidRequest => "InvalidRequest",
            Self::MethodNotAllowed => "MethodNotAllowed",
            Self::NoSuchBucket => "NoSuchBucket",
            Self::NoSuchKey => "NoSuchKey",
            Self::NoSuchUpload => "NoSuchUpload",
            Self::SignatureDoesNotMatch => "SignatureDoesNotMatch",
        }
    }

    /// Returns the default HTTP status code for this error code.
    #[must_use]
    pub fn default_status_code(&self) -> http::StatusCode {
        match self {
            Self::EntityTooLarge
            | Self::InvalidArgument
            | Self::InvalidBucketName
            | Self::InvalidPart
            | Self::InvalidRequest => http::StatusCode::BAD_REQUEST,
            Self::AccessDenied | Self::SignatureDoesNotMatch => http::StatusCode::FORBIDDEN,
            Self::NoSuchBucket | Self::NoSuchKey | Self::NoSuchUpload => {
                http::StatusCode::NOT_FOUND
            }
            Self::MethodNotAllowed => http::StatusCode::METHOD_NOT_ALLOWED,
            Self::BucketAlreadyExists | Self::BucketNotEmpty => http::StatusCode::CONFLICT,
            Self::InvalidRange => http::StatusCode::RANGE_NOT_SATISFIABLE,
            Self::InternalError => http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for S3ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A wire-facing S3 error: code, human-readable message, and the resource
/// the request addressed. Rendered into the XML `Error` document by the
/// codec; the status code travels with it so the HTTP layer needs no
/// second lookup.
#[derive(Debug, Clone)]
pub struct S3Error {
    /// The S3 error code.
    pub code: S3ErrorCode,
    /// Human-readable message for the `<Message>` element.
    pub message: String,
    /// The resource path the request addressed, if known.
    pub resource: Option<String>,
    /// HTTP status code for the response.
    pub status_code: http::StatusCode,
}

impl S3Error {
    /// Create an error with the given code and message.
    #[must_use]
    pub fn with_message(code: S3ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            resource: None,
            status_code: code.default_status_code(),
        }
    }

    /// Attach the resource path the request addressed.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Access denied. Every signature-verifier failure maps here so the
    /// wire response never reveals which check failed.
    #[must_use]
    pub fn access_denied() -> Self {
        Self::with_message(S3ErrorCode::AccessDenied, "Access Denied")
    }

    /// The specified bucket does not exist.
    #[must_use]
    pub fn no_such_bucket(bucket: &str) -> Self {
        Self::with_message(
            S3ErrorCode::NoSuchBucket,
            format!("The specified bucket does not exist: {bucket}"),
        )
    }

    /// The specified key does not exist.
    #[must_use]
    pub fn no_such_key(key: &str) -> Self {
        Self::with_message(
            S3ErrorCode::NoSuchKey,
            format!("The specified key does not exist: {key}"),
        )
    }

    /// The specified multipart upload does not exist.
    #[must_use]
    pub fn no_such_upload(upload_id: &str) -> Self {
        Self::with_message(
            S3ErrorCode::NoSuchUpload,
            format!("The specified upload does not exist: {upload_id}"),
        )
    }

    /// An invalid request argument.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::with_message(S3ErrorCode::InvalidArgument, message)
    }

    /// The HTTP method is not allowed against this resource.
    #[must_use]
    pub fn method_not_allowed(method: &str) -> Self {
        Self::with_message(
            S3ErrorCode::MethodNotAllowed,
            format!("The method {method} is not allowed against this resource"),
        )
    }

    /// Unexpected server-side failure.
    #[must_use]
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::with_message(S3ErrorCode::InternalError, message)
    }
}

impl fmt::Display for S3Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for S3Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_map_codes_to_status() {
        assert_eq!(
            S3ErrorCode::NoSuchKey.default_status_code(),
            http::StatusCode::NOT_FOUND
        );
        assert_eq!(
            S3ErrorCode::BucketNotEmpty.default_status_code(),
            http::StatusCode::CONFLICT
        );
        assert_eq!(
            S3ErrorCode::InvalidRange.default_status_code(),
            http::StatusCode::RANGE_NOT_SATISFIABLE
        );
        assert_eq!(
            S3ErrorCode::AccessDenied.default_status_code(),
            http::StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_should_build_error_with_resource() {
        let err = S3Error::no_such_bucket("b1").with_resource("/b1");
        assert_eq!(err.code, S3ErrorCode::NoSuchBucket);
        assert_eq!(err.status_code, http::StatusCode::NOT_FOUND);
        assert_eq!(err.resource.as_deref(), Some("/b1"));
        assert!(err.message.contains("b1"));
    }

    #[test]
    fn test_should_keep_access_denied_opaque() {
        let err = S3Error::access_denied();
        assert_eq!(err.message, "Access Denied");
        assert_eq!(err.status_code, http::StatusCode::FORBIDDEN);
    }
}
