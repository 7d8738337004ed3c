//! Signature verification error kinds.

/// Why a request failed signature verification.
///
/// The kinds are precise so logs can tell a missing header from a genuine
/// mismatch, but none of this detail may reach the wire: the HTTP layer
/// answers every kind with the same opaque 403.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The request carries no `Authorization` header.
    #[error("missing Authorization header")]
    MissingAuthorization,

    /// The signing algorithm is not `AWS4-HMAC-SHA256`.
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The `Authorization` header is present but cannot be parsed, or a
    /// header named in `SignedHeaders` is absent from the request.
    #[error("malformed Authorization header")]
    MalformedAuthorization,

    /// The credential scope is not `key/date/region/service/aws4_request`,
    /// the `x-amz-date` header is missing or unparsable, or the request
    /// timestamp falls outside the configured clock-skew window.
    #[error("invalid credential scope")]
    InvalidCredentialScope,

    /// The access key in the credential scope is not known.
    #[error("unknown access key: {0}")]
    UnknownAccessKey(String),

    /// The computed signature does not match the one supplied.
    #[error("signature mismatch")]
    SignatureMismatch,
}
