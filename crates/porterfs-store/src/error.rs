//! Storage engine error types.

use std::io;

/// Errors produced by the storage engine.
///
/// These are typed domain errors; the HTTP layer is the sole place they are
/// translated into wire status codes and S3 error documents.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The bucket name violates the naming rules.
    #[error("invalid bucket name {name:?}: {reason}")]
    InvalidBucketName {
        /// The offending name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The key is empty, contains NUL, or escapes the storage root.
    #[error("invalid object key: {reason}")]
    InvalidKey {
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The bucket does not exist.
    #[error("bucket not found: {bucket}")]
    BucketNotFound {
        /// The missing bucket.
        bucket: String,
    },

    /// The object does not exist.
    #[error("object not found: {key}")]
    ObjectNotFound {
        /// The missing key.
        key: String,
    },

    /// The bucket still contains entries.
    #[error("bucket not empty: {bucket}")]
    BucketNotEmpty {
        /// The non-empty bucket.
        bucket: String,
    },

    /// A non-directory entry already exists at the bucket name.
    #[error("bucket name collides with an existing entry: {bucket}")]
    BucketConflict {
        /// The colliding name.
        bucket: String,
    },

    /// The multipart upload is unknown (never started, completed, or aborted).
    #[error("no such multipart upload: {upload_id}")]
    NoSuchUpload {
        /// The unknown upload ID.
        upload_id: String,
    },

    /// A listed part is unknown or its ETag does not match the stored bytes.
    #[error("invalid part {part_number}")]
    InvalidPart {
        /// The offending part number.
        part_number: u32,
    },

    /// The part number is outside `[1, 10000]`.
    #[error("part number {part_number} out of range")]
    InvalidPartNumber {
        /// The offending part number.
        part_number: u32,
    },

    /// The Range header is unparsable or out of bounds for the object.
    #[error("unsatisfiable range {spec:?} for size {size}")]
    InvalidRange {
        /// The raw range spec.
        spec: String,
        /// The object size.
        size: u64,
    },

    /// Fewer or more bytes arrived than the request declared.
    #[error("body size mismatch: declared {declared}, received {actual}")]
    SizeMismatch {
        /// Declared content length.
        declared: u64,
        /// Bytes actually received.
        actual: u64,
    },

    /// The declared size exceeds the configured advisory cap.
    #[error("declared size {declared} exceeds the {limit}-byte cap")]
    EntityTooLarge {
        /// Declared content length.
        declared: u64,
        /// The configured cap.
        limit: u64,
    },

    /// Unexpected filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Convenience result alias for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;
