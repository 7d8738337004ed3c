//! The S3 operations PorterFS serves.

use std::fmt;

/// An S3 operation, identified by the router from the method, path shape,
/// and selector query parameters of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum S3Operation {
    /// `GET /` - list all buckets.
    ListBuckets,
    /// `PUT /{bucket}` - create a bucket.
    CreateBucket,
    /// `DELETE /{bucket}` - delete an empty bucket.
    DeleteBucket,
    /// `GET /{bucket}` - list objects (v1).
    ListObjects,
    /// `GET /{bucket}?list-type=2` - list objects (v2).
    ListObjectsV2,
    /// `GET /{bucket}?uploads` - list in-progress multipart uploads.
    ListMultipartUploads,
    /// `GET /{bucket}/{key}` - read an object, honoring `Range`.
    GetObject,
    /// `HEAD /{bucket}/{key}` - object metadata only.
    HeadObject,
    /// `PUT /{bucket}/{key}` - store an object.
    PutObject,
    /// `PUT /{bucket}/{key}?partNumber=N&uploadId=U` - upload one part.
    UploadPart,
    /// `POST /{bucket}/{key}?uploads` - start a multipart upload.
    InitiateMultipartUpload,
    /// `POST /{bucket}/{key}?uploadId=U` - assemble parts into the object.
    CompleteMultipartUpload,
    /// `DELETE /{bucket}/{key}?uploadId=U` - discard a multipart upload.
    AbortMultipartUpload,
    /// `DELETE /{bucket}/{key}` - delete an object.
    DeleteObject,
}

impl S3Operation {
    /// Returns the operation name as used in logs and error messages.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListBuckets => "ListBuckets",
            Self::CreateBucket => "CreateBucket",
            Self::DeleteBucket => "DeleteBucket",
            Self::ListObjects => "ListObjects",
            Self::ListObjectsV2 => "ListObjectsV2",
            Self::ListMultipartUploads => "ListMultipartUploads",
            Self::GetObject => "GetObject",
            Self::HeadObject => "HeadObject",
            Self::PutObject => "PutObject",
            Self::UploadPart => "UploadPart",
            Self::InitiateMultipartUpload => "InitiateMultipartUpload",
            Self::CompleteMultipartUpload => "CompleteMultipartUpload",
            Self::AbortMultipartUpload => "AbortMultipartUpload",
            Self::DeleteObject => "DeleteObject",
        }
    }
}

impl fmt::Display for S3Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
