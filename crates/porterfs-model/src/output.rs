//! Typed records for the XML documents PorterFS returns.
//!
//! These are the payload side of the wire codec: the dispatcher fills them
//! from storage results and `porterfs-xml` renders them. Field names follow
//! the S3 element names they map to.

use chrono::{DateTime, Utc};

/// The bucket owner reported in `ListAllMyBucketsResult`.
///
/// PorterFS is single-tenant, so this is a fixed identity.
#[derive(Debug, Clone)]
pub struct Owner {
    /// Canonical owner ID.
    pub id: String,
    /// Display name.
    pub display_name: String,
}

impl Default for Owner {
    fn default() -> Self {
        Self {
            id: "porterfs".to_owned(),
            display_name: "porterfs".to_owned(),
        }
    }
}

/// One `<Bucket>` entry in `ListAllMyBucketsResult`.
#[derive(Debug, Clone)]
pub struct BucketSummary {
    /// Bucket name.
    pub name: String,
    /// Creation time (directory mtime).
    pub creation_date: DateTime<Utc>,
}

/// The `ListAllMyBucketsResult` document.
#[derive(Debug, Clone, Default)]
pub struct ListAllMyBuckets {
    /// The owner of every bucket.
    pub owner: Owner,
    /// All buckets, sorted by name.
    pub buckets: Vec<BucketSummary>,
}

/// One `<Contents>` entry in a `ListBucketResult`.
#[derive(Debug, Clone)]
pub struct ObjectSummary {
    /// Object key relative to the bucket.
    pub key: String,
    /// Last modification time.
    pub last_modified: DateTime<Utc>,
    /// Quoted hex MD5 ETag.
    pub etag: String,
    /// Object size in bytes.
    pub size: u64,
}

/// A page of a bucket listing, rendered as `ListBucketResult` (v1 or v2).
#[derive(Debug, Clone, Default)]
pub struct ListBucketPage {
    /// Bucket name.
    pub bucket: String,
    /// The prefix filter that was applied.
    pub prefix: String,
    /// The delimiter used for grouping, if any.
    pub delimiter: Option<String>,
    /// The effective max-keys cap.
    pub max_keys: u32,
    /// Whether more results remain past this page.
    pub is_truncated: bool,
    /// Keys on this page, lexicographically ordered.
    pub contents: Vec<ObjectSummary>,
    /// Delimiter groups on this page, lexicographically ordered.
    pub common_prefixes: Vec<String>,
    /// The continuation token the client supplied (v2 only).
    pub continuation_token: Option<String>,
    /// Token for the next page when truncated (v2 only).
    pub next_continuation_token: Option<String>,
}

/// The `InitiateMultipartUploadResult` document.
#[derive(Debug, Clone)]
pub struct InitiatedUpload {
    /// Bucket the upload targets.
    pub bucket: String,
    /// Key the upload targets.
    pub key: String,
    /// The server-generated upload ID.
    pub upload_id: String,
}

/// The `CompleteMultipartUploadResult` document.
#[derive(Debug, Clone)]
pub struct CompletedUpload {
    /// Path-style location of the assembled object.
    pub location: String,
    /// Bucket of the assembled object.
    pub bucket: String,
    /// Key of the assembled object.
    pub key: String,
    /// Composite ETag of the assembled object.
    pub etag: String,
}

/// One `<Upload>` entry in `ListMultipartUploadsResult`.
#[derive(Debug, Clone)]
pub struct UploadSummary {
    /// Key the upload targets.
    pub key: String,
    /// The upload ID.
    pub upload_id: String,
    /// When the upload was initiated.
    pub initiated: DateTime<Utc>,
}

/// The `ListMultipartUploadsResult` document.
#[derive(Debug, Clone, Default)]
pub struct ListUploadsPage {
    /// Bucket whose uploads are listed.
    pub bucket: String,
    /// Open uploads, in manifest order.
    pub uploads: Vec<UploadSummary>,
}

/// One `<Part>` of a `CompleteMultipartUpload` request body.
///
/// The order of parts is client-controlled and preserved; the storage engine
/// concatenates in exactly this order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    /// Part number in `[1, 10000]`.
    pub part_number: u32,
    /// Client-supplied ETag for the part, quoted or bare hex.
    pub etag: String,
}
