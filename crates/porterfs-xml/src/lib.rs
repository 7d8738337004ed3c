//! S3 wire codec for PorterFS.
//!
//! Renders the listing and multipart reply documents and the `Error`
//! document in S3's RestXml shape, and parses the one XML request body the
//! server accepts (`CompleteMultipartUpload`). Element names, nesting, the
//! `http://s3.amazonaws.com/doc/2006-03-01/` namespace, and ISO-8601
//! millisecond timestamps follow the S3 wire format.

pub mod complete;
pub mod error;
pub mod serialize;

pub use complete::parse_complete_multipart_upload;
pub use error::{error_to_xml, XmlError};
pub use serialize::{to_xml, ListBucketV1, ListBucketV2, S3Serialize};
