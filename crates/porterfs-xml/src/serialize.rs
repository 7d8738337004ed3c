//! XML serialization of PorterFS response documents.
//!
//! The [`S3Serialize`] trait writes a value's child elements into an open
//! document; [`to_xml`] wraps that with the XML declaration and the
//! namespaced root element. Conventions per the S3 RestXml protocol:
//!
//! - Namespace: `http://s3.amazonaws.com/doc/2006-03-01/`
//! - Booleans: lowercase `true`/`false`
//! - Timestamps: ISO 8601 with milliseconds (`2026-02-03T16:45:09.000Z`)

use std::io::{self, Write};

use quick_xml::events::{BytesText, Event};
use quick_xml::Writer;

use porterfs_model::output::{
    CompletedUpload, InitiatedUpload, ListAllMyBuckets, ListBucketPage, ListUploadsPage,
};

use crate::error::XmlError;

/// The S3 XML namespace.
pub const S3_NAMESPACE: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

/// Trait for serializing response types to XML.
///
/// Implementors write their content as child elements of the root; the root
/// element name and namespace are handled by [`to_xml`].
///
/// Uses `io::Result` because `quick_xml::Writer` inner-content closures
/// require `io::Result<()>`.
pub trait S3Serialize {
    /// Serialize this value as XML child elements into the given writer.
    ///
    /// # Errors
    ///
    /// Returns `io::Error` if writing to the underlying writer fails.
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()>;
}

/// Serialize a value as a complete S3 XML document.
///
/// # Errors
///
/// Returns `XmlError` if serialization fails.
pub fn to_xml<T: S3Serialize>(root_element: &str, value: &T) -> Result<Vec<u8>, XmlError> {
    let mut buf = Vec::with_capacity(512);
    let mut writer = Writer::new(&mut buf);

    writer.write_event(Event::Decl(quick_xml::events::BytesDecl::new(
        "1.0",
        Some("UTF-8"),
        None,
    )))?;

    writer
        .create_element(root_element)
        .with_attribute(("xmlns", S3_NAMESPACE))
        .write_inner_content(|w| value.serialize_xml(w))?;

    Ok(buf)
}

/// Write a simple `<tag>text</tag>` element.
fn write_text_element<W: Write>(writer: &mut Writer<W>, tag: &str, text: &str) -> io::Result<()> {
    writer
        .create_element(tag)
        .write_text_content(BytesText::new(text))?;
    Ok(())
}

/// Write `<tag>true|false</tag>`.
fn write_bool_element<W: Write>(writer: &mut Writer<W>, tag: &str, value: bool) -> io::Result<()> {
    write_text_element(writer, tag, if value { "true" } else { "false" })
}

/// Format a timestamp as ISO 8601 with millisecond precision.
fn format_timestamp(dt: &chrono::DateTime<chrono::Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

impl S3Serialize for ListAllMyBuckets {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        writer.create_element("Owner").write_inner_content(|w| {
            write_text_element(w, "ID", &self.owner.id)?;
            write_text_element(w, "DisplayName", &self.owner.display_name)?;
            Ok(())
        })?;
        writer.create_element("Buckets").write_inner_content(|w| {
            for bucket in &self.buckets {
                w.create_element("Bucket").write_inner_content(|b| {
                    write_text_element(b, "Name", &bucket.name)?;
                    write_text_element(b, "CreationDate", &format_timestamp(&bucket.creation_date))?;
                    Ok(())
                })?;
            }
            Ok(())
        })?;
        Ok(())
    }
}

/// Shared body of both `ListBucketResult` versions: contents and prefixes.
fn write_list_entries<W: Write>(writer: &mut Writer<W>, page: &ListBucketPage) -> io::Result<()> {
    for object in &page.contents {
        writer.create_element("Contents").write_inner_content(|w| {
            write_text_element(w, "Key", &object.key)?;
            write_text_element(w, "LastModified", &format_timestamp(&object.last_modified))?;
            write_text_element(w, "ETag", &object.etag)?;
            write_text_element(w, "Size", &object.size.to_string())?;
            write_text_element(w, "StorageClass", "STANDARD")?;
            Ok(())
        })?;
    }
    for prefix in &page.common_prefixes {
        writer
            .create_element("CommonPrefixes")
            .write_inner_content(|w| write_text_element(w, "Prefix", prefix))?;
    }
    Ok(())
}

/// `ListBucketResult` in the v1 shape.
#[derive(Debug)]
pub struct ListBucketV1<'a>(pub &'a ListBucketPage);

impl S3Serialize for ListBucketV1<'_> {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        let page = self.0;
        write_text_element(writer, "Name", &page.bucket)?;
        write_text_element(writer, "Prefix", &page.prefix)?;
        if let Some(delimiter) = &page.delimiter {
            write_text_element(writer, "Delimiter", delimiter)?;
        }
        write_text_element(writer, "MaxKeys", &page.max_keys.to_string())?;
        write_bool_element(writer, "IsTruncated", page.is_truncated)?;
        write_list_entries(writer, page)?;
        Ok(())
    }
}

/// `ListBucketResult` in the v2 shape, with `KeyCount` and the
/// continuation-token pair.
#[derive(Debug)]
pub struct ListBucketV2<'a>(pub &'a ListBucketPage);

impl S3Serialize for ListBucketV2<'_> {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        let page = self.0;
        write_text_element(writer, "Name", &page.bucket)?;
        write_text_element(writer, "Prefix", &page.prefix)?;
        if let Some(delimiter) = &page.delimiter {
            write_text_element(writer, "Delimiter", delimiter)?;
        }
        let key_count = page.contents.len() + page.common_prefixes.len();
        write_text_element(writer, "KeyCount", &key_count.to_string())?;
        write_text_element(writer, "MaxKeys", &page.max_keys.to_string())?;
        write_bool_element(writer, "IsTruncated", page.is_truncated)?;
        if let Some(token) = &page.continuation_token {
            write_text_element(writer, "ContinuationToken", token)?;
        }
        if let Some(token) = &page.next_continuation_token {
            write_text_element(writer, "NextContinuationToken", token)?;
        }
        write_list_entries(writer, page)?;
        Ok(())
    }
}

impl S3Serialize for InitiatedUpload {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Bucket", &self.bucket)?;
        write_text_element(writer, "Key", &self.key)?;
        write_text_element(writer, "UploadId", &self.upload_id)?;
        Ok(())
    }
}

impl S3Serialize for CompletedUpload {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Location", &self.location)?;
        write_text_element(writer, "Bucket", &self.bucket)?;
        write_text_element(writer, "Key", &self.key)?;
        write_text_element(writer, "ETag", &self.etag)?;
        Ok(())
    }
}

impl S3Serialize for ListUploadsPage {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Bucket", &self.bucket)?;
        for upload in &self.uploads {
            writer.create_element("Upload").write_inner_content(|w| {
                write_text_element(w, "Key", &upload.key)?;
                write_text_element(w, "UploadId", &upload.upload_id)?;
                write_text_element(w, "Initiated", &format_timestamp(&upload.initiated))?;
                Ok(())
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use porterfs_model::output::{BucketSummary, ObjectSummary, Owner, UploadSummary};

    use super::*;

    fn xml_string<T: S3Serialize>(root: &str, value: &T) -> String {
        String::from_utf8(to_xml(root, value).expect("serialization succeeds"))
            .expect("valid UTF-8")
    }

    fn timestamp() -> chrono::DateTime<chrono::Utc> {
        chrono::Utc.with_ymd_and_hms(2026, 2, 3, 16, 45, 9).unwrap()
    }

    #[test]
    fn test_should_serialize_list_all_my_buckets() {
        let doc = ListAllMyBuckets {
            owner: Owner::default(),
            buckets: vec![
                BucketSummary {
                    name: "alpha".to_owned(),
                    creation_date: timestamp(),
                },
                BucketSummary {
                    name: "beta".to_owned(),
                    creation_date: timestamp(),
                },
            ],
        };
        let xml = xml_string("ListAllMyBucketsResult", &doc);

        assert!(xml.contains(
            "<ListAllMyBucketsResult xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">"
        ));
        assert!(xml.contains("<Owner><ID>porterfs</ID><DisplayName>porterfs</DisplayName></Owner>"));
        assert!(xml.contains("<Name>alpha</Name>"));
        assert!(xml.contains("<Name>beta</Name>"));
        assert!(xml.contains("<CreationDate>2026-02-03T16:45:09.000Z</CreationDate>"));
    }

    #[test]
    fn test_should_serialize_list_bucket_v2_with_key_count() {
        let page = ListBucketPage {
            bucket: "b".to_owned(),
            prefix: "a/".to_owned(),
            delimiter: None,
            max_keys: 1000,
            is_truncated: false,
            contents: vec![
                ObjectSummary {
                    key: "a/x".to_owned(),
                    last_modified: timestamp(),
                    etag: "\"d41d8cd98f00b204e9800998ecf8427e\"".to_owned(),
                    size: 0,
                },
                ObjectSummary {
                    key: "a/y".to_owned(),
                    last_modified: timestamp(),
                    etag: "\"d41d8cd98f00b204e9800998ecf8427e\"".to_owned(),
                    size: 5,
                },
            ],
            common_prefixes: vec![],
            continuation_token: None,
            next_continuation_token: None,
        };
        let xml = xml_string("ListBucketResult", &ListBucketV2(&page));

        assert!(xml.contains("<KeyCount>2</KeyCount>"));
        assert!(xml.contains("<IsTruncated>false</IsTruncated>"));
        assert!(xml.contains("<Key>a/x</Key>"));
        assert!(xml.contains("<Key>a/y</Key>"));
        assert!(xml.contains("<StorageClass>STANDARD</StorageClass>"));
        assert!(!xml.contains("<ContinuationToken>"));
    }

    #[test]
    fn test_should_serialize_continuation_tokens_when_truncated() {
        let page = ListBucketPage {
            bucket: "b".to_owned(),
            prefix: String::new(),
            delimiter: Some("/".to_owned()),
            max_keys: 1,
            is_truncated: true,
            contents: vec![],
            common_prefixes: vec!["a/".to_owned()],
            continuation_token: Some("from".to_owned()),
            next_continuation_token: Some("next".to_owned()),
        };
        let xml = xml_string("ListBucketResult", &ListBucketV2(&page));

        assert!(xml.contains("<Delimiter>/</Delimiter>"));
        assert!(xml.contains("<IsTruncated>true</IsTruncated>"));
        assert!(xml.contains("<ContinuationToken>from</ContinuationToken>"));
        assert!(xml.contains("<NextContinuationToken>next</NextContinuationToken>"));
        assert!(xml.contains("<CommonPrefixes><Prefix>a/</Prefix></CommonPrefixes>"));
    }

    #[test]
    fn test_should_serialize_list_bucket_v1_without_v2_fields() {
        let page = ListBucketPage {
            bucket: "b".to_owned(),
            prefix: String::new(),
            delimiter: None,
            max_keys: 1000,
            is_truncated: false,
            contents: vec![],
            common_prefixes: vec![],
            continuation_token: None,
            next_continuation_token: None,
        };
        let xml = xml_string("ListBucketResult", &ListBucketV1(&page));

        assert!(xml.contains("<Name>b</Name>"));
        assert!(!xml.contains("<KeyCount>"));
        assert!(!xml.contains("<ContinuationToken>"));
    }

    #[test]
    fn test_should_serialize_initiate_result() {
        let doc = InitiatedUpload {
            bucket: "b".to_owned(),
            key: "path/to/obj".to_owned(),
            upload_id: "deadbeef".to_owned(),
        };
        let xml = xml_string("InitiateMultipartUploadResult", &doc);

        assert!(xml.contains("<Bucket>b</Bucket>"));
        assert!(xml.contains("<Key>path/to/obj</Key>"));
        assert!(xml.contains("<UploadId>deadbeef</UploadId>"));
    }

    #[test]
    fn test_should_serialize_complete_result() {
        let doc = CompletedUpload {
            location: "/b/obj".to_owned(),
            bucket: "b".to_owned(),
            key: "obj".to_owned(),
            etag: "\"abc-2\"".to_owned(),
        };
        let xml = xml_string("CompleteMultipartUploadResult", &doc);

        assert!(xml.contains("<Location>/b/obj</Location>"));
        assert!(xml.contains("<ETag>\"abc-2\"</ETag>"));
    }

    #[test]
    fn test_should_serialize_list_uploads() {
        let doc = ListUploadsPage {
            bucket: "b".to_owned(),
            uploads: vec![UploadSummary {
                key: "obj".to_owned(),
                upload_id: "u1".to_owned(),
                initiated: timestamp(),
            }],
        };
        let xml = xml_string("ListMultipartUploadsResult", &doc);

        assert!(xml.contains("<Upload><Key>obj</Key><UploadId>u1</UploadId>"));
        assert!(xml.contains("<Initiated>2026-02-03T16:45:09.000Z</Initiated>"));
    }
}
