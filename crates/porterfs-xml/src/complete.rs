//! Parsing of the `CompleteMultipartUpload` request body.
//!
//! ```xml
//! <CompleteMultipartUpload>
//!   <Part><PartNumber>1</PartNumber><ETag>"etag1"</ETag></Part>
//!   <Part><PartNumber>2</PartNumber><ETag>"etag2"</ETag></Part>
//! </CompleteMultipartUpload>
//! ```
//!
//! The part order is client-controlled and preserved: the storage engine
//! concatenates parts in exactly the order listed here, not sorted.

use quick_xml::events::Event;
use quick_xml::Reader;

use porterfs_model::output::CompletedPart;

use crate::error::XmlError;

/// Parse a `CompleteMultipartUpload` document into its parts, in the order
/// the client listed them.
///
/// # Errors
///
/// Returns `XmlError` if the XML is malformed, a part lacks a number or
/// ETag, or a part number is not a positive integer.
pub fn parse_complete_multipart_upload(xml: &[u8]) -> Result<Vec<CompletedPart>, XmlError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut parts = Vec::new();
    let mut saw_root = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"CompleteMultipartUpload" => saw_root = true,
                b"Part" => parts.push(read_part(&mut reader)?),
                _ => skip_element(&mut reader)?,
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(XmlError::MissingElement(
            "CompleteMultipartUpload".to_owned(),
        ));
    }

    Ok(parts)
}

/// Read one `<Part>` element; the reader is positioned after its start tag.
fn read_part(reader: &mut Reader<&[u8]>) -> Result<CompletedPart, XmlError> {
    let mut part_number: Option<u32> = None;
    let mut etag: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"PartNumber" => {
                    let text = read_text_content(reader)?;
                    let number = text
                        .parse::<u32>()
                        .map_err(|_| XmlError::ParseError(format!("invalid PartNumber: {text}")))?;
                    part_number = Some(number);
                }
                b"ETag" => {
                    etag = Some(read_text_content(reader)?);
                }
                _ => skip_element(reader)?,
            },
            Event::End(e) if e.name().as_ref() == b"Part" => break,
            Event::Eof => {
                return Err(XmlError::ParseError(
                    "unexpected EOF inside Part element".to_owned(),
                ));
            }
            _ => {}
        }
    }

    Ok(CompletedPart {
        part_number: part_number.ok_or_else(|| XmlError::MissingElement("PartNumber".to_owned()))?,
        etag: etag.ok_or_else(|| XmlError::MissingElement("ETag".to_owned()))?,
    })
}

/// Read the text content of the current element through its end tag.
fn read_text_content(reader: &mut Reader<&[u8]>) -> Result<String, XmlError> {
    let mut text = String::new();
    loop {
        match reader.read_event()? {
            Event::Text(e) => {
                let unescaped = e
                    .unescape()
                    .map_err(|err| XmlError::ParseError(err.to_string()))?;
                text.push_str(&unescaped);
            }
            Event::End(_) => return Ok(text),
            Event::Eof => {
                return Err(XmlError::ParseError(
                    "unexpected EOF while reading text content".to_owned(),
                ));
            }
            _ => {}
        }
    }
}

/// Skip over an element and all its children.
fn skip_element(reader: &mut Reader<&[u8]>) -> Result<(), XmlError> {
    let mut depth: u32 = 1;
    loop {
        match reader.read_event()? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            Event::Eof => {
                return Err(XmlError::ParseError(
                    "unexpected EOF while skipping element".to_owned(),
                ));
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_parse_parts_preserving_client_order() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
            <CompleteMultipartUpload>
              <Part><PartNumber>2</PartNumber><ETag>"etag2"</ETag></Part>
              <Part><PartNumber>1</PartNumber><ETag>"etag1"</ETag></Part>
            </CompleteMultipartUpload>"#;

        let parts = parse_complete_multipart_upload(xml).unwrap();
        assert_eq!(parts.len(), 2);
        // NOT sorted: the client's order is the assembly order.
        assert_eq!(parts[0].part_number, 2);
        assert_eq!(parts[0].etag, "\"etag2\"");
        assert_eq!(parts[1].part_number, 1);
    }

    #[test]
    fn test_should_parse_reversed_element_order_inside_part() {
        let xml = br#"<CompleteMultipartUpload>
              <Part><ETag>"e"</ETag><PartNumber>3</PartNumber></Part>
            </CompleteMultipartUpload>"#;
        let parts = parse_complete_multipart_upload(xml).unwrap();
        assert_eq!(parts[0].part_number, 3);
        assert_eq!(parts[0].etag, "\"e\"");
    }

    #[test]
    fn test_should_reject_part_without_etag() {
        let xml = br"<CompleteMultipartUpload>
              <Part><PartNumber>1</PartNumber></Part>
            </CompleteMultipartUpload>";
        assert!(matches!(
            parse_complete_multipart_upload(xml),
            Err(XmlError::MissingElement(_))
        ));
    }

    #[test]
    fn test_should_reject_non_numeric_part_number() {
        let xml = br#"<CompleteMultipartUpload>
              <Part><PartNumber>one</PartNumber><ETag>"e"</ETag></Part>
            </CompleteMultipartUpload>"#;
        assert!(matches!(
            parse_complete_multipart_upload(xml),
            Err(XmlError::ParseError(_))
        ));
    }

    #[test]
    fn test_should_reject_missing_root() {
        let xml = br"<SomethingElse/>";
        assert!(matches!(
            parse_complete_multipart_upload(xml),
            Err(XmlError::MissingElement(_))
        ));
    }

    #[test]
    fn test_should_accept_empty_upload_listing_no_parts() {
        let xml = br"<CompleteMultipartUpload></CompleteMultipartUpload>";
        let parts = parse_complete_multipart_upload(xml).unwrap();
        assert!(parts.is_empty());
    }
}
