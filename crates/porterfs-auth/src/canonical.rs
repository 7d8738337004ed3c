//! Canonical request construction for AWS Signature Version 4.
//!
//! The canonical request is the deterministic textual form of a request:
//!
//! ```text
//! HTTPRequestMethod\n
//! CanonicalURI\n
//! CanonicalQueryString\n
//! CanonicalHeaders\n\n
//! SignedHeaders\n
//! HashedPayload
//! ```
//!
//! Each component is normalized so the server reconstructs byte-for-byte what
//! the client signed.

use std::collections::BTreeMap;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters percent-encoded in canonical components.
///
/// Everything except the RFC 3986 unreserved set (A-Z, a-z, 0-9, `-`, `_`,
/// `.`, `~`) is encoded. Path segments are encoded individually so `/` is
/// preserved as a separator.
const SIGV4_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Build the full canonical request string from its components.
#[must_use]
pub fn build_canonical_request(
    method: &str,
    uri_path: &str,
    query_string: &str,
    headers: &[(String, String)],
    signed_headers: &[String],
    payload_hash: &str,
) -> String {
    let canonical_uri = build_canonical_uri(uri_path);
    let canonical_query = build_canonical_query_string(query_string);
    let canonical_headers = build_canonical_headers(headers, signed_headers);
    let signed_headers_str = build_signed_headers_string(signed_headers);

    format!(
        "{method}\n{canonical_uri}\n{canonical_query}\n{canonical_headers}\n\n{signed_headers_str}\n{payload_hash}"
    )
}

/// Build the canonical URI by encoding each path segment individually.
///
/// Empty paths become `/`. Double slashes are NOT collapsed: each empty
/// segment stays empty, so `/a//b` canonicalizes to `/a//b`. Segments are
/// decoded first to avoid double-encoding paths the client already
/// percent-encoded.
///
/// # Examples
///
/// ```
/// use porterfs_auth::canonical::build_canonical_uri;
///
/// assert_eq!(build_canonical_uri(""), "/");
/// assert_eq!(build_canonical_uri("/b/key with spaces"), "/b/key%20with%20spaces");
/// assert_eq!(build_canonical_uri("/b/already%20enc"), "/b/already%20enc");
/// ```
#[must_use]
pub fn build_canonical_uri(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return "/".to_owned();
    }

    let encoded: Vec<String> = path
        .split('/')
        .map(|segment| {
            let decoded = percent_decode_str(segment).decode_utf8_lossy();
            sigv4_encode(&decoded)
        })
        .collect();

    let joined = encoded.join("/");
    if joined.starts_with('/') {
        joined
    } else {
        format!("/{joined}")
    }
}

/// Build the canonical query string.
///
/// Parameters are split on `&`, percent-decoded, re-encoded with the RFC 3986
/// unreserved set, and sorted by encoded key with ties broken by encoded
/// value. An empty query yields the empty string.
///
/// # Examples
///
/// ```
/// use porterfs_auth::canonical::build_canonical_query_string;
///
/// assert_eq!(build_canonical_query_string(""), "");
/// assert_eq!(build_canonical_query_string("b=2&a=1"), "a=1&b=2");
/// assert_eq!(build_canonical_query_string("prefix=a%2Fb"), "prefix=a%2Fb");
/// assert_eq!(build_canonical_query_string("uploads"), "uploads=");
/// ```
#[must_use]
pub fn build_canonical_query_string(query: &str) -> String {
    if query.is_empty() {
        return String::new();
    }

    let mut params: Vec<(String, String)> = query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|param| {
            let (key, value) = param.split_once('=').unwrap_or((param, ""));
            let key = sigv4_encode(&percent_decode_str(key).decode_utf8_lossy());
            let value = sigv4_encode(&percent_decode_str(value).decode_utf8_lossy());
            (key, value)
        })
        .collect();

    params.sort_unstable();

    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Build the canonical headers string.
///
/// Only headers named in `signed_headers` are included. Names are lowercased,
/// values trimmed with inner whitespace runs collapsed to a single space,
/// and entries sorted by name. Duplicate headers are joined with commas.
/// The trailing newline of the canonical-request format is added by the
/// caller, not here.
#[must_use]
pub fn build_canonical_headers(headers: &[(String, String)], signed_headers: &[String]) -> String {
    let mut header_map: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let lower = name.to_lowercase();
        let normalized = collapse_whitespace(value.trim());
        header_map
            .entry(lower)
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(&normalized);
            })
            .or_insert(normalized);
    }

    let mut sorted: Vec<&String> = signed_headers.iter().collect();
    sorted.sort_unstable();

    sorted
        .iter()
        .filter_map(|name| {
            header_map
                .get(name.as_str())
                .map(|value| format!("{name}:{value}"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the `SignedHeaders` string: lowercase names, sorted, `;`-joined.
#[must_use]
pub fn build_signed_headers_string(signed_headers: &[String]) -> String {
    let mut sorted: Vec<&str> = signed_headers.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.join(";")
}

/// Percent-encode with the SigV4 unreserved set.
fn sigv4_encode(input: &str) -> String {
    utf8_percent_encode(input, SIGV4_ENCODE_SET).to_string()
}

/// Collapse consecutive whitespace characters to a single space.
fn collapse_whitespace(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut prev_was_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_was_space {
                result.push(' ');
                prev_was_space = true;
            }
        } else {
            result.push(ch);
            prev_was_space = false;
        }
    }
    result
}
