//! HTTP byte-range parsing.
//!
//! Understands the three single-range forms of `Range: bytes=...`:
//! `a-b` (inclusive both ends), `a-` (open end), and `-n` (suffix length).
//! Multi-range specs are rejected outright.

use crate::error::{StoreError, StoreResult};

/// Parse a `Range` header value against an object of `size` bytes.
///
/// Returns the inclusive `(start, end)` byte positions. A valid range
/// satisfies `0 <= start <= end <= size - 1`; anything else (including any
/// range against an empty object) is unsatisfiable.
pub fn parse_range(header: &str, size: u64) -> StoreResult<(u64, u64)> {
    let invalid = || StoreError::InvalidRange {
        spec: header.to_owned(),
        size,
    };

    let spec = header.strip_prefix("bytes=").ok_or_else(invalid)?;
    if spec.contains(',') {
        // Multi-range requests are not supported.
        return Err(invalid());
    }

    let (start_str, end_str) = spec.split_once('-').ok_or_else(invalid)?;

    let (start, end) = match (start_str.is_empty(), end_str.is_empty()) {
        // bytes=a-b
        (false, false) => {
            let start: u64 = start_str.parse().map_err(|_| invalid())?;
            let end: u64 = end_str.parse().map_err(|_| invalid())?;
            (start, end)
        }
        // bytes=a-
        (false, true) => {
            let start: u64 = start_str.parse().map_err(|_| invalid())?;
            if size == 0 {
                return Err(invalid());
            }
            (start, size - 1)
        }
        // bytes=-n : the last n bytes
        (true, false) => {
            let suffix: u64 = end_str.parse().map_err(|_| invalid())?;
            if suffix == 0 || size == 0 {
                return Err(invalid());
            }
            (size.saturating_sub(suffix), size - 1)
        }
        (true, true) => return Err(invalid()),
    };

    if start > end || end >= size {
        return Err(invalid());
    }
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_parse_bounded_range() {
        assert_eq!(parse_range("bytes=5-9", 36).unwrap(), (5, 9));
        assert_eq!(parse_range("bytes=0-0", 1).unwrap(), (0, 0));
        assert_eq!(parse_range("bytes=0-35", 36).unwrap(), (0, 35));
    }

    #[test]
    fn test_should_parse_open_ended_range() {
        assert_eq!(parse_range("bytes=10-", 36).unwrap(), (10, 35));
        assert_eq!(parse_range("bytes=0-", 1).unwrap(), (0, 0));
    }

    #[test]
    fn test_should_parse_suffix_range() {
        assert_eq!(parse_range("bytes=-5", 36).unwrap(), (31, 35));
        // A suffix longer than the object covers the whole object.
        assert_eq!(parse_range("bytes=-100", 36).unwrap(), (0, 35));
    }

    #[test]
    fn test_should_reject_out_of_bounds_ranges() {
        assert!(parse_range("bytes=36-40", 36).is_err());
        assert!(parse_range("bytes=5-36", 36).is_err());
        assert!(parse_range("bytes=9-5", 36).is_err());
        assert!(parse_range("bytes=0-0", 0).is_err());
        assert!(parse_range("bytes=-1", 0).is_err());
    }

    #[test]
    fn test_should_reject_malformed_specs() {
        assert!(parse_range("bytes=", 36).is_err());
        assert!(parse_range("bytes=-", 36).is_err());
        assert!(parse_range("bytes=abc-def", 36).is_err());
        assert!(parse_range("items=0-5", 36).is_err());
        assert!(parse_range("0-5", 36).is_err());
        assert!(parse_range("bytes=-0", 36).is_err());
    }

    #[test]
    fn test_should_reject_multi_range_specs() {
        assert!(parse_range("bytes=0-5,10-15", 36).is_err());
    }
}
