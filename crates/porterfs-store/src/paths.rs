//! Path resolution and safety checks.
//!
//! Every bucket name and key is untrusted input. Names are validated
//! lexically and the resolved path is re-checked against the storage root,
//! so no `(bucket, key)` pair can name anything outside it.

use std::path::{Component, Path, PathBuf};

use crate::error::{StoreError, StoreResult};

/// Reserved directory under the root holding in-progress multipart state.
pub const MULTIPART_DIR: &str = ".multipart";

/// Prefix of in-flight temporary files. Listing never reports entries with
/// this prefix, and keys ending in such a component are rejected, so a crash
/// mid-write cannot surface a partial object.
pub const TMP_PREFIX: &str = ".porterfs-tmp-";

/// Validate a bucket name against the S3 naming rules.
///
/// 3-63 characters, lowercase letters, digits, and hyphens, starting and
/// ending alphanumeric. The `.multipart` name is reserved.
pub fn validate_bucket_name(name: &str) -> StoreResult<()> {
    let invalid = |reason: &'static str| StoreError::InvalidBucketName {
        name: name.to_owned(),
        reason,
    };

    if name == MULTIPART_DIR {
        return Err(invalid("name is reserved"));
    }
    if name.len() < 3 || name.len() > 63 {
        return Err(invalid("length must be between 3 and 63"));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err(invalid(
            "only lowercase letters, digits, and hyphens are allowed",
        ));
    }
    let first = name.as_bytes()[0];
    let last = name.as_bytes()[name.len() - 1];
    if !first.is_ascii_alphanumeric() || !last.is_ascii_alphanumeric() {
        return Err(invalid("must start and end with a letter or digit"));
    }
    Ok(())
}

/// Validate an object key.
///
/// Keys are opaque strings that may contain `/`, mapping onto nested
/// directories. Rejected: empty keys, NUL bytes, absolute keys, `.` or `..`
/// components, empty components (`a//b`), and components carrying the
/// reserved temp-file prefix.
pub fn validate_key(key: &str) -> StoreResult<()> {
    let invalid = |reason: &'static str| StoreError::InvalidKey { reason };

    if key.is_empty() {
        return Err(invalid("key is empty"));
    }
    if key.contains('\0') {
        return Err(invalid("key contains a NUL byte"));
    }
    if key.starts_with('/') {
        return Err(invalid("key is absolute"));
    }
    for component in key.split('/') {
        match component {
            "" => return Err(invalid("key contains an empty path component")),
            "." | ".." => return Err(invalid("key contains a relative path component")),
            c if c.starts_with(TMP_PREFIX) => {
                return Err(invalid("key uses the reserved temp-file prefix"));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Resolve a bucket to its directory under `root`.
pub fn bucket_path(root: &Path, bucket: &str) -> StoreResult<PathBuf> {
    validate_bucket_name(bucket)?;
    Ok(root.join(bucket))
}

/// Resolve `(bucket, key)` to an object path under `root`.
///
/// After lexical validation the joined path is normalized and re-checked to
/// start with the bucket directory. The filesystem is trusted not to be
/// adversarial (no symlink racing), so the check is lexical.
pub fn object_path(root: &Path, bucket: &str, key: &str) -> StoreResult<PathBuf> {
    let bucket_dir = bucket_path(root, bucket)?;
    validate_key(key)?;

    let joined = bucket_dir.join(key);
    if !normalize(&joined).starts_with(normalize(&bucket_dir)) {
        return Err(StoreError::InvalidKey {
            reason: "key escapes the storage root",
        });
    }
    Ok(joined)
}

/// The sidecar directory for one multipart upload.
pub fn multipart_dir(root: &Path, bucket: &str, upload_id: &str) -> StoreResult<PathBuf> {
    validate_bucket_name(bucket)?;
    if upload_id.is_empty() || !upload_id.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(StoreError::NoSuchUpload {
            upload_id: upload_id.to_owned(),
        });
    }
    Ok(root.join(MULTIPART_DIR).join(bucket).join(upload_id))
}

/// Lexical normalization: strip `.` components and resolve `..` without
/// touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_accept_valid_bucket_names() {
        assert!(validate_bucket_name("abc").is_ok());
        assert!(validate_bucket_name("my-bucket-01").is_ok());
        assert!(validate_bucket_name("0numeric").is_ok());
    }

    #[test]
    fn test_should_reject_invalid_bucket_names() {
        assert!(validate_bucket_name("ab").is_err());
        assert!(validate_bucket_name(&"a".repeat(64)).is_err());
        assert!(validate_bucket_name("UPPER").is_err());
        assert!(validate_bucket_name("has_underscore").is_err());
        assert!(validate_bucket_name("has/slash").is_err());
        assert!(validate_bucket_name("-leading").is_err());
        assert!(validate_bucket_name("trailing-").is_err());
        assert!(validate_bucket_name("..").is_err());
        assert!(validate_bucket_name(".multipart").is_err());
    }

    #[test]
    fn test_should_accept_nested_keys() {
        assert!(validate_key("a/b/c.txt").is_ok());
        assert!(validate_key("plain").is_ok());
        assert!(validate_key(".hidden").is_ok());
    }

    #[test]
    fn test_should_reject_unsafe_keys() {
        assert!(validate_key("").is_err());
        assert!(validate_key("/absolute").is_err());
        assert!(validate_key("a//b").is_err());
        assert!(validate_key("a/../b").is_err());
        assert!(validate_key("..").is_err());
        assert!(validate_key("./x").is_err());
        assert!(validate_key("nul\0byte").is_err());
        assert!(validate_key(".porterfs-tmp-cafe").is_err());
        assert!(validate_key("dir/.porterfs-tmp-cafe").is_err());
    }

    #[test]
    fn test_should_resolve_object_path_inside_bucket() {
        let root = Path::new("/srv/data");
        let path = object_path(root, "b01", "a/b.txt").unwrap();
        assert_eq!(path, Path::new("/srv/data/b01/a/b.txt"));
    }

    #[test]
    fn test_should_reject_escape_attempts() {
        let root = Path::new("/srv/data");
        assert!(object_path(root, "b01", "../other/x").is_err());
        assert!(object_path(root, "b01", "a/../../x").is_err());
        assert!(object_path(root, "../escape", "x").is_err());
    }

    #[test]
    fn test_should_reject_non_hex_upload_ids() {
        let root = Path::new("/srv/data");
        assert!(multipart_dir(root, "b01", "..").is_err());
        assert!(multipart_dir(root, "b01", "").is_err());
        assert!(multipart_dir(root, "b01", "0123abcd").is_ok());
    }
}
