//! Object CRUD: streaming put, range-aware get, head, idempotent delete.

use std::io;
use std::path::Path;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use md5::{Digest, Md5};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, warn};
use uuid::Uuid;

use porterfs_model::ByteStream;

use crate::error::{StoreError, StoreResult};
use crate::paths::{object_path, TMP_PREFIX};
use crate::range::parse_range;
use crate::FsStore;

/// Reader over an object's bytes (or a slice of them): a seeked file handle
/// limited to the slice length. Dropped when the response ends.
pub type ObjectReader = tokio::io::Take<fs::File>;

/// Default content type served when the client stored none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Result of storing an object.
#[derive(Debug, Clone)]
pub struct PutOutcome {
    /// Quoted hex MD5 of the stored bytes.
    pub etag: String,
    /// Bytes written.
    pub size: u64,
}

/// The byte extent a range read resolves to.
#[derive(Debug, Clone, Copy)]
pub struct RangeInfo {
    /// First byte position, inclusive.
    pub start: u64,
    /// Last byte position, inclusive.
    pub end: u64,
    /// Total object size the range was resolved against.
    pub total: u64,
}

/// Object metadata, as returned alongside reads and stat calls.
///
/// For a range read, `size` is the slice length and `range` carries the
/// extent; the total object size lives in `range.total`.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    /// The object key.
    pub key: String,
    /// Length of the returned byte sequence.
    pub size: u64,
    /// Filesystem mtime.
    pub last_modified: DateTime<Utc>,
    /// Quoted hex MD5 of the full object bytes.
    pub etag: String,
    /// Content type. Not persisted; always the default.
    pub content_type: String,
    /// Present iff this is a range read.
    pub range: Option<RangeInfo>,
}

/// A listing entry: metadata without a reader.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    /// The object key.
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
    /// Filesystem mtime.
    pub last_modified: DateTime<Utc>,
    /// Quoted hex MD5 of the object bytes.
    pub etag: String,
}

impl FsStore {
    /// Store an object, streaming `body` to disk.
    ///
    /// Bytes land in a temp file beside the destination while an MD5 runs
    /// incrementally, then the temp is renamed over the final path. When
    /// `declared_size` is known and the received byte count differs, the
    /// write is discarded. A mid-stream error (client disconnect) likewise
    /// removes the temp file before returning.
    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ByteStream,
        declared_size: Option<u64>,
    ) -> StoreResult<PutOutcome> {
        let dest = object_path(self.root(), bucket, key)?;
        if !self.bucket_exists(bucket).await? {
            return Err(StoreError::BucketNotFound {
                bucket: bucket.to_owned(),
            });
        }
        if let (Some(declared), Some(limit)) = (declared_size, self.size_cap()) {
            if declared > limit {
                return Err(StoreError::EntityTooLarge { declared, limit });
            }
        }

        let parent = dest.parent().expect("object path always has a parent");
        fs::create_dir_all(parent).await?;

        let tmp = parent.join(format!("{TMP_PREFIX}{}", Uuid::new_v4().simple()));
        let outcome = write_hashed(&tmp, body, declared_size).await;

        match outcome {
            Ok(outcome) => {
                if let Err(e) = fs::rename(&tmp, &dest).await {
                    remove_quietly(&tmp).await;
                    return Err(e.into());
                }
                debug!(bucket, key, size = outcome.size, "stored object");
                Ok(outcome)
            }
            Err(e) => {
                remove_quietly(&tmp).await;
                Err(e)
            }
        }
    }

    /// Open an object for reading, optionally sliced by a `Range` header.
    ///
    /// For range reads the returned info's `size` is the slice length and
    /// `range` carries the extent for `Content-Range`.
    pub async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<&str>,
    ) -> StoreResult<(ObjectReader, ObjectInfo)> {
        let path = object_path(self.root(), bucket, key)?;
        let mut info = self.stat_object(bucket, key, &path).await?;

        let mut file = fs::File::open(&path).await?;
        let total = info.size;

        let reader = if let Some(header) = range {
            let (start, end) = parse_range(header, total)?;
            file.seek(io::SeekFrom::Start(start)).await?;
            info.size = end - start + 1;
            info.range = Some(RangeInfo { start, end, total });
            file.take(end - start + 1)
        } else {
            file.take(total)
        };

        Ok((reader, info))
    }

    /// Object metadata without opening a reader.
    pub async fn head_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectInfo> {
        let path = object_path(self.root(), bucket, key)?;
        self.stat_object(bucket, key, &path).await
    }

    /// Delete an object. Deleting an absent key succeeds: S3 answers 204
    /// for deletes of non-existent keys and the engine preserves that.
    pub async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        let path = object_path(self.root(), bucket, key)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {
                fs::remove_file(&path).await?;
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn stat_object(&self, bucket: &str, key: &str, path: &Path) -> StoreResult<ObjectInfo> {
        let not_found = || StoreError::ObjectNotFound {
            key: key.to_owned(),
        };

        let meta = match fs::metadata(path).await {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return Err(not_found()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                // Distinguish a missing object from a missing bucket.
                if !self.bucket_exists(bucket).await? {
                    return Err(StoreError::BucketNotFound {
                        bucket: bucket.to_owned(),
                    });
                }
                return Err(not_found());
            }
            Err(e) => return Err(e.into()),
        };

        let last_modified = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        Ok(ObjectInfo {
            key: key.to_owned(),
            size: meta.len(),
            last_modified,
            etag: file_etag(path).await?,
            content_type: DEFAULT_CONTENT_TYPE.to_owned(),
            range: None,
        })
    }
}

/// Stream `body` into `path` while hashing, enforcing the declared size.
async fn write_hashed(
    path: &Path,
    mut body: ByteStream,
    declared_size: Option<u64>,
) -> StoreResult<PutOutcome> {
    let mut file = fs::File::create(path).await?;
    let mut hasher = Md5::new();
    let mut written: u64 = 0;

    while let Some(chunk) = body.next().await {
        let chunk: Bytes = chunk?;
        hasher.update(&chunk);
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    drop(file);

    if let Some(declared) = declared_size {
        if declared != written {
            return Err(StoreError::SizeMismatch {
                declared,
                actual: written,
            });
        }
    }

    Ok(PutOutcome {
        etag: format!("\"{}\"", hex::encode(hasher.finalize())),
        size: written,
    })
}

/// The quoted hex MD5 of a file's bytes, computed by streaming the file.
pub(crate) async fn file_etag(path: &Path) -> StoreResult<String> {
    let mut file = fs::File::open(path).await?;
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("\"{}\"", hex::encode(hasher.finalize())))
}

/// Best-effort removal of a temp file after a failed write.
pub(crate) async fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove temp file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn body_of(bytes: &'static [u8]) -> ByteStream {
        Box::pin(stream::once(async move {
            Ok::<_, io::Error>(Bytes::from_static(bytes))
        }))
    }

    async fn store_with_bucket() -> (tempfile::TempDir, FsStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsStore::open(dir.path().join("data"), None)
            .await
            .expect("open store");
        store.create_bucket("b01").await.expect("create bucket");
        (dir, store)
    }

    #[tokio::test]
    async fn test_should_round_trip_object_bytes() {
        let (_guard, store) = store_with_bucket().await;
        let outcome = store
            .put_object("b01", "hello", body_of(b"Hello from PorterFS test!"), Some(25))
            .await
            .unwrap();
        assert_eq!(outcome.size, 25);
        assert!(outcome.etag.starts_with('"') && outcome.etag.ends_with('"'));

        let (mut reader, info) = store.get_object("b01", "hello", None).await.unwrap();
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await.unwrap();
        assert_eq!(data, b"Hello from PorterFS test!");
        assert_eq!(info.size, 25);
        assert_eq!(info.etag, outcome.etag);
    }

    #[tokio::test]
    async fn test_should_compute_md5_etag_of_bytes() {
        let (_guard, store) = store_with_bucket().await;
        let outcome = store
            .put_object("b01", "k", body_of(b"hello"), None)
            .await
            .unwrap();
        assert_eq!(outcome.etag, "\"5d41402abc4b2a76b9719d911017c592\"");
    }

    #[tokio::test]
    async fn test_should_reject_size_mismatch_and_remove_temp() {
        let (_guard, store) = store_with_bucket().await;
        let err = store
            .put_object("b01", "k", body_of(b"abc"), Some(10))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::SizeMismatch { .. }));

        // Neither the object nor any temp file survives.
        assert!(matches!(
            store.head_object("b01", "k").await,
            Err(StoreError::ObjectNotFound { .. })
        ));
        let mut entries = fs::read_dir(store.root().join("b01")).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_should_remove_temp_when_stream_errors() {
        let (_guard, store) = store_with_bucket().await;
        let failing: ByteStream = Box::pin(stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "client gone")),
        ]));
        let err = store.put_object("b01", "k", failing, None).await.unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));

        let mut entries = fs::read_dir(store.root().join("b01")).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_should_read_byte_ranges() {
        let (_guard, store) = store_with_bucket().await;
        store
            .put_object(
                "b01",
                "abc",
                body_of(b"0123456789abcdefghijklmnopqrstuvwxyz"),
                Some(36),
            )
            .await
            .unwrap();

        let (mut reader, info) = store
            .get_object("b01", "abc", Some("bytes=5-9"))
            .await
            .unwrap();
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await.unwrap();
        assert_eq!(data, b"56789");
        assert_eq!(info.size, 5);
        let range = info.range.expect("range info present");
        assert_eq!((range.start, range.end, range.total), (5, 9, 36));
    }

    #[tokio::test]
    async fn test_should_reject_unsatisfiable_range() {
        let (_guard, store) = store_with_bucket().await;
        store
            .put_object("b01", "small", body_of(b"abc"), None)
            .await
            .unwrap();
        assert!(matches!(
            store.get_object("b01", "small", Some("bytes=10-20")).await,
            Err(StoreError::InvalidRange { .. })
        ));
    }

    #[tokio::test]
    async fn test_should_succeed_deleting_absent_key() {
        let (_guard, store) = store_with_bucket().await;
        store.delete_object("b01", "never-existed").await.unwrap();
    }

    #[tokio::test]
    async fn test_should_delete_then_miss() {
        let (_guard, store) = store_with_bucket().await;
        store
            .put_object("b01", "gone", body_of(b"x"), None)
            .await
            .unwrap();
        store.delete_object("b01", "gone").await.unwrap();
        assert!(matches!(
            store.get_object("b01", "gone", None).await,
            Err(StoreError::ObjectNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_should_nest_keys_with_slashes() {
        let (_guard, store) = store_with_bucket().await;
        store
            .put_object("b01", "a/b/c.txt", body_of(b"nested"), None)
            .await
            .unwrap();
        let info = store.head_object("b01", "a/b/c.txt").await.unwrap();
        assert_eq!(info.size, 6);
    }

    #[tokio::test]
    async fn test_should_report_missing_bucket_on_get() {
        let (_guard, store) = store_with_bucket().await;
        assert!(matches!(
            store.get_object("nonexistent", "k", None).await,
            Err(StoreError::BucketNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_should_enforce_declared_size_cap() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path().join("data"), Some(4)).await.unwrap();
        store.create_bucket("b01").await.unwrap();
        assert!(matches!(
            store
                .put_object("b01", "big", body_of(b"too large"), Some(9))
                .await,
            Err(StoreError::EntityTooLarge { .. })
        ));
    }
}
