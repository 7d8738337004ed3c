//! POSIX filesystem storage engine for PorterFS.
//!
//! Buckets are directories immediately under the storage root; objects are
//! files at `root/<bucket>/<key>`, where a `/` in the key nests directories.
//! Multipart state lives under the reserved `.multipart/` sidecar, invisible
//! to the object namespace until completion.
//!
//! Writes never land in place: bodies stream into a temp file next to the
//! destination and are promoted with an atomic `rename`, so readers observe
//! either the old bytes or the new bytes in their entirety. The engine holds
//! no cross-request locks; racing writers are resolved by whichever rename
//! wins, and racing multipart completions by whichever removes the sidecar
//! first.
//!
//! No metadata is persisted beside the file bytes. ETags are the MD5 of the
//! stored bytes, recomputed on demand for reads and listings; the cost of
//! that recomputation is the price of the bare on-disk layout, which keeps
//! every object a plain file a human can inspect.

pub mod error;
mod list;
mod multipart;
mod object;
pub mod paths;
mod range;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tokio::fs;

pub use error::{StoreError, StoreResult};
pub use list::{ListOptions, ListPage};
pub use multipart::UploadInfo;
pub use object::{ObjectInfo, ObjectMeta, ObjectReader, PutOutcome, RangeInfo};

use paths::{bucket_path, MULTIPART_DIR};

/// The filesystem-backed storage engine.
///
/// Cheap to clone is not a goal; the server wraps it in an `Arc`. All paths
/// under the root are owned by this type — nothing else in the process
/// touches them.
#[derive(Debug)]
pub struct FsStore {
    root: PathBuf,
    max_object_size: Option<u64>,
}

impl FsStore {
    /// Open a store rooted at `root`, creating the root and the multipart
    /// sidecar directory if missing.
    ///
    /// `max_object_size` is the advisory cap from the configuration; puts
    /// declaring a larger size are rejected.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directories cannot be created.
    pub async fn open(
        root: impl Into<PathBuf>,
        max_object_size: Option<u64>,
    ) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        fs::create_dir_all(root.join(MULTIPART_DIR)).await?;
        Ok(Self {
            root,
            max_object_size,
        })
    }

    /// The storage root.
    #[must_use]
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    pub(crate) fn size_cap(&self) -> Option<u64> {
        self.max_object_size
    }

    /// Create a bucket directory. Succeeds idempotently if the bucket
    /// already exists as a directory; a non-directory at that name is a
    /// conflict.
    pub async fn create_bucket(&self, bucket: &str) -> StoreResult<()> {
        let dir = bucket_path(&self.root, bucket)?;
        match fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(StoreError::BucketConflict {
                bucket: bucket.to_owned(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                match fs::create_dir(&dir).await {
                    Ok(()) => Ok(()),
                    // Lost a creation race; the other writer made the directory.
                    Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
                    Err(e) => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a bucket. Fails if the bucket contains any entry. Any
    /// in-progress multipart uploads targeting the bucket are discarded
    /// along with it.
    pub async fn delete_bucket(&self, bucket: &str) -> StoreResult<()> {
        let dir = bucket_path(&self.root, bucket)?;

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::BucketNotFound {
                    bucket: bucket.to_owned(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        if entries.next_entry().await?.is_some() {
            return Err(StoreError::BucketNotEmpty {
                bucket: bucket.to_owned(),
            });
        }
        drop(entries);

        fs::remove_dir(&dir).await?;

        let sidecar = self.root.join(MULTIPART_DIR).join(bucket);
        match fs::remove_dir_all(&sidecar).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    /// List all buckets, sorted by name. The `.multipart` sidecar and any
    /// other dot-entries are never reported.
    pub async fn list_buckets(&self) -> StoreResult<Vec<BucketInfo>> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut buckets = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let meta = entry.metadata().await?;
            if !meta.is_dir() {
                continue;
            }
            let created = meta
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            buckets.push(BucketInfo { name, created });
        }

        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buckets)
    }

    /// Whether a bucket directory exists.
    pub(crate) async fn bucket_exists(&self, bucket: &str) -> StoreResult<bool> {
        let dir = bucket_path(&self.root, bucket)?;
        match fs::metadata(&dir).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// A bucket as reported by [`FsStore::list_buckets`].
#[derive(Debug, Clone)]
pub struct BucketInfo {
    /// Bucket name.
    pub name: String,
    /// Creation time (directory mtime).
    pub created: DateTime<Utc>,
}
