//! The multipart-upload state machine.
//!
//! Upload state lives under `root/.multipart/<bucket>/<upload-id>/`: a
//! `metadata` manifest recording the target key and initiation time, plus
//! one zero-padded `part-NNNNN` file per uploaded part. The sidecar shares
//! the filesystem with the live namespace, which is what makes `complete`'s
//! final `rename` atomic.
//!
//! Completion streams the listed parts, in the client's order, into a temp
//! file beside the destination while recomputing each part's MD5. That one
//! pass validates the client-supplied part ETags against the stored bytes
//! and accumulates the raw digests for the composite object ETag,
//! `"hex(md5(concat(md5_i)))-N"`. Two racing completions are settled by the
//! sidecar: whichever removes it first wins, the other reports the upload
//! gone.

use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use md5::{Digest, Md5};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};
use uuid::Uuid;

use porterfs_model::output::CompletedPart;
use porterfs_model::ByteStream;

use crate::error::{StoreError, StoreResult};
use crate::object::remove_quietly;
use crate::paths::{multipart_dir, object_path, validate_key, TMP_PREFIX};
use crate::FsStore;

/// Largest part number S3 accepts.
const MAX_PART_NUMBER: u32 = 10_000;

/// Manifest file name inside an upload's sidecar directory.
const MANIFEST: &str = "metadata";

/// An open multipart upload, as reported by
/// [`FsStore::list_multipart_uploads`].
#[derive(Debug, Clone)]
pub struct UploadInfo {
    /// The target key.
    pub key: String,
    /// The upload ID.
    pub upload_id: String,
    /// When the upload was initiated.
    pub initiated: DateTime<Utc>,
}

impl FsStore {
    /// Start a multipart upload, returning its upload ID.
    ///
    /// The ID is 128 random bits as hex, unguessable by construction.
    pub async fn init_multipart(&self, bucket: &str, key: &str) -> StoreResult<String> {
        validate_key(key)?;
        if !self.bucket_exists(bucket).await? {
            return Err(StoreError::BucketNotFound {
                bucket: bucket.to_owned(),
            });
        }

        let upload_id = Uuid::new_v4().simple().to_string();
        let dir = multipart_dir(self.root(), bucket, &upload_id)?;
        fs::create_dir_all(&dir).await?;

        let manifest = format!(
            "key={key}\ninitiated={}\n",
            Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
        );
        fs::write(dir.join(MANIFEST), manifest).await?;

        debug!(bucket, key, upload_id, "initiated multipart upload");
        Ok(upload_id)
    }

    /// Store one part of an upload, returning the part's quoted MD5 ETag.
    ///
    /// Re-uploading a part number atomically replaces the prior bytes; the
    /// last write wins.
    pub async fn upload_part(
        &self,
        bucket: &str,
        upload_id: &str,
        part_number: u32,
        body: ByteStream,
        declared_size: Option<u64>,
    ) -> StoreResult<String> {
        if part_number < 1 || part_number > MAX_PART_NUMBER {
            return Err(StoreError::InvalidPartNumber { part_number });
        }
        let dir = multipart_dir(self.root(), bucket, upload_id)?;
        if !is_dir(&dir).await? {
            return Err(StoreError::NoSuchUpload {
                upload_id: upload_id.to_owned(),
            });
        }

        let tmp = dir.join(format!("{TMP_PREFIX}{}", Uuid::new_v4().simple()));
        let mut file = fs::File::create(&tmp).await?;
        let mut hasher = Md5::new();
        let mut written: u64 = 0;
        let mut body = body;

        let write_result: StoreResult<()> = async {
            while let Some(chunk) = body.next().await {
                let chunk: Bytes = chunk?;
                hasher.update(&chunk);
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            Ok(())
        }
        .await;

        drop(file);
        if let Err(e) = write_result {
            remove_quietly(&tmp).await;
            return Err(e);
        }
        if let Some(declared) = declared_size {
            if declared != written {
                remove_quietly(&tmp).await;
                return Err(StoreError::SizeMismatch {
                    declared,
                    actual: written,
                });
            }
        }

        if let Err(e) = fs::rename(&tmp, dir.join(part_file_name(part_number))).await {
            remove_quietly(&tmp).await;
            return Err(e.into());
        }

        debug!(bucket, upload_id, part_number, size = written, "stored part");
        Ok(format!("\"{}\"", hex::encode(hasher.finalize())))
    }

    /// Assemble the listed parts, in the order supplied, into the final
    /// object. Returns the composite ETag.
    ///
    /// Each listed part must exist on disk and its recomputed MD5 must
    /// match the client-supplied ETag; any mismatch aborts cleanly. On
    /// success the sidecar is removed, terminating the upload.
    pub async fn complete_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StoreResult<String> {
        let dir = multipart_dir(self.root(), bucket, upload_id)?;
        if !is_dir(&dir).await? {
            return Err(StoreError::NoSuchUpload {
                upload_id: upload_id.to_owned(),
            });
        }

        // Part numbers must be unique within one completion.
        let mut seen = std::collections::HashSet::new();
        for part in parts {
            if part.part_number < 1 || part.part_number > MAX_PART_NUMBER {
                return Err(StoreError::InvalidPartNumber {
                    part_number: part.part_number,
                });
            }
            if !seen.insert(part.part_number) {
                return Err(StoreError::InvalidPart {
                    part_number: part.part_number,
                });
            }
        }

        let dest = object_path(self.root(), bucket, key)?;
        let parent = dest.parent().expect("object path always has a parent");
        fs::create_dir_all(parent).await?;

        let tmp = parent.join(format!("{TMP_PREFIX}{}", Uuid::new_v4().simple()));
        let assembled = assemble_parts(&dir, &tmp, parts).await;

        let etag = match assembled {
            Ok(etag) => etag,
            Err(e) => {
                remove_quietly(&tmp).await;
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&tmp, &dest).await {
            remove_quietly(&tmp).await;
            return Err(e.into());
        }

        // Terminal transition: removing the sidecar ends the upload. If a
        // racing completion already removed it, that race was lost at the
        // entry check; a NotFound here just means cleanup already happened.
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(upload_id, error = %e, "failed to remove multipart sidecar"),
        }

        debug!(bucket, key, upload_id, "completed multipart upload");
        Ok(etag)
    }

    /// Abort an upload, discarding all its state. Aborting an unknown
    /// upload succeeds; abort is idempotent.
    pub async fn abort_multipart(&self, bucket: &str, upload_id: &str) -> StoreResult<()> {
        let dir = multipart_dir(self.root(), bucket, upload_id)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Enumerate open uploads for a bucket from their sidecar manifests.
    pub async fn list_multipart_uploads(&self, bucket: &str) -> StoreResult<Vec<UploadInfo>> {
        crate::paths::validate_bucket_name(bucket)?;
        if !self.bucket_exists(bucket).await? {
            return Err(StoreError::BucketNotFound {
                bucket: bucket.to_owned(),
            });
        }

        let bucket_sidecar = self.root().join(crate::paths::MULTIPART_DIR).join(bucket);
        let mut entries = match fs::read_dir(&bucket_sidecar).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut uploads = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let upload_id = entry.file_name().to_string_lossy().into_owned();
            let manifest = match fs::read_to_string(entry.path().join(MANIFEST)).await {
                Ok(manifest) => manifest,
                // A sidecar mid-creation or mid-removal; skip it.
                Err(_) => continue,
            };
            if let Some(info) = parse_manifest(&upload_id, &manifest) {
                uploads.push(info);
            }
        }

        uploads.sort_by(|a, b| a.key.cmp(&b.key).then_with(|| a.upload_id.cmp(&b.upload_id)));
        Ok(uploads)
    }
}

/// `part-NNNNN`, zero-padded to keep directory listings ordered.
fn part_file_name(part_number: u32) -> String {
    format!("part-{part_number:05}")
}

/// Stream every listed part into `tmp`, validating digests, and return the
/// composite ETag.
async fn assemble_parts(
    sidecar: &Path,
    tmp: &PathBuf,
    parts: &[CompletedPart],
) -> StoreResult<String> {
    let mut out = fs::File::create(tmp).await?;
    let mut digests: Vec<u8> = Vec::with_capacity(parts.len() * 16);
    let mut buf = vec![0u8; 64 * 1024];

    for part in parts {
        let part_path = sidecar.join(part_file_name(part.part_number));
        let mut file = match fs::File::open(&part_path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::InvalidPart {
                    part_number: part.part_number,
                });
            }
            Err(e) => return Err(e.into()),
        };

        let mut hasher = Md5::new();
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            out.write_all(&buf[..n]).await?;
        }

        let digest = hasher.finalize();
        let expected = part.etag.trim_matches('"').to_ascii_lowercase();
        if hex::encode(digest) != expected {
            return Err(StoreError::InvalidPart {
                part_number: part.part_number,
            });
        }
        digests.extend_from_slice(&digest);
    }

    out.flush().await?;
    drop(out);

    let composite = hex::encode(Md5::digest(&digests));
    Ok(format!("\"{composite}-{}\"", parts.len()))
}

/// Parse a sidecar manifest into an [`UploadInfo`].
fn parse_manifest(upload_id: &str, manifest: &str) -> Option<UploadInfo> {
    let mut key = None;
    let mut initiated = None;
    for line in manifest.lines() {
        if let Some(value) = line.strip_prefix("key=") {
            key = Some(value.to_owned());
        } else if let Some(value) = line.strip_prefix("initiated=") {
            initiated = DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.with_timezone(&Utc));
        }
    }
    Some(UploadInfo {
        key: key?,
        upload_id: upload_id.to_owned(),
        initiated: initiated?,
    })
}

async fn is_dir(path: &Path) -> StoreResult<bool> {
    match fs::metadata(path).await {
        Ok(meta) => Ok(meta.is_dir()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
