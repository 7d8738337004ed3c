//! Bucket listing: iterative traversal, prefix/delimiter filtering,
//! truncation with continuation tokens.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tokio::fs;

use crate::error::{StoreError, StoreResult};
use crate::object::{file_etag, ObjectMeta};
use crate::paths::{bucket_path, TMP_PREFIX};
use crate::FsStore;

/// Parameters of a listing request.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Only keys starting with this byte prefix are reported.
    pub prefix: String,
    /// When non-empty, keys are grouped at the first occurrence of this
    /// delimiter past the prefix.
    pub delimiter: Option<String>,
    /// Cap on contents plus common prefixes combined.
    pub max_keys: u32,
    /// Resume after this item (a key or common prefix from a prior page).
    pub continuation: Option<String>,
}

/// One page of a listing.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    /// Keys on this page with their metadata, lexicographically ordered.
    pub contents: Vec<ObjectMeta>,
    /// Delimiter groups on this page, lexicographically ordered.
    pub common_prefixes: Vec<String>,
    /// Whether items remain past this page.
    pub is_truncated: bool,
    /// The item to resume after, set when truncated.
    pub next_continuation: Option<String>,
}

/// An emitted listing item: a concrete key or a delimiter group.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ListItem {
    Key(String),
    Prefix(String),
}

impl ListItem {
    fn as_str(&self) -> &str {
        match self {
            Self::Key(s) | Self::Prefix(s) => s,
        }
    }
}

impl FsStore {
    /// List objects in a bucket.
    ///
    /// Keys are enumerated by an iterative walk of the bucket directory
    /// (nested directories become `/`-separated keys), sorted
    /// lexicographically, filtered by prefix, grouped by delimiter, and
    /// capped at `max_keys` combined items. A truncated page carries the
    /// last emitted item as its continuation.
    pub async fn list_objects(&self, bucket: &str, opts: &ListOptions) -> StoreResult<ListPage> {
        let dir = bucket_path(self.root(), bucket)?;
        if !self.bucket_exists(bucket).await? {
            return Err(StoreError::BucketNotFound {
                bucket: bucket.to_owned(),
            });
        }

        if opts.max_keys == 0 {
            return Ok(ListPage::default());
        }

        let mut keys = collect_keys(&dir).await?;
        keys.sort_unstable();

        let items = group_items(&keys, &opts.prefix, opts.delimiter.as_deref());

        // Resume strictly after the continuation item.
        let after = opts.continuation.as_deref().unwrap_or("");

        let mut page = ListPage::default();
        let mut emitted = 0u32;
        let mut last_item: Option<String> = None;

        for item in items.into_iter().filter(|item| item.as_str() > after) {
            if emitted >= opts.max_keys {
                page.is_truncated = true;
                page.next_continuation = last_item;
                return self.materialize(&dir, page).await;
            }
            emitted += 1;
            last_item = Some(item.as_str().to_owned());
            match item {
                ListItem::Key(key) => page.contents.push(ObjectMeta {
                    key,
                    size: 0,
                    last_modified: Utc::now(),
                    etag: String::new(),
                }),
                ListItem::Prefix(prefix) => page.common_prefixes.push(prefix),
            }
        }

        self.materialize(&dir, page).await
    }

    /// Fill in size, mtime, and ETag for the page's keys.
    async fn materialize(&self, dir: &std::path::Path, mut page: ListPage) -> StoreResult<ListPage> {
        for entry in &mut page.contents {
            let path = dir.join(&entry.key);
            let meta = fs::metadata(&path).await?;
            entry.size = meta.len();
            entry.last_modified = meta
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            entry.etag = file_etag(&path).await?;
        }
        Ok(page)
    }
}

/// Walk the bucket directory iteratively, collecting relative keys.
///
/// In-flight temp files are skipped, so a crashed write never appears in a
/// listing.
async fn collect_keys(bucket_dir: &PathBuf) -> StoreResult<Vec<String>> {
    let mut keys = Vec::new();
    let mut stack: Vec<(PathBuf, String)> = vec![(bucket_dir.clone(), String::new())];

    while let Some((dir, rel)) = stack.pop() {
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(TMP_PREFIX) {
                continue;
            }
            let child_rel = if rel.is_empty() {
                name
            } else {
                format!("{rel}/{name}")
            };
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                stack.push((entry.path(), child_rel));
            } else if file_type.is_file() {
                keys.push(child_rel);
            }
        }
    }

    Ok(keys)
}

/// Apply prefix filtering and delimiter grouping over sorted keys.
///
/// Keys sharing a delimiter group are contiguous in sorted order, so a
/// group is emitted once, at the position of its first member, and the
/// member keys are suppressed.
fn group_items(sorted_keys: &[String], prefix: &str, delimiter: Option<&str>) -> Vec<ListItem> {
    let mut items = Vec::new();
    let mut last_group: Option<String> = None;

    for key in sorted_keys {
        if !key.starts_with(prefix) {
            continue;
        }
        if let Some(delim) = delimiter.filter(|d| !d.is_empty()) {
            if let Some(pos) = key[prefix.len()..].find(delim) {
                let group = key[..prefix.len() + pos + delim.len()].to_owned();
                if last_group.as_deref() != Some(group.as_str()) {
                    last_group = Some(group.clone());
                    items.push(ListItem::Prefix(group));
                }
                continue;
            }
        }
        items.push(ListItem::Key(key.clone()));
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn test_should_filter_by_prefix() {
        let sorted = keys(&["a/x", "a/y", "b/z"]);
        let items = group_items(&sorted, "a/", None);
        assert_eq!(
            items,
            vec![
                ListItem::Key("a/x".to_owned()),
                ListItem::Key("a/y".to_owned())
            ]
        );
    }

    #[test]
    fn test_should_group_by_delimiter() {
        let sorted = keys(&["a/x", "a/y", "b/z", "top"]);
        let items = group_items(&sorted, "", Some("/"));
        assert_eq!(
            items,
            vec![
                ListItem::Prefix("a/".to_owned()),
                ListItem::Prefix("b/".to_owned()),
                ListItem::Key("top".to_owned())
            ]
        );
    }

    #[test]
    fn test_should_group_past_prefix_only() {
        let sorted = keys(&["photos/2024/feb.jpg", "photos/2024/jan.jpg", "photos/top.jpg"]);
        let items = group_items(&sorted, "photos/", Some("/"));
        assert_eq!(
            items,
            vec![
                ListItem::Prefix("photos/2024/".to_owned()),
                ListItem::Key("photos/top.jpg".to_owned())
            ]
        );
    }
}
