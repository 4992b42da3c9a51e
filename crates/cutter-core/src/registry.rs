use crate::error::{Result, StorageError};
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A stored URL record.
///
/// Records are created once and never rewritten, except for the `deleted`
/// tombstone which only ever flips from `false` to `true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    pub short_code: ShortCode,
    /// The original URL that was shortened.
    pub original_url: String,
    /// Opaque identity of the submitter.
    pub owner_id: String,
    pub deleted: bool,
}

/// A live `{short_code, original_url}` pair as returned by owner listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlPair {
    pub short_code: ShortCode,
    pub original_url: String,
}

/// One entry of a batch insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUrl {
    pub short_code: ShortCode,
    pub original_url: String,
}

impl NewUrl {
    pub fn new(short_code: ShortCode, original_url: impl Into<String>) -> Self {
        Self {
            short_code,
            original_url: original_url.into(),
        }
    }
}

/// How a backend commits a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchAtomicity {
    /// Every entry commits or none does.
    Atomic,
    /// Entries are saved one by one; a failure leaves earlier entries committed.
    PerRecord,
}

/// The capability contract every registry backend implements.
///
/// Backends enforce the same rules regardless of how they store records:
///
/// - short codes are unique across all records, tombstoned or not
/// - at most one live record holds a given original URL
/// - the owner of a record never changes
/// - tombstones are never reversed
///
/// Backends never log or swallow errors; every failure is returned.
#[async_trait]
pub trait Registry: Send + Sync + 'static {
    /// Short name of the backend, for diagnostics.
    fn backend_name(&self) -> &'static str;

    /// How [`Registry::save_batch`] behaves when an entry fails.
    fn batch_atomicity(&self) -> BatchAtomicity;

    /// Stores a new record.
    ///
    /// Returns `Err(StorageError::Conflict { existing })` without inserting
    /// when a live record already holds `original_url`, and
    /// `Err(StorageError::CodeTaken)` when `code` is already assigned.
    async fn save(&self, code: &ShortCode, original_url: &str, owner_id: &str) -> Result<()>;

    /// Looks up a record by short code.
    ///
    /// Tombstoned records are returned with `deleted == true`; only an unknown
    /// code yields `Err(StorageError::NotFound)`.
    async fn resolve(&self, code: &ShortCode) -> Result<UrlRecord>;

    /// Stores several records for one owner.
    ///
    /// The whole batch is rejected before any write if it fails
    /// [`validate_batch`]. Entries are inserted as given: a URL that is
    /// already registered is an error here, not a dedup hit.
    async fn save_batch(&self, entries: &[NewUrl], owner_id: &str) -> Result<()>;

    /// Lists live records owned by `owner_id`, in no particular order.
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<UrlPair>>;

    /// Tombstones the given codes that exist and belong to `owner_id`.
    ///
    /// Codes that are unknown, already tombstoned, or owned by someone else
    /// are skipped. Returns the number of records newly tombstoned.
    async fn mark_deleted(&self, owner_id: &str, codes: &[ShortCode]) -> Result<usize>;

    /// Checks that the backend can serve requests.
    async fn health_check(&self) -> Result<()>;
}

/// Pre-validation pass shared by every backend's batch path.
///
/// Rejects the whole batch if any entry has an empty URL, or if two entries
/// share a short code or a URL.
pub fn validate_batch(entries: &[NewUrl]) -> Result<()> {
    let mut codes = HashSet::with_capacity(entries.len());
    let mut urls = HashSet::with_capacity(entries.len());

    for (index, entry) in entries.iter().enumerate() {
        if entry.original_url.is_empty() {
            return Err(StorageError::InvalidData(format!(
                "batch entry {index} has an empty original url"
            )));
        }
        if !codes.insert(entry.short_code.as_str()) {
            return Err(StorageError::InvalidData(format!(
                "batch repeats short code {}",
                entry.short_code
            )));
        }
        if !urls.insert(entry.original_url.as_str()) {
            return Err(StorageError::InvalidData(format!(
                "batch repeats original url {}",
                entry.original_url
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(code: &str, url: &str) -> NewUrl {
        NewUrl::new(ShortCode::new_unchecked(code), url)
    }

    #[test]
    fn accepts_distinct_entries() {
        let entries = vec![
            entry("aaa111", "https://a.example"),
            entry("bbb222", "https://b.example"),
        ];
        assert!(validate_batch(&entries).is_ok());
    }

    #[test]
    fn accepts_empty_batch() {
        assert!(validate_batch(&[]).is_ok());
    }

    #[test]
    fn rejects_empty_url_anywhere() {
        let entries = vec![
            entry("aaa111", "https://a.example"),
            entry("bbb222", "https://b.example"),
            entry("ccc333", ""),
        ];
        let err = validate_batch(&entries).unwrap_err();
        assert!(matches!(err, StorageError::InvalidData(msg) if msg.contains("entry 2")));
    }

    #[test]
    fn rejects_repeated_code() {
        let entries = vec![
            entry("aaa111", "https://a.example"),
            entry("aaa111", "https://b.example"),
        ];
        assert!(matches!(
            validate_batch(&entries),
            Err(StorageError::InvalidData(_))
        ));
    }

    #[test]
    fn rejects_repeated_url() {
        let entries = vec![
            entry("aaa111", "https://a.example"),
            entry("bbb222", "https://a.example"),
        ];
        assert!(matches!(
            validate_batch(&entries),
            Err(StorageError::InvalidData(_))
        ));
    }
}
