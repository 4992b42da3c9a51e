use cutter_core::{Result, ShortCode, StorageError, UrlPair, UrlRecord};
use std::collections::{HashMap, HashSet};

/// Resident record set shared by the volatile and logged backends.
///
/// `active` maps the original URL of every live record to its code, so the
/// dedup check and the insert happen under the same lock as one step.
#[derive(Debug, Default)]
pub(crate) struct Index {
    records: HashMap<String, UrlRecord>,
    active: HashMap<String, ShortCode>,
}

impl Index {
    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    /// Checks that `code` and `original_url` can be inserted.
    ///
    /// A live record holding the URL wins over a code collision, so
    /// resubmitting a URL always reports the code it already has.
    pub(crate) fn check_insert(&self, code: &ShortCode, original_url: &str) -> Result<()> {
        if let Some(existing) = self.active.get(original_url) {
            return Err(StorageError::Conflict {
                existing: existing.clone(),
            });
        }
        if self.records.contains_key(code.as_str()) {
            return Err(StorageError::CodeTaken(code.to_string()));
        }
        Ok(())
    }

    /// Inserts a record that already passed [`Index::check_insert`].
    pub(crate) fn insert(&mut self, record: UrlRecord) {
        if !record.deleted {
            self.active
                .insert(record.original_url.clone(), record.short_code.clone());
        }
        self.records
            .insert(record.short_code.as_str().to_owned(), record);
    }

    pub(crate) fn get(&self, code: &ShortCode) -> Option<UrlRecord> {
        self.records.get(code.as_str()).cloned()
    }

    pub(crate) fn list_by_owner(&self, owner_id: &str) -> Vec<UrlPair> {
        self.records
            .values()
            .filter(|record| !record.deleted && record.owner_id == owner_id)
            .map(|record| UrlPair {
                short_code: record.short_code.clone(),
                original_url: record.original_url.clone(),
            })
            .collect()
    }

    /// Live records among `codes` that belong to `owner_id`, each at most once.
    pub(crate) fn deletable(&self, owner_id: &str, codes: &[ShortCode]) -> Vec<UrlRecord> {
        let mut seen = HashSet::new();
        codes
            .iter()
            .filter(|code| seen.insert(code.as_str()))
            .filter_map(|code| self.records.get(code.as_str()))
            .filter(|record| !record.deleted && record.owner_id == owner_id)
            .cloned()
            .collect()
    }

    /// Sets the tombstone on `code`. Returns `false` if the record is unknown
    /// or already tombstoned.
    pub(crate) fn tombstone(&mut self, code: &ShortCode) -> bool {
        let Some(record) = self.records.get_mut(code.as_str()) else {
            return false;
        };
        if record.deleted {
            return false;
        }
        record.deleted = true;

        if self
            .active
            .get(&record.original_url)
            .is_some_and(|active| active == code)
        {
            self.active.remove(&record.original_url);
        }
        true
    }
}
