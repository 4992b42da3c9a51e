use crate::index::Index;
use async_trait::async_trait;
use cutter_core::{
    validate_batch, BatchAtomicity, NewUrl, Registry, Result, ShortCode, StorageError, UrlPair,
    UrlRecord,
};
use parking_lot::RwLock;

/// In-memory implementation of the [`Registry`] contract.
///
/// Records live for as long as the process does. Writers take the index
/// lock exclusively, so the dedup check and the insert are one step;
/// readers share it. Lookups clone records out and never expose the map.
///
/// Batches are saved entry by entry: a failure part way through leaves the
/// earlier entries in place.
#[derive(Debug, Default)]
pub struct VolatileRegistry {
    index: RwLock<Index>,
}

impl VolatileRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held, tombstoned ones included.
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Registry for VolatileRegistry {
    fn backend_name(&self) -> &'static str {
        "volatile"
    }

    fn batch_atomicity(&self) -> BatchAtomicity {
        BatchAtomicity::PerRecord
    }

    async fn save(&self, code: &ShortCode, original_url: &str, owner_id: &str) -> Result<()> {
        let mut index = self.index.write();
        index.check_insert(code, original_url)?;
        index.insert(UrlRecord {
            short_code: code.clone(),
            original_url: original_url.to_owned(),
            owner_id: owner_id.to_owned(),
            deleted: false,
        });
        Ok(())
    }

    async fn resolve(&self, code: &ShortCode) -> Result<UrlRecord> {
        self.index
            .read()
            .get(code)
            .ok_or_else(|| StorageError::NotFound(code.to_string()))
    }

    async fn save_batch(&self, entries: &[NewUrl], owner_id: &str) -> Result<()> {
        validate_batch(entries)?;
        for entry in entries {
            self.save(&entry.short_code, &entry.original_url, owner_id)
                .await?;
        }
        Ok(())
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<UrlPair>> {
        Ok(self.index.read().list_by_owner(owner_id))
    }

    async fn mark_deleted(&self, owner_id: &str, codes: &[ShortCode]) -> Result<usize> {
        let mut index = self.index.write();
        let targets = index.deletable(owner_id, codes);
        Ok(targets
            .iter()
            .filter(|record| index.tombstone(&record.short_code))
            .count())
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
