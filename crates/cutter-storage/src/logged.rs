use crate::index::Index;
use async_trait::async_trait;
use cutter_core::{
    validate_batch, BatchAtomicity, NewUrl, Registry, Result, ShortCode, StorageError, UrlPair,
    UrlRecord,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// One line of the URL log.
#[derive(Debug, Serialize, Deserialize)]
struct LogEntry {
    #[serde(rename = "uuid")]
    sequence: u64,
    short_url: String,
    original_url: String,
    user_id: String,
    #[serde(default)]
    is_deleted: bool,
}

impl LogEntry {
    fn new(sequence: u64, record: &UrlRecord) -> Self {
        Self {
            sequence,
            short_url: record.short_code.as_str().to_owned(),
            original_url: record.original_url.clone(),
            user_id: record.owner_id.clone(),
            is_deleted: record.deleted,
        }
    }

    fn into_record(self) -> UrlRecord {
        UrlRecord {
            short_code: ShortCode::new_unchecked(self.short_url),
            original_url: self.original_url,
            owner_id: self.user_id,
            deleted: self.is_deleted,
        }
    }
}

/// Where log lines end up.
#[async_trait]
trait LogSink: Send + 'static {
    /// Writes one complete line and makes it durable.
    async fn write_line(&mut self, line: &[u8]) -> std::io::Result<()>;

    /// Cuts the log back to `len` bytes.
    async fn truncate(&mut self, len: u64) -> std::io::Result<()>;
}

#[async_trait]
impl LogSink for File {
    async fn write_line(&mut self, line: &[u8]) -> std::io::Result<()> {
        self.write_all(line).await?;
        self.flush().await?;
        self.sync_data().await
    }

    async fn truncate(&mut self, len: u64) -> std::io::Result<()> {
        self.set_len(len).await
    }
}

/// Append side of the log. Only ever used under the writer mutex.
struct LogWriter {
    sink: Box<dyn LogSink>,
    /// Length of the file up to the last complete line.
    len: u64,
    last_sequence: u64,
    /// Set once a partial line could not be cut off. Appending after it
    /// would glue the next entry onto the fragment.
    poisoned: bool,
}

impl std::fmt::Debug for LogWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogWriter")
            .field("len", &self.len)
            .field("last_sequence", &self.last_sequence)
            .field("poisoned", &self.poisoned)
            .finish_non_exhaustive()
    }
}

impl LogWriter {
    async fn append(&mut self, record: &UrlRecord) -> Result<()> {
        if self.poisoned {
            return Err(StorageError::Io(
                "url log ends in a partial entry that could not be removed, reopen the registry"
                    .to_string(),
            ));
        }

        let sequence = self.last_sequence + 1;
        let mut line = serde_json::to_vec(&LogEntry::new(sequence, record))
            .map_err(|e| StorageError::InvalidData(format!("cannot encode log entry: {e}")))?;
        line.push(b'\n');

        if let Err(err) = self.sink.write_line(&line).await {
            // Cut off whatever part of the line made it to disk.
            if let Err(rollback) = self.sink.truncate(self.len).await {
                self.poisoned = true;
                return Err(StorageError::Io(format!(
                    "append failed ({err}) and the partial entry could not be removed ({rollback})"
                )));
            }
            return Err(err.into());
        }

        self.len += line.len() as u64;
        self.last_sequence = sequence;
        Ok(())
    }
}

/// Outcome of replaying a log file.
struct Replay {
    index: Index,
    last_sequence: u64,
    /// Offset just past the last complete entry.
    valid_len: u64,
    /// Whether bytes after `valid_len` hold a torn entry.
    torn: bool,
    /// Whether the valid part does not end on a line break.
    needs_newline: bool,
}

/// State shared with detached write tasks.
#[derive(Debug)]
struct Shared {
    index: RwLock<Index>,
    log: Mutex<LogWriter>,
}

impl Shared {
    async fn save(&self, record: UrlRecord) -> Result<()> {
        let mut log = self.log.lock().await;
        // Only writers holding the log lock mutate the index, so the check
        // stays valid until the insert below.
        self.index
            .read()
            .check_insert(&record.short_code, &record.original_url)?;

        log.append(&record).await?;
        self.index.write().insert(record);
        Ok(())
    }

    async fn mark_deleted(&self, owner_id: &str, codes: &[ShortCode]) -> Result<usize> {
        let mut log = self.log.lock().await;
        let targets = self.index.read().deletable(owner_id, codes);

        let mut marked = 0;
        for record in targets {
            let tombstone = UrlRecord {
                deleted: true,
                ..record
            };
            log.append(&tombstone).await?;
            self.index.write().tombstone(&tombstone.short_code);
            marked += 1;
        }
        Ok(marked)
    }
}

/// A [`Registry`] held in memory and written through to an append-only log.
///
/// The log is a JSON lines file, one record per line, replayed in order by
/// [`LoggedRegistry::open`]. Saves append the new record and tombstones
/// append the record again with `is_deleted` set; memory is only updated
/// once the line is on disk, so the map never runs ahead of the log.
///
/// Writes run on their own task and finish even if the caller stops
/// waiting, so a timed out or abandoned save cannot leave a line in the
/// log that memory never saw.
///
/// Writers are serialized by one mutex around the log file; readers go
/// straight to the in-memory index. Batches are saved entry by entry, so a
/// failure part way through leaves the earlier entries in place.
#[derive(Debug)]
pub struct LoggedRegistry {
    path: PathBuf,
    shared: Arc<Shared>,
}

impl LoggedRegistry {
    /// Opens the log at `path`, replaying every complete entry.
    ///
    /// A missing file is created. A torn entry at the end of the file, left
    /// by a crash mid-append, ends the replay and is cut off. Any other
    /// undecodable content fails with [`StorageError::InvalidData`].
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let replay = Self::replay(&path).await?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        let mut len = replay.valid_len;
        if replay.torn {
            warn!(
                path = %path.display(),
                offset = replay.valid_len,
                "discarding torn entry at end of url log"
            );
            file.set_len(replay.valid_len).await?;
        }
        if replay.needs_newline {
            file.write_all(b"\n").await?;
            file.sync_data().await?;
            len += 1;
        }

        info!(
            path = %path.display(),
            records = replay.index.len(),
            last_sequence = replay.last_sequence,
            "replayed url log"
        );

        Ok(Self {
            path,
            shared: Arc::new(Shared {
                index: RwLock::new(replay.index),
                log: Mutex::new(LogWriter {
                    sink: Box::new(file),
                    len,
                    last_sequence: replay.last_sequence,
                    poisoned: false,
                }),
            }),
        })
    }

    async fn replay(path: &Path) -> Result<Replay> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };

        let mut index = Index::default();
        let mut last_sequence = 0;
        let mut torn = false;

        let mut stream = serde_json::Deserializer::from_slice(&bytes).into_iter::<LogEntry>();
        loop {
            match stream.next() {
                None => break,
                Some(Ok(entry)) => {
                    last_sequence = last_sequence.max(entry.sequence);
                    Self::apply(&mut index, entry.into_record())?;
                }
                Some(Err(err)) if err.is_eof() => {
                    torn = true;
                    break;
                }
                Some(Err(err)) => {
                    return Err(StorageError::InvalidData(format!(
                        "url log {} is corrupt: {err}",
                        path.display()
                    )));
                }
            }
        }

        // After a torn entry the offset points at its first byte, past any
        // line break that closed the previous entry.
        let valid_len = if torn {
            stream.byte_offset()
        } else {
            bytes.len()
        };
        let needs_newline = valid_len > 0 && bytes[valid_len - 1] != b'\n';

        Ok(Replay {
            index,
            last_sequence,
            valid_len: valid_len as u64,
            torn,
            needs_newline,
        })
    }

    /// Applies one replayed record: a new code is inserted, a repeated code
    /// can only tombstone the record it names.
    fn apply(index: &mut Index, record: UrlRecord) -> Result<()> {
        match index.get(&record.short_code) {
            Some(existing) => {
                if existing.original_url != record.original_url
                    || existing.owner_id != record.owner_id
                {
                    return Err(StorageError::InvalidData(format!(
                        "url log reassigns short code {}",
                        record.short_code
                    )));
                }
                if record.deleted {
                    index.tombstone(&record.short_code);
                }
                Ok(())
            }
            None => {
                if !record.deleted {
                    index
                        .check_insert(&record.short_code, &record.original_url)
                        .map_err(|e| {
                            StorageError::InvalidData(format!("url log entry rejected: {e}"))
                        })?;
                }
                index.insert(record);
                Ok(())
            }
        }
    }

    /// Runs a write on a spawned task and waits for it. Dropping the
    /// returned future does not stop the write.
    async fn detached<T, F, Fut>(&self, write: F) -> Result<T>
    where
        F: FnOnce(Arc<Shared>) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        tokio::spawn(write(Arc::clone(&self.shared)))
            .await
            .map_err(|e| StorageError::Io(format!("url log writer task failed: {e}")))?
    }

    /// Path of the backing log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sequence number of the most recent log entry.
    pub async fn last_sequence(&self) -> u64 {
        self.shared.log.lock().await.last_sequence
    }

    /// Number of records held, tombstoned ones included.
    pub fn len(&self) -> usize {
        self.shared.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Registry for LoggedRegistry {
    fn backend_name(&self) -> &'static str {
        "logged"
    }

    fn batch_atomicity(&self) -> BatchAtomicity {
        BatchAtomicity::PerRecord
    }

    async fn save(&self, code: &ShortCode, original_url: &str, owner_id: &str) -> Result<()> {
        let record = UrlRecord {
            short_code: code.clone(),
            original_url: original_url.to_owned(),
            owner_id: owner_id.to_owned(),
            deleted: false,
        };
        self.detached(|shared| async move { shared.save(record).await })
            .await
    }

    async fn resolve(&self, code: &ShortCode) -> Result<UrlRecord> {
        self.shared
            .index
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
        Ok(self.shared.index.read().list_by_owner(owner_id))
    }

    async fn mark_deleted(&self, owner_id: &str, codes: &[ShortCode]) -> Result<usize> {
        let owner_id = owner_id.to_owned();
        let codes = codes.to_vec();
        self.detached(|shared| async move { shared.mark_deleted(&owner_id, &codes).await })
            .await
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
