use crate::error::{Result, ShortenerError};
use cutter_core::{Registry, ShortCode};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// A request to tombstone `codes` on behalf of `owner_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionJob {
    pub owner_id: String,
    pub codes: Vec<ShortCode>,
}

struct Envelope {
    job: DeletionJob,
    ack: Option<oneshot::Sender<cutter_core::Result<usize>>>,
}

/// Bounded queue feeding a single background worker that applies
/// [`Registry::mark_deleted`].
///
/// Submitting never waits on storage. Once accepted, a job is applied
/// exactly once; codes the owner does not hold are skipped by the registry.
/// Dropping every handle closes the queue and lets the worker drain and exit.
#[derive(Debug, Clone)]
pub struct DeletionQueue {
    sender: mpsc::Sender<Envelope>,
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("job", &self.job)
            .field("tracked", &self.ack.is_some())
            .finish()
    }
}

impl DeletionQueue {
    /// Starts the worker on the current runtime.
    pub fn spawn<R>(registry: Arc<R>, capacity: usize) -> (Self, JoinHandle<()>)
    where
        R: Registry + ?Sized,
    {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(run_worker(registry, receiver));
        (Self { sender }, worker)
    }

    /// Enqueues a job without waiting for it to be applied.
    pub fn submit(&self, job: DeletionJob) -> Result<()> {
        self.enqueue(Envelope { job, ack: None })
    }

    /// Enqueues a job and returns a receiver for the number of records it
    /// tombstoned.
    pub fn submit_tracked(
        &self,
        job: DeletionJob,
    ) -> Result<oneshot::Receiver<cutter_core::Result<usize>>> {
        let (ack, receiver) = oneshot::channel();
        self.enqueue(Envelope {
            job,
            ack: Some(ack),
        })?;
        Ok(receiver)
    }

    fn enqueue(&self, envelope: Envelope) -> Result<()> {
        self.sender.try_send(envelope).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => ShortenerError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => ShortenerError::QueueClosed,
        })
    }
}

async fn run_worker<R>(registry: Arc<R>, mut receiver: mpsc::Receiver<Envelope>)
where
    R: Registry + ?Sized,
{
    info!(backend = registry.backend_name(), "deletion worker started");

    while let Some(Envelope { job, ack }) = receiver.recv().await {
        let result = registry.mark_deleted(&job.owner_id, &job.codes).await;
        match &result {
            Ok(marked) => debug!(
                owner_id = %job.owner_id,
                requested = job.codes.len(),
                marked,
                "applied deletion"
            ),
            Err(err) => error!(
                owner_id = %job.owner_id,
                requested = job.codes.len(),
                error = %err,
                "deletion failed"
            ),
        }
        if let Some(ack) = ack {
            // The submitter may have stopped waiting.
            let _ = ack.send(result);
        }
    }

    info!("deletion queue closed, worker exiting");
}
