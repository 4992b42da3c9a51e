//! URL shortener service implementation.
//!
//! [`ShortenerService`] is the calling layer over a [`Registry`]: it mints
//! short codes, retries on collisions, turns dedup conflicts into the
//! existing code and orchestrates batches. Deletions run out of band on a
//! [`DeletionQueue`].
//!
//! [`Registry`]: cutter_core::Registry

pub mod deletion;
pub mod error;
pub mod service;
pub mod shortener;

pub use deletion::{DeletionJob, DeletionQueue, DEFAULT_QUEUE_CAPACITY};
pub use error::ShortenerError;
pub use service::{ShortenerService, ShortenerSettings};
pub use shortener::{BatchItem, BatchRequest, Shortened, Shortener};
