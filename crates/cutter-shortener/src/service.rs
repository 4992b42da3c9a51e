use crate::error::{Result, ShortenerError};
use crate::shortener::{BatchItem, BatchRequest, Shortened, Shortener};
use async_trait::async_trait;
use cutter_core::{BatchAtomicity, NewUrl, Registry, ShortCode, StorageError, UrlPair};
use cutter_generator::Generator;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};
use typed_builder::TypedBuilder;

#[derive(Debug, Clone, TypedBuilder)]
pub struct ShortenerSettings {
    /// Codes tried per URL before giving up on collisions.
    #[builder(default = 4)]
    pub max_code_attempts: usize,
    /// Upper bound on every registry call. `None` waits as long as the
    /// backend takes.
    #[builder(default, setter(strip_option))]
    pub deadline: Option<Duration>,
}

impl Default for ShortenerSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A concrete implementation of the [`Shortener`] trait.
///
/// This service wraps a [`Registry`] and a [`Generator`] to handle:
/// - short code generation, regenerating when a code is already taken
/// - mapping dedup conflicts to [`Shortened::Existing`]
/// - batch validation and submission
/// - per-call deadlines
#[derive(Debug)]
pub struct ShortenerService<R, G> {
    registry: Arc<R>,
    generator: G,
    settings: ShortenerSettings,
}

impl<R: Registry, G: Generator> ShortenerService<R, G> {
    pub fn new(registry: Arc<R>, generator: G) -> Self {
        Self {
            registry,
            generator,
            settings: ShortenerSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ShortenerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Returns a handle to the underlying registry.
    pub fn registry(&self) -> Arc<R> {
        Arc::clone(&self.registry)
    }

    fn validate_url(url: &str) -> Result<()> {
        if url.is_empty() {
            return Err(ShortenerError::InvalidUrl(
                "URL cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_owner(owner_id: &str) -> Result<()> {
        if owner_id.is_empty() {
            return Err(ShortenerError::MissingOwner);
        }
        Ok(())
    }

    /// Runs a registry call under the configured deadline.
    ///
    /// The outer error is the deadline; the inner result is the registry's,
    /// left untouched so callers can match on `Conflict` and `CodeTaken`.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = cutter_core::Result<T>>,
    ) -> Result<cutter_core::Result<T>> {
        match self.settings.deadline {
            Some(deadline) => tokio::time::timeout(deadline, call)
                .await
                .map_err(|_| ShortenerError::DeadlineExceeded(deadline)),
            None => Ok(call.await),
        }
    }

    /// Generates one code per request, distinct within the batch.
    fn generate_batch_codes(&self, requests: &[BatchRequest]) -> Result<Vec<NewUrl>> {
        let mut seen = HashSet::with_capacity(requests.len());
        let mut entries = Vec::with_capacity(requests.len());

        for request in requests {
            let mut code = None;
            for _ in 0..self.settings.max_code_attempts {
                let candidate = self.generator.generate()?;
                if seen.insert(candidate.clone()) {
                    code = Some(candidate);
                    break;
                }
            }
            let code = code.ok_or(ShortenerError::CodeSpaceExhausted(
                self.settings.max_code_attempts,
            ))?;
            entries.push(NewUrl::new(code, request.original_url.clone()));
        }

        Ok(entries)
    }
}

#[async_trait]
impl<R: Registry, G: Generator> Shortener for ShortenerService<R, G> {
    async fn shorten(&self, original_url: &str, owner_id: &str) -> Result<Shortened> {
        Self::validate_url(original_url)?;
        Self::validate_owner(owner_id)?;

        for attempt in 1..=self.settings.max_code_attempts {
            let code = self.generator.generate()?;

            match self
                .bounded(self.registry.save(&code, original_url, owner_id))
                .await?
            {
                Ok(()) => {
                    debug!(code = %code, owner_id, "shortened url");
                    return Ok(Shortened::Created(code));
                }
                Err(StorageError::Conflict { existing }) => {
                    debug!(code = %existing, owner_id, "url already shortened");
                    return Ok(Shortened::Existing(existing));
                }
                Err(StorageError::CodeTaken(taken)) => {
                    debug!(code = %taken, attempt, "short code collision, regenerating");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(ShortenerError::CodeSpaceExhausted(
            self.settings.max_code_attempts,
        ))
    }

    async fn shorten_batch(
        &self,
        owner_id: &str,
        requests: Vec<BatchRequest>,
    ) -> Result<Vec<BatchItem>> {
        Self::validate_owner(owner_id)?;
        if requests.is_empty() {
            return Err(ShortenerError::EmptyBatch);
        }

        let mut urls = HashSet::with_capacity(requests.len());
        for request in &requests {
            if request.original_url.is_empty() {
                return Err(ShortenerError::InvalidUrl(format!(
                    "empty original url for correlation id {}",
                    request.correlation_id
                )));
            }
            if !urls.insert(request.original_url.as_str()) {
                return Err(ShortenerError::InvalidUrl(format!(
                    "original url {} appears twice in the batch",
                    request.original_url
                )));
            }
        }

        // Only an atomic backend leaves nothing behind on failure, so only
        // there is regenerating the whole batch safe.
        let retry_collisions = self.registry.batch_atomicity() == BatchAtomicity::Atomic;

        for attempt in 1..=self.settings.max_code_attempts {
            let entries = self.generate_batch_codes(&requests)?;

            match self
                .bounded(self.registry.save_batch(&entries, owner_id))
                .await?
            {
                Ok(()) => {
                    debug!(owner_id, size = entries.len(), "shortened batch");
                    return Ok(requests
                        .into_iter()
                        .zip(entries)
                        .map(|(request, entry)| BatchItem {
                            correlation_id: request.correlation_id,
                            short_code: entry.short_code,
                        })
                        .collect());
                }
                Err(StorageError::CodeTaken(taken)) if retry_collisions => {
                    debug!(code = %taken, attempt, "short code collision in batch, regenerating");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(ShortenerError::CodeSpaceExhausted(
            self.settings.max_code_attempts,
        ))
    }

    async fn resolve(&self, code: &str) -> Result<String> {
        let code = ShortCode::new(code)?;
        trace!(code = %code, "resolving short code");

        let record = self.bounded(self.registry.resolve(&code)).await??;
        if record.deleted {
            return Err(ShortenerError::Gone(code.into_string()));
        }
        Ok(record.original_url)
    }

    async fn list(&self, owner_id: &str) -> Result<Vec<UrlPair>> {
        Self::validate_owner(owner_id)?;
        Ok(self
            .bounded(self.registry.list_by_owner(owner_id))
            .await??)
    }

    async fn health(&self) -> Result<()> {
        Ok(self.bounded(self.registry.health_check()).await??)
    }
}
