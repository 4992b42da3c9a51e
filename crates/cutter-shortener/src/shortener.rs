use crate::error::Result;
use async_trait::async_trait;
use cutter_core::{ShortCode, UrlPair};

/// Outcome of shortening a single URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shortened {
    /// A new record was created under this code.
    Created(ShortCode),
    /// The URL was already shortened; this is the code it already has.
    Existing(ShortCode),
}

impl Shortened {
    pub fn code(&self) -> &ShortCode {
        match self {
            Shortened::Created(code) | Shortened::Existing(code) => code,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Shortened::Created(_))
    }
}

/// One URL of a batch submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    /// Caller-chosen id echoed back in the matching [`BatchItem`].
    pub correlation_id: String,
    pub original_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub correlation_id: String,
    pub short_code: ShortCode,
}

#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Shortens `original_url` on behalf of `owner_id`.
    async fn shorten(&self, original_url: &str, owner_id: &str) -> Result<Shortened>;

    /// Shortens several URLs at once. Items come back in request order.
    async fn shorten_batch(
        &self,
        owner_id: &str,
        requests: Vec<BatchRequest>,
    ) -> Result<Vec<BatchItem>>;

    /// Returns the original URL behind `code`.
    ///
    /// Fails with `NotFound` for unknown codes and `Gone` for deleted ones.
    async fn resolve(&self, code: &str) -> Result<String>;

    /// Lists the live URLs owned by `owner_id`.
    async fn list(&self, owner_id: &str) -> Result<Vec<UrlPair>>;

    async fn health(&self) -> Result<()>;
}
