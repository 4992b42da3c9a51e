use async_trait::async_trait;
use cutter_core::{
    validate_batch, BatchAtomicity, NewUrl, Registry, Result, ShortCode, StorageError, UrlPair,
    UrlRecord,
};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::time::Duration;

const SHORT_URL_CONSTRAINT: &str = "urls_short_url_key";
const ACTIVE_ORIGINAL_URL_INDEX: &str = "urls_original_url_active_idx";

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// PostgreSQL implementation of the registry contract.
///
/// The schema enforces both uniqueness rules: `short_url` is unique across
/// every row, tombstoned or not, and a partial unique index keeps
/// `original_url` unique among live rows. Saves rely on those constraints
/// rather than checking first: the URL index arbitrates `ON CONFLICT`, so a
/// live URL is reported as a conflict ahead of a short code collision.
/// There is no in-process cache.
///
/// Batches are written in one transaction and commit as a whole.
#[derive(Debug, Clone)]
pub struct PostgresRegistry {
    pool: PgPool,
}

/// Which uniqueness rule an insert broke.
enum UniqueViolation {
    ShortCode,
    OriginalUrl,
}

impl PostgresRegistry {
    /// Creates a registry from an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a registry by opening a new connection pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .acquire_timeout(DEFAULT_ACQUIRE_TIMEOUT)
            .connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Applies the bundled schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Query(format!("migration failed: {e}")))
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Inserts one batch entry inside a caller-owned transaction.
    ///
    /// Nothing is visible until the caller commits; dropping the
    /// transaction rolls the insert back. A short code collision is
    /// reported as [`StorageError::CodeTaken`]; every other failure as
    /// [`StorageError::Transaction`].
    pub async fn save_batch_in_transaction(
        tx: &mut Transaction<'_, Postgres>,
        code: &ShortCode,
        original_url: &str,
        owner_id: &str,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO urls (user_id, short_url, original_url)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(owner_id)
        .bind(code.as_str())
        .bind(original_url)
        .execute(&mut **tx)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) => match unique_violation(&err) {
                Some(UniqueViolation::ShortCode) => Err(StorageError::CodeTaken(code.to_string())),
                Some(UniqueViolation::OriginalUrl) => Err(StorageError::Transaction(format!(
                    "{original_url} is already shortened"
                ))),
                None => Err(StorageError::Transaction(format!(
                    "insert of {code} failed: {err}"
                ))),
            },
        }
    }

    async fn find_active_by_original(&self, original_url: &str) -> Result<Option<ShortCode>> {
        let row = sqlx::query(
            r#"
            SELECT short_url
            FROM urls
            WHERE original_url = $1
              AND NOT is_deleted
            LIMIT 1
            "#,
        )
        .bind(original_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(|row| {
            row.try_get::<String, _>("short_url")
                .map(ShortCode::new_unchecked)
                .map_err(map_sqlx_error)
        })
        .transpose()
    }
}

fn unique_violation(err: &sqlx::Error) -> Option<UniqueViolation> {
    let db_err = err
        .as_database_error()
        .filter(|e| e.is_unique_violation())?;

    match db_err.constraint() {
        Some(SHORT_URL_CONSTRAINT) => Some(UniqueViolation::ShortCode),
        Some(ACTIVE_ORIGINAL_URL_INDEX) => Some(UniqueViolation::OriginalUrl),
        _ => None,
    }
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

fn record_from_row(row: &PgRow) -> Result<UrlRecord> {
    let short_code: String = row.try_get("short_url").map_err(map_sqlx_error)?;
    Ok(UrlRecord {
        short_code: ShortCode::new_unchecked(short_code),
        original_url: row.try_get("original_url").map_err(map_sqlx_error)?,
        owner_id: row.try_get("user_id").map_err(map_sqlx_error)?,
        deleted: row.try_get("is_deleted").map_err(map_sqlx_error)?,
    })
}

#[async_trait]
impl Registry for PostgresRegistry {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    fn batch_atomicity(&self) -> BatchAtomicity {
        BatchAtomicity::Atomic
    }

    async fn save(&self, code: &ShortCode, original_url: &str, owner_id: &str) -> Result<()> {
        // The active-URL index is the conflict arbiter, so a resubmitted URL
        // yields no row even when the code is taken too. Only the short code
        // constraint can still raise.
        let inserted = sqlx::query(
            r#"
            INSERT INTO urls (user_id, short_url, original_url)
            VALUES ($1, $2, $3)
            ON CONFLICT (original_url) WHERE NOT is_deleted DO NOTHING
            RETURNING short_url
            "#,
        )
        .bind(owner_id)
        .bind(code.as_str())
        .bind(original_url)
        .fetch_optional(&self.pool)
        .await;

        match inserted {
            Ok(Some(_)) => Ok(()),
            Ok(None) => match self.find_active_by_original(original_url).await? {
                Some(existing) => Err(StorageError::Conflict { existing }),
                // The holder was tombstoned between the insert and the lookup.
                None => Err(StorageError::Query(format!(
                    "conflicting record for {original_url} disappeared, retry the save"
                ))),
            },
            Err(err) => match unique_violation(&err) {
                Some(UniqueViolation::ShortCode) => Err(StorageError::CodeTaken(code.to_string())),
                _ => Err(map_sqlx_error(err)),
            },
        }
    }

    async fn resolve(&self, code: &ShortCode) -> Result<UrlRecord> {
        let row = sqlx::query(
            r#"
            SELECT short_url, original_url, user_id, is_deleted
            FROM urls
            WHERE short_url = $1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(row) => record_from_row(&row),
            None => Err(StorageError::NotFound(code.to_string())),
        }
    }

    async fn save_batch(&self, entries: &[NewUrl], owner_id: &str) -> Result<()> {
        validate_batch(entries)?;

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        for entry in entries {
            // Returning early drops `tx`, which rolls the batch back.
            Self::save_batch_in_transaction(
                &mut tx,
                &entry.short_code,
                &entry.original_url,
                owner_id,
            )
            .await?;
        }
        tx.commit()
            .await
            .map_err(|e| StorageError::Transaction(format!("commit failed: {e}")))
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<UrlPair>> {
        let rows = sqlx::query(
            r#"
            SELECT short_url, original_url
            FROM urls
            WHERE user_id = $1
              AND NOT is_deleted
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter()
            .map(|row| {
                let short_code: String = row.try_get("short_url").map_err(map_sqlx_error)?;
                Ok(UrlPair {
                    short_code: ShortCode::new_unchecked(short_code),
                    original_url: row.try_get("original_url").map_err(map_sqlx_error)?,
                })
            })
            .collect()
    }

    async fn mark_deleted(&self, owner_id: &str, codes: &[ShortCode]) -> Result<usize> {
        if codes.is_empty() {
            return Ok(0);
        }

        let codes: Vec<String> = codes.iter().map(|c| c.as_str().to_owned()).collect();
        let result = sqlx::query(
            r#"
            UPDATE urls
            SET is_deleted = TRUE
            WHERE user_id = $1
              AND short_url = ANY($2)
              AND NOT is_deleted
            "#,
        )
        .bind(owner_id)
        .bind(codes)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() as usize)
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| StorageError::Unavailable(e.to_string()))
    }
}
