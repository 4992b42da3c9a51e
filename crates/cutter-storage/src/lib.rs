//! Registry backends.
//!
//! - [`VolatileRegistry`]: process memory only.
//! - [`LoggedRegistry`]: process memory, written through to an append-only
//!   JSON lines log that is replayed on open.
//! - [`PostgresRegistry`]: PostgreSQL, with batch inserts in one transaction.

mod index;
pub mod logged;
pub mod memory;
pub mod postgres;

pub use cutter_core::{
    BatchAtomicity, NewUrl, Registry, Result, ShortCode, StorageError, UrlPair, UrlRecord,
};
pub use logged::LoggedRegistry;
pub use memory::VolatileRegistry;
pub use postgres::PostgresRegistry;
