//! Core types and traits for the cutter URL registry.
//!
//! This crate defines the [`Registry`] capability contract shared by every
//! storage backend, along with the record and short code types that flow
//! through it.

pub mod error;
pub mod registry;
pub mod shortcode;

pub use error::{CoreError, Result, StorageError};
pub use registry::{validate_batch, BatchAtomicity, NewUrl, Registry, UrlPair, UrlRecord};
pub use shortcode::ShortCode;
