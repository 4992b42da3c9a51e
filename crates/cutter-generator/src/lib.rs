//! Short code generators.
//!
//! Generators are pure: they never consult a registry, so uniqueness of
//! their output is not guaranteed. Collision handling belongs to the caller.

pub mod error;
pub mod random;
pub mod seq;

pub use error::GeneratorError;
pub use random::RandomGenerator;
pub use seq::SeqGenerator;

use cutter_core::ShortCode;

/// Trait for generating short codes.
///
/// Implementations can vary from random generators to deterministic
/// sequences used in tests.
pub trait Generator: Send + Sync + 'static {
    /// Produces a new candidate short code.
    fn generate(&self) -> Result<ShortCode, GeneratorError>;
}

impl<G: Generator + ?Sized> Generator for std::sync::Arc<G> {
    fn generate(&self) -> Result<ShortCode, GeneratorError> {
        (**self).generate()
    }
}
