use crate::error::GeneratorError;
use crate::Generator;
use cutter_core::ShortCode;
use std::sync::atomic::{AtomicU64, Ordering};

/// A short code generator using a sequential counter.
///
/// Produces codes like `cu000000`, `cu000001`, ... Codes are unique within
/// one instance. Restarting from a fixed offset replays earlier codes,
/// which makes it handy for exercising collision handling.
#[derive(Debug)]
pub struct SeqGenerator {
    counter: AtomicU64,
    prefix: String,
}

impl SeqGenerator {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self::with_offset(prefix, 0)
    }

    /// Starts the counter at `offset`.
    pub fn with_offset(prefix: impl Into<String>, offset: u64) -> Self {
        Self {
            counter: AtomicU64::new(offset),
            prefix: prefix.into(),
        }
    }
}

impl Generator for SeqGenerator {
    fn generate(&self) -> Result<ShortCode, GeneratorError> {
        let count = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(ShortCode::new_unchecked(format!("{}{:06}", self.prefix, count)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_sequential_codes() {
        let generator = SeqGenerator::with_prefix("cu");

        assert_eq!(generator.generate().unwrap().as_str(), "cu000000");
        assert_eq!(generator.generate().unwrap().as_str(), "cu000001");
        assert_eq!(generator.generate().unwrap().as_str(), "cu000002");
    }

    #[test]
    fn with_offset() {
        let generator = SeqGenerator::with_offset("cu", 1000);

        assert_eq!(generator.generate().unwrap().as_str(), "cu001000");
        assert_eq!(generator.generate().unwrap().as_str(), "cu001001");
    }

    #[test]
    fn generator_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SeqGenerator>();
    }
}
