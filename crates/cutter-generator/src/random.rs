use crate::error::GeneratorError;
use crate::Generator;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use cutter_core::shortcode::{MAX_LENGTH, MIN_LENGTH};
use cutter_core::ShortCode;
use rand::rngs::OsRng;
use rand::RngCore;

pub const DEFAULT_CODE_LENGTH: usize = 8;

/// Generates short codes from operating system randomness.
///
/// Draws `length` random bytes, encodes them with the URL-safe base64
/// alphabet and keeps the first `length` characters. Because `length`
/// bytes always encode to more than `length` characters, no padding ever
/// reaches the output.
#[derive(Debug, Clone)]
pub struct RandomGenerator {
    length: usize,
}

impl RandomGenerator {
    pub fn new(length: usize) -> Result<Self, GeneratorError> {
        if !(MIN_LENGTH..=MAX_LENGTH).contains(&length) {
            return Err(GeneratorError::InvalidLength(length));
        }
        Ok(Self { length })
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self {
            length: DEFAULT_CODE_LENGTH,
        }
    }
}

impl Generator for RandomGenerator {
    fn generate(&self) -> Result<ShortCode, GeneratorError> {
        let mut bytes = vec![0u8; self.length];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| GeneratorError::EntropyUnavailable(e.to_string()))?;

        let mut encoded = URL_SAFE.encode(&bytes);
        encoded.truncate(self.length);
        Ok(ShortCode::new_unchecked(encoded))
    }
}
