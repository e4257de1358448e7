use rand::distr::{Alphanumeric, SampleString};

use crate::generator::Generator;
use hotlink_core::ShortCode;

const DEFAULT_LENGTH: usize = 8;

/// Random `[A-Za-z0-9]` codes of a fixed length.
#[derive(Debug, Clone, Copy)]
pub struct RandomGenerator {
    length: usize,
}

impl RandomGenerator {
    pub fn new() -> Self {
        Self {
            length: DEFAULT_LENGTH,
        }
    }

    /// Lengths below 3 are raised to 3 so every code is a valid `ShortCode`.
    pub fn with_length(length: usize) -> Self {
        Self {
            length: length.clamp(3, 32),
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for RandomGenerator {
    fn generate(&self) -> ShortCode {
        let code = Alphanumeric.sample_string(&mut rand::rng(), self.length);
        ShortCode::new_unchecked(code)
    }
}
