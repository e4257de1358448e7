pub mod generator;
pub mod service;

pub use generator::random::RandomGenerator;
pub use generator::seq::SequentialGenerator;
pub use generator::Generator;
pub use service::{ShortenerService, RESERVED_ROUTES};
