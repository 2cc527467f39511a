pub mod error;
pub mod random;

pub use error::GeneratorError;
pub use random::{generate, RandomGenerator, ALPHABET, DEFAULT_SLUG_LENGTH};

use snip_core::Slug;

/// Trait for generating slugs.
///
/// Implementations are pure generators that don't interact with storage.
/// A generated slug is not guaranteed to be unique; uniqueness is enforced
/// by the storage backend at insertion time, and the service regenerates on
/// collision.
pub trait Generator: Send + Sync + 'static {
    /// Generates the next candidate slug.
    fn generate(&self) -> Result<Slug, GeneratorError>;
}
