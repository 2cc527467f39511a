use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeneratorError {
    #[error("slug length must be greater than zero, got {0}")]
    InvalidLength(usize),
}
