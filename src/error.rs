use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
  /// The leaf index is not in `[0, size)`.
  #[error("index out of bounds: {index} (size {size})")]
  OutOfRange { index: u64, size: u64 },

  /// Rejected by the hash function or the proof decoder, e.g. a digest of the wrong width.
  #[error("invalid input: {0}")]
  InvalidInput(String),

  #[error(transparent)]
  Io(#[from] std::io::Error),
}
