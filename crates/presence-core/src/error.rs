//! Error types for `presence-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("cache error: {0}")]
  Cache(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("invalid ignore prefix {0:?}: prefixes must start with '/'")]
  InvalidPrefix(String),

  #[error("{setting} = {value} is out of range (at most {max})")]
  OutOfRange {
    setting: &'static str,
    value:   u64,
    max:     u64,
  },
}

impl Error {
  pub(crate) fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }

  pub(crate) fn cache<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Cache(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
