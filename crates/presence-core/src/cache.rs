//! The shared cache the reaper uses to pace itself.
//!
//! Only one scalar is ever stored: the time of the last cleanup run. A
//! process-local [`MemoryCache`] is enough for a single server; backends that
//! several processes share (e.g. the SQLite store) pace all of them together.

use std::{
  collections::HashMap,
  convert::Infallible,
  future::Future,
  sync::{Mutex, PoisonError},
};

use chrono::{DateTime, Utc};

pub trait SharedCache: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn get_timestamp<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<DateTime<Utc>>, Self::Error>> + Send + 'a;

  fn set_timestamp<'a>(
    &'a self,
    key: &'a str,
    value: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

/// In-process cache. Not shared between processes.
#[derive(Debug, Default)]
pub struct MemoryCache {
  entries: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl MemoryCache {
  pub fn new() -> Self { Self::default() }
}

impl SharedCache for MemoryCache {
  type Error = Infallible;

  async fn get_timestamp(&self, key: &str) -> Result<Option<DateTime<Utc>>, Infallible> {
    let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    Ok(entries.get(key).copied())
  }

  async fn set_timestamp(&self, key: &str, value: DateTime<Utc>) -> Result<(), Infallible> {
    let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    entries.insert(key.to_owned(), value);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn memory_cache_round_trips_timestamps() {
    let cache = MemoryCache::new();
    assert_eq!(cache.get_timestamp("k").await.unwrap(), None);

    let now = Utc::now();
    cache.set_timestamp("k", now).await.unwrap();
    assert_eq!(cache.get_timestamp("k").await.unwrap(), Some(now));
    assert_eq!(cache.get_timestamp("other").await.unwrap(), None);
  }
}
