//! Stale visitor reaper.
//!
//! Called on every request and paces itself through a shared "last cleanup"
//! timestamp, so cleanup runs roughly once per half active-timeout without a
//! scheduler. Claiming the slot is a plain read-then-write: two requests can
//! both run a cleanup, which is harmless because deletes are idempotent.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::{
  Error, Result,
  cache::SharedCache,
  config::TrackerConfig,
  store::{VisitorStore, earlier},
};

/// Cache key holding the time of the last cleanup run.
pub const LAST_CLEANUP_KEY: &str = "presence:last_cleanup";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReapOutcome {
  /// A cleanup ran recently enough; nothing was done.
  Throttled,
  /// The slot was claimed but retention is disabled.
  Disabled,
  /// Records last updated at or before the retention cutoff were deleted.
  Purged(u64),
}

#[derive(Debug, Clone, Default)]
pub struct Reaper {
  config: TrackerConfig,
}

impl Reaper {
  pub fn new(config: TrackerConfig) -> Self { Self { config } }

  pub async fn run<S, C>(&self, store: &S, cache: &C, now: DateTime<Utc>) -> Result<ReapOutcome>
  where
    S: VisitorStore,
    C: SharedCache,
  {
    let last_run = cache
      .get_timestamp(LAST_CLEANUP_KEY)
      .await
      .map_err(Error::cache)?;

    let due_before = earlier(now, self.config.cleanup_interval());
    if last_run.is_some_and(|at| at > due_before) {
      return Ok(ReapOutcome::Throttled);
    }

    cache
      .set_timestamp(LAST_CLEANUP_KEY, now)
      .await
      .map_err(Error::cache)?;

    let Some(retention) = self.config.retention().as_delta() else {
      debug!("visitor cleanup disabled");
      return Ok(ReapOutcome::Disabled);
    };

    let cutoff = earlier(now, retention);
    let deleted = store
      .delete_updated_before(cutoff)
      .await
      .map_err(Error::store)?;
    if deleted > 0 {
      info!(deleted, %cutoff, "purged stale visitors");
    }
    Ok(ReapOutcome::Purged(deleted))
  }
}
