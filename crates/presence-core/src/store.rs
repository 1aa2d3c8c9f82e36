//! The `VisitorStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `presence-store-sqlite`).
//! The tracker, the reaper and the HTTP layer depend on this abstraction, not
//! on any concrete backend.

use std::future::Future;

use chrono::{DateTime, TimeDelta, Utc};

use crate::visitor::Visitor;

// ─── Query type ──────────────────────────────────────────────────────────────

/// Filter for [`VisitorStore::list_visitors`].
///
/// Built from explicit timestamps; nothing here reads the clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisitorFilter {
  /// Only visitors whose `last_update` is at or after this instant.
  pub updated_since: Option<DateTime<Utc>>,
}

/// `now - delta`, clamped to the earliest representable instant.
pub(crate) fn earlier(now: DateTime<Utc>, delta: TimeDelta) -> DateTime<Utc> {
  now.checked_sub_signed(delta).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

impl VisitorFilter {
  pub fn all() -> Self { Self::default() }

  /// Visitors seen within `timeout` of `now`.
  pub fn active(now: DateTime<Utc>, timeout: TimeDelta) -> Self {
    Self { updated_since: Some(earlier(now, timeout)) }
  }

  pub fn matches(&self, visitor: &Visitor) -> bool {
    self
      .updated_since
      .is_none_or(|cutoff| visitor.last_update >= cutoff)
  }
}

/// Result of a write that may hit the (session key, IP) uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
  Written,
  /// Another record already holds this (session key, IP) pair.
  Conflict,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a visitor-record backend.
///
/// Backends enforce uniqueness of `(session_key, ip_address)` and report a
/// violation as [`WriteOutcome::Conflict`] rather than an error.
pub trait VisitorStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The record keyed by `(session_key, ip_address)`, if any.
  fn find_by_key<'a>(
    &'a self,
    session_key: &'a str,
    ip_address: &'a str,
  ) -> impl Future<Output = Result<Option<Visitor>, Self::Error>> + Send + 'a;

  /// The most recently updated record with this IP and user agent whose
  /// `last_update` is at or after `since`.
  fn find_recent_by_agent<'a>(
    &'a self,
    ip_address: &'a str,
    user_agent: &'a str,
    since: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Visitor>, Self::Error>> + Send + 'a;

  fn insert_visitor<'a>(
    &'a self,
    visitor: &'a Visitor,
  ) -> impl Future<Output = Result<WriteOutcome, Self::Error>> + Send + 'a;

  /// Overwrite the record with `visitor.visitor_id`.
  fn update_visitor<'a>(
    &'a self,
    visitor: &'a Visitor,
  ) -> impl Future<Output = Result<WriteOutcome, Self::Error>> + Send + 'a;

  /// Overwrite every mutable field of the record holding
  /// `(visitor.session_key, visitor.ip_address)`. Returns the rows touched.
  fn update_by_key<'a>(
    &'a self,
    visitor: &'a Visitor,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  /// Visitors matching `filter`, most recently updated first.
  fn list_visitors<'a>(
    &'a self,
    filter: &'a VisitorFilter,
  ) -> impl Future<Output = Result<Vec<Visitor>, Self::Error>> + Send + 'a;

  /// Delete every record with `last_update <= cutoff`. Returns the rows
  /// deleted.
  fn delete_updated_before(
    &self,
    cutoff: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use uuid::Uuid;

  use super::*;

  fn seen_at(last_update: DateTime<Utc>) -> Visitor {
    Visitor {
      visitor_id: Uuid::new_v4(),
      session_key: "s".into(),
      ip_address: "10.0.0.1".into(),
      user: None,
      user_agent: String::new(),
      referrer: "unknown".into(),
      url: "/".into(),
      page_views: 1,
      session_start: Some(last_update),
      last_update,
    }
  }

  #[test]
  fn active_filter_clamps_huge_timeouts() {
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let filter = VisitorFilter::active(now, TimeDelta::MAX);
    assert_eq!(filter.updated_since, Some(DateTime::<Utc>::MIN_UTC));
    assert!(filter.matches(&seen_at(Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap())));
  }

  #[test]
  fn active_filter_uses_explicit_clock() {
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let filter = VisitorFilter::active(now, TimeDelta::minutes(60));

    assert!(filter.matches(&seen_at(now - TimeDelta::minutes(30))));
    assert!(filter.matches(&seen_at(now - TimeDelta::minutes(60))));
    assert!(!filter.matches(&seen_at(now - TimeDelta::minutes(61))));
  }

  #[test]
  fn all_filter_matches_everything() {
    let old = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
    assert!(VisitorFilter::all().matches(&seen_at(old)));
  }
}
