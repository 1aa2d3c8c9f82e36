//! The visitor tracker: find-or-create, merge-by-recency and conflict retry.
//!
//! Runs once per inbound request. The find-or-create sequence is not wrapped
//! in a transaction; two concurrent first requests for the same visitor may
//! both try to insert, and the loser turns its insert into an update.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::{
  Error, Result,
  config::TrackerConfig,
  request::{RequestInfo, SessionState},
  store::{VisitorStore, WriteOutcome},
  visitor::{truncate, Visitor, URL_MAX},
};

/// A visitor with the same IP and user agent seen this recently is assumed to
/// be the same browser under a rotated session key.
pub const MERGE_WINDOW: TimeDelta = TimeDelta::minutes(5);

/// Inactivity after which the next request starts a new session.
pub const SESSION_BOUNDARY: TimeDelta = TimeDelta::hours(1);

/// Why a request was not tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
  /// Background fetch rather than a page navigation.
  Background,
  /// The session has not been issued a key yet.
  NoSession,
  /// The path matches an ignore prefix.
  Ignored,
}

/// What [`Tracker::track`] did with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackOutcome {
  Skipped(SkipReason),
  /// No matching record existed; a new one was inserted.
  Created(Visitor),
  /// The record for this (session key, IP) was updated.
  Updated(Visitor),
  /// A recent record with the same IP and user agent took over the new
  /// session key.
  Merged(Visitor),
  /// The write collided with a concurrent insert and was applied as an
  /// update to the winning record instead.
  Recovered(Visitor),
}

impl TrackOutcome {
  pub fn visitor(&self) -> Option<&Visitor> {
    match self {
      Self::Skipped(_) => None,
      Self::Created(v) | Self::Updated(v) | Self::Merged(v) | Self::Recovered(v) => Some(v),
    }
  }
}

enum Found {
  Exact(Visitor),
  Merged(Visitor),
  New,
}

#[derive(Debug, Clone, Default)]
pub struct Tracker {
  config: TrackerConfig,
}

impl Tracker {
  pub fn new(config: TrackerConfig) -> Self { Self { config } }

  pub fn config(&self) -> &TrackerConfig { &self.config }

  /// Decide whether `request` should be tracked at all.
  pub fn check(&self, request: &RequestInfo) -> Option<SkipReason> {
    if request.is_background {
      return Some(SkipReason::Background);
    }
    if request.session == SessionState::Pending {
      return Some(SkipReason::NoSession);
    }
    if let Some(prefix) = self.config.ignored_by(&request.path) {
      debug!(path = %request.path, %prefix, "not tracking request");
      return Some(SkipReason::Ignored);
    }
    None
  }

  /// Track a page request, unless [`check`](Self::check) rules it out.
  pub async fn track<S: VisitorStore>(
    &self,
    store: &S,
    request: &RequestInfo,
    now: DateTime<Utc>,
  ) -> Result<TrackOutcome> {
    if let Some(reason) = self.check(request) {
      return Ok(TrackOutcome::Skipped(reason));
    }
    self.record(store, request, now).await
  }

  /// Record a visit without the background and ignore-prefix checks.
  ///
  /// Still defers when the session has no key yet.
  pub async fn record<S: VisitorStore>(
    &self,
    store: &S,
    request: &RequestInfo,
    now: DateTime<Utc>,
  ) -> Result<TrackOutcome> {
    let Some(session_key) = request.session_key() else {
      return Ok(TrackOutcome::Skipped(SkipReason::NoSession));
    };
    let ip_address = request.client_ip();
    let user_agent = request.user_agent();

    let found = match store
      .find_by_key(&session_key, &ip_address)
      .await
      .map_err(Error::store)?
    {
      Some(existing) => Found::Exact(existing),
      None => match store
        .find_recent_by_agent(&ip_address, &user_agent, now - MERGE_WINDOW)
        .await
        .map_err(Error::store)?
      {
        Some(existing) => {
          debug!(
            %ip_address, %user_agent, visitor_id = %existing.visitor_id,
            "using existing visitor for rotated session key"
          );
          Found::Merged(existing)
        }
        None => Found::New,
      },
    };

    let prior = match &found {
      Found::Exact(v) | Found::Merged(v) => Some(v),
      Found::New => None,
    };
    let new_session = prior.is_none_or(|v| v.last_update <= now - SESSION_BOUNDARY);

    let visitor = Visitor {
      visitor_id: prior.map_or_else(Uuid::new_v4, |v| v.visitor_id),
      session_key,
      ip_address,
      user: request.user.clone(),
      user_agent,
      referrer: match prior {
        Some(v) if !new_session => v.referrer.clone(),
        _ => request.referrer(),
      },
      url: truncate(&request.path, URL_MAX),
      page_views: match prior {
        Some(v) if !new_session => v.page_views.saturating_add(1),
        _ => 1,
      },
      session_start: match prior {
        Some(v) if !new_session => v.session_start,
        _ => Some(now),
      },
      last_update: prior.map_or(now, |v| v.last_update.max(now)),
    };

    let written = match &found {
      Found::New => store.insert_visitor(&visitor).await,
      Found::Exact(_) | Found::Merged(_) => store.update_visitor(&visitor).await,
    }
    .map_err(Error::store)?;

    if written == WriteOutcome::Conflict {
      debug!(
        session_key = %visitor.session_key, ip_address = %visitor.ip_address,
        "visitor written concurrently; updating existing record"
      );
      store.update_by_key(&visitor).await.map_err(Error::store)?;
      return Ok(TrackOutcome::Recovered(visitor));
    }

    Ok(match found {
      Found::Exact(_) => TrackOutcome::Updated(visitor),
      Found::Merged(_) => TrackOutcome::Merged(visitor),
      Found::New => {
        debug!(
          session_key = %visitor.session_key, ip_address = %visitor.ip_address,
          "created a new visitor"
        );
        TrackOutcome::Created(visitor)
      }
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::{HostPaths, TrackerSettings};

  fn tracker() -> Tracker {
    let settings = TrackerSettings {
      ignore_prefixes: vec!["/static/".into()],
      ..Default::default()
    };
    Tracker::new(TrackerConfig::build(settings, &HostPaths::default()).unwrap())
  }

  fn page(path: &str) -> RequestInfo {
    RequestInfo::new(path, SessionState::Key("session-1".into()))
  }

  #[test]
  fn check_skips_background_requests() {
    let mut req = page("/");
    req.is_background = true;
    assert_eq!(tracker().check(&req), Some(SkipReason::Background));
  }

  #[test]
  fn check_skips_pending_sessions() {
    let req = RequestInfo::new("/", SessionState::Pending);
    assert_eq!(tracker().check(&req), Some(SkipReason::NoSession));
  }

  #[test]
  fn check_skips_ignored_prefixes() {
    assert_eq!(tracker().check(&page("/static/site.css")), Some(SkipReason::Ignored));
    assert_eq!(tracker().check(&page("/articles/1")), None);
  }

  #[test]
  fn check_tracks_without_session_mechanism() {
    let req = RequestInfo::new("/", SessionState::Unavailable);
    assert_eq!(tracker().check(&req), None);
  }
}
