//! The visitor record and the values derived from it.
//!
//! A [`Visitor`] is one tracked (session key, IP address) pair. Derived values
//! such as time-on-site are computed on read and never stored.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Field limits ────────────────────────────────────────────────────────────

pub const SESSION_KEY_MAX: usize = 40;
pub const IP_ADDRESS_MAX: usize = 45;
pub const USER_AGENT_MAX: usize = 255;
pub const REFERRER_MAX: usize = 255;
pub const URL_MAX: usize = 255;

/// Truncate `value` to at most `max` characters, never splitting a character.
pub fn truncate(value: &str, max: usize) -> String {
  match value.char_indices().nth(max) {
    Some((idx, _)) => value[..idx].to_owned(),
    None => value.to_owned(),
  }
}

// ─── Visitor ─────────────────────────────────────────────────────────────────

/// One tracked human/session pair.
///
/// `(session_key, ip_address)` is unique across all stored records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visitor {
  pub visitor_id:    Uuid,
  pub session_key:   String,
  pub ip_address:    String,
  /// Authenticated user reference; `None` for anonymous visitors.
  pub user:          Option<String>,
  pub user_agent:    String,
  pub referrer:      String,
  /// Path of the page most recently requested.
  pub url:           String,
  pub page_views:    u32,
  pub session_start: Option<DateTime<Utc>>,
  pub last_update:   DateTime<Utc>,
}

impl Visitor {
  /// Time between session start and the last request, as `H:MM:SS`.
  pub fn time_on_site(&self) -> String {
    let Some(start) = self.session_start else {
      return "unknown".to_owned();
    };

    let seconds = (self.last_update - start).num_seconds().max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let seconds = seconds % 60;
    format!("{hours}:{minutes:02}:{seconds:02}")
  }

  /// Human-readable time since the last request, relative to `now`.
  pub fn last_seen(&self, now: DateTime<Utc>) -> String {
    humanize_elapsed(now - self.last_update)
  }
}

const UNITS: [(i64, &str); 3] = [(86_400, "day"), (3_600, "hour"), (60, "minute")];

/// Format an elapsed duration with at most two adjacent units, largest first.
pub fn humanize_elapsed(elapsed: TimeDelta) -> String {
  let seconds = elapsed.num_seconds();
  if seconds < 60 {
    return "just now".to_owned();
  }

  let plural = |count: i64, unit: &str| {
    if count == 1 {
      format!("1 {unit}")
    } else {
      format!("{count} {unit}s")
    }
  };

  for (i, (size, unit)) in UNITS.iter().enumerate() {
    let count = seconds / size;
    if count == 0 {
      continue;
    }
    let mut out = plural(count, unit);
    if let Some((next_size, next_unit)) = UNITS.get(i + 1) {
      let rest = (seconds - count * size) / next_size;
      if rest > 0 {
        out.push_str(", ");
        out.push_str(&plural(rest, next_unit));
      }
    }
    return out;
  }

  "just now".to_owned()
}

// ─── Presentation ────────────────────────────────────────────────────────────

/// The public projection of a [`Visitor`]: everything except the session key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveVisitor {
  pub visitor_id:   Uuid,
  pub ip_address:   String,
  pub user:         Option<String>,
  pub user_agent:   String,
  pub referrer:     String,
  pub url:          String,
  pub page_views:   u32,
  pub last_update:  DateTime<Utc>,
  pub last_seen:    String,
  pub time_on_site: String,
}

impl ActiveVisitor {
  pub fn from_visitor(visitor: Visitor, now: DateTime<Utc>) -> Self {
    let last_seen = visitor.last_seen(now);
    let time_on_site = visitor.time_on_site();
    Self {
      visitor_id: visitor.visitor_id,
      ip_address: visitor.ip_address,
      user: visitor.user,
      user_agent: visitor.user_agent,
      referrer: visitor.referrer,
      url: visitor.url,
      page_views: visitor.page_views,
      last_update: visitor.last_update,
      last_seen,
      time_on_site,
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn visitor(start: Option<DateTime<Utc>>, last: DateTime<Utc>) -> Visitor {
    Visitor {
      visitor_id:    Uuid::new_v4(),
      session_key:   "abc".into(),
      ip_address:    "10.0.0.1".into(),
      user:          None,
      user_agent:    "Mozilla/5.0".into(),
      referrer:      "unknown".into(),
      url:           "/".into(),
      page_views:    1,
      session_start: start,
      last_update:   last,
    }
  }

  fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, h, m, s).unwrap()
  }

  #[test]
  fn truncate_counts_characters() {
    assert_eq!(truncate("hello", 3), "hel");
    assert_eq!(truncate("hello", 10), "hello");
    assert_eq!(truncate("héllo", 2), "hé");
    assert_eq!(truncate("", 5), "");
  }

  #[test]
  fn time_on_site_formats_hours_minutes_seconds() {
    let v = visitor(Some(at(10, 0, 0)), at(11, 2, 7));
    assert_eq!(v.time_on_site(), "1:02:07");
  }

  #[test]
  fn time_on_site_does_not_wrap_after_a_day() {
    let start = at(0, 0, 0);
    let v = visitor(Some(start), start + TimeDelta::hours(26));
    assert_eq!(v.time_on_site(), "26:00:00");
  }

  #[test]
  fn time_on_site_unknown_without_session_start() {
    let v = visitor(None, at(10, 0, 0));
    assert_eq!(v.time_on_site(), "unknown");
  }

  #[test]
  fn humanize_picks_two_adjacent_units() {
    assert_eq!(humanize_elapsed(TimeDelta::seconds(12)), "just now");
    assert_eq!(humanize_elapsed(TimeDelta::seconds(61)), "1 minute");
    assert_eq!(humanize_elapsed(TimeDelta::minutes(45)), "45 minutes");
    assert_eq!(humanize_elapsed(TimeDelta::minutes(125)), "2 hours, 5 minutes");
    assert_eq!(humanize_elapsed(TimeDelta::hours(72)), "3 days");
    assert_eq!(
      humanize_elapsed(TimeDelta::days(1) + TimeDelta::hours(1) + TimeDelta::minutes(9)),
      "1 day, 1 hour"
    );
  }

  #[test]
  fn active_visitor_omits_session_key() {
    let v = visitor(Some(at(10, 0, 0)), at(10, 5, 0));
    let view = ActiveVisitor::from_visitor(v, at(10, 8, 0));
    assert_eq!(view.last_seen, "3 minutes");
    assert_eq!(view.time_on_site, "0:05:00");

    let json = serde_json::to_value(&view).unwrap();
    assert!(json.get("session_key").is_none());
    assert_eq!(json["ip_address"], "10.0.0.1");
  }
}
