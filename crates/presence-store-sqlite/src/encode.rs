//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings with microsecond
//! precision, so comparing the text compares the instants. UUIDs are stored as
//! hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use presence_core::visitor::Visitor;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Visitor rows ─────────────────────────────────────────────────────────────

/// Column list matching [`raw_visitor`].
pub const VISITOR_COLUMNS: &str = "visitor_id, session_key, ip_address, user_ref, \
   user_agent, referrer, url, page_views, session_start, last_update";

/// A visitor row as stored, before decoding.
pub struct RawVisitor {
  pub visitor_id:    String,
  pub session_key:   String,
  pub ip_address:    String,
  pub user_ref:      Option<String>,
  pub user_agent:    String,
  pub referrer:      String,
  pub url:           String,
  pub page_views:    u32,
  pub session_start: Option<String>,
  pub last_update:   String,
}

pub fn raw_visitor(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawVisitor> {
  Ok(RawVisitor {
    visitor_id:    row.get(0)?,
    session_key:   row.get(1)?,
    ip_address:    row.get(2)?,
    user_ref:      row.get(3)?,
    user_agent:    row.get(4)?,
    referrer:      row.get(5)?,
    url:           row.get(6)?,
    page_views:    row.get(7)?,
    session_start: row.get(8)?,
    last_update:   row.get(9)?,
  })
}

impl RawVisitor {
  pub fn into_visitor(self) -> Result<Visitor> {
    Ok(Visitor {
      visitor_id:    decode_uuid(&self.visitor_id)?,
      session_key:   self.session_key,
      ip_address:    self.ip_address,
      user:          self.user_ref,
      user_agent:    self.user_agent,
      referrer:      self.referrer,
      url:           self.url,
      page_views:    self.page_views,
      session_start: self.session_start.as_deref().map(decode_dt).transpose()?,
      last_update:   decode_dt(&self.last_update)?,
    })
  }
}

/// Owned column values for a visitor write, ready to move into a
/// `Connection::call` closure.
pub struct VisitorParams {
  pub visitor_id:    String,
  pub session_key:   String,
  pub ip_address:    String,
  pub user_ref:      Option<String>,
  pub user_agent:    String,
  pub referrer:      String,
  pub url:           String,
  pub page_views:    u32,
  pub session_start: Option<String>,
  pub last_update:   String,
}

impl VisitorParams {
  pub fn new(v: &Visitor) -> Self {
    Self {
      visitor_id:    encode_uuid(v.visitor_id),
      session_key:   v.session_key.clone(),
      ip_address:    v.ip_address.clone(),
      user_ref:      v.user.clone(),
      user_agent:    v.user_agent.clone(),
      referrer:      v.referrer.clone(),
      url:           v.url.clone(),
      page_views:    v.page_views,
      session_start: v.session_start.map(encode_dt),
      last_update:   encode_dt(v.last_update),
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::{TimeDelta, TimeZone};

  use super::*;

  #[test]
  fn encoded_timestamps_sort_like_instants() {
    let base = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let later = base + TimeDelta::microseconds(1);
    assert_eq!(encode_dt(base), "2026-03-01T12:00:00.000000Z");
    assert!(encode_dt(base) < encode_dt(later));
    assert_eq!(decode_dt(&encode_dt(later)).unwrap(), later);
  }

  #[test]
  fn decode_dt_rejects_garbage() {
    assert!(matches!(decode_dt("yesterday"), Err(Error::DateParse(_))));
  }
}
