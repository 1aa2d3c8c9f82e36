//! [`SqliteStore`] — the SQLite implementation of [`VisitorStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use presence_core::{
  store::{VisitorFilter, VisitorStore, WriteOutcome},
  visitor::Visitor,
};
use rusqlite::OptionalExtension as _;
use tracing::debug;

use crate::{
  Result,
  encode::{encode_dt, raw_visitor, RawVisitor, VisitorParams, VISITOR_COLUMNS},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A visitor store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    debug!(path = %path.display(), "opening visitor store");
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn query_one(&self, sql: String, args: Vec<String>) -> Result<Option<Visitor>> {
    let raw: Option<RawVisitor> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params_from_iter(args), raw_visitor)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawVisitor::into_visitor).transpose()
  }
}

/// True when `err` is a violation of the (session_key, ip_address) UNIQUE
/// constraint.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
  matches!(
    err,
    rusqlite::Error::SqliteFailure(e, _)
      if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
  )
}

fn insert(conn: &rusqlite::Connection, p: &VisitorParams) -> rusqlite::Result<WriteOutcome> {
  let result = conn.execute(
    "INSERT INTO visitors (
       visitor_id, session_key, ip_address, user_ref, user_agent,
       referrer, url, page_views, session_start, last_update
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    rusqlite::params![
      p.visitor_id,
      p.session_key,
      p.ip_address,
      p.user_ref,
      p.user_agent,
      p.referrer,
      p.url,
      p.page_views,
      p.session_start,
      p.last_update,
    ],
  );

  match result {
    Ok(_) => Ok(WriteOutcome::Written),
    Err(e) if is_unique_violation(&e) => Ok(WriteOutcome::Conflict),
    Err(e) => Err(e),
  }
}

// ─── VisitorStore impl ───────────────────────────────────────────────────────

impl VisitorStore for SqliteStore {
  type Error = crate::Error;

  async fn find_by_key(&self, session_key: &str, ip_address: &str) -> Result<Option<Visitor>> {
    let sql = format!(
      "SELECT {VISITOR_COLUMNS} FROM visitors
       WHERE session_key = ?1 AND ip_address = ?2"
    );
    self
      .query_one(sql, vec![session_key.to_owned(), ip_address.to_owned()])
      .await
  }

  async fn find_recent_by_agent(
    &self,
    ip_address: &str,
    user_agent: &str,
    since:      DateTime<Utc>,
  ) -> Result<Option<Visitor>> {
    let sql = format!(
      "SELECT {VISITOR_COLUMNS} FROM visitors
       WHERE ip_address = ?1 AND user_agent = ?2 AND last_update >= ?3
       ORDER BY last_update DESC
       LIMIT 1"
    );
    self
      .query_one(
        sql,
        vec![ip_address.to_owned(), user_agent.to_owned(), encode_dt(since)],
      )
      .await
  }

  async fn insert_visitor(&self, visitor: &Visitor) -> Result<WriteOutcome> {
    let params = VisitorParams::new(visitor);
    let outcome = self
      .conn
      .call(move |conn| Ok(insert(conn, &params)?))
      .await?;
    Ok(outcome)
  }

  async fn update_visitor(&self, visitor: &Visitor) -> Result<WriteOutcome> {
    let p = VisitorParams::new(visitor);

    let outcome = self
      .conn
      .call(move |conn| {
        let result = conn.execute(
          "UPDATE visitors SET
             session_key = ?2, ip_address = ?3, user_ref = ?4, user_agent = ?5,
             referrer = ?6, url = ?7, page_views = ?8, session_start = ?9,
             last_update = ?10
           WHERE visitor_id = ?1",
          rusqlite::params![
            p.visitor_id,
            p.session_key,
            p.ip_address,
            p.user_ref,
            p.user_agent,
            p.referrer,
            p.url,
            p.page_views,
            p.session_start,
            p.last_update,
          ],
        );

        match result {
          // The row was reaped since it was read; write it back.
          Ok(0) => Ok(insert(conn, &p)?),
          Ok(_) => Ok(WriteOutcome::Written),
          Err(e) if is_unique_violation(&e) => Ok(WriteOutcome::Conflict),
          Err(e) => Err(e.into()),
        }
      })
      .await?;
    Ok(outcome)
  }

  async fn update_by_key(&self, visitor: &Visitor) -> Result<u64> {
    let p = VisitorParams::new(visitor);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE visitors SET
             user_ref = ?3, user_agent = ?4, referrer = ?5, url = ?6,
             page_views = ?7, session_start = ?8, last_update = ?9
           WHERE session_key = ?1 AND ip_address = ?2",
          rusqlite::params![
            p.session_key,
            p.ip_address,
            p.user_ref,
            p.user_agent,
            p.referrer,
            p.url,
            p.page_views,
            p.session_start,
            p.last_update,
          ],
        )?)
      })
      .await?;
    Ok(changed as u64)
  }

  async fn list_visitors(&self, filter: &VisitorFilter) -> Result<Vec<Visitor>> {
    let since = filter.updated_since.map(encode_dt);

    let raws: Vec<RawVisitor> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {VISITOR_COLUMNS} FROM visitors
           WHERE ?1 IS NULL OR last_update >= ?1
           ORDER BY last_update DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![since], raw_visitor)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawVisitor::into_visitor).collect()
  }

  async fn delete_updated_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
    let cutoff_str = encode_dt(cutoff);

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM visitors WHERE last_update <= ?1",
          rusqlite::params![cutoff_str],
        )?)
      })
      .await?;
    Ok(deleted as u64)
  }
}
