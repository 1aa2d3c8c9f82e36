//! [`SharedCache`] on the `cache_entries` table.

use chrono::{DateTime, Utc};
use presence_core::cache::SharedCache;
use rusqlite::OptionalExtension as _;

use crate::{
  Result,
  encode::{decode_dt, encode_dt},
  store::SqliteStore,
};

impl SharedCache for SqliteStore {
  type Error = crate::Error;

  async fn get_timestamp(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
    let key = key.to_owned();

    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT value FROM cache_entries WHERE key = ?1",
              rusqlite::params![key],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    raw.as_deref().map(decode_dt).transpose()
  }

  async fn set_timestamp(&self, key: &str, value: DateTime<Utc>) -> Result<()> {
    let key = key.to_owned();
    let value = encode_dt(value);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO cache_entries (key, value) VALUES (?1, ?2)
           ON CONFLICT (key) DO UPDATE SET value = excluded.value",
          rusqlite::params![key, value],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
