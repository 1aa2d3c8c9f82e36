//! SQLite backend for presence tracking.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. [`SqliteStore`] implements both
//! [`VisitorStore`](presence_core::store::VisitorStore) and
//! [`SharedCache`](presence_core::cache::SharedCache), so every process
//! pointed at the same database shares one reaper cadence.

mod cache;
mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
