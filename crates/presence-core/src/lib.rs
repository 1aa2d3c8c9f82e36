//! Core types and algorithms for active-visitor presence tracking.
//!
//! This crate is free of HTTP and database dependencies. Storage backends
//! implement [`store::VisitorStore`] and [`cache::SharedCache`]; the HTTP
//! layer builds a [`request::RequestInfo`] per request and hands it to the
//! [`tracker::Tracker`] and [`reaper::Reaper`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod cache;
pub mod config;
pub mod error;
pub mod reaper;
pub mod request;
pub mod store;
pub mod tracker;
pub mod visitor;

pub use error::{Error, Result};
