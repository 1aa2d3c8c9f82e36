//! `GET|POST /refresh/` — track the caller on demand.

use axum::{extract::State, http::StatusCode};
use chrono::Utc;
use presence_core::{cache::SharedCache, store::VisitorStore, tracker::TrackOutcome};
use tracing::debug;

use crate::{AppState, error::Error, extract::Visit};

/// Runs the tracker for this request regardless of ignore prefixes or
/// background-fetch headers, so client-side polling keeps a visitor active.
pub async fn handler<S, C>(
  State(state): State<AppState<S, C>>,
  Visit(visit): Visit,
) -> Result<StatusCode, Error>
where
  S: VisitorStore + 'static,
  C: SharedCache + 'static,
{
  let outcome = state.tracker.record(&*state.store, &visit, Utc::now()).await?;
  if let TrackOutcome::Skipped(reason) = outcome {
    debug!(?reason, "refresh not recorded");
  }
  Ok(StatusCode::NO_CONTENT)
}
