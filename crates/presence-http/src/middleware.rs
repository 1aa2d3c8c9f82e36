//! Per-request tracking middleware.
//!
//! Mount with [`axum::middleware::from_fn_with_state`]. The tracker runs
//! before the inner service, then the reaper gets its chance to clean up.

use axum::{
  extract::{Request, State},
  middleware::Next,
  response::{IntoResponse, Response},
};
use chrono::Utc;
use presence_core::{cache::SharedCache, store::VisitorStore};

use crate::{AppState, error::Error, extract::Visit};

pub async fn track_visitors<S, C>(
  State(state): State<AppState<S, C>>,
  Visit(visit): Visit,
  request: Request,
  next: Next,
) -> Response
where
  S: VisitorStore + 'static,
  C: SharedCache + 'static,
{
  let now = Utc::now();

  if let Err(e) = state.tracker.track(&*state.store, &visit, now).await {
    return Error::from(e).into_response();
  }
  if let Err(e) = state.reaper.run(&*state.store, &*state.cache, now).await {
    return Error::from(e).into_response();
  }

  next.run(request).await
}
