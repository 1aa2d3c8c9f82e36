//! `GET /refresh/json/` — the visitors active right now.

use axum::{Json, extract::State};
use chrono::Utc;
use presence_core::{
  cache::SharedCache,
  store::{VisitorFilter, VisitorStore},
  visitor::ActiveVisitor,
};

use crate::{AppState, error::Error};

pub async fn handler<S, C>(
  State(state): State<AppState<S, C>>,
) -> Result<Json<Vec<ActiveVisitor>>, Error>
where
  S: VisitorStore + 'static,
  C: SharedCache + 'static,
{
  let now = Utc::now();
  let filter = VisitorFilter::active(now, state.tracker.config().active_timeout());

  let visitors = state
    .store
    .list_visitors(&filter)
    .await
    .map_err(|e| presence_core::Error::Store(Box::new(e)))?;

  Ok(Json(
    visitors
      .into_iter()
      .map(|v| ActiveVisitor::from_visitor(v, now))
      .collect(),
  ))
}
