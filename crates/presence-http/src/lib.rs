//! HTTP layer for presence tracking.
//!
//! Exposes the [`middleware::track_visitors`] layer, the refresh endpoints and
//! an axum [`Router`] wiring both together over any
//! [`VisitorStore`] and [`SharedCache`].

pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;

pub use error::Error;
pub use extract::AuthenticatedUser;

use std::{path::PathBuf, sync::Arc};

use axum::{Router, routing::get};
use presence_core::{
  cache::SharedCache,
  config::{HostPaths, TrackerConfig, TrackerSettings},
  reaper::Reaper,
  store::VisitorStore,
  tracker::Tracker,
};
use serde::Deserialize;

/// Where the refresh endpoints are mounted.
pub const REFRESH_PATH: &str = "/refresh/";

// ─── Configuration ────────────────────────────────────────────────────────────

/// Which [`SharedCache`] paces the reaper.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
  /// Process-local; each server process reaps on its own schedule.
  Memory,
  /// The visitor database; every process sharing it shares one schedule.
  #[default]
  Store,
}

/// Runtime server configuration, deserialised from `config.toml` and
/// `PRESENCE_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:           String,
  pub port:           u16,
  pub store_path:     PathBuf,
  /// Name of the session cookie. Without one, visitors are keyed by IP and
  /// user agent.
  pub session_cookie: Option<String>,
  pub media_url:      Option<String>,
  pub static_url:     Option<String>,
  pub mount_refresh:  bool,
  pub cleanup_cache:  CacheBackend,
  pub tracking:       TrackerSettings,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:           "127.0.0.1".to_string(),
      port:           8080,
      store_path:     PathBuf::from("presence.db"),
      session_cookie: None,
      media_url:      None,
      static_url:     None,
      mount_refresh:  true,
      cleanup_cache:  CacheBackend::default(),
      tracking:       TrackerSettings::default(),
    }
  }
}

impl ServerConfig {
  pub fn host_paths(&self) -> HostPaths {
    HostPaths {
      media_url:    self.media_url.clone(),
      static_url:   self.static_url.clone(),
      refresh_path: self.mount_refresh.then(|| REFRESH_PATH.to_string()),
    }
  }

  pub fn tracker_config(&self) -> presence_core::Result<TrackerConfig> {
    TrackerConfig::build(self.tracking.clone(), &self.host_paths())
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through the middleware and handlers.
pub struct AppState<S, C> {
  pub store:   Arc<S>,
  pub cache:   Arc<C>,
  pub config:  Arc<ServerConfig>,
  pub tracker: Arc<Tracker>,
  pub reaper:  Arc<Reaper>,
}

impl<S, C> Clone for AppState<S, C> {
  fn clone(&self) -> Self {
    Self {
      store:   Arc::clone(&self.store),
      cache:   Arc::clone(&self.cache),
      config:  Arc::clone(&self.config),
      tracker: Arc::clone(&self.tracker),
      reaper:  Arc::clone(&self.reaper),
    }
  }
}

impl<S, C> AppState<S, C> {
  /// Build the state, computing the tracker configuration once.
  pub fn new(store: S, cache: C, config: ServerConfig) -> presence_core::Result<Self> {
    let tracker_config = config.tracker_config()?;
    Ok(Self {
      store:   Arc::new(store),
      cache:   Arc::new(cache),
      config:  Arc::new(config),
      tracker: Arc::new(Tracker::new(tracker_config.clone())),
      reaper:  Arc::new(Reaper::new(tracker_config)),
    })
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The refresh endpoints, relative to the router root.
pub fn refresh_routes<S, C>() -> Router<AppState<S, C>>
where
  S: VisitorStore + 'static,
  C: SharedCache + 'static,
{
  Router::new()
    .route(
      REFRESH_PATH,
      get(handlers::refresh::handler::<S, C>).post(handlers::refresh::handler::<S, C>),
    )
    .route("/refresh/json/", get(handlers::active::handler::<S, C>))
}

/// Build the presence [`Router`]: refresh endpoints (when mounted), a 404
/// fallback, and the tracking middleware around all of it.
///
/// Host applications that serve their own pages can instead `merge` their
/// routes into [`refresh_routes`] and apply
/// [`middleware::track_visitors`] themselves.
pub fn router<S, C>(state: AppState<S, C>) -> Router
where
  S: VisitorStore + 'static,
  C: SharedCache + 'static,
{
  let routes = if state.config.mount_refresh {
    refresh_routes::<S, C>()
  } else {
    Router::new()
  };

  routes
    .fallback(handlers::not_found)
    .layer(axum::middleware::from_fn_with_state(
      state.clone(),
      middleware::track_visitors::<S, C>,
    ))
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────
