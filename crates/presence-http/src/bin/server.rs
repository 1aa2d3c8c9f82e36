//! presence server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! SQLite visitor store, and serves the refresh endpoints with the tracking
//! middleware applied to every request.

use std::{
  net::SocketAddr,
  path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::Parser;
use presence_core::cache::{MemoryCache, SharedCache};
use presence_http::{AppState, CacheBackend, ServerConfig};
use presence_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Active-visitor presence server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("PRESENCE")
        .prefix_separator("_")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("tracking.ignore_prefixes")
        .try_parsing(true),
    )
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  match server_cfg.cleanup_cache {
    CacheBackend::Store => serve(store.clone(), store, server_cfg).await,
    CacheBackend::Memory => serve(store, MemoryCache::new(), server_cfg).await,
  }
}

async fn serve<C>(store: SqliteStore, cache: C, server_cfg: ServerConfig) -> anyhow::Result<()>
where
  C: SharedCache + 'static,
{
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  let state = AppState::new(store, cache, server_cfg)
    .context("invalid tracking configuration")?;
  tracing::info!(
    ignore_prefixes = ?state.tracker.config().ignore_prefixes(),
    "tracking configured"
  );

  let app = presence_http::router(state).layer(TraceLayer::new_for_http());

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
    .await
    .context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
