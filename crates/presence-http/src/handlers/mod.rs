//! Refresh endpoints.
//!
//! | Method       | Path             | Notes |
//! |--------------|------------------|-------|
//! | `GET`/`POST` | `/refresh/`      | Tracks the caller now; 204 |
//! | `GET`        | `/refresh/json/` | Active visitors, newest first |

pub mod active;
pub mod refresh;

use axum::http::StatusCode;

/// Fallback for paths the host application does not serve.
pub async fn not_found() -> StatusCode { StatusCode::NOT_FOUND }
