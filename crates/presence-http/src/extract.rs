//! Building a [`RequestInfo`] from an axum request.

use std::{convert::Infallible, net::SocketAddr};

use axum::{
  extract::{ConnectInfo, FromRequestParts},
  http::{HeaderMap, HeaderName, header, request::Parts},
};
use axum_extra::extract::cookie::CookieJar;
use presence_core::request::{RequestInfo, SessionState};

use crate::AppState;

const X_REQUESTED_WITH: HeaderName = HeaderName::from_static("x-requested-with");
const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Request extension naming the authenticated user.
///
/// An upstream auth layer inserts it; requests without it are anonymous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

/// Extractor yielding the tracker's view of the current request.
pub struct Visit(pub RequestInfo);

impl<S, C> FromRequestParts<AppState<S, C>> for Visit
where
  S: Send + Sync,
  C: Send + Sync,
{
  type Rejection = Infallible;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, C>,
  ) -> Result<Self, Self::Rejection> {
    Ok(Visit(request_info(parts, state.config.session_cookie.as_deref())))
  }
}

/// Header value decoded lossily; invalid bytes become U+FFFD.
fn header_lossy(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
  headers
    .get(name)
    .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
}

/// Read everything the tracker needs from the request head.
///
/// With no `session_cookie` configured the session is
/// [`SessionState::Unavailable`]; with one configured but absent from the
/// request it is [`SessionState::Pending`].
pub fn request_info(parts: &Parts, session_cookie: Option<&str>) -> RequestInfo {
  let headers = &parts.headers;

  let session = match session_cookie {
    None => SessionState::Unavailable,
    Some(name) => CookieJar::from_headers(headers)
      .get(name)
      .map(|cookie| cookie.value().to_owned())
      .filter(|value| !value.is_empty())
      .map_or(SessionState::Pending, SessionState::Key),
  };

  let is_background = headers
    .get(&X_REQUESTED_WITH)
    .is_some_and(|v| v.as_bytes().eq_ignore_ascii_case(b"XMLHttpRequest"));

  RequestInfo {
    path: parts.uri.path().to_owned(),
    is_background,
    session,
    forwarded_for: header_lossy(headers, &X_FORWARDED_FOR),
    peer_addr: parts
      .extensions
      .get::<ConnectInfo<SocketAddr>>()
      .map(|ConnectInfo(addr)| addr.ip().to_string()),
    user_agent: header_lossy(headers, &header::USER_AGENT),
    referrer: header_lossy(headers, &header::REFERER),
    user: parts
      .extensions
      .get::<AuthenticatedUser>()
      .map(|AuthenticatedUser(name)| name.clone()),
  }
}
