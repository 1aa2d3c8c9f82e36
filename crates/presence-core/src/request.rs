//! Framework-independent view of an inbound request.

use sha2::{Digest, Sha256};

use crate::visitor::{truncate, IP_ADDRESS_MAX, REFERRER_MAX, SESSION_KEY_MAX, USER_AGENT_MAX};

/// What the session mechanism knows about the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
  /// A stable session identifier is available.
  Key(String),
  /// Sessions are in use but no key has been issued yet. Tracking waits for
  /// the next request, which also filters out one-shot crawlers.
  Pending,
  /// No session mechanism is configured; a key is derived from a digest of
  /// the client IP and user agent.
  Unavailable,
}

/// Everything the tracker needs to know about a request.
#[derive(Debug, Clone)]
pub struct RequestInfo {
  pub path:          String,
  /// Asynchronous/background fetch rather than a page navigation.
  pub is_background: bool,
  pub session:       SessionState,
  /// Raw `X-Forwarded-For` value, if any.
  pub forwarded_for: Option<String>,
  pub peer_addr:     Option<String>,
  pub user_agent:    Option<String>,
  /// Referrer header, already decoded lossily to UTF-8.
  pub referrer:      Option<String>,
  /// Authenticated user; `None` for anonymous requests.
  pub user:          Option<String>,
}

impl RequestInfo {
  /// A plain anonymous page request for `path` with no headers.
  pub fn new(path: impl Into<String>, session: SessionState) -> Self {
    Self {
      path: path.into(),
      is_background: false,
      session,
      forwarded_for: None,
      peer_addr: None,
      user_agent: None,
      referrer: None,
      user: None,
    }
  }

  /// The client address: first forwarded-for hop, else the peer address.
  pub fn client_ip(&self) -> String {
    let forwarded = self
      .forwarded_for
      .as_deref()
      .and_then(|chain| chain.split(',').next())
      .map(str::trim)
      .filter(|ip| !ip.is_empty());

    let ip = forwarded
      .or(self.peer_addr.as_deref())
      .unwrap_or("unknown");
    truncate(ip, IP_ADDRESS_MAX)
  }

  pub fn user_agent(&self) -> String {
    truncate(self.user_agent.as_deref().unwrap_or_default(), USER_AGENT_MAX)
  }

  pub fn referrer(&self) -> String {
    truncate(self.referrer.as_deref().unwrap_or("unknown"), REFERRER_MAX)
  }

  /// The session key to track under, or `None` while the session is pending.
  pub fn session_key(&self) -> Option<String> {
    match &self.session {
      SessionState::Key(key) => Some(truncate(key, SESSION_KEY_MAX)),
      SessionState::Pending => None,
      SessionState::Unavailable => Some(synthetic_key(&self.client_ip(), &self.user_agent())),
    }
  }
}

/// Hex SHA-256 of `ip` and `user_agent`, cut to [`SESSION_KEY_MAX`].
///
/// Every byte of the user agent contributes, so agents sharing a long prefix
/// still get distinct keys.
fn synthetic_key(ip: &str, user_agent: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(ip.as_bytes());
  hasher.update([0]);
  hasher.update(user_agent.as_bytes());
  let mut key = hex::encode(hasher.finalize());
  key.truncate(SESSION_KEY_MAX);
  key
}

#[cfg(test)]
mod tests {
  use super::*;

  fn request() -> RequestInfo {
    RequestInfo::new("/", SessionState::Key("k".into()))
  }

  #[test]
  fn client_ip_prefers_first_forwarded_hop() {
    let mut req = request();
    req.forwarded_for = Some(" 203.0.113.7 , 10.0.0.2, 10.0.0.3".into());
    req.peer_addr = Some("10.0.0.9".into());
    assert_eq!(req.client_ip(), "203.0.113.7");
  }

  #[test]
  fn client_ip_falls_back_to_peer() {
    let mut req = request();
    req.forwarded_for = Some("  ".into());
    req.peer_addr = Some("10.0.0.9".into());
    assert_eq!(req.client_ip(), "10.0.0.9");

    req.peer_addr = None;
    assert_eq!(req.client_ip(), "unknown");
  }

  #[test]
  fn referrer_defaults_to_unknown_and_truncates() {
    let mut req = request();
    assert_eq!(req.referrer(), "unknown");

    req.referrer = Some(format!("http://ref/{}", "x".repeat(400)));
    assert_eq!(req.referrer().chars().count(), REFERRER_MAX);
  }

  #[test]
  fn user_agent_truncated() {
    let mut req = request();
    assert_eq!(req.user_agent(), "");
    req.user_agent = Some("a".repeat(300));
    assert_eq!(req.user_agent().len(), USER_AGENT_MAX);
  }

  #[test]
  fn session_key_by_state() {
    let mut req = request();
    assert_eq!(req.session_key().as_deref(), Some("k"));

    req.session = SessionState::Pending;
    assert_eq!(req.session_key(), None);

    req.session = SessionState::Unavailable;
    req.peer_addr = Some("10.0.0.9".into());
    req.user_agent = Some("curl/8".into());
    let key = req.session_key().unwrap();
    assert_eq!(key.len(), SESSION_KEY_MAX);
    assert!(key.bytes().all(|b| b.is_ascii_hexdigit()));
    assert_eq!(req.session_key().as_deref(), Some(key.as_str()));
  }

  #[test]
  fn derived_keys_differ_for_agents_sharing_a_long_prefix() {
    let prefix = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
    let mut chrome = RequestInfo::new("/", SessionState::Unavailable);
    chrome.peer_addr = Some("203.0.113.77".into());
    chrome.user_agent = Some(format!("{prefix} Chrome/124.0"));
    let mut firefox = chrome.clone();
    firefox.user_agent = Some(format!("{prefix} Firefox/125.0"));

    assert_ne!(chrome.session_key(), firefox.session_key());

    let mut other_ip = chrome.clone();
    other_ip.peer_addr = Some("203.0.113.78".into());
    assert_ne!(chrome.session_key(), other_ip.session_key());
  }
}
