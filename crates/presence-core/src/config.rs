//! Tracker configuration.
//!
//! [`TrackerSettings`] is what operators declare. [`TrackerConfig::build`]
//! turns it into the immutable value the tracker and reaper run against,
//! folding in the paths the host application serves itself.

use chrono::TimeDelta;
use serde::{Deserialize, Deserializer};

use crate::{Error, Result};

pub const DEFAULT_ACTIVE_TIMEOUT_MINUTES: u64 = 10;
pub const DEFAULT_RETENTION_HOURS: u64 = 24;

/// Upper bound for `active_timeout_minutes`: one hundred years.
pub const MAX_ACTIVE_TIMEOUT_MINUTES: u64 = 100 * 366 * 24 * 60;
/// Upper bound for `cleanup_retention_hours`: one hundred years.
pub const MAX_RETENTION_HOURS: u64 = 100 * 366 * 24;

// ─── Retention ───────────────────────────────────────────────────────────────

/// How long visitor records are kept before the reaper purges them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
  Hours(u64),
  /// Cleanup is switched off (or the configured value was not a
  /// non-negative integer).
  Disabled,
}

impl Retention {
  /// Parse a textual setting; anything but a plain digit string disables
  /// cleanup.
  pub fn parse(value: &str) -> Self {
    let value = value.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
      return Self::Disabled;
    }
    value.parse().map_or(Self::Disabled, Self::Hours)
  }

  /// The retention window, or `None` when cleanup is disabled. Windows
  /// beyond what [`TimeDelta`] can hold saturate at [`TimeDelta::MAX`].
  pub fn as_delta(self) -> Option<TimeDelta> {
    match self {
      Self::Hours(hours) => Some(
        i64::try_from(hours)
          .ok()
          .and_then(TimeDelta::try_hours)
          .unwrap_or(TimeDelta::MAX),
      ),
      Self::Disabled => None,
    }
  }
}

impl Default for Retention {
  fn default() -> Self { Self::Hours(DEFAULT_RETENTION_HOURS) }
}

impl<'de> Deserialize<'de> for Retention {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
      Hours(u64),
      Signed(i64),
      Flag(bool),
      Text(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
      Raw::Hours(hours) => Self::Hours(hours),
      Raw::Text(text) => Self::parse(&text),
      Raw::Signed(_) | Raw::Flag(_) => Self::Disabled,
    })
  }
}

// ─── Declared settings ───────────────────────────────────────────────────────

/// Operator-declared tracker settings. Every field is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
  /// Path prefixes that are never tracked.
  pub ignore_prefixes:         Vec<String>,
  /// Window within which a visitor counts as active.
  pub active_timeout_minutes:  u64,
  pub cleanup_retention_hours: Retention,
}

impl Default for TrackerSettings {
  fn default() -> Self {
    Self {
      ignore_prefixes:         Vec::new(),
      active_timeout_minutes:  DEFAULT_ACTIVE_TIMEOUT_MINUTES,
      cleanup_retention_hours: Retention::default(),
    }
  }
}

/// Paths the host application serves that should never be tracked.
#[derive(Debug, Clone, Default)]
pub struct HostPaths {
  pub media_url:    Option<String>,
  pub static_url:   Option<String>,
  /// Where the refresh endpoints are mounted; `None` when they are not.
  pub refresh_path: Option<String>,
}

// ─── Effective configuration ─────────────────────────────────────────────────

/// The immutable configuration the tracker and reaper run against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
  ignore_prefixes: Vec<String>,
  active_timeout:  TimeDelta,
  retention:       Retention,
}

impl TrackerConfig {
  /// Build the effective configuration once at startup.
  ///
  /// Ignore prefixes are the declared ones followed by the media URL (unless
  /// it is `/`), the static prefix and the refresh path, without duplicates.
  pub fn build(settings: TrackerSettings, host: &HostPaths) -> Result<Self> {
    let media = host
      .media_url
      .as_deref()
      .filter(|url| !url.is_empty() && *url != "/");

    let candidates = settings
      .ignore_prefixes
      .iter()
      .map(String::as_str)
      .chain(media)
      .chain(host.static_url.as_deref().filter(|url| !url.is_empty()))
      .chain(host.refresh_path.as_deref());

    let mut ignore_prefixes: Vec<String> = Vec::new();
    for prefix in candidates {
      if !prefix.starts_with('/') {
        return Err(Error::InvalidPrefix(prefix.to_owned()));
      }
      if !ignore_prefixes.iter().any(|p| p == prefix) {
        ignore_prefixes.push(prefix.to_owned());
      }
    }

    let minutes = settings.active_timeout_minutes;
    if minutes > MAX_ACTIVE_TIMEOUT_MINUTES {
      return Err(Error::OutOfRange {
        setting: "active_timeout_minutes",
        value:   minutes,
        max:     MAX_ACTIVE_TIMEOUT_MINUTES,
      });
    }
    if let Retention::Hours(hours) = settings.cleanup_retention_hours
      && hours > MAX_RETENTION_HOURS
    {
      return Err(Error::OutOfRange {
        setting: "cleanup_retention_hours",
        value:   hours,
        max:     MAX_RETENTION_HOURS,
      });
    }
    let active_timeout = TimeDelta::minutes(minutes as i64);

    Ok(Self {
      ignore_prefixes,
      active_timeout,
      retention: settings.cleanup_retention_hours,
    })
  }

  pub fn ignore_prefixes(&self) -> &[String] { &self.ignore_prefixes }

  /// The first ignore prefix `path` starts with, if any.
  pub fn ignored_by(&self, path: &str) -> Option<&str> {
    self
      .ignore_prefixes
      .iter()
      .map(String::as_str)
      .find(|prefix| path.starts_with(prefix))
  }

  pub fn active_timeout(&self) -> TimeDelta { self.active_timeout }

  /// Minimum spacing between reaper runs.
  pub fn cleanup_interval(&self) -> TimeDelta { self.active_timeout / 2 }

  pub fn retention(&self) -> Retention { self.retention }
}

impl Default for TrackerConfig {
  fn default() -> Self {
    Self {
      ignore_prefixes: Vec::new(),
      active_timeout:  TimeDelta::minutes(DEFAULT_ACTIVE_TIMEOUT_MINUTES as i64),
      retention:       Retention::default(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn host() -> HostPaths {
    HostPaths {
      media_url:    Some("/media/".into()),
      static_url:   Some("/static/".into()),
      refresh_path: Some("/presence/refresh/".into()),
    }
  }

  #[test]
  fn build_appends_host_paths_in_order() {
    let settings = TrackerSettings {
      ignore_prefixes: vec!["/health".into()],
      ..Default::default()
    };
    let cfg = TrackerConfig::build(settings, &host()).unwrap();
    assert_eq!(
      cfg.ignore_prefixes(),
      &["/health", "/media/", "/static/", "/presence/refresh/"]
    );
  }

  #[test]
  fn build_is_idempotent_and_deduplicates() {
    let settings = TrackerSettings {
      ignore_prefixes: vec!["/static/".into(), "/static/".into()],
      ..Default::default()
    };
    let first = TrackerConfig::build(settings.clone(), &host()).unwrap();
    let second = TrackerConfig::build(settings, &host()).unwrap();
    assert_eq!(first, second);
    assert_eq!(
      first.ignore_prefixes(),
      &["/static/", "/media/", "/presence/refresh/"]
    );
  }

  #[test]
  fn build_skips_root_media_and_unmounted_refresh() {
    let paths = HostPaths {
      media_url:    Some("/".into()),
      static_url:   None,
      refresh_path: None,
    };
    let cfg = TrackerConfig::build(TrackerSettings::default(), &paths).unwrap();
    assert!(cfg.ignore_prefixes().is_empty());
  }

  #[test]
  fn build_rejects_relative_prefix() {
    let settings = TrackerSettings {
      ignore_prefixes: vec!["static/".into()],
      ..Default::default()
    };
    let err = TrackerConfig::build(settings, &HostPaths::default()).unwrap_err();
    assert!(matches!(err, Error::InvalidPrefix(p) if p == "static/"));
  }

  #[test]
  fn ignored_by_matches_prefix() {
    let cfg = TrackerConfig::build(TrackerSettings::default(), &host()).unwrap();
    assert_eq!(cfg.ignored_by("/static/app.css"), Some("/static/"));
    assert_eq!(cfg.ignored_by("/blog/"), None);
  }

  #[test]
  fn cleanup_interval_is_half_the_timeout() {
    let settings = TrackerSettings { active_timeout_minutes: 15, ..Default::default() };
    let cfg = TrackerConfig::build(settings, &HostPaths::default()).unwrap();
    assert_eq!(cfg.cleanup_interval(), TimeDelta::seconds(450));
  }

  #[test]
  fn build_rejects_out_of_range_timeout() {
    let settings = TrackerSettings {
      active_timeout_minutes: u64::MAX,
      ..Default::default()
    };
    let err = TrackerConfig::build(settings, &HostPaths::default()).unwrap_err();
    assert!(matches!(
      err,
      Error::OutOfRange { setting: "active_timeout_minutes", value: u64::MAX, .. }
    ));

    let settings = TrackerSettings {
      active_timeout_minutes: MAX_ACTIVE_TIMEOUT_MINUTES,
      ..Default::default()
    };
    assert!(TrackerConfig::build(settings, &HostPaths::default()).is_ok());
  }

  #[test]
  fn build_rejects_out_of_range_retention() {
    let settings = TrackerSettings {
      cleanup_retention_hours: Retention::Hours(3_000_000_000),
      ..Default::default()
    };
    let err = TrackerConfig::build(settings, &HostPaths::default()).unwrap_err();
    assert!(matches!(
      err,
      Error::OutOfRange { setting: "cleanup_retention_hours", value: 3_000_000_000, .. }
    ));
  }

  #[test]
  fn oversized_retention_saturates_instead_of_disabling() {
    assert_eq!(Retention::Hours(u64::MAX).as_delta(), Some(TimeDelta::MAX));
    assert_eq!(Retention::Hours(2).as_delta(), Some(TimeDelta::hours(2)));
    assert_eq!(Retention::Disabled.as_delta(), None);
  }

  #[test]
  fn retention_parse() {
    assert_eq!(Retention::parse("48"), Retention::Hours(48));
    assert_eq!(Retention::parse(" 0 "), Retention::Hours(0));
    assert_eq!(Retention::parse("off"), Retention::Disabled);
    assert_eq!(Retention::parse("-1"), Retention::Disabled);
    assert_eq!(Retention::parse("1.5"), Retention::Disabled);
    assert_eq!(Retention::parse(""), Retention::Disabled);
  }

  #[test]
  fn retention_deserialises_numbers_and_strings() {
    let parse = |json: &str| serde_json::from_str::<Retention>(json).unwrap();
    assert_eq!(parse("12"), Retention::Hours(12));
    assert_eq!(parse("\"6\""), Retention::Hours(6));
    assert_eq!(parse("\"disabled\""), Retention::Disabled);
    assert_eq!(parse("-3"), Retention::Disabled);
    assert_eq!(parse("false"), Retention::Disabled);
  }

  #[test]
  fn settings_default_when_fields_missing() {
    let settings: TrackerSettings = serde_json::from_str("{}").unwrap();
    assert_eq!(settings.active_timeout_minutes, DEFAULT_ACTIVE_TIMEOUT_MINUTES);
    assert_eq!(settings.cleanup_retention_hours, Retention::Hours(DEFAULT_RETENTION_HOURS));
    assert!(settings.ignore_prefixes.is_empty());
  }
}
