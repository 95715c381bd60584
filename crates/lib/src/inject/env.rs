//! Build-time environment constants.
//!
//! `process.env.NAME` member expressions in scripts are replaced with the JSON string literal of
//! the resolved value. Resolution happens once per build, so every module sees the same
//! `BUILD_DATE`.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use tracing::debug;

use crate::config::{ConfigError, ExtraEnvVar};
use crate::script::{ScriptFacts, js_string};
use crate::util::splice::Splicer;

pub const BUILD_DATE: &str = "BUILD_DATE";
pub const COMMIT_HASH: &str = "COMMIT_HASH";
pub const NODE_ENV: &str = "NODE_ENV";
/// Commit identifier some hosting platforms export instead of `COMMIT_HASH`.
pub const SOURCE_VERSION: &str = "SOURCE_VERSION";

const RECOGNIZED: [&str; 3] = [BUILD_DATE, COMMIT_HASH, NODE_ENV];

static ENV_MEMBER: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^\s*\.\s*env\s*\.\s*([A-Za-z_$][A-Za-z0-9_$]*)").expect("env member pattern is valid")
});

/// The resolved constants for one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentSet {
  values: BTreeMap<String, String>,
}

impl EnvironmentSet {
  /// Resolve every variable with an explicit lookup and clock.
  ///
  /// - `BUILD_DATE`: the variable if set, else `now` as ISO-8601 UTC with milliseconds
  /// - `COMMIT_HASH`: the variable if set, else `SOURCE_VERSION`, else empty
  /// - `NODE_ENV`: the variable if set, else `development`
  /// - extra variables: the variable if set, else the declared fallback
  pub fn resolve<F>(lookup: F, now: DateTime<Utc>, extra: &BTreeMap<String, ExtraEnvVar>) -> Result<Self, ConfigError>
  where
    F: Fn(&str) -> Option<String>,
  {
    let mut values = BTreeMap::new();

    let build_date = lookup(BUILD_DATE).unwrap_or_else(|| now.to_rfc3339_opts(SecondsFormat::Millis, true));
    values.insert(BUILD_DATE.to_string(), build_date);

    let commit = lookup(COMMIT_HASH)
      .or_else(|| lookup(SOURCE_VERSION))
      .unwrap_or_default();
    values.insert(COMMIT_HASH.to_string(), commit);

    let node_env = lookup(NODE_ENV).unwrap_or_else(|| "development".to_string());
    values.insert(NODE_ENV.to_string(), node_env);

    for (name, var) in extra {
      if RECOGNIZED.contains(&name.as_str()) {
        return Err(ConfigError::ReservedEnvVar(name.clone()));
      }
      let value = lookup(name)
        .or_else(|| var.fallback.clone())
        .ok_or_else(|| ConfigError::MissingEnvVar(name.clone()))?;
      values.insert(name.clone(), value);
    }

    debug!(count = values.len(), "resolved build environment");
    Ok(Self { values })
  }

  /// Resolve against the process environment and the current time.
  pub fn from_process(extra: &BTreeMap<String, ExtraEnvVar>) -> Result<Self, ConfigError> {
    Self::resolve(|name| std::env::var(name).ok(), Utc::now(), extra)
  }

  pub fn get(&self, name: &str) -> Option<&str> {
    self.values.get(name).map(String::as_str)
  }

  pub fn build_date(&self) -> &str {
    self.get(BUILD_DATE).unwrap_or_default()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }

  /// Replace `process.env.NAME` occurrences for every known name.
  ///
  /// Only references to a free `process` are rewritten; unknown names are left for the runtime.
  /// Returns `None` when nothing was replaced.
  pub fn inject(&self, facts: &ScriptFacts, source: &str) -> Option<String> {
    let mut splicer = Splicer::new(source);
    let mut replaced = 0usize;

    for reference in facts.free_references("process") {
      let tail = &source[reference.end..];
      let Some(captures) = ENV_MEMBER.captures(tail) else {
        continue;
      };
      let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
        continue;
      };
      let Some(value) = self.get(name.as_str()) else {
        continue;
      };
      splicer.replace(reference.start, reference.end + whole.end(), js_string(value));
      replaced += 1;
    }

    if splicer.is_empty() {
      return None;
    }
    debug!(replaced, "injected environment constants");
    Some(splicer.apply())
  }
}
