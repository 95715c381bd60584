//! Project configuration.
//!
//! The pipeline is driven by an optional `spabuild.toml` in the project directory. Every field
//! has a default, and the defaults describe the deployment this tool was written for: a
//! `client/` directory with sources in `src/`, static roots in `../public` and `../upload`, output
//! in `../dist`, one `main` entry, and a dev server on port 8080 proxying `/api`.
//!
//! ```toml
//! [paths]
//! output = "../dist"
//!
//! [[entries]]
//! name = "main"
//! modules = ["jquery-binarytransport", "./index.css", "./buildinfo.js", "./index.jsx"]
//!
//! [provide]
//! "$" = "jquery"
//! AudioContext = ["standardized-audio-context", "AudioContext"]
//!
//! [[serve.proxy]]
//! prefix = "/api"
//! target = "http://localhost:3000"
//! ```

use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::CONFIG_FILENAME;

/// Errors in configuration. Always raised before any build I/O.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("cannot determine working directory: {0}")]
  WorkingDirectory(#[source] io::Error),

  #[error("failed to read config {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("invalid config {path}: {message}")]
  Parse { path: PathBuf, message: String },

  #[error("root '{0}' must not be empty")]
  EmptyRoot(&'static str),

  #[error("no entries configured")]
  NoEntries,

  #[error("entry '{0}' is declared more than once")]
  DuplicateEntry(String),

  #[error("entry '{0}' has no modules")]
  EmptyEntry(String),

  #[error("invalid entry name '{0}': use letters, digits, '-' or '_'")]
  InvalidEntryName(String),

  #[error("invalid provide rule '{key}': {reason}")]
  InvalidProvide { key: String, reason: String },

  #[error("invalid proxy rule '{prefix}': {reason}")]
  InvalidProxy { prefix: String, reason: String },

  #[error("invalid pattern '{pattern}': {message}")]
  InvalidPattern { pattern: String, message: String },

  #[error("invalid script target '{target}': {message}")]
  InvalidScriptTarget { target: String, message: String },

  #[error("environment variable {0} has a fixed resolution policy and cannot be redeclared")]
  ReservedEnvVar(String),

  #[error("environment variable {0} is not set and has no fallback")]
  MissingEnvVar(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
  pub paths: PathsConfig,
  pub entries: Vec<EntryConfig>,
  pub document: DocumentConfig,
  pub resolve: ResolveConfig,
  pub transform: TransformConfig,
  pub provide: BTreeMap<String, ProvideTarget>,
  pub env: BTreeMap<String, ExtraEnvVar>,
  pub optimize: OptimizeConfig,
  pub serve: ServeConfig,
}

/// Logical roots, relative to the project directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
  pub source: PathBuf,
  pub public: PathBuf,
  pub upload: PathBuf,
  pub output: PathBuf,
}

impl Default for PathsConfig {
  fn default() -> Self {
    Self {
      source: PathBuf::from("src"),
      public: PathBuf::from("../public"),
      upload: PathBuf::from("../upload"),
      output: PathBuf::from("../dist"),
    }
  }
}

/// A named bundle root. Relative module paths are resolved against the source root; anything
/// else is treated as a package name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntryConfig {
  pub name: String,
  pub modules: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DocumentConfig {
  /// Markup template, relative to the source root.
  pub template: PathBuf,
  /// Prefix for artifact URLs in the generated document.
  pub public_path: String,
}

impl Default for DocumentConfig {
  fn default() -> Self {
    Self {
      template: PathBuf::from("index.html"),
      public_path: "/".to_string(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolveConfig {
  pub extensions: Vec<String>,
  /// Bare specifiers that resolve to an empty module instead of a package.
  pub fallback_empty: Vec<String>,
}

impl Default for ResolveConfig {
  fn default() -> Self {
    Self {
      extensions: vec![".js".to_string(), ".jsx".to_string()],
      fallback_empty: vec!["fs".to_string(), "path".to_string()],
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformConfig {
  /// Scripts whose path matches this pattern skip the compile step.
  pub compile_exclude: String,
  /// ES version compiled scripts must run on, `es5` through `es2024` or `esnext`.
  pub script_target: String,
  pub jsx_pragma: String,
  pub jsx_pragma_frag: String,
  pub css_targets: CssTargets,
  /// Append an inline source map to every script artifact.
  pub source_maps: bool,
}

impl Default for TransformConfig {
  fn default() -> Self {
    Self {
      compile_exclude: "node_modules".to_string(),
      script_target: "es2019".to_string(),
      jsx_pragma: "React.createElement".to_string(),
      jsx_pragma_frag: "React.Fragment".to_string(),
      css_targets: CssTargets::default(),
      source_maps: true,
    }
  }
}

/// Minimum browser major versions for stylesheet prefixing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CssTargets {
  pub chrome: Option<u32>,
  pub edge: Option<u32>,
  pub firefox: Option<u32>,
  pub safari: Option<u32>,
  pub ios_saf: Option<u32>,
}

impl Default for CssTargets {
  fn default() -> Self {
    Self {
      chrome: Some(87),
      edge: Some(88),
      firefox: Some(78),
      safari: Some(14),
      ios_saf: Some(14),
    }
  }
}

/// Where a provided global comes from: a whole module, or one named export of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProvideTarget {
  Module(String),
  Export(String, String),
}

/// An additional build-time environment variable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtraEnvVar {
  /// Used when the process environment does not define the variable. Without a fallback the
  /// variable is required.
  pub fallback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizeConfig {
  pub minify: bool,
}

impl Default for OptimizeConfig {
  fn default() -> Self {
    Self { minify: true }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServeConfig {
  pub host: String,
  pub port: u16,
  pub proxy: Vec<ProxyConfig>,
  pub watch: bool,
}

impl Default for ServeConfig {
  fn default() -> Self {
    Self {
      host: "0.0.0.0".to_string(),
      port: 8080,
      proxy: vec![ProxyConfig {
        prefix: "/api".to_string(),
        target: "http://localhost:3000".to_string(),
      }],
      watch: true,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfig {
  pub prefix: String,
  pub target: String,
}

impl Default for ProjectConfig {
  fn default() -> Self {
    let mut provide = BTreeMap::new();
    provide.insert("$".to_string(), ProvideTarget::Module("jquery".to_string()));
    provide.insert(
      "AudioContext".to_string(),
      ProvideTarget::Export("standardized-audio-context".to_string(), "AudioContext".to_string()),
    );
    provide.insert(
      "Buffer".to_string(),
      ProvideTarget::Export("buffer".to_string(), "Buffer".to_string()),
    );
    provide.insert("window.jQuery".to_string(), ProvideTarget::Module("jquery".to_string()));

    Self {
      paths: PathsConfig::default(),
      entries: vec![EntryConfig {
        name: "main".to_string(),
        modules: vec![
          "jquery-binarytransport".to_string(),
          "./index.css".to_string(),
          "./buildinfo.js".to_string(),
          "./index.jsx".to_string(),
        ],
      }],
      document: DocumentConfig::default(),
      resolve: ResolveConfig::default(),
      transform: TransformConfig::default(),
      provide,
      env: BTreeMap::new(),
      optimize: OptimizeConfig::default(),
      serve: ServeConfig::default(),
    }
  }
}

impl ProjectConfig {
  /// Parse a config file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::parse(&content, path)
  }

  pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::Parse {
      path: path.to_path_buf(),
      message: e.to_string(),
    })
  }

  /// Load the explicit config if given, else `spabuild.toml` in the project directory if it
  /// exists, else the defaults.
  pub fn discover(project_dir: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
    if let Some(path) = explicit {
      debug!(path = %path.display(), "loading explicit config");
      return Self::load(path);
    }

    let candidate = project_dir.join(CONFIG_FILENAME);
    if candidate.is_file() {
      debug!(path = %candidate.display(), "loading project config");
      Self::load(&candidate)
    } else {
      debug!("no config file found, using defaults");
      Ok(Self::default())
    }
  }

  /// Structural validation that needs no I/O.
  ///
  /// Provide, proxy and pattern rules are validated where they are compiled into their runtime
  /// form; this covers the rest.
  pub fn validate(&self) -> Result<(), ConfigError> {
    let roots = [
      ("source", &self.paths.source),
      ("public", &self.paths.public),
      ("upload", &self.paths.upload),
      ("output", &self.paths.output),
    ];
    for (name, path) in roots {
      if path.as_os_str().is_empty() {
        return Err(ConfigError::EmptyRoot(name));
      }
    }

    if self.entries.is_empty() {
      return Err(ConfigError::NoEntries);
    }

    let mut seen = HashSet::new();
    for entry in &self.entries {
      let valid_name = !entry.name.is_empty()
        && entry
          .name
          .chars()
          .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
      if !valid_name {
        return Err(ConfigError::InvalidEntryName(entry.name.clone()));
      }
      if !seen.insert(entry.name.as_str()) {
        return Err(ConfigError::DuplicateEntry(entry.name.clone()));
      }
      if entry.modules.is_empty() {
        return Err(ConfigError::EmptyEntry(entry.name.clone()));
      }
    }

    Ok(())
  }
}
