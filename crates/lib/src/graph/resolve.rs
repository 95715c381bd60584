//! Module request resolution.
//!
//! Relative and absolute requests are resolved against the importing file's directory. Bare
//! requests are looked up in `node_modules` directories walking up from the importer, honoring
//! `exports`, `browser`, `module` and `main` in the package manifest.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::trace;

use crate::config::ResolveConfig;
use crate::consts::NODE_MODULES;
use crate::paths::{ProjectRoots, normalize};

/// Export conditions honored in `package.json` `exports`, in priority order.
const CONDITIONS: [&str; 5] = ["browser", "import", "module", "default", "require"];

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Resolved {
  File(PathBuf),
  /// A configured fallback: the request resolves to a module with no content.
  Empty(String),
}

#[derive(Debug, Clone)]
pub struct Resolver {
  extensions: Vec<String>,
  fallback_empty: HashSet<String>,
}

impl Resolver {
  pub fn new(config: &ResolveConfig) -> Self {
    Self {
      extensions: config.extensions.clone(),
      fallback_empty: config.fallback_empty.iter().cloned().collect(),
    }
  }

  /// Resolve an entry module reference.
  ///
  /// `./` and `../` references are relative to the source root; bare names are packages looked
  /// up from the project directory.
  pub fn resolve_entry(&self, reference: &str, roots: &ProjectRoots) -> Option<Resolved> {
    if is_relative(reference) {
      self.resolve_file(&normalize(&roots.source.join(reference))).map(Resolved::File)
    } else {
      self.resolve(reference, &roots.project)
    }
  }

  /// Resolve a script request made from a file in `from_dir`.
  pub fn resolve(&self, specifier: &str, from_dir: &Path) -> Option<Resolved> {
    trace!(specifier, from = %from_dir.display(), "resolving");
    if is_relative(specifier) || Path::new(specifier).is_absolute() {
      return self.resolve_file(&normalize(&from_dir.join(specifier))).map(Resolved::File);
    }
    if let Some(path) = self.resolve_package(specifier, from_dir) {
      return Some(Resolved::File(path));
    }
    if self.fallback_empty.contains(specifier) {
      return Some(Resolved::Empty(specifier.to_string()));
    }
    None
  }

  /// Resolve a stylesheet `@import`.
  ///
  /// The request is tried as a path relative to the stylesheet first, then, if bare, as a
  /// package. A leading `~` forces package lookup.
  pub fn resolve_style_import(&self, specifier: &str, from_dir: &Path) -> Option<PathBuf> {
    if let Some(package) = specifier.strip_prefix('~') {
      return self.resolve_package(package, from_dir);
    }
    let local = normalize(&from_dir.join(specifier));
    if local.is_file() {
      return Some(local);
    }
    if is_relative(specifier) || Path::new(specifier).is_absolute() {
      return None;
    }
    self.resolve_package(specifier, from_dir)
  }

  /// Resolve a stylesheet `url()` reference to an existing local file, exact match only.
  pub fn resolve_asset(&self, specifier: &str, from_dir: &Path) -> Option<PathBuf> {
    let clean = specifier.split(['?', '#']).next().unwrap_or(specifier);
    if clean.is_empty() {
      return None;
    }
    let path = normalize(&from_dir.join(clean));
    path.is_file().then_some(path)
  }

  /// Exact file, then each configured extension, then a directory index.
  pub fn resolve_file(&self, path: &Path) -> Option<PathBuf> {
    if path.is_file() {
      return Some(path.to_path_buf());
    }
    for ext in &self.extensions {
      let candidate = with_suffix(path, ext);
      if candidate.is_file() {
        return Some(candidate);
      }
    }
    if path.is_dir() {
      for ext in &self.extensions {
        let candidate = path.join(format!("index{}", ext));
        if candidate.is_file() {
          return Some(candidate);
        }
      }
    }
    None
  }

  fn resolve_package(&self, specifier: &str, from_dir: &Path) -> Option<PathBuf> {
    let (name, subpath) = split_package(specifier)?;
    for dir in from_dir.ancestors() {
      let package_dir = dir.join(NODE_MODULES).join(name);
      if package_dir.is_dir() {
        return self.resolve_in_package(&package_dir, subpath);
      }
    }
    None
  }

  fn resolve_in_package(&self, package_dir: &Path, subpath: Option<&str>) -> Option<PathBuf> {
    let manifest = read_manifest(package_dir);
    let key = match subpath {
      Some(sub) => format!("./{}", sub),
      None => ".".to_string(),
    };

    if let Some(exports) = manifest.as_ref().and_then(|m| m.get("exports"))
      && let Some(target) = export_target(exports, &key)
    {
      return self.resolve_file(&normalize(&package_dir.join(target)));
    }

    if let Some(sub) = subpath {
      return self.resolve_file(&normalize(&package_dir.join(sub)));
    }

    if let Some(manifest) = &manifest {
      for field in ["browser", "module", "main"] {
        if let Some(Value::String(target)) = manifest.get(field)
          && let Some(found) = self.resolve_file(&normalize(&package_dir.join(target)))
        {
          return Some(found);
        }
      }
    }

    self.resolve_file(&package_dir.join("index"))
  }
}

fn is_relative(specifier: &str) -> bool {
  specifier == "." || specifier == ".." || specifier.starts_with("./") || specifier.starts_with("../")
}

/// Split `@scope/name/sub/path` or `name/sub/path` into package name and subpath.
fn split_package(specifier: &str) -> Option<(&str, Option<&str>)> {
  if specifier.is_empty() {
    return None;
  }
  let name_end = if specifier.starts_with('@') {
    let first = specifier.find('/')?;
    specifier[first + 1..].find('/').map(|i| first + 1 + i)
  } else {
    specifier.find('/')
  };
  match name_end {
    Some(end) => {
      let sub = &specifier[end + 1..];
      Some((&specifier[..end], (!sub.is_empty()).then_some(sub)))
    }
    None => Some((specifier, None)),
  }
}

fn read_manifest(package_dir: &Path) -> Option<Value> {
  let content = std::fs::read_to_string(package_dir.join("package.json")).ok()?;
  serde_json::from_str(&content).ok()
}

/// Target of `key` (`.` or `./sub`) in an `exports` field.
fn export_target<'v>(exports: &'v Value, key: &str) -> Option<&'v str> {
  match exports {
    Value::String(target) if key == "." => Some(target.as_str()),
    Value::Object(map) => {
      let is_subpath_map = map.keys().any(|k| k.starts_with('.'));
      if is_subpath_map {
        map.get(key).and_then(conditional_target)
      } else if key == "." {
        conditional_target(exports)
      } else {
        None
      }
    }
    Value::Array(_) if key == "." => conditional_target(exports),
    _ => None,
  }
}

fn conditional_target(value: &Value) -> Option<&str> {
  match value {
    Value::String(target) => Some(target.as_str()),
    Value::Object(map) => CONDITIONS
      .iter()
      .filter_map(|c| map.get(*c))
      .find_map(conditional_target),
    Value::Array(items) => items.iter().find_map(conditional_target),
    _ => None,
  }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
  let mut os: OsString = path.as_os_str().to_owned();
  os.push(suffix);
  PathBuf::from(os)
}
