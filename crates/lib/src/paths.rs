//! Resolution of the logical project roots into absolute directories.

use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::config::{ConfigError, PathsConfig};

/// Absolute locations of every root the pipeline touches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectRoots {
  /// Directory the configuration is relative to; also where package lookup starts for entries.
  pub project: PathBuf,
  pub source: PathBuf,
  pub public: PathBuf,
  pub upload: PathBuf,
  pub output: PathBuf,
}

impl ProjectRoots {
  /// Resolve roots against an explicit project directory.
  ///
  /// A relative `project_dir` is taken relative to the working directory.
  pub fn resolve(project_dir: &Path, paths: &PathsConfig) -> Result<Self, ConfigError> {
    let project = if project_dir.is_absolute() {
      normalize(project_dir)
    } else {
      let cwd = std::env::current_dir().map_err(ConfigError::WorkingDirectory)?;
      normalize(&cwd.join(project_dir))
    };

    let join = |name: &'static str, root: &Path| -> Result<PathBuf, ConfigError> {
      if root.as_os_str().is_empty() {
        return Err(ConfigError::EmptyRoot(name));
      }
      Ok(normalize(&project.join(root)))
    };

    Ok(Self {
      source: join("source", &paths.source)?,
      public: join("public", &paths.public)?,
      upload: join("upload", &paths.upload)?,
      output: join("output", &paths.output)?,
      project,
    })
  }

  /// Static roots in precedence order: earlier roots win on path collisions.
  pub fn static_roots(&self) -> [&Path; 2] {
    [&self.public, &self.upload]
  }
}

/// Lexically normalize a path: drop `.` components and fold `..` into the parent.
///
/// No filesystem access, so symlinks are not resolved and missing directories are fine.
pub fn normalize(path: &Path) -> PathBuf {
  let mut out = PathBuf::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        if !out.pop() {
          out.push("..");
        }
      }
      other => out.push(other.as_os_str()),
    }
  }
  out
}

/// Project-relative, `/`-separated identifier for a path, prefixed with `./`.
///
/// Used as the module id in bundles so output does not depend on where the project lives.
pub fn relative_id(project: &Path, path: &Path) -> String {
  let relative = pathdiff::diff_paths(path, project).unwrap_or_else(|| path.to_path_buf());
  let joined = relative
    .components()
    .map(|c| c.as_os_str().to_string_lossy().into_owned())
    .collect::<Vec<_>>()
    .join("/");
  if joined.starts_with("..") {
    joined
  } else {
    format!("./{}", joined)
  }
}
