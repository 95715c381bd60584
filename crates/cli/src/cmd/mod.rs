mod build;
mod gc;
mod info;
mod serve;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use spabuild_lib::pipeline::ResolvedConfig;

pub use build::cmd_build;
pub use gc::cmd_gc;
pub use info::cmd_info;
pub use serve::{ServeOverrides, cmd_serve};

/// Project directory and config file given on the command line.
pub struct ProjectArgs {
  pub project: Option<PathBuf>,
  pub config: Option<PathBuf>,
}

impl ProjectArgs {
  pub fn project_dir(&self) -> Result<PathBuf> {
    let dir = match &self.project {
      Some(dir) => dir.clone(),
      None => std::env::current_dir().context("Failed to determine working directory")?,
    };
    dunce::canonicalize(&dir).with_context(|| format!("Project directory not found: {}", dir.display()))
  }

  pub fn resolve(&self) -> Result<(PathBuf, ResolvedConfig)> {
    let dir = self.project_dir()?;
    let resolved = ResolvedConfig::load(&dir, self.config.as_deref()).context("Invalid configuration")?;
    Ok((dir, resolved))
  }
}

pub(crate) fn display_relative(base: &Path, path: &Path) -> String {
  path.strip_prefix(base).unwrap_or(path).display().to_string()
}
