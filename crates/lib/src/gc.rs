//! Pruning of stale artifacts from an output root.
//!
//! Builds never delete anything. Every rebuild with changed content leaves the previous
//! hash-named files behind in `scripts/` and `styles/`; `collect_garbage` removes the ones the
//! latest [`BuildManifest`] no longer references. Files that do not look like artifacts are
//! never touched.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::consts::{APP_NAME, SCRIPTS_DIR, STYLES_DIR};
use crate::emit::write::{BuildManifest, ManifestError};
use crate::lock::{OutputLock, OutputLockError};

/// `<entry>.<hash>.<ext>`
static ARTIFACT_NAME: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^(.+)\.([0-9a-f]{20})\.(js|css)$").expect("artifact name pattern is valid"));

#[derive(Debug, Error)]
pub enum GcError {
  #[error("no build manifest in {0}; run a build first")]
  NoManifest(PathBuf),

  #[error(transparent)]
  Manifest(#[from] ManifestError),

  #[error(transparent)]
  Lock(#[from] OutputLockError),

  #[error("failed to read {path}: {source}")]
  ReadDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

#[derive(Debug, Default, Serialize)]
pub struct GcStats {
  pub scanned: usize,
  pub kept: usize,
  pub deleted: usize,
  pub bytes_freed: u64,
}

#[derive(Debug, Serialize)]
pub struct GcResult {
  pub dry_run: bool,
  pub stats: GcStats,
  /// Removed (or, in a dry run, removable) files, relative to the output root.
  pub deleted: Vec<String>,
}

/// Remove artifacts in `output` not referenced by its manifest.
///
/// With `dry_run` nothing is deleted; the result lists what would be.
pub fn collect_garbage(output: &Path, dry_run: bool) -> Result<GcResult, GcError> {
  let _lock = OutputLock::acquire(output, &format!("{} gc", APP_NAME))?;
  let manifest = BuildManifest::load(output)?.ok_or_else(|| GcError::NoManifest(output.to_path_buf()))?;
  let live = manifest.referenced();
  debug!(live = live.len(), build_date = %manifest.build_date, "loaded build manifest");

  let mut stats = GcStats::default();
  let mut deleted = Vec::new();

  for dir in [SCRIPTS_DIR, STYLES_DIR] {
    sweep(output, dir, &live, dry_run, &mut stats, &mut deleted)?;
  }

  info!(
    scanned = stats.scanned,
    deleted = stats.deleted,
    bytes_freed = stats.bytes_freed,
    dry_run,
    "garbage collection complete"
  );
  Ok(GcResult {
    dry_run,
    stats,
    deleted,
  })
}

fn sweep(
  output: &Path,
  dir: &str,
  live: &HashSet<&str>,
  dry_run: bool,
  stats: &mut GcStats,
  deleted: &mut Vec<String>,
) -> Result<(), GcError> {
  let path = output.join(dir);
  let entries = match fs::read_dir(&path) {
    Ok(entries) => entries,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
    Err(source) => return Err(GcError::ReadDir { path, source }),
  };

  let mut names: Vec<(String, PathBuf)> = entries
    .flatten()
    .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
    .filter_map(|e| Some((e.file_name().to_str()?.to_string(), e.path())))
    .filter(|(name, _)| ARTIFACT_NAME.is_match(name))
    .collect();
  names.sort();

  for (name, file) in names {
    stats.scanned += 1;
    let relative = format!("{}/{}", dir, name);
    if live.contains(relative.as_str()) {
      stats.kept += 1;
      continue;
    }

    let size = file.metadata().map(|m| m.len()).unwrap_or(0);
    if !dry_run
      && let Err(e) = fs::remove_file(&file)
    {
      warn!(path = %file.display(), error = %e, "failed to delete stale artifact");
      continue;
    }
    debug!(artifact = %relative, dry_run, "removing stale artifact");
    stats.deleted += 1;
    stats.bytes_freed += size;
    deleted.push(relative);
  }

  Ok(())
}
