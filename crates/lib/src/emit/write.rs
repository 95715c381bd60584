//! Persisting a build into the output root.
//!
//! # Output Layout
//!
//! ```text
//! {output}/
//! ├── .spabuild.lock            # held while writing
//! ├── .spabuild-manifest.json   # BuildManifest of the last successful write
//! ├── index.html                # document shell
//! ├── scripts/<entry>.<hash>.js
//! └── styles/<entry>.<hash>.css
//! ```
//!
//! Every file is written to a temporary sibling and renamed into place. Files that already exist
//! with identical content are left untouched. Stale hash-named artifacts are never removed here;
//! see [`crate::gc`].

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::consts::{APP_NAME, DOCUMENT_FILENAME, MANIFEST_FILENAME};
use crate::lock::OutputLock;
use crate::pipeline::{BuildError, CancelFlag};
use crate::util::hash::{hash_bytes, hash_file};

use super::OutputArtifact;

pub const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ManifestError {
  #[error("failed to read manifest {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("invalid manifest {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

/// Record of the last successful write, relative to the output root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildManifest {
  pub version: u32,
  pub build_date: String,
  pub document: String,
  /// Entry name to artifact names, in emission order.
  pub entries: BTreeMap<String, Vec<String>>,
}

impl BuildManifest {
  pub fn new(build_date: &str, artifacts: &[OutputArtifact]) -> Self {
    let mut entries: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for artifact in artifacts {
      entries.entry(artifact.entry.clone()).or_default().push(artifact.name.clone());
    }
    Self {
      version: MANIFEST_VERSION,
      build_date: build_date.to_string(),
      document: DOCUMENT_FILENAME.to_string(),
      entries,
    }
  }

  /// Every file name the manifest keeps alive.
  pub fn referenced(&self) -> HashSet<&str> {
    self
      .entries
      .values()
      .flatten()
      .map(String::as_str)
      .chain(std::iter::once(self.document.as_str()))
      .collect()
  }

  /// Load the manifest of an output root. `None` if no build has been written there.
  pub fn load(output: &Path) -> Result<Option<Self>, ManifestError> {
    let path = output.join(MANIFEST_FILENAME);
    let content = match fs::read_to_string(&path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
      Err(source) => return Err(ManifestError::Read { path, source }),
    };
    serde_json::from_str(&content)
      .map(Some)
      .map_err(|source| ManifestError::Parse { path, source })
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteReport {
  /// Files written by this build, relative to the output root.
  pub written: Vec<String>,
  /// Files that already had identical content.
  pub unchanged: Vec<String>,
}

/// Write artifacts, the document and the manifest under an exclusive output lock.
///
/// The cancel flag is checked before every file. Files written before cancellation stay.
pub fn write_output(
  output: &Path,
  artifacts: &[OutputArtifact],
  document: &str,
  build_date: &str,
  cancel: &CancelFlag,
) -> Result<WriteReport, BuildError> {
  let _lock = OutputLock::acquire(output, &format!("{} build", APP_NAME))?;
  let mut report = WriteReport::default();
  let mut seen = HashSet::new();

  for artifact in artifacts {
    if !seen.insert(artifact.name.as_str()) {
      continue;
    }
    cancel.check()?;
    write_file(output, &artifact.name, &artifact.rendered(), &mut report)?;
  }

  cancel.check()?;
  write_file(output, DOCUMENT_FILENAME, document, &mut report)?;

  let manifest = BuildManifest::new(build_date, artifacts);
  let json = serde_json::to_string_pretty(&manifest).map_err(|e| BuildError::Write {
    path: output.join(MANIFEST_FILENAME),
    source: io::Error::other(e),
  })?;
  cancel.check()?;
  write_file(output, MANIFEST_FILENAME, &json, &mut report)?;

  info!(
    output = %output.display(),
    written = report.written.len(),
    unchanged = report.unchanged.len(),
    "wrote build output"
  );
  Ok(report)
}

fn write_file(output: &Path, name: &str, content: &str, report: &mut WriteReport) -> Result<(), BuildError> {
  let path = output.join(name);
  if path.is_file()
    && let Ok(existing) = hash_file(&path)
    && existing == hash_bytes(content.as_bytes())
  {
    debug!(name, "unchanged, skipping write");
    report.unchanged.push(name.to_string());
    return Ok(());
  }

  let failed = |source: io::Error| BuildError::Write {
    path: path.clone(),
    source,
  };
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).map_err(failed)?;
  }
  let temp_path = path.with_file_name(format!(
    ".{}.tmp",
    path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
  ));
  if let Err(source) = fs::write(&temp_path, content).and_then(|()| fs::rename(&temp_path, &path)) {
    let _ = fs::remove_file(&temp_path);
    return Err(failed(source));
  }

  debug!(name, bytes = content.len(), "wrote file");
  report.written.push(name.to_string());
  Ok(())
}
