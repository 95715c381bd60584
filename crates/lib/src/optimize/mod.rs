//! Post-emission optimization.
//!
//! Runs over output artifacts only, never over the module graph. Every optimized artifact is
//! re-hashed, so its name follows its final content. A script's inline map is carried through
//! minification by composing the minifier's map onto it.

pub mod js;

use lightningcss::targets::Targets;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::emit::{ArtifactRole, OutputArtifact};
use crate::sourcemap;
use crate::transform::{TransformError, css};

pub fn optimize(artifacts: Vec<OutputArtifact>, targets: Targets) -> Result<Vec<OutputArtifact>, TransformError> {
  let before: usize = artifacts.iter().map(|a| a.content.len()).sum();

  let optimized = artifacts
    .into_par_iter()
    .map(|artifact| -> Result<OutputArtifact, TransformError> {
      let failed = |message: String| TransformError {
        path: artifact.name.clone().into(),
        stage: "minify".to_string(),
        message,
      };
      let (content, source_map) = match artifact.role {
        ArtifactRole::Script => {
          let minified = js::minify(&artifact.content, &artifact.name, artifact.source_map.is_some()).map_err(failed)?;
          let source_map = match (&minified.map, &artifact.source_map) {
            (Some(outer), Some(inner)) => Some(sourcemap::compose(outer, inner).map_err(failed)?),
            _ => None,
          };
          (minified.code, source_map)
        }
        ArtifactRole::Style => (
          css::minify(&artifact.name, &artifact.content, targets.clone()).map_err(failed)?,
          None,
        ),
      };
      debug!(name = %artifact.name, before = artifact.content.len(), after = content.len(), "minified artifact");
      Ok(artifact.with_content(content, source_map))
    })
    .collect::<Result<Vec<_>, _>>()?;

  let after: usize = optimized.iter().map(|a| a.content.len()).sum();
  info!(artifacts = optimized.len(), before, after, "optimized artifacts");
  Ok(optimized)
}
