//! Document shell generation.

use std::path::Path;

use crate::transform::TransformError;

use super::{ArtifactRole, OutputArtifact};

/// Inject artifact tags into the template right before `</head>`.
///
/// Script tags come first (deferred, in entry order), then stylesheet links.
pub fn render(template: &str, template_path: &Path, artifacts: &[OutputArtifact], public_path: &str) -> Result<String, TransformError> {
  let lower = template.to_ascii_lowercase();
  let Some(at) = lower.find("</head>") else {
    return Err(TransformError {
      path: template_path.to_path_buf(),
      stage: "document".to_string(),
      message: "template has no </head> to inject tags into".to_string(),
    });
  };

  let base = if public_path.ends_with('/') {
    public_path.to_string()
  } else {
    format!("{}/", public_path)
  };

  let mut tags = String::new();
  for artifact in artifacts.iter().filter(|a| a.role == ArtifactRole::Script) {
    tags.push_str(&format!("<script defer src=\"{}{}\"></script>", base, artifact.name));
  }
  for artifact in artifacts.iter().filter(|a| a.role == ArtifactRole::Style) {
    tags.push_str(&format!("<link href=\"{}{}\" rel=\"stylesheet\">", base, artifact.name));
  }

  let mut out = String::with_capacity(template.len() + tags.len());
  out.push_str(&template[..at]);
  out.push_str(&tags);
  out.push_str(&template[at..]);
  Ok(out)
}
