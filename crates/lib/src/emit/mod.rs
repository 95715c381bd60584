//! Asset emission.
//!
//! Walks the module graph, runs the remaining stylesheet and markup chains, links scripts into
//! registry slots and assembles one script artifact and at most one style artifact per entry.
//! Script artifacts carry an inline source map unless maps are switched off. Artifacts are
//! content-addressed: the name embeds a hash of the final content, map included.

pub mod document;
pub mod link;
pub mod runtime;
pub mod write;

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use petgraph::graph::NodeIndex;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::consts::{SCRIPTS_DIR, STYLES_DIR};
use crate::graph::{ModuleGraph, ModuleKind, ResolutionError};
use crate::pipeline::BuildError;
use crate::sourcemap::{self, ArtifactMap};
use crate::transform::{TransformError, TransformRegistry};
use crate::util::hash::{ContentHash, hash_bytes};
use link::{Linked, ProvidedBinding, json_module, link_script, markup_module};
use runtime::{Assembled, RegistryModule, assemble};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactRole {
  Script,
  Style,
}

impl ArtifactRole {
  pub fn dir(self) -> &'static str {
    match self {
      Self::Script => SCRIPTS_DIR,
      Self::Style => STYLES_DIR,
    }
  }

  pub fn extension(self) -> &'static str {
    match self {
      Self::Script => "js",
      Self::Style => "css",
    }
  }
}

/// A content-addressed output file, named `<dir>/<entry>.<hash>.<ext>` relative to the output
/// root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
  pub role: ArtifactRole,
  pub entry: String,
  pub content: String,
  /// Source map as a `data:` URL, appended to the file as a trailing comment.
  pub source_map: Option<String>,
  pub hash: ContentHash,
  pub name: String,
}

impl OutputArtifact {
  pub fn new(role: ArtifactRole, entry: &str, content: String) -> Self {
    Self::mapped(role, entry, content, None)
  }

  pub fn mapped(role: ArtifactRole, entry: &str, content: String, source_map: Option<String>) -> Self {
    let hash = hash_bytes(render(&content, source_map.as_deref()).as_bytes());
    let name = format!("{}/{}.{}.{}", role.dir(), entry, hash.short(), role.extension());
    Self {
      role,
      entry: entry.to_string(),
      content,
      source_map,
      hash,
      name,
    }
  }

  /// Replace the content and map, re-hashing and renaming the artifact.
  pub fn with_content(self, content: String, source_map: Option<String>) -> Self {
    Self::mapped(self.role, &self.entry, content, source_map)
  }

  /// File text as written: the content plus the map comment, if any.
  pub fn rendered(&self) -> Cow<'_, str> {
    render(&self.content, self.source_map.as_deref())
  }
}

fn render<'c>(content: &'c str, source_map: Option<&str>) -> Cow<'c, str> {
  match source_map {
    None => Cow::Borrowed(content),
    Some(url) => {
      let mut text = String::with_capacity(content.len() + url.len() + 32);
      text.push_str(content);
      if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
      }
      text.push_str(&sourcemap::comment(url));
      Cow::Owned(text)
    }
  }
}

/// Everything emission produces. The document is rendered later, once artifact names are final.
#[derive(Debug, Clone)]
pub struct Emitted {
  pub artifacts: Vec<OutputArtifact>,
  pub template: String,
  pub template_path: PathBuf,
}

/// Per-module emission result.
#[derive(Debug, Default)]
struct Prepared {
  /// Registry body; `None` for modules without a registry slot.
  linked: Option<Linked>,
  css: Option<String>,
}

pub fn emit(graph: &ModuleGraph, registry: &TransformRegistry, template_path: &Path) -> Result<Emitted, BuildError> {
  let nodes: Vec<NodeIndex> = graph.nodes().collect();
  let prepared: Vec<Prepared> = nodes
    .par_iter()
    .map(|&node| prepare(graph, registry, node))
    .collect::<Result<_, _>>()?;

  let mut artifacts = Vec::with_capacity(graph.entries().len() * 2);
  for entry in graph.entries() {
    for &node in &entry.modules {
      let module = graph.module(node);
      if !module.kind.in_registry() {
        return Err(
          TransformError {
            path: module.display_path(),
            stage: "emit".to_string(),
            message: format!("entry '{}' lists a module that cannot be bundled", entry.name),
          }
          .into(),
        );
      }
    }

    let order: Vec<NodeIndex> = graph
      .script_order(entry)
      .into_iter()
      .filter(|&node| prepared[node.index()].linked.is_some())
      .collect();
    let slots: Vec<RegistryModule<'_>> = order
      .iter()
      .filter_map(|&node| {
        prepared[node.index()].linked.as_ref().map(|linked| RegistryModule {
          id: &graph.module(node).id,
          linked,
        })
      })
      .collect();
    let entry_ids: Vec<&str> = entry.modules.iter().map(|&n| graph.module(n).id.as_str()).collect();
    let assembled = assemble(&slots, &entry_ids);
    let source_map = if registry.source_maps() {
      script_map(graph, &order, &prepared, &assembled).map_err(|message| TransformError {
        path: PathBuf::from(&entry.name),
        stage: "sourcemap".to_string(),
        message,
      })?
    } else {
      None
    };
    let script = OutputArtifact::mapped(ArtifactRole::Script, &entry.name, assembled.code, source_map);
    debug!(entry = %entry.name, modules = slots.len(), name = %script.name, "assembled script artifact");
    artifacts.push(script);

    let css: Vec<&str> = graph
      .style_order(entry)
      .iter()
      .filter_map(|&node| prepared[node.index()].css.as_deref())
      .filter(|css| !css.trim().is_empty())
      .collect();
    if css.is_empty() {
      debug!(entry = %entry.name, "no stylesheets, style artifact omitted");
    } else {
      let mut content = css.join("\n");
      if !content.ends_with('\n') {
        content.push('\n');
      }
      artifacts.push(OutputArtifact::new(ArtifactRole::Style, &entry.name, content));
    }
  }

  let template = read_template(registry, template_path)?;
  info!(artifacts = artifacts.len(), "emitted artifacts");

  Ok(Emitted {
    artifacts,
    template,
    template_path: template_path.to_path_buf(),
  })
}

/// Map every slot that has source text behind it.
fn script_map(
  graph: &ModuleGraph,
  order: &[NodeIndex],
  prepared: &[Prepared],
  assembled: &Assembled,
) -> Result<Option<String>, String> {
  let mut map = ArtifactMap::new();
  for (&node, &first_line) in order.iter().zip(&assembled.body_lines) {
    let module = graph.module(node);
    let (Some(linked), Some(original)) = (&prepared[node.index()].linked, &module.original) else {
      continue;
    };
    map.add_module(
      &sourcemap::source_name(&module.id),
      original,
      first_line,
      &linked.lines,
      module.origins.as_ref(),
    )?;
  }
  map.into_data_url()
}

fn prepare(graph: &ModuleGraph, registry: &TransformRegistry, node: NodeIndex) -> Result<Prepared, BuildError> {
  let module = graph.module(node);
  let path = module.display_path();
  let failed = |stage: &str, message: String| TransformError {
    path: path.clone(),
    stage: stage.to_string(),
    message,
  };

  let prepared = match module.kind {
    ModuleKind::Asset => Prepared::default(),
    ModuleKind::Empty => Prepared {
      linked: Some(Linked::empty()),
      css: None,
    },
    ModuleKind::Script => {
      let provided: Vec<ProvidedBinding> = module
        .provided
        .iter()
        .map(|p| ProvidedBinding {
          local: p.local.clone(),
          export: p.export.clone(),
          id: graph.module(p.target).id.clone(),
        })
        .collect();
      let resolve = |specifier: &str| -> Result<String, String> {
        let target = module
          .target_of(specifier)
          .ok_or_else(|| format!("'{}' was not resolved", specifier))?;
        let target = graph.module(target);
        if !target.kind.in_registry() {
          return Err(format!("'{}' is not a script-loadable module", specifier));
        }
        Ok(target.id.clone())
      };
      let linked = link_script(&module.content, resolve, &provided).map_err(|m| failed("link", m))?;
      Prepared {
        linked: Some(linked),
        css: None,
      }
    }
    ModuleKind::Stylesheet => {
      let (body, meta) = registry.run(&path, module.kind, module.content.clone())?;
      Prepared {
        linked: Some(Linked::generated(body, false)),
        css: Some(meta.extracted_css.unwrap_or_default()),
      }
    }
    ModuleKind::Markup => {
      let (content, meta) = registry.run(&path, module.kind, module.content.clone())?;
      Prepared {
        linked: Some(markup_module(meta.template.as_deref().unwrap_or(&content))),
        css: None,
      }
    }
    ModuleKind::Json => Prepared {
      linked: Some(json_module(&module.content).map_err(|m| failed("json", m))?),
      css: None,
    },
  };
  Ok(prepared)
}

fn read_template(registry: &TransformRegistry, path: &Path) -> Result<String, BuildError> {
  let content = match std::fs::read_to_string(path) {
    Ok(content) => content,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
      return Err(
        ResolutionError {
          importer: "document".to_string(),
          specifier: path.display().to_string(),
        }
        .into(),
      );
    }
    Err(source) => {
      return Err(BuildError::Read {
        path: path.to_path_buf(),
        source,
      });
    }
  };
  let (content, meta) = registry.run(path, ModuleKind::Markup, content)?;
  Ok(meta.template.unwrap_or(content))
}
