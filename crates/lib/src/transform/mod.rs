//! Transform chains.
//!
//! A [`TransformRegistry`] maps file paths to ordered chains of [`Transform`]s. Every rule whose
//! pattern matches (and whose exclude pattern does not) contributes its chain, in registry order.
//! Script chains run while the graph loads, so imports a chain introduces are resolved like any
//! other. Stylesheet and markup chains run during emission. Every chain runs once per module.

pub mod compile;
pub mod css;

use std::path::{Path, PathBuf};

use lightningcss::targets::Targets;
use oxc_transformer::TransformOptions;
use regex::Regex;
use thiserror::Error;
use tracing::trace;

use crate::config::{ConfigError, TransformConfig};
use crate::graph::ModuleKind;
use crate::sourcemap::LineOrigins;

/// A failed transform. Identifies the file and the stage.
#[derive(Debug, Error)]
#[error("{stage} failed for {}: {message}", path.display())]
pub struct TransformError {
  pub path: PathBuf,
  pub stage: String,
  pub message: String,
}

/// Side outputs of a chain run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformMeta {
  pub path: PathBuf,
  pub kind: ModuleKind,
  /// Stylesheet text moved out of the module by `extract`.
  pub extracted_css: Option<String>,
  /// Markup recorded by `template`.
  pub template: Option<String>,
  /// Source lines of compiled script output.
  pub origins: Option<LineOrigins>,
}

impl TransformMeta {
  pub fn new(path: &Path, kind: ModuleKind) -> Self {
    Self {
      path: path.to_path_buf(),
      kind,
      extracted_css: None,
      template: None,
      origins: None,
    }
  }
}

pub trait Transform: Send + Sync {
  fn name(&self) -> &'static str;

  fn apply(&self, content: String, meta: &mut TransformMeta) -> Result<String, String>;
}

/// Syntax lowering to the configured ES target plus JSX.
pub struct Compile {
  options: TransformOptions,
  source_maps: bool,
}

impl Transform for Compile {
  fn name(&self) -> &'static str {
    "compile"
  }

  fn apply(&self, content: String, meta: &mut TransformMeta) -> Result<String, String> {
    let compiled = compile::compile(&meta.path, &content, &self.options, self.source_maps)?;
    meta.origins = compiled.origins;
    Ok(compiled.code)
  }
}

/// Vendor prefixing and normalization for the configured browser targets.
pub struct Prefix {
  targets: Targets,
}

impl Transform for Prefix {
  fn name(&self) -> &'static str {
    "postcss"
  }

  fn apply(&self, content: String, meta: &mut TransformMeta) -> Result<String, String> {
    css::prefix(&meta.path, &content, self.targets.clone())
  }
}

/// Moves stylesheet text into the style artifact and leaves an empty module behind.
pub struct Extract;

impl Transform for Extract {
  fn name(&self) -> &'static str {
    "extract"
  }

  fn apply(&self, content: String, meta: &mut TransformMeta) -> Result<String, String> {
    meta.extracted_css = Some(content);
    Ok(String::new())
  }
}

/// Records markup as template source. The markup must have a `<head>` for tag injection.
pub struct Template;

impl Transform for Template {
  fn name(&self) -> &'static str {
    "template"
  }

  fn apply(&self, content: String, meta: &mut TransformMeta) -> Result<String, String> {
    if !content.to_ascii_lowercase().contains("<head") {
      return Err("template has no <head> element".to_string());
    }
    meta.template = Some(content.clone());
    Ok(content)
  }
}

struct Rule {
  test: Regex,
  exclude: Option<Regex>,
  chain: Vec<Box<dyn Transform>>,
}

impl Rule {
  fn matches(&self, path: &str) -> bool {
    self.test.is_match(path) && !self.exclude.as_ref().is_some_and(|e| e.is_match(path))
  }
}

pub struct TransformRegistry {
  rules: Vec<Rule>,
  source_maps: bool,
}

impl TransformRegistry {
  /// The standard registry: markup templates, script compilation outside excluded paths,
  /// stylesheet prefixing and extraction.
  pub fn new(config: &TransformConfig) -> Result<Self, ConfigError> {
    let exclude = if config.compile_exclude.is_empty() {
      None
    } else {
      Some(compile_pattern(&config.compile_exclude)?)
    };
    let options = compile::options(&config.script_target, &config.jsx_pragma, &config.jsx_pragma_frag).map_err(
      |message| ConfigError::InvalidScriptTarget {
        target: config.script_target.clone(),
        message,
      },
    )?;

    let rules = vec![
      Rule {
        test: compile_pattern(r"\.html?$")?,
        exclude: None,
        chain: vec![Box::new(Template)],
      },
      Rule {
        test: compile_pattern(r"\.(jsx?|mjs|cjs)$")?,
        exclude,
        chain: vec![Box::new(Compile {
          options,
          source_maps: config.source_maps,
        })],
      },
      Rule {
        test: compile_pattern(r"\.css$")?,
        exclude: None,
        chain: vec![
          Box::new(Prefix {
            targets: css::targets(&config.css_targets),
          }),
          Box::new(Extract),
        ],
      },
    ];

    Ok(Self {
      rules,
      source_maps: config.source_maps,
    })
  }

  /// Whether script artifacts carry inline source maps.
  pub fn source_maps(&self) -> bool {
    self.source_maps
  }

  fn chain_for<'r>(&'r self, path: &Path) -> impl Iterator<Item = &'r dyn Transform> + 'r {
    let path = path_key(path);
    self
      .rules
      .iter()
      .filter(move |r| r.matches(&path))
      .flat_map(|r| r.chain.iter().map(|t| t.as_ref()))
  }

  pub fn transforms_for(&self, path: &Path) -> Vec<&'static str> {
    self.chain_for(path).map(|t| t.name()).collect()
  }

  /// Run every matching transform over `content`.
  pub fn run(&self, path: &Path, kind: ModuleKind, content: String) -> Result<(String, TransformMeta), TransformError> {
    let mut meta = TransformMeta::new(path, kind);
    let mut content = content;
    for transform in self.chain_for(path) {
      trace!(path = %path.display(), transform = transform.name(), "applying transform");
      content = transform.apply(content, &mut meta).map_err(|message| TransformError {
        path: path.to_path_buf(),
        stage: transform.name().to_string(),
        message,
      })?;
    }
    Ok((content, meta))
  }
}

fn compile_pattern(pattern: &str) -> Result<Regex, ConfigError> {
  Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
    pattern: pattern.to_string(),
    message: e.to_string(),
  })
}

/// `/`-separated path string that patterns are matched against.
fn path_key(path: &Path) -> String {
  path.to_string_lossy().replace('\\', "/")
}
