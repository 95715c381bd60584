//! Build orchestration.
//!
//! A build is a fixed sequence of typed stages:
//!
//! ```text
//! ProjectRoots::resolve -> EnvironmentSet::resolve -> ModuleGraph::build -> emit
//!   -> optimize -> document::render -> write_output
//! ```
//!
//! Configuration is resolved and validated once into a [`ResolvedConfig`] before any build I/O.
//! The dev server keeps one `ResolvedConfig` and calls [`build`] on every change.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use lightningcss::targets::Targets;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::config::{ConfigError, ProjectConfig};
use crate::emit::write::{WriteReport, write_output};
use crate::emit::{ArtifactRole, document, emit};
use crate::graph::resolve::Resolver;
use crate::graph::{GraphContext, ModuleGraph, ResolutionError};
use crate::inject::{EnvironmentSet, ProvideTable};
use crate::lock::OutputLockError;
use crate::optimize::optimize;
use crate::paths::ProjectRoots;
use crate::serve::proxy::ProxyRule;
use crate::transform::{TransformError, TransformRegistry, css};

/// Any failure that stops a build. Nothing is rolled back.
#[derive(Debug, Error)]
pub enum BuildError {
  #[error(transparent)]
  Configuration(#[from] ConfigError),

  #[error(transparent)]
  Resolution(#[from] ResolutionError),

  #[error(transparent)]
  Transform(#[from] TransformError),

  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error(transparent)]
  Lock(#[from] OutputLockError),

  #[error("build cancelled")]
  Cancelled,
}

impl BuildError {
  /// The failing stage, for user-facing output.
  pub fn stage(&self) -> &str {
    match self {
      Self::Configuration(_) => "configuration",
      Self::Resolution(_) => "resolve",
      Self::Transform(e) => &e.stage,
      Self::Read { .. } => "read",
      Self::Write { .. } => "write",
      Self::Lock(_) => "lock",
      Self::Cancelled => "cancelled",
    }
  }
}

/// Shared cancellation signal, checked between graph waves and before every file write.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
  pub fn cancel(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }

  pub fn check(&self) -> Result<(), BuildError> {
    if self.is_cancelled() {
      Err(BuildError::Cancelled)
    } else {
      Ok(())
    }
  }
}

/// Configuration compiled into the pipeline's runtime form.
pub struct ResolvedConfig {
  pub config: ProjectConfig,
  pub roots: ProjectRoots,
  pub template: PathBuf,
  pub resolver: Resolver,
  pub provide: ProvideTable,
  pub registry: TransformRegistry,
  pub proxies: Vec<ProxyRule>,
  pub css_targets: Targets,
}

impl ResolvedConfig {
  pub fn resolve(project_dir: &Path, config: ProjectConfig) -> Result<Self, ConfigError> {
    config.validate()?;
    let roots = ProjectRoots::resolve(project_dir, &config.paths)?;
    let provide = ProvideTable::from_config(&config.provide)?;
    let registry = TransformRegistry::new(&config.transform)?;
    let proxies = ProxyRule::compile(&config.serve.proxy)?;

    Ok(Self {
      template: roots.source.join(&config.document.template),
      resolver: Resolver::new(&config.resolve),
      css_targets: css::targets(&config.transform.css_targets),
      roots,
      provide,
      registry,
      proxies,
      config,
    })
  }

  /// Discover the config file for `project_dir` and resolve it.
  pub fn load(project_dir: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
    Self::resolve(project_dir, ProjectConfig::discover(project_dir, explicit)?)
  }
}

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
  pub minify: bool,
  pub cancel: CancelFlag,
  /// Pre-resolved environment; resolved from the process when `None`.
  pub env: Option<EnvironmentSet>,
}

impl BuildOptions {
  pub fn from_config(config: &ProjectConfig) -> Self {
    Self {
      minify: config.optimize.minify,
      ..Self::default()
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactSummary {
  pub name: String,
  pub role: ArtifactRole,
  pub entry: String,
  pub bytes: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
  pub output: PathBuf,
  pub build_date: String,
  pub modules: usize,
  pub artifacts: Vec<ArtifactSummary>,
  /// The rendered document shell, as written to the output root.
  #[serde(skip)]
  pub document: String,
  pub write: WriteReport,
  pub duration_ms: u128,
}

pub fn build(resolved: &ResolvedConfig, options: &BuildOptions) -> Result<BuildReport, BuildError> {
  let started = Instant::now();
  let env = match &options.env {
    Some(env) => env.clone(),
    None => EnvironmentSet::from_process(&resolved.config.env)?,
  };
  info!(
    source = %resolved.roots.source.display(),
    build_date = env.build_date(),
    minify = options.minify,
    "starting build"
  );

  let graph = ModuleGraph::build(&GraphContext {
    roots: &resolved.roots,
    entries: &resolved.config.entries,
    resolver: &resolved.resolver,
    env: &env,
    provide: &resolved.provide,
    registry: &resolved.registry,
    cancel: &options.cancel,
  })?;

  let emitted = emit(&graph, &resolved.registry, &resolved.template)?;
  let artifacts = if options.minify {
    optimize(emitted.artifacts, resolved.css_targets.clone())?
  } else {
    emitted.artifacts
  };
  let html = document::render(
    &emitted.template,
    &emitted.template_path,
    &artifacts,
    &resolved.config.document.public_path,
  )?;

  let write = write_output(&resolved.roots.output, &artifacts, &html, env.build_date(), &options.cancel)?;

  let report = BuildReport {
    output: resolved.roots.output.clone(),
    build_date: env.build_date().to_string(),
    modules: graph.len(),
    artifacts: artifacts
      .iter()
      .map(|a| ArtifactSummary {
        name: a.name.clone(),
        role: a.role,
        entry: a.entry.clone(),
        bytes: a.rendered().len(),
      })
      .collect(),
    document: html,
    write,
    duration_ms: started.elapsed().as_millis(),
  };
  info!(
    modules = report.modules,
    artifacts = report.artifacts.len(),
    duration_ms = report.duration_ms as u64,
    "build finished"
  );
  Ok(report)
}
