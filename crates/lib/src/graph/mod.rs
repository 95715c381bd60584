//! Module graph construction.
//!
//! Starting from the configured entries, every reachable module is read, injected, compiled,
//! analyzed and resolved. Each wave of newly discovered modules is loaded in parallel with rayon; the results
//! are merged sequentially in frontier order, so node indices (and therefore discovery order)
//! are identical across runs.
//!
//! Modules are stored in a petgraph `DiGraph`. Edges mirror [`Module::dependencies`], which
//! keeps the declared order that traversals need.

pub mod resolve;
pub mod stylesheet;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use petgraph::Direction;
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::EntryConfig;
use crate::inject::globals::{MemberSite, rewrite_sites};
use crate::inject::{EnvironmentSet, ProvideTable, SyntheticImport};
use crate::paths::{ProjectRoots, relative_id};
use crate::pipeline::{BuildError, CancelFlag};
use crate::script;
use crate::sourcemap::LineOrigins;
use crate::transform::{TransformError, TransformRegistry};
use resolve::{Resolved, Resolver};

/// A module request that could not be resolved. Always fatal.
#[derive(Debug, Error)]
#[error("cannot resolve '{specifier}' from {importer}")]
pub struct ResolutionError {
  pub importer: String,
  pub specifier: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
  Script,
  Stylesheet,
  Markup,
  Json,
  /// Any other file, referenced from a stylesheet `url()`.
  Asset,
  /// A configured fallback with no content.
  Empty,
}

impl ModuleKind {
  pub fn from_path(path: &Path) -> Self {
    let ext = path
      .extension()
      .map(|e| e.to_string_lossy().to_ascii_lowercase())
      .unwrap_or_default();
    match ext.as_str() {
      "js" | "jsx" | "mjs" | "cjs" => Self::Script,
      "css" => Self::Stylesheet,
      "html" | "htm" => Self::Markup,
      "json" => Self::Json,
      _ => Self::Asset,
    }
  }

  /// Whether modules of this kind get a slot in the script registry.
  pub fn in_registry(self) -> bool {
    !matches!(self, Self::Asset)
  }
}

/// How a module refers to one of its dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
  /// `import ... from` and side-effect `import`.
  Static,
  /// `export ... from` and `export * from`.
  ReExport,
  /// `import("literal")`.
  Dynamic,
  /// `require("literal")`.
  Require,
  /// An implicit import added by a global provider.
  Provided,
  /// Stylesheet `@import`, inlined into the importer's stylesheet.
  StyleImport,
  /// Stylesheet `url()` reference.
  Asset,
}

impl DependencyKind {
  /// Edges that become `__bundle_require__` calls in the importer.
  pub fn is_script_edge(self) -> bool {
    !matches!(self, Self::StyleImport | Self::Asset)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ModuleKey {
  File(PathBuf),
  Empty(String),
}

impl From<Resolved> for ModuleKey {
  fn from(resolved: Resolved) -> Self {
    match resolved {
      Resolved::File(path) => Self::File(path),
      Resolved::Empty(name) => Self::Empty(name),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
  pub specifier: String,
  pub kind: DependencyKind,
  pub target: NodeIndex,
}

/// A synthetic import after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvidedImport {
  pub local: String,
  pub export: Option<String>,
  pub target: NodeIndex,
}

#[derive(Debug, Clone)]
pub struct Module {
  /// Project-relative id, e.g. `./src/index.jsx`.
  pub id: String,
  /// Absolute path; `None` for empty fallbacks.
  pub path: Option<PathBuf>,
  pub kind: ModuleKind,
  /// Content after injection, and after compilation for scripts. Empty for assets and
  /// fallbacks.
  pub content: String,
  /// Script text as read from disk, kept for source maps.
  pub original: Option<String>,
  /// Source line of every line of compiled `content`.
  pub origins: Option<LineOrigins>,
  pub dependencies: Vec<Dependency>,
  pub provided: Vec<ProvidedImport>,
  /// Names of the transforms in this module's chain.
  pub transforms: Vec<&'static str>,
}

impl Module {
  fn placeholder(id: String, key: &ModuleKey) -> Self {
    let (path, kind) = match key {
      ModuleKey::File(path) => (Some(path.clone()), ModuleKind::from_path(path)),
      ModuleKey::Empty(_) => (None, ModuleKind::Empty),
    };
    Self {
      id,
      path,
      kind,
      content: String::new(),
      original: None,
      origins: None,
      dependencies: Vec::new(),
      provided: Vec::new(),
      transforms: Vec::new(),
    }
  }

  /// Target of a script request by specifier.
  pub fn target_of(&self, specifier: &str) -> Option<NodeIndex> {
    self
      .dependencies
      .iter()
      .find(|d| d.specifier == specifier && d.kind.is_script_edge())
      .map(|d| d.target)
  }

  /// Path for diagnostics.
  pub fn display_path(&self) -> PathBuf {
    self.path.clone().unwrap_or_else(|| PathBuf::from(&self.id))
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
  pub name: String,
  /// Entry modules in declared order, deduplicated.
  pub modules: Vec<NodeIndex>,
}

/// Everything graph construction reads.
pub struct GraphContext<'c> {
  pub roots: &'c ProjectRoots,
  pub entries: &'c [EntryConfig],
  pub resolver: &'c Resolver,
  pub env: &'c EnvironmentSet,
  pub provide: &'c ProvideTable,
  pub registry: &'c TransformRegistry,
  pub cancel: &'c CancelFlag,
}

#[derive(Debug)]
pub struct ModuleGraph {
  graph: DiGraph<Module, DependencyKind>,
  index: HashMap<ModuleKey, NodeIndex>,
  entries: Vec<EntryPoint>,
}

/// Result of loading one module, before it is merged into the graph.
struct Loaded {
  content: String,
  original: Option<String>,
  origins: Option<LineOrigins>,
  requests: Vec<(String, DependencyKind, Resolved)>,
  provided: Vec<(SyntheticImport, Resolved)>,
  sites: Vec<MemberSite>,
}

impl ModuleGraph {
  pub fn build(ctx: &GraphContext<'_>) -> Result<Self, BuildError> {
    let mut graph = Self {
      graph: DiGraph::new(),
      index: HashMap::new(),
      entries: Vec::with_capacity(ctx.entries.len()),
    };
    let mut frontier = Vec::new();

    for entry in ctx.entries {
      let mut modules = Vec::with_capacity(entry.modules.len());
      for reference in &entry.modules {
        let resolved = ctx.resolver.resolve_entry(reference, ctx.roots).ok_or_else(|| ResolutionError {
          importer: format!("entry '{}'", entry.name),
          specifier: reference.clone(),
        })?;
        let (node, new) = graph.intern(ctx, resolved.into());
        if new {
          frontier.push(node);
        }
        if !modules.contains(&node) {
          modules.push(node);
        }
      }
      graph.entries.push(EntryPoint {
        name: entry.name.clone(),
        modules,
      });
    }

    let mut waves = 0usize;
    while !frontier.is_empty() {
      ctx.cancel.check()?;
      waves += 1;

      let jobs: Vec<(NodeIndex, Module)> = frontier
        .iter()
        .map(|&node| (node, graph.graph[node].clone()))
        .collect();
      let loaded: Vec<Result<Loaded, BuildError>> = jobs.par_iter().map(|(_, module)| load(ctx, module)).collect();

      let mut next = Vec::new();
      for ((node, _), result) in jobs.into_iter().zip(loaded) {
        let loaded = result?;
        graph.merge(ctx, node, loaded, &mut next);
      }
      frontier = next;
    }

    let cyclic = is_cyclic_directed(&graph.graph);
    info!(
      modules = graph.graph.node_count(),
      edges = graph.graph.edge_count(),
      waves,
      cyclic,
      "module graph built"
    );
    Ok(graph)
  }

  fn intern(&mut self, ctx: &GraphContext<'_>, key: ModuleKey) -> (NodeIndex, bool) {
    if let Some(&node) = self.index.get(&key) {
      return (node, false);
    }
    let id = match &key {
      ModuleKey::File(path) => relative_id(&ctx.roots.project, path),
      ModuleKey::Empty(name) => format!("empty:{}", name),
    };
    let mut module = Module::placeholder(id, &key);
    if let Some(path) = &module.path {
      module.transforms = ctx.registry.transforms_for(path);
    }
    let node = self.graph.add_node(module);
    self.index.insert(key, node);
    (node, true)
  }

  fn merge(&mut self, ctx: &GraphContext<'_>, node: NodeIndex, loaded: Loaded, next: &mut Vec<NodeIndex>) {
    let mut dependencies = Vec::with_capacity(loaded.requests.len());
    for (specifier, kind, resolved) in loaded.requests {
      let (target, new) = self.intern(ctx, resolved.into());
      if new {
        next.push(target);
      }
      self.graph.add_edge(node, target, kind);
      dependencies.push(Dependency { specifier, kind, target });
    }

    let mut provided = Vec::with_capacity(loaded.provided.len());
    let mut kept = HashSet::new();
    for (import, resolved) in loaded.provided {
      let (target, new) = self.intern(ctx, resolved.into());
      if target == node {
        debug!(module = %self.graph[node].id, local = %import.local, "module not provided to itself");
        continue;
      }
      if new {
        next.push(target);
      }
      self.graph.add_edge(node, target, DependencyKind::Provided);
      kept.insert(import.local.clone());
      provided.push(ProvidedImport {
        local: import.local,
        export: import.export,
        target,
      });
    }

    let content = rewrite_sites(&loaded.content, &loaded.sites, |local| kept.contains(local)).unwrap_or(loaded.content);

    let module = &mut self.graph[node];
    module.content = content;
    module.original = loaded.original;
    module.origins = loaded.origins;
    module.dependencies = dependencies;
    module.provided = provided;
  }

  pub fn entries(&self) -> &[EntryPoint] {
    &self.entries
  }

  pub fn module(&self, node: NodeIndex) -> &Module {
    &self.graph[node]
  }

  /// Node indices in discovery order.
  pub fn nodes(&self) -> impl Iterator<Item = NodeIndex> + '_ {
    self.graph.node_indices()
  }

  pub fn len(&self) -> usize {
    self.graph.node_count()
  }

  pub fn is_empty(&self) -> bool {
    self.graph.node_count() == 0
  }

  pub fn find(&self, path: &Path) -> Option<NodeIndex> {
    self.index.get(&ModuleKey::File(path.to_path_buf())).copied()
  }

  /// Modules that depend on `node` directly.
  pub fn dependents(&self, node: NodeIndex) -> Vec<NodeIndex> {
    let mut out: Vec<_> = self.graph.neighbors_directed(node, Direction::Incoming).collect();
    out.sort();
    out.dedup();
    out
  }

  /// Registry modules of an entry: the entry modules in declared order, then every other
  /// module reachable over script edges in discovery order.
  pub fn script_order(&self, entry: &EntryPoint) -> Vec<NodeIndex> {
    let mut reachable = HashSet::new();
    let mut stack: Vec<NodeIndex> = entry.modules.clone();
    while let Some(node) = stack.pop() {
      let module = &self.graph[node];
      if !module.kind.in_registry() || !reachable.insert(node) {
        continue;
      }
      if matches!(module.kind, ModuleKind::Stylesheet) {
        continue;
      }
      stack.extend(
        module
          .dependencies
          .iter()
          .filter(|d| d.kind.is_script_edge())
          .map(|d| d.target),
      );
      stack.extend(module.provided.iter().map(|p| p.target));
    }

    let mut order: Vec<NodeIndex> = entry.modules.iter().copied().filter(|n| reachable.contains(n)).collect();
    let mut rest: Vec<NodeIndex> = reachable.into_iter().filter(|n| !entry.modules.contains(n)).collect();
    rest.sort();
    order.extend(rest);
    order
  }

  /// Stylesheets reachable from an entry, in dependency post-order: a stylesheet's imports come
  /// before it, and sibling imports keep their declared order.
  pub fn style_order(&self, entry: &EntryPoint) -> Vec<NodeIndex> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();

    for &root in &entry.modules {
      if !visited.insert(root) {
        continue;
      }
      let mut stack = vec![(root, 0usize)];
      while let Some((node, child)) = stack.pop() {
        let module = &self.graph[node];
        let children = self.traversal_children(module);
        if let Some(&next) = children.get(child) {
          stack.push((node, child + 1));
          if visited.insert(next) {
            stack.push((next, 0));
          }
        } else if module.kind == ModuleKind::Stylesheet {
          order.push(node);
        }
      }
    }

    order
  }

  fn traversal_children(&self, module: &Module) -> Vec<NodeIndex> {
    match module.kind {
      ModuleKind::Stylesheet => module
        .dependencies
        .iter()
        .filter(|d| d.kind == DependencyKind::StyleImport)
        .map(|d| d.target)
        .collect(),
      ModuleKind::Asset => Vec::new(),
      _ => module
        .provided
        .iter()
        .map(|p| p.target)
        .chain(
          module
            .dependencies
            .iter()
            .filter(|d| d.kind.is_script_edge())
            .map(|d| d.target),
        )
        .collect(),
    }
  }
}

/// Read and analyze one module. Runs on the rayon pool; touches no shared state.
fn load(ctx: &GraphContext<'_>, module: &Module) -> Result<Loaded, BuildError> {
  let mut loaded = Loaded {
    content: String::new(),
    original: None,
    origins: None,
    requests: Vec::new(),
    provided: Vec::new(),
    sites: Vec::new(),
  };
  let Some(path) = &module.path else {
    return Ok(loaded);
  };
  if module.kind == ModuleKind::Asset {
    return Ok(loaded);
  }

  let content = std::fs::read_to_string(path).map_err(|source| BuildError::Read {
    path: path.clone(),
    source,
  })?;
  let dir = path.parent().unwrap_or(Path::new("/"));

  match module.kind {
    ModuleKind::Script => load_script(ctx, module, path, dir, content, &mut loaded)?,
    ModuleKind::Stylesheet => load_stylesheet(ctx, module, path, dir, content, &mut loaded)?,
    _ => loaded.content = content,
  }

  debug!(module = %module.id, requests = loaded.requests.len(), "loaded module");
  Ok(loaded)
}

fn load_script(
  ctx: &GraphContext<'_>,
  module: &Module,
  path: &Path,
  dir: &Path,
  mut content: String,
  loaded: &mut Loaded,
) -> Result<(), BuildError> {
  let parse_error = |message: String| TransformError {
    path: path.to_path_buf(),
    stage: "parse".to_string(),
    message,
  };

  if ctx.registry.source_maps() {
    loaded.original = Some(content.clone());
  }

  let mut facts = script::analyze(&content).map_err(parse_error)?;
  if let Some(injected) = ctx.env.inject(&facts, &content) {
    content = injected;
    facts = script::analyze(&content).map_err(parse_error)?;
  }

  if !module.transforms.is_empty() {
    let (compiled, meta) = ctx.registry.run(path, ModuleKind::Script, content)?;
    content = compiled;
    loaded.origins = meta.origins;
    facts = script::analyze(&content).map_err(parse_error)?;
  }

  let provided = ctx.provide.scan(&facts, &content);
  for import in provided.imports {
    let resolved = ctx.resolver.resolve(&import.request, dir).ok_or_else(|| ResolutionError {
      importer: module.id.clone(),
      specifier: import.request.clone(),
    })?;
    loaded.provided.push((import, resolved));
  }
  loaded.sites = provided.sites;

  for request in facts.imports {
    let resolved = ctx.resolver.resolve(&request.specifier, dir).ok_or_else(|| ResolutionError {
      importer: module.id.clone(),
      specifier: request.specifier.clone(),
    })?;
    loaded.requests.push((request.specifier, request.kind, resolved));
  }

  loaded.content = content;
  Ok(())
}

fn load_stylesheet(
  ctx: &GraphContext<'_>,
  module: &Module,
  path: &Path,
  dir: &Path,
  content: String,
  loaded: &mut Loaded,
) -> Result<(), BuildError> {
  let facts = stylesheet::analyze(&path.display().to_string(), &content).map_err(|message| TransformError {
    path: path.to_path_buf(),
    stage: "parse".to_string(),
    message,
  })?;
  let mut splicer = crate::util::splice::Splicer::new(&content);

  for import in facts.imports {
    if stylesheet::is_external(&import.specifier) || import.condition.is_some() {
      debug!(module = %module.id, specifier = %import.specifier, "leaving @import in place");
      continue;
    }
    let path = ctx
      .resolver
      .resolve_style_import(&import.specifier, dir)
      .ok_or_else(|| ResolutionError {
        importer: module.id.clone(),
        specifier: import.specifier.clone(),
      })?;
    splicer.remove(import.start, import.end);
    loaded
      .requests
      .push((import.specifier, DependencyKind::StyleImport, Resolved::File(path)));
  }

  for url in facts.urls {
    if stylesheet::is_external(&url) {
      continue;
    }
    match ctx.resolver.resolve_asset(&url, dir) {
      Some(path) => loaded.requests.push((url, DependencyKind::Asset, Resolved::File(path))),
      None => debug!(module = %module.id, url = %url, "url() reference left unresolved"),
    }
  }

  loaded.content = splicer.apply();
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::{ProjectConfig, ResolveConfig, TransformConfig};
  use crate::util::testutil::TestProject;
  use chrono::Utc;
  use std::collections::BTreeMap;

  struct Fixture {
    project: TestProject,
    roots: ProjectRoots,
    resolver: Resolver,
    env: EnvironmentSet,
    provide: ProvideTable,
    registry: TransformRegistry,
    cancel: CancelFlag,
  }

  impl Fixture {
    fn new() -> Self {
      let project = TestProject::new();
      let roots = ProjectRoots::resolve(&project.dir, &Default::default()).unwrap();
      Self {
        roots,
        resolver: Resolver::new(&ResolveConfig::default()),
        env: EnvironmentSet::resolve(|_| None, Utc::now(), &BTreeMap::new()).unwrap(),
        provide: ProvideTable::from_config(&ProjectConfig::default().provide).unwrap(),
        registry: TransformRegistry::new(&TransformConfig::default()).unwrap(),
        cancel: CancelFlag::default(),
        project,
      }
    }

    fn build(&self, modules: &[&str]) -> Result<ModuleGraph, BuildError> {
      let entries = vec![EntryConfig {
        name: "main".to_string(),
        modules: modules.iter().map(|m| m.to_string()).collect(),
      }];
      ModuleGraph::build(&GraphContext {
        roots: &self.roots,
        entries: &entries,
        resolver: &self.resolver,
        env: &self.env,
        provide: &self.provide,
        registry: &self.registry,
        cancel: &self.cancel,
      })
    }
  }

  fn ids(graph: &ModuleGraph, nodes: &[NodeIndex]) -> Vec<String> {
    nodes.iter().map(|&n| graph.module(n).id.clone()).collect()
  }

  #[test]
  fn shared_modules_appear_once() {
    let fx = Fixture::new();
    fx.project.write("src/index.js", "import './a'; import './b';");
    fx.project.write("src/a.js", "import './shared';");
    fx.project.write("src/b.js", "import './shared';");
    fx.project.write("src/shared.js", "export const x = 1;");

    let graph = fx.build(&["./index.js"]).unwrap();
    assert_eq!(graph.len(), 4);
    let shared = graph.find(&fx.project.path("src/shared.js")).unwrap();
    assert_eq!(graph.dependents(shared).len(), 2);
  }

  #[test]
  fn cycles_are_permitted() {
    let fx = Fixture::new();
    fx.project.write("src/a.js", "import './b'; export const a = 1;");
    fx.project.write("src/b.js", "import './a'; export const b = 2;");

    let graph = fx.build(&["./a.js"]).unwrap();
    assert_eq!(graph.len(), 2);
  }

  #[test]
  fn missing_import_names_importer_and_specifier() {
    let fx = Fixture::new();
    fx.project.write("src/index.js", "import './nope';");

    let err = fx.build(&["./index.js"]).unwrap_err();
    match err {
      BuildError::Resolution(e) => {
        assert_eq!(e.importer, "./src/index.js");
        assert_eq!(e.specifier, "./nope");
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[test]
  fn missing_entry_is_a_resolution_error() {
    let fx = Fixture::new();
    let err = fx.build(&["./absent.js"]).unwrap_err();
    assert!(matches!(err, BuildError::Resolution(e) if e.importer == "entry 'main'"));
  }

  #[test]
  fn entry_order_then_discovery_order() {
    let fx = Fixture::new();
    fx.project.package("polyfill", "index.js", "window.p = 1;");
    fx.project.write("src/index.css", "body { margin: 0; }");
    fx.project.write("src/buildinfo.js", "export const date = process.env.BUILD_DATE;");
    fx.project.write("src/index.jsx", "import { date } from './buildinfo'; import './app';");
    fx.project.write("src/app.js", "export default 1;");

    let graph = fx
      .build(&["polyfill", "./index.css", "./buildinfo.js", "./index.jsx"])
      .unwrap();
    let entry = &graph.entries()[0];
    assert_eq!(
      ids(&graph, &graph.script_order(entry)),
      vec![
        "./node_modules/polyfill/index.js",
        "./src/index.css",
        "./src/buildinfo.js",
        "./src/index.jsx",
        "./src/app.js",
      ]
    );
  }

  #[test]
  fn environment_is_injected_while_loading() {
    let fx = Fixture::new();
    fx.project.write("src/info.js", "export const env = process.env.NODE_ENV;");

    let graph = fx.build(&["./info.js"]).unwrap();
    let node = graph.find(&fx.project.path("src/info.js")).unwrap();
    assert_eq!(graph.module(node).content.trim_end(), "export const env = \"development\";");
    assert_eq!(
      graph.module(node).original.as_deref(),
      Some("export const env = process.env.NODE_ENV;")
    );
  }

  #[test]
  fn provided_globals_become_edges() {
    let fx = Fixture::new();
    let jquery = fx.project.package("jquery", "dist/jquery.js", "module.exports = function () {};");
    fx.project.write("src/index.js", "$('#app');");

    let graph = fx.build(&["./index.js"]).unwrap();
    let index = graph.find(&fx.project.path("src/index.js")).unwrap();
    let module = graph.module(index);
    assert_eq!(module.provided.len(), 1);
    assert_eq!(module.provided[0].local, "$");
    assert_eq!(graph.module(module.provided[0].target).path.as_deref(), Some(jquery.as_path()));
  }

  #[test]
  fn modules_are_not_provided_to_themselves() {
    let fx = Fixture::new();
    fx.project.package("jquery", "jquery.js", "$.fn = {}; window.jQuery.extend({});");
    fx.project.write("src/index.js", "import 'jquery';");

    let graph = fx.build(&["./index.js"]).unwrap();
    let jquery = graph.find(&fx.project.path("node_modules/jquery/jquery.js")).unwrap();
    let module = graph.module(jquery);
    assert!(module.provided.is_empty());
    assert!(module.content.contains("window.jQuery.extend"));
  }

  #[test]
  fn stylesheet_imports_are_stripped_and_followed() {
    let fx = Fixture::new();
    fx.project.write("src/index.css", "@import \"./reset.css\";\nbody { background: url(img/bg.png); }");
    fx.project.write("src/reset.css", "* { box-sizing: border-box; }");
    fx.project.write("src/img/bg.png", "png");

    let graph = fx.build(&["./index.css"]).unwrap();
    assert_eq!(graph.len(), 3);
    let index = graph.find(&fx.project.path("src/index.css")).unwrap();
    let module = graph.module(index);
    assert!(!module.content.contains("@import"));
    let kinds: Vec<_> = module.dependencies.iter().map(|d| d.kind).collect();
    assert_eq!(kinds, vec![DependencyKind::StyleImport, DependencyKind::Asset]);
    let asset = graph.find(&fx.project.path("src/img/bg.png")).unwrap();
    assert_eq!(graph.module(asset).kind, ModuleKind::Asset);
  }

  #[test]
  fn missing_stylesheet_import_is_fatal() {
    let fx = Fixture::new();
    fx.project.write("src/index.css", "@import \"./gone.css\";");
    assert!(matches!(fx.build(&["./index.css"]), Err(BuildError::Resolution(_))));
  }

  #[test]
  fn missing_url_targets_are_left_alone() {
    let fx = Fixture::new();
    fx.project.write("src/index.css", "a { background: url(missing.png); } b { background: url(/abs.png); }");
    let graph = fx.build(&["./index.css"]).unwrap();
    assert_eq!(graph.len(), 1);
  }

  #[test]
  fn quoted_url_text_is_not_an_asset() {
    let fx = Fixture::new();
    fx.project.write("src/x", "not an asset");
    fx.project.write("src/img.png", "png");
    fx.project.write("src/index.css", ".a::before { content: \"url(x)\"; }\n.b { background: url(img.png); }");

    let graph = fx.build(&["./index.css"]).unwrap();
    assert!(graph.find(&fx.project.path("src/x")).is_none());
    assert!(graph.find(&fx.project.path("src/img.png")).is_some());
    let index = graph.find(&fx.project.path("src/index.css")).unwrap();
    assert!(graph.module(index).content.contains("content: \"url(x)\""));
  }

  #[test]
  fn style_order_is_post_order() {
    let fx = Fixture::new();
    fx.project.write("src/index.js", "import './a.css'; import './b.css';");
    fx.project.write("src/a.css", "@import './base.css'; .a {}");
    fx.project.write("src/base.css", ".base {}");
    fx.project.write("src/b.css", "@import './base.css'; .b {}");

    let graph = fx.build(&["./index.js"]).unwrap();
    let entry = &graph.entries()[0];
    assert_eq!(
      ids(&graph, &graph.style_order(entry)),
      vec!["./src/base.css", "./src/a.css", "./src/b.css"]
    );
  }

  #[test]
  fn fallback_modules_are_empty() {
    let fx = Fixture::new();
    fx.project.write("src/index.js", "const fs = require('fs');");
    let graph = fx.build(&["./index.js"]).unwrap();
    assert_eq!(graph.len(), 2);
    let index = graph.find(&fx.project.path("src/index.js")).unwrap();
    let target = graph.module(index).target_of("fs").unwrap();
    assert_eq!(graph.module(target).kind, ModuleKind::Empty);
    assert_eq!(graph.module(target).id, "empty:fs");
  }

  #[test]
  fn imports_added_by_compilation_join_the_graph() {
    let fx = Fixture::new();
    fx.project
      .package("@babel/runtime", "helpers/defineProperty.js", "module.exports = function () {};");
    fx.project.write("src/index.js", "export class Counter { count = 0; }");

    let graph = fx.build(&["./index.js"]).unwrap();
    let index = graph.find(&fx.project.path("src/index.js")).unwrap();
    let module = graph.module(index);
    assert!(!module.content.contains("count = 0;\n}"), "{}", module.content);
    assert!(
      module
        .dependencies
        .iter()
        .any(|d| d.specifier.starts_with("@babel/runtime/helpers/")),
      "{:?}",
      module.dependencies
    );
    assert!(module.origins.is_some());
  }

  #[test]
  fn transforms_follow_the_registry() {
    let fx = Fixture::new();
    fx.project.write("src/index.jsx", "import './index.css';");
    fx.project.write("src/index.css", "");
    fx.project.package("lib", "index.js", "");

    let graph = fx.build(&["./index.jsx", "lib"]).unwrap();
    let jsx = graph.find(&fx.project.path("src/index.jsx")).unwrap();
    let css = graph.find(&fx.project.path("src/index.css")).unwrap();
    let lib = graph.find(&fx.project.path("node_modules/lib/index.js")).unwrap();
    assert_eq!(graph.module(jsx).transforms, vec!["compile"]);
    assert_eq!(graph.module(css).transforms, vec!["postcss", "extract"]);
    assert!(graph.module(lib).transforms.is_empty());
  }

  #[test]
  fn cancelled_builds_stop_between_waves() {
    let fx = Fixture::new();
    fx.project.write("src/index.js", "");
    fx.cancel.cancel();
    assert!(matches!(fx.build(&["./index.js"]), Err(BuildError::Cancelled)));
  }
}
