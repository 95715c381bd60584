//! Shared helpers for pipeline tests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use spabuild_lib::config::ProjectConfig;
use spabuild_lib::inject::EnvironmentSet;
use spabuild_lib::pipeline::{BuildOptions, ResolvedConfig};
use tempfile::TempDir;

pub const TEMPLATE: &str = "<!doctype html>\n<html><head><title>app</title></head><body><div id=\"root\"></div></body></html>\n";
pub const BUILD_DATE: &str = "2024-05-01T12:00:00.000Z";

/// A project at `<temp>/client` with the default sibling roots.
pub struct Project {
  pub temp: TempDir,
  pub dir: PathBuf,
}

impl Project {
  /// A project with `src/index.html` in place.
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("client");
    let project = Self { temp, dir };
    project.write("src/index.html", TEMPLATE);
    project
  }

  /// Write a file relative to the project directory.
  pub fn write(&self, relative: &str, content: &str) {
    let path = self.dir.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, content).unwrap();
  }

  pub fn package(&self, name: &str, main: &str, content: &str) {
    self.write(
      &format!("node_modules/{}/package.json", name),
      &format!(r#"{{ "name": "{}", "main": "{}" }}"#, name, main),
    );
    self.write(&format!("node_modules/{}/{}", name, main), content);
  }

  pub fn output(&self) -> PathBuf {
    self.temp.path().join("dist")
  }

  pub fn read_output(&self, name: &str) -> String {
    std::fs::read_to_string(self.output().join(name)).unwrap()
  }

  /// Resolve a `spabuild.toml` body against this project.
  pub fn config(&self, toml: &str) -> ResolvedConfig {
    let config = ProjectConfig::parse(toml, Path::new("spabuild.toml")).unwrap();
    ResolvedConfig::resolve(&self.dir, config).unwrap()
  }
}

/// An environment with a pinned `BUILD_DATE`.
pub fn fixed_env() -> EnvironmentSet {
  EnvironmentSet::resolve(
    |name| (name == "BUILD_DATE").then(|| BUILD_DATE.to_string()),
    Utc::now(),
    &BTreeMap::new(),
  )
  .unwrap()
}

pub fn options(minify: bool) -> BuildOptions {
  BuildOptions {
    minify,
    env: Some(fixed_env()),
    ..BuildOptions::default()
  }
}

/// Config with one entry named `main`.
pub fn single_entry(modules: &[&str]) -> String {
  let list: Vec<String> = modules.iter().map(|m| format!("\"{}\"", m)).collect();
  format!("[[entries]]\nname = \"main\"\nmodules = [{}]\n", list.join(", "))
}

/// Run a built script in an embedded JavaScript engine, then evaluate `expression`.
///
/// `window` is the global object and `console.log` records its arguments in `window.logged`.
pub fn run_script(code: &str, expression: &str) -> String {
  use boa_engine::{Context, Source};

  let mut context = Context::default();
  context
    .eval(Source::from_bytes(
      "var window = globalThis; window.logged = []; \
       var console = { log: function () { window.logged.push([].slice.call(arguments).join(' ')); } };",
    ))
    .unwrap();
  if let Err(e) = context.eval(Source::from_bytes(code)) {
    panic!("script failed: {e}\n{code}");
  }
  let value = context.eval(Source::from_bytes(expression)).unwrap();
  value.to_string(&mut context).unwrap().to_std_string_escaped()
}
