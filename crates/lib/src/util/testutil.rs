//! Test utilities for spabuild-lib.
//!
//! Helpers that lay out small project trees on disk: a client directory with `src/`, sibling
//! `public/`, `upload/` and `dist/` roots, and stub packages under `node_modules/`.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A throwaway project rooted at `<temp>/client`, mirroring the default root layout.
pub struct TestProject {
  pub temp: TempDir,
  pub dir: PathBuf,
}

impl TestProject {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("client");
    fs::create_dir_all(dir.join("src")).unwrap();
    Self { temp, dir }
  }

  /// Write a file relative to the project directory, creating parents.
  pub fn write(&self, relative: &str, content: &str) -> PathBuf {
    write_file(&self.dir, relative, content)
  }

  /// Write a stub package with a `package.json` and the given entry file.
  pub fn package(&self, name: &str, main: &str, content: &str) -> PathBuf {
    let pkg = format!("node_modules/{}", name);
    self.write(
      &format!("{}/package.json", pkg),
      &format!(r#"{{ "name": "{}", "main": "{}" }}"#, name, main),
    );
    self.write(&format!("{}/{}", pkg, main), content)
  }

  pub fn path(&self, relative: &str) -> PathBuf {
    self.dir.join(relative)
  }
}

/// Write a file below `root`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, content: &str) -> PathBuf {
  let path = root.join(relative);
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).unwrap();
  }
  fs::write(&path, content).unwrap();
  path
}

/// Run `code` in an embedded JavaScript engine, then evaluate `expression` and return it as a
/// string. `window` is the global object, as in a browser.
pub fn run_script(code: &str, expression: &str) -> String {
  use boa_engine::{Context, Source};

  let mut context = Context::default();
  context
    .eval(Source::from_bytes("var window = globalThis;"))
    .unwrap();
  if let Err(e) = context.eval(Source::from_bytes(code)) {
    panic!("script failed: {e}\n{code}");
  }
  let value = context.eval(Source::from_bytes(expression)).unwrap();
  value.to_string(&mut context).unwrap().to_std_string_escaped()
}
