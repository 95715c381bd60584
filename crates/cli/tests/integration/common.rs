//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

pub const TEMPLATE: &str = "<html><head><title>app</title></head><body></body></html>\n";

/// Isolated project tree.
///
/// The project directory is `<temp>/client`; the default roots put the output in `<temp>/dist`.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  /// A project with a template, a stylesheet and one script, built as entry `main`.
  pub fn app() -> Self {
    let env = Self { temp: TempDir::new().unwrap() };
    env.write_file("client/src/index.html", TEMPLATE);
    env.write_file("client/src/index.css", ".app { color: red; }\n");
    env.write_file("client/src/index.js", "console.log(process.env.BUILD_DATE);\n");
    env.write_file(
      "client/spabuild.toml",
      "[[entries]]\nname = \"main\"\nmodules = [\"./index.css\", \"./index.js\"]\n",
    );
    env
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  pub fn project_path(&self) -> PathBuf {
    self.temp.path().join("client")
  }

  pub fn output_path(&self) -> PathBuf {
    self.temp.path().join("dist")
  }

  /// Artifact names currently in an output subdirectory, sorted.
  pub fn artifacts(&self, dir: &str) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(self.output_path().join(dir))
      .map(|entries| {
        entries
          .flatten()
          .map(|e| format!("{}/{}", dir, e.file_name().to_string_lossy()))
          .collect()
      })
      .unwrap_or_default();
    names.sort();
    names
  }

  /// A `spabuild` command rooted at the project, with a pinned build date.
  pub fn spabuild_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("spabuild");
    cmd.arg("-C").arg(self.project_path());
    cmd.env("BUILD_DATE", "2024-05-01T12:00:00.000Z");
    cmd.env_remove("RUST_LOG");
    cmd
  }
}
