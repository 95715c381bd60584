//! Built bundles executed in an embedded JavaScript engine, plain and minified.

use spabuild_lib::emit::ArtifactRole;
use spabuild_lib::pipeline::{BuildReport, build};

use super::common::{BUILD_DATE, Project, options, run_script, single_entry};

fn built_script(project: &Project, report: &BuildReport) -> String {
  let artifact = report
    .artifacts
    .iter()
    .find(|a| a.role == ArtifactRole::Script)
    .unwrap();
  project.read_output(&artifact.name)
}

/// Build `entries` once plain and once minified, returning both scripts.
fn both_builds(project: &Project, entries: &[&str]) -> Vec<String> {
  let resolved = project.config(&single_entry(entries));
  [false, true]
    .into_iter()
    .map(|minify| {
      let report = build(&resolved, &options(minify)).unwrap();
      built_script(project, &report)
    })
    .collect()
}

#[test]
fn entry_modules_run_in_declared_order() {
  let project = Project::new();
  project.write("src/one.js", "window.order = ['one'];\n");
  project.write("src/two.js", "window.order.push('two');\n");
  project.write("src/three.js", "window.order.push('three');\n");

  for script in both_builds(&project, &["./one.js", "./two.js", "./three.js"]) {
    assert_eq!(run_script(&script, "window.order.join(',')"), "one,two,three");
  }
}

#[test]
fn provided_dollar_is_the_jquery_export() {
  let project = Project::new();
  project.package("jquery", "jquery.js", "module.exports = function jQuery(sel) { return 'jq:' + sel; };\n");
  project.write("src/index.js", "window.picked = $('#root');\n");

  for script in both_builds(&project, &["./index.js"]) {
    assert_eq!(run_script(&script, "window.picked"), "jq:#root");
  }
}

#[test]
fn cyclic_imports_read_bindings_once_initialized() {
  let project = Project::new();
  project.write(
    "src/a.js",
    "import { readA } from './b';\nexport const a = 'a';\nexport function hello() { return 'hi'; }\nwindow.result = readA();\n",
  );
  project.write(
    "src/b.js",
    "import { a, hello } from './a';\nwindow.early = hello();\nexport function readA() { return a; }\n",
  );

  for script in both_builds(&project, &["./a.js"]) {
    assert_eq!(run_script(&script, "window.early + ',' + window.result"), "hi,a");
  }
}

#[test]
fn exported_lets_are_live() {
  let project = Project::new();
  project.write("src/counter.js", "export let count = 0;\nexport function inc() { count++; }\n");
  project.write(
    "src/index.js",
    "import { count, inc } from './counter';\nimport * as ns from './counter';\n\
     window.before = count;\ninc();\nwindow.after = count;\nwindow.viaNamespace = ns.count;\n",
  );

  for script in both_builds(&project, &["./index.js"]) {
    assert_eq!(
      run_script(&script, "[window.before, window.after, window.viaNamespace].join(',')"),
      "0,1,1"
    );
  }
}

#[test]
fn only_commonjs_modules_see_exports_as_this() {
  let project = Project::new();
  project.write("src/esm.js", "export const x = 1;\nwindow.esmThis = typeof this;\n");
  project.write("src/cjs.js", "window.cjsThis = this === module.exports;\n");

  for script in both_builds(&project, &["./esm.js", "./cjs.js"]) {
    assert_eq!(run_script(&script, "window.esmThis"), "undefined");
    assert_eq!(run_script(&script, "window.cjsThis"), "true");
  }
}

#[test]
fn compiled_jsx_and_lowered_syntax_run() {
  let project = Project::new();
  project.package(
    "react",
    "index.js",
    "exports.createElement = function (tag, props, child) { return tag + ':' + child; };\n",
  );
  project.write(
    "src/index.jsx",
    "import React from 'react';\nconst data = { a: null };\nwindow.el = <b>{data?.a?.b ?? 'fallback'}</b>;\n",
  );

  for script in both_builds(&project, &["./index.jsx"]) {
    assert_eq!(run_script(&script, "window.el"), "b:fallback");
  }
}

#[test]
fn console_output_sees_injected_values() {
  let project = Project::new();
  project.write("src/index.js", "console.log('mode', process.env.NODE_ENV, process.env.BUILD_DATE);\n");

  for script in both_builds(&project, &["./index.js"]) {
    assert_eq!(
      run_script(&script, "window.logged.join('|')"),
      format!("mode development {BUILD_DATE}")
    );
  }
}
