use spabuild_lib::consts::{DOCUMENT_FILENAME, MANIFEST_FILENAME};
use spabuild_lib::emit::ArtifactRole;
use spabuild_lib::emit::write::BuildManifest;
use spabuild_lib::pipeline::{BuildError, BuildOptions, BuildReport, build};

use super::common::{BUILD_DATE, Project, options, single_entry};

fn names(report: &BuildReport) -> Vec<String> {
  report.artifacts.iter().map(|a| a.name.clone()).collect()
}

fn script_of(project: &Project, report: &BuildReport, entry: &str) -> String {
  let artifact = report
    .artifacts
    .iter()
    .find(|a| a.role == ArtifactRole::Script && a.entry == entry)
    .unwrap();
  project.read_output(&artifact.name)
}

#[test]
fn build_writes_artifacts_document_and_manifest() {
  let project = Project::new();
  project.write("src/index.css", ".app { color: red; }\n");
  project.write("src/index.js", "document.title = 'ready';\n");
  let resolved = project.config(&single_entry(&["./index.css", "./index.js"]));

  let report = build(&resolved, &options(false)).unwrap();

  assert_eq!(report.artifacts.len(), 2);
  assert_eq!(report.build_date, BUILD_DATE);
  let script = &report.artifacts[0];
  let style = &report.artifacts[1];
  assert!(script.name.starts_with("scripts/main.") && script.name.ends_with(".js"));
  assert!(style.name.starts_with("styles/main.") && style.name.ends_with(".css"));

  let document = project.read_output(DOCUMENT_FILENAME);
  assert_eq!(document, report.document);
  let head_close = document.find("</head>").unwrap();
  let script_tag = document
    .find(&format!("<script defer src=\"/{}\"></script>", script.name))
    .unwrap();
  let link_tag = document
    .find(&format!("<link href=\"/{}\" rel=\"stylesheet\">", style.name))
    .unwrap();
  assert!(script_tag < link_tag && link_tag < head_close);

  let manifest = BuildManifest::load(&project.output()).unwrap().unwrap();
  assert_eq!(manifest.build_date, BUILD_DATE);
  assert_eq!(manifest.entries["main"], names(&report));
  assert!(project.output().join(MANIFEST_FILENAME).is_file());
}

#[test]
fn shared_modules_appear_once() {
  let project = Project::new();
  project.write("src/shared.js", "export const shared = 'shared';\n");
  project.write("src/a.js", "import { shared } from './shared';\nexport const a = shared;\n");
  project.write("src/b.js", "import { shared } from './shared.js';\nexport const b = shared;\n");
  project.write(
    "src/index.js",
    "import { a } from './a';\nimport { b } from '../src/b.js';\nimport './shared';\nconsole.log(a, b);\n",
  );
  let resolved = project.config(&single_entry(&["./index.js"]));

  let report = build(&resolved, &options(false)).unwrap();

  assert_eq!(report.modules, 4);
  let script = script_of(&project, &report, "main");
  assert_eq!(script.matches("\"./src/shared.js\": function").count(), 1);
  assert_eq!(script.matches("export const shared").count(), 0);
}

#[test]
fn identical_inputs_build_identically() {
  let project = Project::new();
  project.write("src/index.css", "body { margin: 0; }\n");
  project.write("src/util.js", "export function twice(x) { return x * 2; }\n");
  project.write("src/index.js", "import { twice } from './util';\nconsole.log(twice(21));\n");
  let resolved = project.config(&single_entry(&["./index.css", "./index.js"]));

  let first = build(&resolved, &options(true)).unwrap();
  let first_bytes: Vec<String> = names(&first).iter().map(|n| project.read_output(n)).collect();
  let second = build(&resolved, &options(true)).unwrap();
  let second_bytes: Vec<String> = names(&second).iter().map(|n| project.read_output(n)).collect();

  assert_eq!(names(&first), names(&second));
  assert_eq!(first_bytes, second_bytes);
  assert_eq!(first.document, second.document);
  assert!(second.write.written.is_empty(), "{:?}", second.write.written);
  assert!(second.write.unchanged.contains(&DOCUMENT_FILENAME.to_string()));
}

#[test]
fn changed_module_rehashes_only_artifacts_that_include_it() {
  let project = Project::new();
  project.write("src/theme.css", ".theme { color: blue; }\n");
  project.write("src/a.js", "console.log('a');\n");
  project.write("src/b.js", "console.log('b');\n");
  let resolved = project.config(
    r#"
[[entries]]
name = "a"
modules = ["./theme.css", "./a.js"]

[[entries]]
name = "b"
modules = ["./theme.css", "./b.js"]
"#,
  );

  let before = build(&resolved, &options(false)).unwrap();
  project.write("src/a.js", "console.log('A');\n");
  let after = build(&resolved, &options(false)).unwrap();

  let (old, new) = (names(&before), names(&after));
  let changed: Vec<&String> = old.iter().zip(&new).filter(|(o, n)| o != n).map(|(o, _)| o).collect();
  assert_eq!(changed.len(), 1, "{old:?} -> {new:?}");
  assert!(changed[0].starts_with("scripts/a."));

  // Stale artifacts stay until collected.
  assert!(project.output().join(changed[0]).is_file());
}

#[test]
fn entry_requires_follow_declared_order() {
  let project = Project::new();
  project.write("src/one.js", "window.order = ['one'];\n");
  project.write("src/two.js", "window.order.push('two');\n");
  project.write("src/three.js", "window.order.push('three');\n");
  let resolved = project.config(&single_entry(&["./one.js", "./two.js", "./three.js"]));

  let report = build(&resolved, &options(false)).unwrap();
  let script = script_of(&project, &report, "main");

  let requires: Vec<usize> = ["one", "two", "three"]
    .iter()
    .map(|name| script.find(&format!("__bundle_require__(\"./src/{}.js\");", name)).unwrap())
    .collect();
  assert!(requires.windows(2).all(|w| w[0] < w[1]), "{script}");
}

#[test]
fn bare_dollar_is_provided_from_jquery() {
  let project = Project::new();
  project.package("jquery", "jquery.js", "module.exports = function jQuery(sel) { return sel; };\n");
  project.write("src/index.js", "$('#root').text('hi');\n");
  let resolved = project.config(&single_entry(&["./index.js"]));

  let report = build(&resolved, &options(false)).unwrap();
  let script = script_of(&project, &report, "main");

  assert!(script.contains("var $ = __bundle_require__(\"./node_modules/jquery/jquery.js\");"));
  assert!(script.contains("\"./node_modules/jquery/jquery.js\": function"));
  let provided = script.find("var $ = ").unwrap();
  let used = script.find("$(").unwrap();
  assert!(provided < used);
}

#[test]
fn build_date_is_identical_across_modules() {
  let project = Project::new();
  project.write("src/buildinfo.js", "export const builtAt = process.env.BUILD_DATE;\n");
  project.write(
    "src/index.js",
    "import { builtAt } from './buildinfo';\nconsole.log(builtAt, process.env.BUILD_DATE);\n",
  );
  let resolved = project.config(&single_entry(&["./index.js"]));

  let report = build(
    &resolved,
    &BuildOptions {
      minify: false,
      ..BuildOptions::default()
    },
  )
  .unwrap();
  let script = script_of(&project, &report, "main");

  assert!(!script.contains("process.env.BUILD_DATE"));
  assert_eq!(script.matches(&format!("\"{}\"", report.build_date)).count(), 2, "{script}");
}

#[test]
fn minified_build_still_links() {
  let project = Project::new();
  project.write("src/index.css", ".app {\n  color: red;\n}\n");
  project.write(
    "src/index.js",
    "if (process.env.NODE_ENV === 'production') {\n  debug();\n}\nconsole.log('ok');\n",
  );
  let resolved = project.config(&single_entry(&["./index.css", "./index.js"]));

  let report = build(&resolved, &options(true)).unwrap();
  let script = script_of(&project, &report, "main");
  let style = project.read_output(&report.artifacts[1].name);

  assert!(!script.contains("debug()"));
  assert!(script.contains("console.log("));
  assert!(script.contains("\"./src/index.js\""));
  assert!(style.contains(".app{color:red}"));
}

#[test]
fn missing_import_fails_before_writing() {
  let project = Project::new();
  project.write("src/index.js", "import './missing';\n");
  let resolved = project.config(&single_entry(&["./index.js"]));

  let err = build(&resolved, &options(false)).unwrap_err();
  assert_eq!(err.stage(), "resolve");
  assert!(err.to_string().contains("./missing"));
  assert!(!project.output().join(DOCUMENT_FILENAME).exists());
}

#[test]
fn cancelled_build_writes_nothing() {
  let project = Project::new();
  project.write("src/index.js", "console.log(1);\n");
  let resolved = project.config(&single_entry(&["./index.js"]));

  let options = options(false);
  options.cancel.cancel();
  let err = build(&resolved, &options).unwrap_err();
  assert!(matches!(err, BuildError::Cancelled));
  assert!(!project.output().join(DOCUMENT_FILENAME).exists());
}
