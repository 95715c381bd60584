use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn build_writes_output() {
  let env = TestEnv::app();

  env
    .spabuild_cmd()
    .arg("build")
    .assert()
    .success()
    .stdout(predicate::str::contains("Built 2 module(s)"))
    .stdout(predicate::str::contains("scripts/main."))
    .stdout(predicate::str::contains("styles/main."));

  assert_eq!(env.artifacts("scripts").len(), 1);
  assert_eq!(env.artifacts("styles").len(), 1);
  let document = std::fs::read_to_string(env.output_path().join("index.html")).unwrap();
  assert!(document.contains(&format!("<script defer src=\"/{}\"></script>", env.artifacts("scripts")[0])));
}

#[test]
fn build_injects_the_pinned_date() {
  let env = TestEnv::app();

  env.spabuild_cmd().args(["build", "--no-minify"]).assert().success();

  let script = std::fs::read_to_string(env.output_path().join(&env.artifacts("scripts")[0])).unwrap();
  assert!(script.contains("console.log(\"2024-05-01T12:00:00.000Z\");"));
}

#[test]
fn rebuild_is_reproducible() {
  let env = TestEnv::app();

  env.spabuild_cmd().arg("build").assert().success();
  let first = (env.artifacts("scripts"), env.artifacts("styles"));
  env
    .spabuild_cmd()
    .arg("build")
    .assert()
    .success()
    .stdout(predicate::str::contains("Written: 0"));
  assert_eq!((env.artifacts("scripts"), env.artifacts("styles")), first);
}

#[test]
fn build_json_report_is_valid() {
  let env = TestEnv::app();

  let output = env.spabuild_cmd().args(["build", "-o", "json"]).output().unwrap();
  assert!(output.status.success());

  let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(report["modules"], 2);
  assert_eq!(report["build_date"], "2024-05-01T12:00:00.000Z");
  assert_eq!(report["artifacts"].as_array().unwrap().len(), 2);
  assert_eq!(report["artifacts"][0]["role"], "script");
}

#[test]
fn unresolvable_import_fails_with_stage() {
  let env = TestEnv::app();
  env.write_file("client/src/index.js", "import './nope';\n");

  env
    .spabuild_cmd()
    .arg("build")
    .assert()
    .failure()
    .stderr(predicate::str::contains("✗ resolve:"))
    .stderr(predicate::str::contains("./nope"));
  assert!(!env.output_path().join("index.html").exists());
}

#[test]
fn syntax_error_names_file_and_stage() {
  let env = TestEnv::app();
  env.write_file("client/src/index.js", "const = 1;\n");

  env
    .spabuild_cmd()
    .arg("build")
    .assert()
    .failure()
    .stderr(predicate::str::contains("✗ parse:"))
    .stderr(predicate::str::contains("index.js"));
}

#[test]
fn missing_extra_env_var_is_a_configuration_error() {
  let env = TestEnv::app();
  env.write_file(
    "client/spabuild.toml",
    "[[entries]]\nname = \"main\"\nmodules = [\"./index.js\"]\n\n[env.API_KEY]\n",
  );

  env
    .spabuild_cmd()
    .env_remove("API_KEY")
    .arg("build")
    .assert()
    .failure()
    .stderr(predicate::str::contains("✗ configuration:"))
    .stderr(predicate::str::contains("API_KEY"));
}
