use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn gc_removes_artifacts_from_older_builds() {
  let env = TestEnv::app();
  env.spabuild_cmd().arg("build").assert().success();
  let stale = env.artifacts("scripts");

  env.write_file("client/src/index.js", "console.log('changed');\n");
  env.spabuild_cmd().arg("build").assert().success();
  assert_eq!(env.artifacts("scripts").len(), 2);

  env
    .spabuild_cmd()
    .arg("gc")
    .assert()
    .success()
    .stdout(predicate::str::contains("Garbage collection complete"))
    .stdout(predicate::str::contains(&stale[0]));

  let live = env.artifacts("scripts");
  assert_eq!(live.len(), 1);
  assert_ne!(live, stale);
  assert_eq!(env.artifacts("styles").len(), 1);
}

#[test]
fn gc_dry_run_keeps_files() {
  let env = TestEnv::app();
  env.spabuild_cmd().arg("build").assert().success();
  env.write_file("client/src/index.js", "console.log('changed');\n");
  env.spabuild_cmd().arg("build").assert().success();

  env
    .spabuild_cmd()
    .args(["gc", "--dry-run"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Dry run"));
  assert_eq!(env.artifacts("scripts").len(), 2);
}

#[test]
fn gc_json_output_is_valid() {
  let env = TestEnv::app();
  env.spabuild_cmd().arg("build").assert().success();

  env
    .spabuild_cmd()
    .args(["gc", "-o", "json"])
    .assert()
    .success()
    .stdout(predicate::str::contains("\"deleted\": []"))
    .stdout(predicate::str::contains("\"kept\": 2"));
}
