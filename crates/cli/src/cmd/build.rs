//! Implementation of the `spabuild build` command.

use std::time::Duration;

use anyhow::{Context, Result};

use spabuild_lib::pipeline::{BuildOptions, build};

use super::ProjectArgs;
use crate::output::{OutputFormat, format_duration, print_artifact, print_json, print_stat, print_success};

/// Run one production build and report what was written.
pub fn cmd_build(args: &ProjectArgs, no_minify: bool, output: OutputFormat) -> Result<()> {
  let (_, resolved) = args.resolve()?;

  let mut options = BuildOptions::from_config(&resolved.config);
  if no_minify {
    options.minify = false;
  }

  let report = build(&resolved, &options).context("Build failed")?;

  if output.is_json() {
    return print_json(&report);
  }

  print_success(&format!("Built {} module(s) into {}", report.modules, report.output.display()));
  for artifact in &report.artifacts {
    print_artifact(&artifact.name, artifact.bytes as u64);
  }
  print_stat("Written", &report.write.written.len().to_string());
  print_stat("Unchanged", &report.write.unchanged.len().to_string());
  print_stat("Build date", &report.build_date);
  print_stat("Duration", &format_duration(Duration::from_millis(report.duration_ms as u64)));
  Ok(())
}
