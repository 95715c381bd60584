use std::time::Instant;

use anyhow::{Context, Result};

use spabuild_lib::gc::collect_garbage;

use super::{ProjectArgs, display_relative};
use crate::output::{OutputFormat, format_bytes, format_duration, print_info, print_json, print_stat, print_success};

pub fn cmd_gc(args: &ProjectArgs, dry_run: bool, output: OutputFormat) -> Result<()> {
  let start = Instant::now();
  let (_, resolved) = args.resolve()?;
  let out_dir = &resolved.roots.output;

  let result = collect_garbage(out_dir, dry_run)
    .with_context(|| format!("Failed to collect garbage in {}", out_dir.display()))?;

  if output.is_json() {
    print_json(&result)?;
  } else {
    println!();
    if dry_run {
      print_info("Dry run - no changes made");
    } else {
      print_success("Garbage collection complete!");
    }
    for name in &result.deleted {
      print_stat(if dry_run { "Would remove" } else { "Removed" }, name);
    }
    print_stat("Output", &display_relative(&resolved.roots.project, out_dir));
    print_stat("Artifacts kept", &result.stats.kept.to_string());
    print_stat("Artifacts removed", &result.stats.deleted.to_string());
    print_stat("Space freed", &format_bytes(result.stats.bytes_freed));
    print_stat("Duration", &format_duration(start.elapsed()));
  }

  Ok(())
}
