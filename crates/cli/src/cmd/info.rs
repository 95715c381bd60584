use anyhow::Result;

use spabuild_lib::consts::APP_NAME;

use super::{ProjectArgs, display_relative};
use crate::output::{print_json, print_stat};

/// Print the resolved roots, entries and dev-server settings.
pub fn cmd_info(args: &ProjectArgs, json: bool) -> Result<()> {
  let (dir, resolved) = args.resolve()?;
  let roots = &resolved.roots;

  if json {
    return print_json(&serde_json::json!({
      "version": env!("CARGO_PKG_VERSION"),
      "project": dir,
      "roots": {
        "source": roots.source,
        "public": roots.public,
        "upload": roots.upload,
        "output": roots.output,
      },
      "entries": resolved.config.entries,
      "serve": resolved.config.serve,
    }));
  }

  println!("{} {}", APP_NAME, env!("CARGO_PKG_VERSION"));
  println!();
  println!("Roots:");
  print_stat("Project", &dir.display().to_string());
  print_stat("Source", &display_relative(&dir, &roots.source));
  print_stat("Public", &display_relative(&dir, &roots.public));
  print_stat("Upload", &display_relative(&dir, &roots.upload));
  print_stat("Output", &display_relative(&dir, &roots.output));
  println!();
  println!("Entries:");
  for entry in &resolved.config.entries {
    print_stat(&entry.name, &entry.modules.join(", "));
  }
  println!();
  println!("Dev server:");
  print_stat(
    "Listen",
    &format!("{}:{}", resolved.config.serve.host, resolved.config.serve.port),
  );
  for rule in &resolved.proxies {
    print_stat("Proxy", &format!("{} -> {}", rule.prefix(), rule.target()));
  }
  Ok(())
}
