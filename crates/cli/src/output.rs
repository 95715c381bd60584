//! CLI output formatting utilities.
//!
//! Colored status lines, human-readable sizes and durations, and failure reporting.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

use spabuild_lib::config::ConfigError;
use spabuild_lib::gc::GcError;
use spabuild_lib::pipeline::BuildError;
use spabuild_lib::serve::ServeError;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
}

pub fn format_bytes(bytes: u64) -> String {
  const KB: u64 = 1024;
  const MB: u64 = KB * 1024;

  if bytes >= MB {
    format!("{:.1} MB", bytes as f64 / MB as f64)
  } else if bytes >= KB {
    format!("{:.1} KB", bytes as f64 / KB as f64)
  } else {
    format!("{} B", bytes)
  }
}

pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let millis = duration.subsec_millis();

  if secs >= 60 {
    format!("{}m {}s", secs / 60, secs % 60)
  } else if secs > 0 {
    format!("{}.{:02}s", secs, millis / 10)
  } else {
    format!("{}ms", millis)
  }
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

/// One artifact line: `→ scripts/main.<hash>.js (1.2 KB)`.
pub fn print_artifact(name: &str, bytes: u64) {
  println!(
    "  {} {} {}",
    symbols::ARROW.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    name,
    format!("({})", format_bytes(bytes)).if_supports_color(Stream::Stdout, |s| s.dimmed())
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

/// The stage a failure belongs to, from the first library error in the chain.
pub fn failure_stage(error: &anyhow::Error) -> &str {
  for cause in error.chain() {
    if let Some(e) = cause.downcast_ref::<BuildError>() {
      return e.stage();
    }
    if cause.is::<ConfigError>() {
      return "configuration";
    }
    if cause.is::<ServeError>() {
      return "serve";
    }
    if cause.is::<GcError>() {
      return "gc";
    }
  }
  "error"
}

/// `✗ <stage>: <error>` on stderr.
pub fn print_failure(error: &anyhow::Error) {
  let line = format!("{}: {:#}", failure_stage(error), error);
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    line.if_supports_color(Stream::Stderr, |s| s.red())
  );
}
