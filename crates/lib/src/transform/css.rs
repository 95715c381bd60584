//! Stylesheet processing with lightningcss.

use std::path::Path;

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};

use crate::config::CssTargets;

/// lightningcss encodes versions as `major << 16 | minor << 8 | patch`.
fn version(major: Option<u32>) -> Option<u32> {
  major.map(|v| v << 16)
}

pub fn targets(config: &CssTargets) -> Targets {
  Targets::from(Browsers {
    chrome: version(config.chrome),
    edge: version(config.edge),
    firefox: version(config.firefox),
    safari: version(config.safari),
    ios_saf: version(config.ios_saf),
    ..Browsers::default()
  })
}

/// Add vendor prefixes and lower syntax the targets do not support. Output stays readable.
pub fn prefix(path: &Path, source: &str, targets: Targets) -> Result<String, String> {
  process(path, source, targets, false)
}

/// Minify a stylesheet artifact.
pub fn minify(name: &str, source: &str, targets: Targets) -> Result<String, String> {
  process(Path::new(name), source, targets, true)
}

fn process(path: &Path, source: &str, targets: Targets, minify: bool) -> Result<String, String> {
  let mut sheet = StyleSheet::parse(
    source,
    ParserOptions {
      filename: path.display().to_string(),
      ..ParserOptions::default()
    },
  )
  .map_err(|e| e.to_string())?;

  sheet
    .minify(MinifyOptions {
      targets: targets.clone(),
      ..MinifyOptions::default()
    })
    .map_err(|e| e.to_string())?;

  let printed = sheet
    .to_css(PrinterOptions {
      minify,
      targets,
      ..PrinterOptions::default()
    })
    .map_err(|e| e.to_string())?;

  Ok(printed.code)
}
