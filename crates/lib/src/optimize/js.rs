//! Script artifact minification.
//!
//! The assembled bundle is compressed (constant folding and dead-branch removal, which is what
//! `process.env.NODE_ENV` checks need after injection), local names are mangled, and the
//! program is printed in minified form. The result is parsed again before it is returned.

use std::path::PathBuf;

use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::{CompressOptions, MangleOptions, Minifier, MinifierOptions};
use oxc_parser::Parser;
use oxc_span::SourceType;

/// Minified text plus, when requested, a v3 source map of it as JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Minified {
  pub code: String,
  pub map: Option<String>,
}

/// Minify a bundle. `name` labels the input in the map.
pub fn minify(source: &str, name: &str, source_map: bool) -> Result<Minified, String> {
  let allocator = Allocator::default();
  let mut program = parse_bundle(&allocator, source)?;

  let options = MinifierOptions {
    mangle: Some(MangleOptions::default()),
    compress: Some(CompressOptions::default()),
  };
  let minified = Minifier::new(options).build(&allocator, &mut program);
  let printed = Codegen::new()
    .with_options(CodegenOptions {
      minify: true,
      source_map_path: source_map.then(|| PathBuf::from(name)),
      ..CodegenOptions::default()
    })
    .with_symbol_table(minified.symbol_table)
    .build(&program);

  let check = Allocator::default();
  parse_bundle(&check, &printed.code).map_err(|e| format!("minified output does not parse: {e}"))?;

  Ok(Minified {
    code: printed.code,
    map: printed.map.map(|map| map.to_json_string()),
  })
}

/// Bundles are classic scripts: one function expression wrapping every module.
fn parse_bundle<'a>(allocator: &'a Allocator, source: &'a str) -> Result<oxc_ast::ast::Program<'a>, String> {
  let parsed = Parser::new(allocator, source, SourceType::cjs()).parse();
  if parsed.panicked || !parsed.errors.is_empty() {
    let message = parsed
      .errors
      .iter()
      .map(|e| e.to_string())
      .collect::<Vec<_>>()
      .join("; ");
    return Err(if message.is_empty() { "parser aborted".to_string() } else { message });
  }
  Ok(parsed.program)
}
