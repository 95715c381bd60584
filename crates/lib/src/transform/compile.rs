//! Script compilation.
//!
//! Lowers syntax newer than the configured target and turns JSX into classic-runtime pragma
//! calls, then prints the program again. Helpers the lowering needs are imported from
//! `@babel/runtime`, so they join the module graph like any other dependency.

use std::path::Path;

use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_semantic::SemanticBuilder;
use oxc_transformer::{JsxOptions, JsxRuntime, TransformOptions, Transformer};

use crate::script;
use crate::sourcemap::LineOrigins;

/// Printed output of a compile run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compiled {
  pub code: String,
  /// Source line of every printed line, when maps were requested.
  pub origins: Option<LineOrigins>,
}

/// Transformer options for an ES target such as `es2019`, with classic JSX.
pub fn options(target: &str, pragma: &str, pragma_frag: &str) -> Result<TransformOptions, String> {
  let mut options = TransformOptions::from_target(target)?;
  options.jsx = JsxOptions {
    jsx_plugin: true,
    runtime: JsxRuntime::Classic,
    pragma: Some(pragma.to_string()),
    pragma_frag: Some(pragma_frag.to_string()),
    ..JsxOptions::default()
  };
  Ok(options)
}

pub fn compile(path: &Path, source: &str, options: &TransformOptions, source_map: bool) -> Result<Compiled, String> {
  let allocator = Allocator::default();
  let mut program = script::parse(&allocator, source)?;

  let (symbols, scopes) = SemanticBuilder::new()
    .build(&program)
    .semantic
    .into_symbol_table_and_scope_tree();
  let transformed =
    Transformer::new(&allocator, path, options).build_with_symbols_and_scopes(symbols, scopes, &mut program);
  if !transformed.errors.is_empty() {
    return Err(
      transformed
        .errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; "),
    );
  }

  let printed = Codegen::new()
    .with_options(CodegenOptions {
      source_map_path: source_map.then(|| path.to_path_buf()),
      ..CodegenOptions::default()
    })
    .build(&program);
  let origins = printed
    .map
    .map(|map| LineOrigins::from_json(&map.to_json_string()))
    .transpose()?;

  Ok(Compiled {
    code: printed.code,
    origins,
  })
}
