//! Script parsing and fact extraction.
//!
//! Scripts are parsed with oxc. Analysis passes (dependency discovery, environment injection,
//! global providers, linking) go through [`with_program`] or [`with_semantic`], then rewrite the
//! original text by span. Compilation and minification work on the tree from [`parse`] and
//! print it again.

use std::collections::HashSet;

use oxc_allocator::Allocator;
use oxc_ast::ast::{Argument, Expression, Program};
use oxc_ast::{AstKind, Visit};
use oxc_parser::Parser;
use oxc_semantic::{Semantic, SemanticBuilder};
use oxc_span::SourceType;

use crate::graph::DependencyKind;

/// Parse `source` into `allocator`.
///
/// Sources are parsed as JSX-enabled ES modules first. When that fails the source is retried
/// as a classic script, which accepts sloppy-mode code found in older packages. If both fail,
/// the module-mode diagnostics are returned.
pub fn parse<'a>(allocator: &'a Allocator, source: &'a str) -> Result<Program<'a>, String> {
  let module_type = SourceType::mjs().with_jsx(true);
  let parsed = Parser::new(allocator, source, module_type).parse();
  if parsed.errors.is_empty() && !parsed.panicked {
    return Ok(parsed.program);
  }

  let module_errors = parsed
    .errors
    .iter()
    .map(|e| e.to_string())
    .collect::<Vec<_>>()
    .join("; ");

  let script_type = SourceType::cjs().with_jsx(true);
  let fallback = Parser::new(allocator, source, script_type).parse();
  if fallback.errors.is_empty() && !fallback.panicked {
    return Ok(fallback.program);
  }

  if module_errors.is_empty() {
    Err("parser aborted".to_string())
  } else {
    Err(module_errors)
  }
}

/// Parse `source` and hand the program to `f`.
pub fn with_program<R>(source: &str, f: impl for<'a> FnOnce(&Program<'a>) -> R) -> Result<R, String> {
  let allocator = Allocator::default();
  let program = parse(&allocator, source)?;
  Ok(f(&program))
}

/// Parse `source`, resolve its scopes and hand both to `f`.
pub fn with_semantic<R>(
  source: &str,
  f: impl for<'a> FnOnce(&Program<'a>, &Semantic<'a>) -> R,
) -> Result<R, String> {
  let allocator = Allocator::default();
  let program: &Program<'_> = allocator.alloc(parse(&allocator, source)?);
  let semantic = SemanticBuilder::new().build(program).semantic;
  Ok(f(program, &semantic))
}

/// A module request found in a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRequest {
  pub specifier: String,
  pub kind: DependencyKind,
}

/// A free-standing identifier reference and its byte range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
  pub name: String,
  pub start: usize,
  pub end: usize,
}

/// What the pipeline needs to know about a script before transforming it.
#[derive(Debug, Clone, Default)]
pub struct ScriptFacts {
  /// Requests in source order. Duplicates are kept; the graph deduplicates targets.
  pub imports: Vec<ImportRequest>,
  /// Every name bound anywhere in the module (variables, functions, params, imports, classes).
  pub bindings: HashSet<String>,
  pub references: Vec<Reference>,
  /// True when the module uses `import`/`export` syntax.
  pub module_syntax: bool,
}

impl ScriptFacts {
  pub fn is_bound(&self, name: &str) -> bool {
    self.bindings.contains(name)
  }

  /// References to `name` that are not shadowed by a declaration in this module.
  pub fn free_references<'f>(&'f self, name: &'f str) -> impl Iterator<Item = &'f Reference> + 'f {
    let bound = self.is_bound(name);
    self.references.iter().filter(move |r| !bound && r.name == name)
  }
}

/// Parse a script and collect its facts.
pub fn analyze(source: &str) -> Result<ScriptFacts, String> {
  with_program(source, |program| {
    let mut collector = FactCollector::default();
    collector.visit_program(program);
    let mut facts = collector.facts;
    if facts.is_bound("require") {
      facts.imports.retain(|i| i.kind != DependencyKind::Require);
    }
    facts
  })
}

#[derive(Default)]
struct FactCollector {
  facts: ScriptFacts,
}

impl FactCollector {
  fn request(&mut self, specifier: &str, kind: DependencyKind) {
    self.facts.imports.push(ImportRequest {
      specifier: specifier.to_string(),
      kind,
    });
  }
}

impl<'a> Visit<'a> for FactCollector {
  fn enter_node(&mut self, kind: AstKind<'a>) {
    match kind {
      AstKind::ImportDeclaration(decl) => {
        self.facts.module_syntax = true;
        self.request(decl.source.value.as_str(), DependencyKind::Static);
      }
      AstKind::ExportNamedDeclaration(decl) => {
        self.facts.module_syntax = true;
        if let Some(source) = &decl.source {
          self.request(source.value.as_str(), DependencyKind::ReExport);
        }
      }
      AstKind::ExportAllDeclaration(decl) => {
        self.facts.module_syntax = true;
        self.request(decl.source.value.as_str(), DependencyKind::ReExport);
      }
      AstKind::ExportDefaultDeclaration(_) => {
        self.facts.module_syntax = true;
      }
      AstKind::ImportExpression(expr) => {
        if let Expression::StringLiteral(lit) = &expr.source {
          self.request(lit.value.as_str(), DependencyKind::Dynamic);
        }
      }
      AstKind::CallExpression(call) => {
        if let Some(specifier) = require_specifier(&call.callee, &call.arguments) {
          self.request(specifier, DependencyKind::Require);
        }
      }
      AstKind::BindingIdentifier(id) => {
        self.facts.bindings.insert(id.name.to_string());
      }
      AstKind::IdentifierReference(id) => {
        self.facts.references.push(Reference {
          name: id.name.to_string(),
          start: id.span.start as usize,
          end: id.span.end as usize,
        });
      }
      _ => {}
    }
  }
}

/// `require("literal")` with exactly one string argument.
pub fn require_specifier<'s>(callee: &'s Expression<'_>, arguments: &'s [Argument<'_>]) -> Option<&'s str> {
  let Expression::Identifier(callee) = callee else {
    return None;
  };
  if callee.name.as_str() != "require" || arguments.len() != 1 {
    return None;
  }
  match &arguments[0] {
    Argument::StringLiteral(lit) => Some(lit.value.as_str()),
    _ => None,
  }
}

/// JSON string literal, valid as a JavaScript string literal.
pub fn js_string(value: &str) -> String {
  serde_json::Value::from(value).to_string()
}
