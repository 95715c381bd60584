//! Link stage.
//!
//! Rewrites one module's imports and exports into calls against the bundle's module registry.
//! ES module syntax becomes `__bundle_require__` calls plus export getters on `exports`;
//! `require("x")` and `import("x")` get their specifier replaced by the target's module id.
//!
//! Imported bindings stay live: every reference to one reads through the imported module's
//! exports object at the time it runs, so cycles and exported `let` bindings behave as they do
//! in a browser's module loader.

use std::collections::{HashMap, HashSet};

use oxc_ast::ast::{
  BindingPattern, BindingPatternKind, Declaration, ExportAllDeclaration, ExportDefaultDeclaration,
  ExportDefaultDeclarationKind, ExportNamedDeclaration, Expression, IdentifierReference, ImportDeclaration,
  ImportDeclarationSpecifier, ModuleExportName,
};
use oxc_ast::{AstKind, Visit};
use oxc_semantic::Semantic;
use oxc_span::{GetSpan, Span};
use oxc_syntax::identifier::is_identifier_name;
use oxc_syntax::symbol::SymbolId;

use crate::consts::BUNDLE_REQUIRE as R;
use crate::script::{js_string, require_specifier, with_semantic};
use crate::util::splice::Splicer;

const DEFAULT_LOCAL: &str = "__bundle_default__";

/// A module body ready for the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Linked {
  pub body: String,
  /// ES modules run in strict mode.
  pub strict: bool,
  /// Line of the module's code that each body line came from. Empty for generated bodies.
  pub lines: Vec<u32>,
}

impl Linked {
  pub fn empty() -> Self {
    Self::generated(String::new(), false)
  }

  /// A body with no source text behind it.
  pub fn generated(body: String, strict: bool) -> Self {
    Self {
      body,
      strict,
      lines: Vec::new(),
    }
  }
}

/// A provided global after resolution: `var <local> = require(<id>)[<export>]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvidedBinding {
  pub local: String,
  pub export: Option<String>,
  pub id: String,
}

/// Link a script. `resolve` maps a request specifier to the target module id.
pub fn link_script(
  source: &str,
  resolve: impl Fn(&str) -> Result<String, String>,
  provided: &[ProvidedBinding],
) -> Result<Linked, String> {
  with_semantic(source, |program, semantic| {
    let mut collector = LinkCollector::default();
    collector.visit_program(program);

    let mut linker = Linker {
      splicer: Splicer::new(source),
      resolve: &resolve,
      semantic,
      getters: Vec::new(),
      requests: Vec::new(),
      imported: HashMap::new(),
      counter: 0,
    };

    let module_syntax = !(collector.imports.is_empty()
      && collector.named_exports.is_empty()
      && collector.default_exports.is_empty()
      && collector.star_exports.is_empty());

    for decl in &collector.imports {
      linker.import(decl)?;
    }
    for decl in &collector.named_exports {
      linker.named_export(decl)?;
    }
    for decl in &collector.default_exports {
      linker.default_export(decl);
    }
    for decl in &collector.star_exports {
      linker.star_export(decl)?;
    }
    linker.rewrite_references(&collector);
    for (span, specifier) in &collector.dynamic {
      let id = (linker.resolve)(specifier)?;
      linker.splicer.replace(
        span.start as usize,
        span.end as usize,
        format!("Promise.resolve().then(function () {{ return {R}.t({R}({})); }})", js_string(&id)),
      );
    }
    if !collector.require_bound {
      for (callee, argument, specifier) in &collector.requires {
        let id = (linker.resolve)(specifier)?;
        linker.splicer.replace(callee.start as usize, callee.end as usize, R);
        linker
          .splicer
          .replace(argument.start as usize, argument.end as usize, js_string(&id));
      }
    }

    // Export getters come first so a cyclic importer already sees them; module requests follow
    // in source order, as ES modules evaluate their imports before their body.
    let mut prelude = Vec::new();
    if module_syntax {
      prelude.push(format!("{R}.r(exports);"));
    }
    prelude.append(&mut linker.getters);
    for binding in provided {
      prelude.push(match &binding.export {
        Some(export) => format!(
          "var {} = {R}({})[{}];",
          binding.local,
          js_string(&binding.id),
          js_string(export)
        ),
        None => format!("var {} = {R}({});", binding.local, js_string(&binding.id)),
      });
    }
    linker.requests.sort_by_key(|(at, _)| *at);
    prelude.extend(linker.requests.drain(..).map(|(_, code)| code));

    if let Some(hashbang) = &program.hashbang {
      linker.splicer.remove(hashbang.span.start as usize, hashbang.span.end as usize);
    }
    let insert_at = program
      .directives
      .last()
      .map(|d| d.span.end as usize)
      .or_else(|| program.hashbang.as_ref().map(|h| h.span.end as usize))
      .unwrap_or(0);
    if !prelude.is_empty() {
      let mut prelude = prelude.join("\n");
      prelude.push('\n');
      if insert_at > 0 {
        prelude.insert(0, '\n');
      }
      linker.splicer.insert(insert_at, prelude);
    }

    let (body, lines) = linker.splicer.apply_with_lines();
    Ok(Linked {
      body,
      strict: module_syntax,
      lines,
    })
  })?
}

/// Markup imported from a script exports its text as the default export.
pub fn markup_module(markup: &str) -> Linked {
  Linked::generated(
    format!("{R}.r(exports);\nexports[\"default\"] = {};\n", js_string(markup)),
    true,
  )
}

/// JSON modules export their parsed value. The text is validated and emitted as written.
pub fn json_module(content: &str) -> Result<Linked, String> {
  serde_json::from_str::<serde_json::Value>(content).map_err(|e| e.to_string())?;
  Ok(Linked::generated(format!("module.exports = {};\n", content.trim()), false))
}

#[derive(Default)]
struct LinkCollector<'a> {
  imports: Vec<&'a ImportDeclaration<'a>>,
  named_exports: Vec<&'a ExportNamedDeclaration<'a>>,
  default_exports: Vec<&'a ExportDefaultDeclaration<'a>>,
  star_exports: Vec<&'a ExportAllDeclaration<'a>>,
  dynamic: Vec<(Span, String)>,
  requires: Vec<(Span, Span, String)>,
  require_bound: bool,
  references: Vec<&'a IdentifierReference<'a>>,
  /// Starts of identifiers used as a call or tag target.
  callees: HashSet<u32>,
  /// Starts of identifiers used as a `new` target.
  constructed: HashSet<u32>,
  /// Starts of identifiers standing for a shorthand property, `{ a }`.
  shorthand: HashSet<u32>,
}

impl<'a> Visit<'a> for LinkCollector<'a> {
  fn enter_node(&mut self, kind: AstKind<'a>) {
    match kind {
      AstKind::ImportDeclaration(decl) => self.imports.push(decl),
      AstKind::ExportNamedDeclaration(decl) => self.named_exports.push(decl),
      AstKind::ExportDefaultDeclaration(decl) => self.default_exports.push(decl),
      AstKind::ExportAllDeclaration(decl) => self.star_exports.push(decl),
      AstKind::ImportExpression(expr) => {
        if let Expression::StringLiteral(lit) = &expr.source {
          self.dynamic.push((expr.span, lit.value.to_string()));
        }
      }
      AstKind::CallExpression(call) => {
        if let Some(specifier) = require_specifier(&call.callee, &call.arguments) {
          self
            .requires
            .push((call.callee.span(), call.arguments[0].span(), specifier.to_string()));
        }
        if let Expression::Identifier(id) = &call.callee {
          self.callees.insert(id.span.start);
        }
      }
      AstKind::TaggedTemplateExpression(tagged) => {
        if let Expression::Identifier(id) = &tagged.tag {
          self.callees.insert(id.span.start);
        }
      }
      AstKind::NewExpression(new) => {
        if let Expression::Identifier(id) = &new.callee {
          self.constructed.insert(id.span.start);
        }
      }
      AstKind::ObjectProperty(property) if property.shorthand => {
        self.shorthand.insert(property.value.span().start);
      }
      AstKind::BindingIdentifier(id) if id.name.as_str() == "require" => self.require_bound = true,
      AstKind::IdentifierReference(id) => self.references.push(id),
      _ => {}
    }
  }
}

/// What an import binding reads from its module's exports.
enum Imported {
  Default(String),
  Namespace(String),
  Named(String, String),
}

impl Imported {
  fn expression(&self) -> String {
    match self {
      Self::Default(module) => format!("{R}.n({module})"),
      Self::Namespace(module) => module.clone(),
      Self::Named(module, name) => member(module, name),
    }
  }
}

fn member(object: &str, name: &str) -> String {
  if is_identifier_name(name) {
    format!("{object}.{name}")
  } else {
    format!("{object}[{}]", js_string(name))
  }
}

struct Linker<'s, 'r, 'a> {
  splicer: Splicer<'s>,
  resolve: &'r dyn Fn(&str) -> Result<String, String>,
  semantic: &'r Semantic<'a>,
  getters: Vec<String>,
  /// Module requests keyed by source position.
  requests: Vec<(u32, String)>,
  imported: HashMap<SymbolId, Imported>,
  counter: usize,
}

impl Linker<'_, '_, '_> {
  fn temp(&mut self) -> String {
    let name = format!("__bundle_import_{}__", self.counter);
    self.counter += 1;
    name
  }

  fn getter(&mut self, exported: &str, expression: &str) {
    self.getters.push(format!(
      "{R}.d(exports, {}, function () {{ return {}; }});",
      js_string(exported),
      expression
    ));
  }

  /// The import binding `id` refers to, if any.
  fn import_of(&self, id: &IdentifierReference<'_>) -> Option<&Imported> {
    let reference = id.reference_id.get()?;
    let symbol = self.semantic.symbols().get_reference(reference).symbol_id()?;
    self.imported.get(&symbol)
  }

  fn import(&mut self, decl: &ImportDeclaration<'_>) -> Result<(), String> {
    let id = js_string(&(self.resolve)(decl.source.value.as_str())?);
    let at = decl.span.start;
    self.splicer.remove(decl.span.start as usize, decl.span.end as usize);

    let specifiers = decl.specifiers.as_ref().filter(|s| !s.is_empty());
    let Some(specifiers) = specifiers else {
      self.requests.push((at, format!("{R}({id});")));
      return Ok(());
    };

    let module = self.temp();
    self.requests.push((at, format!("var {module} = {R}({id});")));
    for specifier in specifiers.iter() {
      let (local, imported) = match specifier {
        ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => (&s.local, Imported::Default(module.clone())),
        ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => (&s.local, Imported::Namespace(module.clone())),
        ImportDeclarationSpecifier::ImportSpecifier(s) => {
          let name = s.imported.name();
          let imported = if name.as_str() == "default" {
            Imported::Default(module.clone())
          } else {
            Imported::Named(module.clone(), name.to_string())
          };
          (&s.local, imported)
        }
      };
      if let Some(symbol) = local.symbol_id.get() {
        self.imported.insert(symbol, imported);
      }
    }
    Ok(())
  }

  fn named_export(&mut self, decl: &ExportNamedDeclaration<'_>) -> Result<(), String> {
    let (start, end) = (decl.span.start as usize, decl.span.end as usize);

    if let Some(source) = &decl.source {
      let id = js_string(&(self.resolve)(source.value.as_str())?);
      let module = self.temp();
      self.requests.push((decl.span.start, format!("var {module} = {R}({id});")));
      for specifier in decl.specifiers.iter() {
        let local = specifier.local.name();
        let value = if local.as_str() == "default" {
          format!("{R}.n({module})")
        } else {
          member(&module, local.as_str())
        };
        self.getter(specifier.exported.name().as_str(), &value);
      }
      self.splicer.remove(start, end);
      return Ok(());
    }

    if let Some(declaration) = &decl.declaration {
      let mut names = Vec::new();
      match declaration {
        Declaration::VariableDeclaration(var) => {
          for declarator in var.declarations.iter() {
            pattern_names(&declarator.id, &mut names);
          }
        }
        Declaration::FunctionDeclaration(function) => {
          if let Some(id) = &function.id {
            names.push(id.name.to_string());
          }
        }
        Declaration::ClassDeclaration(class) => {
          if let Some(id) = &class.id {
            names.push(id.name.to_string());
          }
        }
        _ => {}
      }
      for name in &names {
        self.getter(name, name);
      }
      self.splicer.remove(start, declaration.span().start as usize);
      return Ok(());
    }

    for specifier in decl.specifiers.iter() {
      let value = match &specifier.local {
        ModuleExportName::IdentifierReference(id) => match self.import_of(id) {
          Some(imported) => imported.expression(),
          None => id.name.to_string(),
        },
        other => other.name().to_string(),
      };
      self.getter(specifier.exported.name().as_str(), &value);
    }
    self.splicer.remove(start, end);
    Ok(())
  }

  fn default_export(&mut self, decl: &ExportDefaultDeclaration<'_>) {
    let start = decl.span.start as usize;
    let named = match &decl.declaration {
      ExportDefaultDeclarationKind::FunctionDeclaration(f) => f.id.as_ref().map(|id| id.name.to_string()),
      ExportDefaultDeclarationKind::ClassDeclaration(c) => c.id.as_ref().map(|id| id.name.to_string()),
      _ => None,
    };
    let body = decl.declaration.span();

    match named {
      Some(name) => {
        self.getter("default", &name);
        self.splicer.remove(start, body.start as usize);
      }
      None => {
        self.getter("default", DEFAULT_LOCAL);
        self
          .splicer
          .replace(start, body.start as usize, format!("var {DEFAULT_LOCAL} = "));
        self.splicer.replace(body.end as usize, decl.span.end as usize, ";");
      }
    }
  }

  fn star_export(&mut self, decl: &ExportAllDeclaration<'_>) -> Result<(), String> {
    let id = js_string(&(self.resolve)(decl.source.value.as_str())?);
    let code = match &decl.exported {
      None => format!("{R}.a(exports, {R}({id}));"),
      Some(name) => {
        let module = self.temp();
        self.getter(name.name().as_str(), &module);
        format!("var {module} = {R}.t({R}({id}));")
      }
    };
    self.requests.push((decl.span.start, code));
    self
      .splicer
      .remove(decl.span.start as usize, decl.span.end as usize);
    Ok(())
  }

  /// Replace every reference to an import binding with a read of the imported module.
  fn rewrite_references(&mut self, collector: &LinkCollector<'_>) {
    let mut edits = Vec::new();
    for id in &collector.references {
      let Some(imported) = self.import_of(id) else {
        continue;
      };
      let start = id.span.start;
      let expression = imported.expression();
      let text = if collector.shorthand.contains(&start) {
        format!("{}: {expression}", id.name)
      } else if collector.constructed.contains(&start) {
        format!("({expression})")
      } else if collector.callees.contains(&start) && matches!(imported, Imported::Named(..)) {
        format!("(0, {expression})")
      } else {
        expression
      };
      edits.push((id.span, text));
    }
    for (span, text) in edits {
      self.splicer.replace(span.start as usize, span.end as usize, text);
    }
  }
}

fn pattern_names(pattern: &BindingPattern<'_>, names: &mut Vec<String>) {
  match &pattern.kind {
    BindingPatternKind::BindingIdentifier(id) => names.push(id.name.to_string()),
    BindingPatternKind::ObjectPattern(object) => {
      for property in object.properties.iter() {
        pattern_names(&property.value, names);
      }
      if let Some(rest) = &object.rest {
        pattern_names(&rest.argument, names);
      }
    }
    BindingPatternKind::ArrayPattern(array) => {
      for element in array.elements.iter().flatten() {
        pattern_names(element, names);
      }
      if let Some(rest) = &array.rest {
        pattern_names(&rest.argument, names);
      }
    }
    BindingPatternKind::AssignmentPattern(assignment) => pattern_names(&assignment.left, names),
  }
}
