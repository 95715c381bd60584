//! Bundle assembly: the module registry, the loader runtime and the entry calls.

use crate::consts::BUNDLE_REQUIRE as R;
use crate::script::js_string;

use super::link::Linked;

/// One registry slot.
#[derive(Debug, Clone)]
pub struct RegistryModule<'m> {
  pub id: &'m str,
  pub linked: &'m Linked,
}

/// Loader helpers installed on `__bundle_require__`:
/// `d` defines an export getter, `r` marks an ES module namespace, `n` reads a default export
/// with CommonJS interop, `t` wraps a CommonJS module as a namespace, `a` copies star exports.
const RUNTIME: &str = r#"  var __bundle_cache__ = {};
  function __bundle_require__(id) {
    var cached = __bundle_cache__[id];
    if (cached !== undefined) {
      return cached.exports;
    }
    var module = (__bundle_cache__[id] = { exports: {} });
    var receiver = __bundle_strict__[id] ? undefined : module.exports;
    __bundle_modules__[id].call(receiver, module, module.exports, __bundle_require__);
    return module.exports;
  }
  __bundle_require__.d = function (exports, name, getter) {
    if (!Object.prototype.hasOwnProperty.call(exports, name)) {
      Object.defineProperty(exports, name, { enumerable: true, get: getter });
    }
  };
  __bundle_require__.r = function (exports) {
    if (typeof Symbol !== "undefined" && Symbol.toStringTag) {
      Object.defineProperty(exports, Symbol.toStringTag, { value: "Module" });
    }
    Object.defineProperty(exports, "__esModule", { value: true });
  };
  __bundle_require__.n = function (m) {
    return m && m.__esModule ? m["default"] : m;
  };
  __bundle_require__.t = function (m) {
    if (m && m.__esModule) {
      return m;
    }
    var ns = Object.create(null);
    __bundle_require__.r(ns);
    if (m && (typeof m === "object" || typeof m === "function")) {
      Object.keys(m).forEach(function (key) {
        __bundle_require__.d(ns, key, function () { return m[key]; });
      });
    }
    __bundle_require__.d(ns, "default", function () { return m; });
    return ns;
  };
  __bundle_require__.a = function (exports, m) {
    Object.keys(m).forEach(function (key) {
      if (key !== "default" && key !== "__esModule") {
        __bundle_require__.d(exports, key, function () { return m[key]; });
      }
    });
  };
"#;

/// An assembled script artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembled {
  pub code: String,
  /// Artifact line (0-based) where each module's body starts, in module order.
  pub body_lines: Vec<u32>,
}

/// Text sink that counts the lines it has written.
struct Output {
  text: String,
  line: u32,
}

impl Output {
  fn push(&mut self, text: &str) {
    self.line += text.matches('\n').count() as u32;
    self.text.push_str(text);
  }
}

/// Assemble a script artifact. Modules keep the given order; entry ids are required in order.
///
/// Strict (ES module) bodies run with `this` undefined, as module code does in a browser.
pub fn assemble(modules: &[RegistryModule<'_>], entries: &[&str]) -> Assembled {
  let body_len: usize = modules.iter().map(|m| m.linked.body.len() + m.id.len() + 96).sum();
  let mut out = Output {
    text: String::with_capacity(body_len + RUNTIME.len() + 128),
    line: 0,
  };
  let mut body_lines = Vec::with_capacity(modules.len());

  out.push("(function () {\n  var __bundle_modules__ = {\n");
  for (i, module) in modules.iter().enumerate() {
    out.push(&format!(
      "    {}: function (module, exports, {R}) {{\n",
      js_string(module.id)
    ));
    if module.linked.strict {
      out.push("\"use strict\";\n");
    }
    body_lines.push(out.line);
    out.push(&module.linked.body);
    if !module.linked.body.ends_with('\n') {
      out.push("\n");
    }
    out.push("    }");
    if i + 1 < modules.len() {
      out.push(",");
    }
    out.push("\n");
  }
  out.push("  };\n");

  let strict: Vec<String> = modules
    .iter()
    .filter(|m| m.linked.strict)
    .map(|m| format!("{}: true", js_string(m.id)))
    .collect();
  out.push(&format!("  var __bundle_strict__ = {{ {} }};\n", strict.join(", ")));

  out.push(RUNTIME);
  for id in entries {
    out.push(&format!("  {R}({});\n", js_string(id)));
  }
  out.push("})();\n");

  Assembled {
    code: out.text,
    body_lines,
  }
}
