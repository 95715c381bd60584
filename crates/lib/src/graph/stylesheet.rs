//! Stylesheet dependency scanning.
//!
//! The stylesheet is parsed with lightningcss. `@import` rules come from the top-level rule list
//! and `url()` references from a visitor, so text inside strings and comments is never mistaken
//! for a dependency. Rule locations are mapped back to byte offsets in the original text.

use std::convert::Infallible;

use lightningcss::rules::{CssRule, Location};
use lightningcss::rules::import::ImportRule;
use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::traits::ToCss;
use lightningcss::values::url::Url;
use lightningcss::visit_types;
use lightningcss::visitor::{Visit, VisitTypes, Visitor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleImport {
  pub specifier: String,
  /// Byte range of the whole rule, including the trailing `;`.
  pub start: usize,
  pub end: usize,
  /// Layer, `supports()` and media conditions after the URL. Conditional imports are not inlined.
  pub condition: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleFacts {
  pub imports: Vec<StyleImport>,
  pub urls: Vec<String>,
}

/// Requests the bundler never follows: remote URLs, data URIs, fragments, root-absolute paths
/// (served from the static roots) and template placeholders.
pub fn is_external(specifier: &str) -> bool {
  let lower = specifier.to_ascii_lowercase();
  specifier.is_empty()
    || lower.starts_with("http:")
    || lower.starts_with("https:")
    || lower.starts_with("data:")
    || specifier.starts_with("//")
    || specifier.starts_with('/')
    || specifier.starts_with('#')
    || specifier.contains("${")
}

/// Invalid rules are skipped the way a browser skips them.
pub fn analyze(filename: &str, source: &str) -> Result<StyleFacts, String> {
  let mut sheet = StyleSheet::parse(
    source,
    ParserOptions {
      filename: filename.to_string(),
      error_recovery: true,
      ..ParserOptions::default()
    },
  )
  .map_err(|e| e.to_string())?;

  let mut facts = StyleFacts::default();
  for rule in &sheet.rules.0 {
    if let CssRule::Import(import) = rule {
      let start = offset(source, import.loc);
      facts.imports.push(StyleImport {
        specifier: import.url.to_string(),
        start,
        end: rule_end(source, start),
        condition: condition(import)?,
      });
    }
  }

  let mut urls = UrlCollector::default();
  let Ok(()) = sheet.visit(&mut urls);
  facts.urls = urls.0;
  Ok(facts)
}

#[derive(Default)]
struct UrlCollector(Vec<String>);

impl<'i> Visitor<'i> for UrlCollector {
  type Error = Infallible;

  fn visit_types(&self) -> VisitTypes {
    visit_types!(URLS)
  }

  fn visit_url(&mut self, url: &mut Url<'i>) -> Result<(), Self::Error> {
    self.0.push(url.url.to_string());
    Ok(())
  }
}

fn condition(import: &ImportRule<'_>) -> Result<Option<String>, String> {
  let mut parts = Vec::new();
  if let Some(layer) = &import.layer {
    parts.push(match layer {
      Some(name) => format!("layer({})", css(name)?),
      None => "layer".to_string(),
    });
  }
  if let Some(supports) = &import.supports {
    parts.push(format!("supports({})", css(supports)?));
  }
  if !import.media.media_queries.is_empty() {
    parts.push(css(&import.media)?);
  }
  Ok((!parts.is_empty()).then(|| parts.join(" ")))
}

fn css(value: &impl ToCss) -> Result<String, String> {
  value.to_css_string(PrinterOptions::default()).map_err(|e| e.to_string())
}

/// Byte offset of a parser location: 0-based line, 1-based column in UTF-16 units.
fn offset(source: &str, loc: Location) -> usize {
  let mut chars = source.char_indices().peekable();
  let mut line = 0;
  while line < loc.line {
    match chars.next() {
      Some((_, '\n' | '\x0c')) => line += 1,
      Some((_, '\r')) => {
        chars.next_if(|&(_, c)| c == '\n');
        line += 1;
      }
      Some(_) => {}
      None => return source.len(),
    }
  }
  let mut column = 1;
  for (index, c) in chars {
    if column >= loc.column {
      return index;
    }
    column += c.len_utf16() as u32;
  }
  source.len()
}

/// End of the at-rule starting at `start`: just past its top-level `;`.
fn rule_end(source: &str, start: usize) -> usize {
  let bytes = source.as_bytes();
  let mut quote = None;
  let mut depth = 0usize;
  let mut i = start;
  while i < bytes.len() {
    let b = bytes[i];
    match quote {
      Some(q) => {
        if b == b'\\' {
          i += 1;
        } else if b == q {
          quote = None;
        }
      }
      None => match b {
        b'"' | b'\'' => quote = Some(b),
        b'(' => depth += 1,
        b')' => depth = depth.saturating_sub(1),
        b'/' if bytes.get(i + 1) == Some(&b'*') => {
          i = source[i + 2..].find("*/").map_or(bytes.len(), |e| i + 2 + e + 2);
          continue;
        }
        b';' if depth == 0 => return i + 1,
        _ => {}
      },
    }
    i += 1;
  }
  bytes.len()
}
