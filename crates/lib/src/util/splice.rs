//! Span-based source rewriting.
//!
//! Passes that rewrite module code in place (environment injection, global providers, linking)
//! do not re-print an AST. They record byte-range edits against the original text and apply them
//! in one sweep, so untouched code survives byte for byte.

/// A single replacement of `source[start..end]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
  pub start: usize,
  pub end: usize,
  pub text: String,
}

/// Collects edits against one source string.
#[derive(Debug)]
pub struct Splicer<'s> {
  source: &'s str,
  edits: Vec<Edit>,
}

impl<'s> Splicer<'s> {
  pub fn new(source: &'s str) -> Self {
    Self {
      source,
      edits: Vec::new(),
    }
  }

  pub fn source(&self) -> &'s str {
    self.source
  }

  pub fn replace(&mut self, start: usize, end: usize, text: impl Into<String>) {
    debug_assert!(start <= end && end <= self.source.len());
    self.edits.push(Edit {
      start,
      end,
      text: text.into(),
    });
  }

  pub fn insert(&mut self, at: usize, text: impl Into<String>) {
    self.replace(at, at, text);
  }

  pub fn remove(&mut self, start: usize, end: usize) {
    self.replace(start, end, "");
  }

  pub fn is_empty(&self) -> bool {
    self.edits.is_empty()
  }

  /// Apply every edit and return the rewritten source.
  ///
  /// Edits are applied in source order. An edit starting inside a range already replaced is
  /// dropped; insertions at the same offset keep their recording order.
  pub fn apply(self) -> String {
    if self.edits.is_empty() {
      return self.source.to_string();
    }
    self.apply_with_lines().0
  }

  /// Like [`apply`](Self::apply), also returning the source line (0-based) of every output line.
  ///
  /// An output line belongs to the source line of its first character. Inserted text belongs to
  /// the line its edit starts on.
  pub fn apply_with_lines(mut self) -> (String, Vec<u32>) {
    self.edits.sort_by_key(|e| (e.start, e.end));

    let mut out = LineTracker {
      text: String::with_capacity(self.source.len() + 64),
      lines: Vec::new(),
      fresh: true,
    };
    let mut line = 0u32;
    let mut cursor = 0;
    for edit in &self.edits {
      if edit.start < cursor {
        continue;
      }
      out.copy(&self.source[cursor..edit.start], &mut line);
      for ch in edit.text.chars() {
        out.push(ch, line);
      }
      line += self.source[edit.start..edit.end].matches('\n').count() as u32;
      cursor = edit.end;
    }
    out.copy(&self.source[cursor..], &mut line);
    if out.fresh {
      out.lines.push(line);
    }
    (out.text, out.lines)
  }
}

struct LineTracker {
  text: String,
  lines: Vec<u32>,
  /// The next character starts a new output line.
  fresh: bool,
}

impl LineTracker {
  fn push(&mut self, ch: char, origin: u32) {
    if self.fresh {
      self.lines.push(origin);
      self.fresh = false;
    }
    self.text.push(ch);
    if ch == '\n' {
      self.fresh = true;
    }
  }

  fn copy(&mut self, source: &str, line: &mut u32) {
    for ch in source.chars() {
      self.push(ch, *line);
      if ch == '\n' {
        *line += 1;
      }
    }
  }
}
