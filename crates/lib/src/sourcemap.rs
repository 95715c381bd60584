//! Inline source maps for script artifacts.
//!
//! Maps are line-granular. Compilation reports which source line each generated line came from
//! ([`LineOrigins`]), linking reports the same for the registry body, and assembly places each
//! body at a known artifact line. [`ArtifactMap`] combines the three into one map per artifact,
//! carrying every module's source text. Minification produces a column-accurate map of its own,
//! which [`compose`] folds back onto the artifact map.

use parcel_sourcemap::{OriginalLocation, SourceMap};

use crate::consts::APP_NAME;

/// Prefix of the trailing comment that points a browser at the map.
pub const MAPPING_URL_PREFIX: &str = "//# sourceMappingURL=";

/// Source line (0-based) for each generated line, where one is known.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineOrigins(Vec<Option<u32>>);

impl LineOrigins {
  /// Reads a v3 source map. A generated line takes the origin of its leftmost mapping.
  pub fn from_json(json: &str) -> Result<Self, String> {
    let map = SourceMap::from_json("/", json).map_err(|e| e.to_string())?;
    let mut leftmost: Vec<Option<(u32, u32)>> = Vec::new();
    for mapping in map.get_mappings() {
      let Some(original) = mapping.original else {
        continue;
      };
      let line = mapping.generated_line as usize;
      if leftmost.len() <= line {
        leftmost.resize(line + 1, None);
      }
      if leftmost[line].is_none_or(|(column, _)| mapping.generated_column < column) {
        leftmost[line] = Some((mapping.generated_column, original.original_line));
      }
    }
    Ok(Self(leftmost.into_iter().map(|l| l.map(|(_, line)| line)).collect()))
  }

  pub fn get(&self, line: u32) -> Option<u32> {
    self.0.get(line as usize).copied().flatten()
  }
}

/// Name under which a module's source appears in browser devtools.
pub fn source_name(id: &str) -> String {
  format!("{APP_NAME}:///{id}")
}

/// Map of one script artifact, built module by module during assembly.
pub struct ArtifactMap {
  map: SourceMap,
}

impl Default for ArtifactMap {
  fn default() -> Self {
    Self::new()
  }
}

impl ArtifactMap {
  pub fn new() -> Self {
    Self {
      map: SourceMap::new("/"),
    }
  }

  /// Record a module body placed at `first_line` of the artifact.
  ///
  /// `lines[i]` is the line of the module's code that body line `i` came from; `origins` maps
  /// that code back to the file on disk when a transform rewrote it.
  pub fn add_module(
    &mut self,
    source: &str,
    content: &str,
    first_line: u32,
    lines: &[u32],
    origins: Option<&LineOrigins>,
  ) -> Result<(), String> {
    if lines.is_empty() {
      return Ok(());
    }
    let index = self.map.add_source(source);
    self
      .map
      .set_source_content(index as usize, content)
      .map_err(|e| e.to_string())?;

    for (offset, &line) in lines.iter().enumerate() {
      let original = match origins {
        Some(origins) => origins.get(line),
        None => Some(line),
      };
      if let Some(original) = original {
        self.map.add_mapping(
          first_line + offset as u32,
          0,
          Some(OriginalLocation::new(original, 0, index, None)),
        );
      }
    }
    Ok(())
  }

  /// `None` when no module contributed a mapping.
  pub fn into_data_url(mut self) -> Result<Option<String>, String> {
    if self.map.get_sources().is_empty() {
      return Ok(None);
    }
    self.map.to_data_url(None).map(Some).map_err(|e| e.to_string())
  }
}

/// Fold a map of rewritten artifact text (`outer`, JSON) onto the artifact's own map, given as a
/// data URL. Returns the composed map as a data URL.
pub fn compose(outer: &str, inner_url: &str) -> Result<String, String> {
  let outer = SourceMap::from_json("/", outer).map_err(|e| e.to_string())?;
  let mut inner = SourceMap::from_data_url("/", inner_url).map_err(|e| e.to_string())?;

  let mut composed = SourceMap::new("/");
  let sources = inner.get_sources().clone();
  let contents = inner.get_sources_content().clone();
  for (i, source) in sources.iter().enumerate() {
    let index = composed.add_source(source);
    if let Some(content) = contents.get(i) {
      composed
        .set_source_content(index as usize, content)
        .map_err(|e| e.to_string())?;
    }
  }

  for mapping in outer.get_mappings() {
    let Some(position) = mapping.original else {
      continue;
    };
    let found = inner
      .find_closest_mapping(position.original_line, position.original_column)
      .and_then(|m| m.original);
    if let Some(original) = found {
      composed.add_mapping(
        mapping.generated_line,
        mapping.generated_column,
        Some(OriginalLocation::new(original.original_line, 0, original.source, None)),
      );
    }
  }

  composed.to_data_url(None).map_err(|e| e.to_string())
}

/// Trailing comment for a map data URL.
pub fn comment(url: &str) -> String {
  format!("{MAPPING_URL_PREFIX}{url}\n")
}

#[cfg(test)]
mod tests {
  use super::*;

  fn decode(url: &str) -> SourceMap {
    SourceMap::from_data_url("/", url).unwrap()
  }

  fn line_of(map: &mut SourceMap, line: u32) -> Option<(u32, String)> {
    let original = map.find_closest_mapping(line, 0)?.original?;
    let source = map.get_source(original.source).unwrap().to_string();
    Some((original.original_line, source))
  }

  #[test]
  fn origins_take_the_leftmost_mapping() {
    // Line 0 maps to source line 2, line 1 has no mapping, line 2 maps to source line 0.
    let json = r#"{"version":3,"sources":["a.js"],"names":[],"mappings":"AAEA,EACA;;AAHA"}"#;
    let origins = LineOrigins::from_json(json).unwrap();
    assert_eq!(origins.get(0), Some(2));
    assert_eq!(origins.get(1), None);
    assert_eq!(origins.get(2), Some(0));
    assert_eq!(origins.get(9), None);
  }

  #[test]
  fn modules_are_placed_at_their_artifact_lines() {
    let mut map = ArtifactMap::new();
    map
      .add_module(&source_name("./src/a.js"), "one\ntwo\n", 3, &[0, 1], None)
      .unwrap();
    let origins = LineOrigins(vec![Some(4), None]);
    map
      .add_module(&source_name("./src/b.jsx"), "b", 10, &[0, 1], Some(&origins))
      .unwrap();

    let mut decoded = decode(&map.into_data_url().unwrap().unwrap());
    assert_eq!(line_of(&mut decoded, 3), Some((0, "spabuild:///./src/a.js".to_string())));
    assert_eq!(line_of(&mut decoded, 4), Some((1, "spabuild:///./src/a.js".to_string())));
    assert_eq!(line_of(&mut decoded, 10), Some((4, "spabuild:///./src/b.jsx".to_string())));
    assert_eq!(line_of(&mut decoded, 11), None);
    assert_eq!(decoded.get_source_content(0).unwrap(), "one\ntwo\n");
  }

  #[test]
  fn empty_maps_are_omitted() {
    let mut map = ArtifactMap::new();
    map.add_module("generated", "", 0, &[], None).unwrap();
    assert_eq!(map.into_data_url().unwrap(), None);
  }

  #[test]
  fn composition_follows_both_maps() {
    let mut inner = ArtifactMap::new();
    inner.add_module("a.js", "x", 0, &[0, 1, 2], None).unwrap();
    let inner = inner.into_data_url().unwrap().unwrap();

    // Everything was joined onto line 0; column 5 came from artifact line 2.
    let outer = r#"{"version":3,"sources":["bundle.js"],"names":[],"mappings":"AAAA,KAEA"}"#;
    let mut composed = decode(&compose(outer, &inner).unwrap());
    let mapping = composed.find_closest_mapping(0, 5).unwrap().original.unwrap();
    assert_eq!(mapping.original_line, 2);
    assert_eq!(composed.get_sources(), &vec!["a.js".to_string()]);
  }

  #[test]
  fn comments_end_the_file() {
    assert_eq!(comment("data:x"), "//# sourceMappingURL=data:x\n");
  }
}
