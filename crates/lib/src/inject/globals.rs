//! Implicit global providers.
//!
//! A module that references a configured global without declaring it gets an implicit import of
//! the providing module. Plain identifiers (`$`, `Buffer`) keep their name as the local binding;
//! member keys such as `window.jQuery` are rewritten to a synthetic local.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::{ConfigError, ProvideTarget};
use crate::script::ScriptFacts;
use crate::util::splice::Splicer;

static IDENTIFIER: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("identifier pattern is valid"));

static MEMBER_TAIL: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^\s*\.\s*([A-Za-z_$][A-Za-z0-9_$]*)").expect("member pattern is valid"));

/// The source expression a rule matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvideKey {
  Identifier(String),
  Member { object: String, property: String },
}

impl ProvideKey {
  fn parse(key: &str) -> Result<Self, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidProvide {
      key: key.to_string(),
      reason: reason.to_string(),
    };

    let parts: Vec<&str> = key.split('.').collect();
    if parts.iter().any(|p| !IDENTIFIER.is_match(p)) {
      return Err(invalid("key must be an identifier or identifier.identifier"));
    }
    match parts.as_slice() {
      [name] => Ok(Self::Identifier(name.to_string())),
      [object, property] => Ok(Self::Member {
        object: object.to_string(),
        property: property.to_string(),
      }),
      _ => Err(invalid("only one level of member access is supported")),
    }
  }

  /// Name of the binding the implicit import introduces.
  pub fn local(&self) -> String {
    match self {
      Self::Identifier(name) => name.clone(),
      Self::Member { object, property } => format!("__provided_{}_{}__", object, property),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvideRule {
  pub key: ProvideKey,
  pub request: String,
  pub export: Option<String>,
}

/// An implicit import produced for one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticImport {
  pub local: String,
  pub request: String,
  pub export: Option<String>,
}

/// A member expression that becomes a reference to a synthetic local.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSite {
  pub local: String,
  pub start: usize,
  pub end: usize,
}

/// Result of scanning one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provided {
  pub imports: Vec<SyntheticImport>,
  pub sites: Vec<MemberSite>,
}

impl Provided {
  pub fn is_empty(&self) -> bool {
    self.imports.is_empty()
  }
}

#[derive(Debug, Clone, Default)]
pub struct ProvideTable {
  rules: Vec<ProvideRule>,
}

impl ProvideTable {
  pub fn from_config(config: &BTreeMap<String, ProvideTarget>) -> Result<Self, ConfigError> {
    let mut rules = Vec::with_capacity(config.len());
    for (key, target) in config {
      let (request, export) = match target {
        ProvideTarget::Module(request) => (request.clone(), None),
        ProvideTarget::Export(request, export) => (request.clone(), Some(export.clone())),
      };
      if request.is_empty() {
        return Err(ConfigError::InvalidProvide {
          key: key.clone(),
          reason: "module request is empty".to_string(),
        });
      }
      if export.as_deref() == Some("") {
        return Err(ConfigError::InvalidProvide {
          key: key.clone(),
          reason: "export name is empty".to_string(),
        });
      }
      rules.push(ProvideRule {
        key: ProvideKey::parse(key)?,
        request,
        export,
      });
    }
    Ok(Self { rules })
  }

  pub fn rules(&self) -> &[ProvideRule] {
    &self.rules
  }

  /// Find the implicit imports a module needs.
  ///
  /// Assignment targets such as `window.jQuery = ...` are not provided, so a library that
  /// installs the global itself keeps doing so.
  pub fn scan(&self, facts: &ScriptFacts, source: &str) -> Provided {
    let mut provided = Provided::default();

    for rule in &self.rules {
      match &rule.key {
        ProvideKey::Identifier(name) => {
          if facts.free_references(name).next().is_some() {
            provided.imports.push(SyntheticImport {
              local: name.clone(),
              request: rule.request.clone(),
              export: rule.export.clone(),
            });
          }
        }
        ProvideKey::Member { object, property } => {
          let local = rule.key.local();
          let before = provided.sites.len();
          for reference in facts.free_references(object) {
            let tail = &source[reference.end..];
            let Some(captures) = MEMBER_TAIL.captures(tail) else {
              continue;
            };
            let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
              continue;
            };
            let end = reference.end + whole.end();
            if name.as_str() != property || is_assignment_target(&source[end..]) {
              continue;
            }
            provided.sites.push(MemberSite {
              local: local.clone(),
              start: reference.start,
              end,
            });
          }
          if provided.sites.len() > before {
            provided.imports.push(SyntheticImport {
              local,
              request: rule.request.clone(),
              export: rule.export.clone(),
            });
          }
        }
      }
    }

    provided
  }
}

/// Rewrite member sites whose synthetic import survived resolution.
pub fn rewrite_sites(source: &str, sites: &[MemberSite], keep: impl Fn(&str) -> bool) -> Option<String> {
  let mut splicer = Splicer::new(source);
  for site in sites.iter().filter(|s| keep(&s.local)) {
    splicer.replace(site.start, site.end, site.local.clone());
  }
  if splicer.is_empty() { None } else { Some(splicer.apply()) }
}

fn is_assignment_target(rest: &str) -> bool {
  let rest = rest.trim_start();
  rest.starts_with('=') && !rest.starts_with("==") && !rest.starts_with("=>")
}
