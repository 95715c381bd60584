//! Dev-server route table.
//!
//! Requests are matched against an ordered list of routes and the first match wins:
//! proxy prefixes (longest first), then the output root, the public root and the upload root,
//! then the document fallback.

use std::path::{Path, PathBuf};

use axum::http::Method;
use percent_encoding::percent_decode_str;

use crate::consts::DOCUMENT_FILENAME;
use crate::paths::ProjectRoots;

use super::proxy::ProxyRule;

#[derive(Debug, Clone)]
pub enum Route {
  Proxy(ProxyRule),
  Static(PathBuf),
  /// The generated document for any remaining `GET`/`HEAD` request.
  Document,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matched {
  /// Forward to this upstream URL.
  Proxy(String),
  File(PathBuf),
  Document,
  NotFound,
}

#[derive(Debug, Clone)]
pub struct RouteTable {
  routes: Vec<Route>,
}

impl RouteTable {
  pub fn new(proxies: &[ProxyRule], roots: &ProjectRoots) -> Self {
    let mut routes: Vec<Route> = proxies.iter().cloned().map(Route::Proxy).collect();
    routes.push(Route::Static(roots.output.clone()));
    routes.extend(roots.static_roots().iter().map(|root| Route::Static(root.to_path_buf())));
    routes.push(Route::Document);
    Self { routes }
  }

  pub fn routes(&self) -> &[Route] {
    &self.routes
  }

  pub fn resolve(&self, method: &Method, path: &str, query: Option<&str>) -> Matched {
    let readable = method == Method::GET || method == Method::HEAD;
    let relative = relative_path(path);

    for route in &self.routes {
      match route {
        Route::Proxy(rule) if rule.matches(path) => return Matched::Proxy(rule.upstream_url(path, query)),
        Route::Proxy(_) => {}
        Route::Static(root) => {
          if readable
            && let Some(relative) = &relative
            && let Some(file) = find_file(root, relative)
          {
            return Matched::File(file);
          }
        }
        Route::Document => {
          if readable {
            return Matched::Document;
          }
        }
      }
    }
    Matched::NotFound
  }
}

/// Decode a request path into a relative file path. Parent and hidden segments are refused.
fn relative_path(path: &str) -> Option<PathBuf> {
  let decoded = percent_decode_str(path).decode_utf8().ok()?;
  let mut relative = PathBuf::new();
  for segment in decoded.split('/').filter(|s| !s.is_empty()) {
    if segment.starts_with('.') || segment.contains('\\') || segment.contains('\0') {
      return None;
    }
    relative.push(segment);
  }
  Some(relative)
}

/// A file below `root`; directories serve their `index.html`.
fn find_file(root: &Path, relative: &Path) -> Option<PathBuf> {
  let candidate = root.join(relative);
  if candidate.is_dir() {
    let index = candidate.join(DOCUMENT_FILENAME);
    return index.is_file().then_some(index);
  }
  candidate.is_file().then_some(candidate)
}
