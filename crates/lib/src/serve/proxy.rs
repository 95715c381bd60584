//! Reverse proxy for the backend prefix.

use axum::body::{Body, to_bytes};
use axum::extract::Request;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use reqwest::Url;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{ConfigError, ProxyConfig};

/// Headers that describe one connection and are never forwarded.
const HOP_BY_HOP: [&str; 8] = [
  "connection",
  "keep-alive",
  "proxy-authenticate",
  "proxy-authorization",
  "te",
  "trailer",
  "transfer-encoding",
  "upgrade",
];

#[derive(Debug, Error)]
pub enum ProxyError {
  #[error("failed to read request body: {0}")]
  Body(String),

  #[error(transparent)]
  Upstream(#[from] reqwest::Error),
}

/// A path prefix forwarded to a backend origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRule {
  prefix: String,
  target: Url,
}

impl ProxyRule {
  /// Validate rules and sort them longest prefix first.
  pub fn compile(configs: &[ProxyConfig]) -> Result<Vec<Self>, ConfigError> {
    let mut rules: Vec<Self> = Vec::with_capacity(configs.len());
    for config in configs {
      let invalid = |reason: &str| ConfigError::InvalidProxy {
        prefix: config.prefix.clone(),
        reason: reason.to_string(),
      };

      if !config.prefix.starts_with('/') {
        return Err(invalid("prefix must start with '/'"));
      }
      let prefix = match config.prefix.trim_end_matches('/') {
        "" => "/".to_string(),
        trimmed => trimmed.to_string(),
      };
      let target = Url::parse(&config.target).map_err(|e| invalid(&format!("invalid target: {}", e)))?;
      if !matches!(target.scheme(), "http" | "https") {
        return Err(invalid("target must be an http or https origin"));
      }
      if rules.iter().any(|r| r.prefix == prefix) {
        return Err(invalid("prefix is declared more than once"));
      }
      rules.push(Self { prefix, target });
    }

    rules.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
    Ok(rules)
  }

  pub fn prefix(&self) -> &str {
    &self.prefix
  }

  pub fn target(&self) -> &Url {
    &self.target
  }

  /// Prefixes match whole path segments: `/api` matches `/api` and `/api/x`, not `/apix`.
  pub fn matches(&self, path: &str) -> bool {
    if self.prefix == "/" {
      return true;
    }
    path
      .strip_prefix(&self.prefix)
      .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
  }

  /// Upstream URL for a request. The path, prefix included, and query are kept as sent.
  pub fn upstream_url(&self, path: &str, query: Option<&str>) -> String {
    let origin = self.target.as_str().trim_end_matches('/');
    match query {
      Some(query) => format!("{}{}?{}", origin, path, query),
      None => format!("{}{}", origin, path),
    }
  }
}

/// Forward a request and relay the response. Upstream failures become `502 Bad Gateway`.
pub async fn forward(client: &reqwest::Client, url: &str, request: Request) -> Response {
  match try_forward(client, url, request).await {
    Ok(response) => response,
    Err(e) => {
      warn!(url, error = %e, "proxy request failed");
      (StatusCode::BAD_GATEWAY, format!("proxy error: {}", e)).into_response()
    }
  }
}

async fn try_forward(client: &reqwest::Client, url: &str, request: Request) -> Result<Response, ProxyError> {
  let (parts, body) = request.into_parts();
  let body = to_bytes(body, usize::MAX)
    .await
    .map_err(|e| ProxyError::Body(e.to_string()))?;

  let mut headers = parts.headers;
  strip_hop_by_hop(&mut headers);
  headers.remove(header::HOST);

  debug!(method = %parts.method, url, "forwarding request");
  let upstream = client
    .request(parts.method, url)
    .headers(headers)
    .body(body)
    .send()
    .await?;

  let status = upstream.status();
  let mut headers = upstream.headers().clone();
  strip_hop_by_hop(&mut headers);
  headers.remove(header::CONTENT_LENGTH);
  let bytes = upstream.bytes().await?;

  let mut response = Response::new(Body::from(bytes));
  *response.status_mut() = status;
  *response.headers_mut() = headers;
  Ok(response)
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
  for name in HOP_BY_HOP {
    headers.remove(name);
  }
}
