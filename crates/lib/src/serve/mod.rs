//! Development server.
//!
//! Serves the output root, the static roots and the generated document, and forwards the proxy
//! prefixes to the backend. A watcher over the source root rebuilds on change; a failed rebuild
//! is logged and the previous output keeps being served.
//!
//! The server moves through two states, published on a `tokio::sync::watch` channel:
//! [`ServerState::Serving`] from `bind` on, [`ServerState::Stopped`] after shutdown.

pub mod proxy;
pub mod routes;
pub mod watch;

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{RwLock, watch as state_channel};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::pipeline::{self, BuildOptions, CancelFlag, ResolvedConfig};
use routes::{Matched, RouteTable};
use watch::{DEBOUNCE, SourceWatcher};

#[derive(Debug, Error)]
pub enum ServeError {
  #[error("cannot bind {addr}: {source}")]
  Bind {
    addr: String,
    #[source]
    source: io::Error,
  },

  #[error("failed to start file watcher: {0}")]
  Watch(#[from] notify::Error),

  #[error("failed to create proxy client: {0}")]
  Client(#[from] reqwest::Error),

  #[error("server error: {0}")]
  Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
  Serving,
  Stopped,
}

/// Shared by every request handler.
#[derive(Clone)]
pub struct AppState {
  routes: Arc<RouteTable>,
  client: reqwest::Client,
  document: Arc<RwLock<Option<String>>>,
}

impl AppState {
  pub fn new(routes: RouteTable) -> Result<Self, ServeError> {
    let client = reqwest::Client::builder()
      .redirect(reqwest::redirect::Policy::none())
      .build()?;
    Ok(Self {
      routes: Arc::new(routes),
      client,
      document: Arc::new(RwLock::new(None)),
    })
  }

  /// Publish the document of a successful build.
  pub async fn set_document(&self, html: String) {
    *self.document.write().await = Some(html);
  }

  pub async fn has_document(&self) -> bool {
    self.document.read().await.is_some()
  }
}

pub fn router(state: AppState) -> Router {
  Router::new()
    .fallback(handle)
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

async fn handle(State(state): State<AppState>, request: Request) -> Response {
  let path = request.uri().path().to_string();
  let query = request.uri().query().map(str::to_string);

  match state.routes.resolve(request.method(), &path, query.as_deref()) {
    Matched::Proxy(url) => proxy::forward(&state.client, &url, request).await,
    Matched::File(file) => match tokio::fs::read(&file).await {
      Ok(bytes) => {
        let mime = mime_guess::from_path(&file).first_or_octet_stream();
        ([(header::CONTENT_TYPE, mime.to_string())], bytes).into_response()
      }
      Err(e) => {
        debug!(path = %file.display(), error = %e, "static file vanished");
        (StatusCode::NOT_FOUND, "not found").into_response()
      }
    },
    Matched::Document => match state.document.read().await.clone() {
      Some(html) => ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], html).into_response(),
      None => (StatusCode::SERVICE_UNAVAILABLE, "no successful build yet").into_response(),
    },
    Matched::NotFound => (StatusCode::NOT_FOUND, "not found").into_response(),
  }
}

pub struct DevServer {
  resolved: Arc<ResolvedConfig>,
  listener: TcpListener,
  app: AppState,
  state: Arc<state_channel::Sender<ServerState>>,
  minify: bool,
}

impl DevServer {
  /// Bind the configured address. An occupied port fails here, before any build runs.
  pub async fn bind(resolved: Arc<ResolvedConfig>, minify: bool) -> Result<Self, ServeError> {
    let addr = format!("{}:{}", resolved.config.serve.host, resolved.config.serve.port);
    let listener = TcpListener::bind(&addr)
      .await
      .map_err(|source| ServeError::Bind { addr, source })?;

    let app = AppState::new(RouteTable::new(&resolved.proxies, &resolved.roots))?;
    let (state, _) = state_channel::channel(ServerState::Serving);

    Ok(Self {
      resolved,
      listener,
      app,
      state: Arc::new(state),
      minify,
    })
  }

  pub fn local_addr(&self) -> Result<SocketAddr, ServeError> {
    Ok(self.listener.local_addr()?)
  }

  pub fn subscribe(&self) -> state_channel::Receiver<ServerState> {
    self.state.subscribe()
  }

  pub fn app_state(&self) -> AppState {
    self.app.clone()
  }

  /// Serve until `shutdown` resolves. Builds once up front, then on every source change when
  /// watching is enabled.
  pub async fn run<F>(self, shutdown: F) -> Result<(), ServeError>
  where
    F: Future<Output = ()> + Send + 'static,
  {
    let addr = self.local_addr()?;
    let watcher = if self.resolved.config.serve.watch {
      Some(SourceWatcher::new(
        &self.resolved.roots.source,
        vec![self.resolved.roots.output.clone()],
      )?)
    } else {
      None
    };

    let rebuilds = tokio::spawn(rebuild_loop(
      self.resolved.clone(),
      self.app.clone(),
      watcher,
      self.minify,
      self.state.subscribe(),
    ));

    info!(%addr, "dev server listening");
    let state = self.state.clone();
    let result = axum::serve(self.listener, router(self.app))
      .with_graceful_shutdown(async move {
        shutdown.await;
        let _ = state.send(ServerState::Stopped);
      })
      .await;

    let _ = self.state.send(ServerState::Stopped);
    if let Err(e) = rebuilds.await {
      warn!(error = %e, "rebuild task ended abnormally");
    }
    info!("dev server stopped");
    result.map_err(ServeError::Io)
  }
}

async fn rebuild_loop(
  resolved: Arc<ResolvedConfig>,
  app: AppState,
  mut watcher: Option<SourceWatcher>,
  minify: bool,
  mut state: state_channel::Receiver<ServerState>,
) {
  let cancel = CancelFlag::default();
  let mut build = tokio::spawn(rebuild(resolved.clone(), app.clone(), minify, cancel.clone()));

  loop {
    let batch = tokio::select! {
      _ = stopped(&mut state) => break,
      batch = next_change(&mut watcher) => batch,
    };
    let Some(batch) = batch else {
      break;
    };
    info!(changed = batch.len(), "source changed, rebuilding");
    let _ = build.await;
    build = tokio::spawn(rebuild(resolved.clone(), app.clone(), minify, cancel.clone()));
  }

  cancel.cancel();
  let _ = build.await;
}

async fn stopped(state: &mut state_channel::Receiver<ServerState>) {
  let _ = state.wait_for(|s| *s == ServerState::Stopped).await;
}

async fn next_change(watcher: &mut Option<SourceWatcher>) -> Option<Vec<std::path::PathBuf>> {
  match watcher {
    Some(watcher) => watcher.next_batch(DEBOUNCE).await,
    None => std::future::pending().await,
  }
}

async fn rebuild(resolved: Arc<ResolvedConfig>, app: AppState, minify: bool, cancel: CancelFlag) {
  let options = BuildOptions {
    minify,
    cancel,
    env: None,
  };
  let result = tokio::task::spawn_blocking(move || pipeline::build(&resolved, &options)).await;

  match result {
    Ok(Ok(report)) => {
      info!(artifacts = report.artifacts.len(), duration_ms = report.duration_ms as u64, "rebuilt");
      app.set_document(report.document).await;
    }
    Ok(Err(e)) => error!(stage = e.stage(), error = %e, "build failed, serving previous output"),
    Err(e) => error!(error = %e, "build task panicked"),
  }
}
