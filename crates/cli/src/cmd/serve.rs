//! Implementation of the `spabuild serve` command.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::warn;

use spabuild_lib::serve::DevServer;

use super::ProjectArgs;
use crate::output::print_success;

/// Command-line overrides of the `[serve]` config table.
#[derive(Debug, Default)]
pub struct ServeOverrides {
  pub host: Option<String>,
  pub port: Option<u16>,
  pub no_watch: bool,
}

pub fn cmd_serve(args: &ProjectArgs, overrides: ServeOverrides) -> Result<()> {
  let (_, mut resolved) = args.resolve()?;
  if let Some(host) = overrides.host {
    resolved.config.serve.host = host;
  }
  if let Some(port) = overrides.port {
    resolved.config.serve.port = port;
  }
  if overrides.no_watch {
    resolved.config.serve.watch = false;
  }
  let minify = resolved.config.optimize.minify;

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  rt.block_on(async move {
    let server = DevServer::bind(Arc::new(resolved), minify)
      .await
      .context("Failed to start dev server")?;
    let addr = server.local_addr()?;
    print_success(&format!("Serving on http://{}", addr));

    server
      .run(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
          warn!(error = %e, "failed to listen for ctrl-c");
          std::future::pending::<()>().await;
        }
      })
      .await
      .context("Dev server failed")
  })
}
