//! Source tree watching for rebuild-on-change.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tracing::{trace, warn};

/// Quiet period after the last change before a rebuild starts.
pub const DEBOUNCE: Duration = Duration::from_millis(200);

pub struct SourceWatcher {
  // Dropping the watcher stops event delivery.
  _watcher: RecommendedWatcher,
  events: UnboundedReceiver<PathBuf>,
}

impl SourceWatcher {
  /// Watch `root` recursively. Changes below any of `ignore` are dropped.
  pub fn new(root: &Path, ignore: Vec<PathBuf>) -> Result<Self, notify::Error> {
    let (tx, rx) = unbounded_channel();

    let mut watcher = RecommendedWatcher::new(
      move |res: Result<Event, notify::Error>| match res {
        Ok(event) => {
          if matches!(event.kind, EventKind::Access(_)) {
            return;
          }
          for path in event.paths {
            if ignore.iter().any(|i| path.starts_with(i)) {
              continue;
            }
            trace!(path = %path.display(), "source changed");
            let _ = tx.send(path);
          }
        }
        Err(e) => warn!(error = %e, "file watcher error"),
      },
      Config::default(),
    )?;
    watcher.watch(root, RecursiveMode::Recursive)?;

    Ok(Self {
      _watcher: watcher,
      events: rx,
    })
  }

  /// Wait for a change, then collect everything that follows within `quiet`.
  ///
  /// Returns `None` once the watcher has shut down.
  pub async fn next_batch(&mut self, quiet: Duration) -> Option<Vec<PathBuf>> {
    let first = self.events.recv().await?;
    let mut batch = vec![first];
    while let Ok(Some(path)) = tokio::time::timeout(quiet, self.events.recv()).await {
      batch.push(path);
    }
    batch.sort();
    batch.dedup();
    Some(batch)
  }
}
