use super::index::{FileIndex, IndexBuilder, is_hidden_path};
use arc_swap::ArcSwap;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// Rebuilds the whole index on every change below the root and swaps it in.
///
/// The returned watcher stops when dropped.
pub(crate) fn watch(builder: IndexBuilder, listing: Arc<ArcSwap<FileIndex>>) -> notify::Result<RecommendedWatcher> {
    let root = builder.root().to_path_buf();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if !is_relevant(builder.root(), &event) {
                    return;
                }
                match builder.build() {
                    Ok(index) => {
                        info!(root = %builder.root().display(), files = index.len(), "static files changed, index rebuilt");
                        listing.store(Arc::new(index));
                    }
                    Err(e) => {
                        error!(cause = %e, root = %builder.root().display(), "static index rebuild failed, keeping the previous one");
                    }
                }
            }
            Err(e) => error!(cause = %e, "static directory watch error"),
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;
    info!(root = %root.display(), "watching static directory");
    Ok(watcher)
}

// gzip artifacts live in the hidden cache dir, so writing them never retriggers a rebuild
fn is_relevant(root: &Path, event: &Event) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }
    event.paths.is_empty() || event.paths.iter().any(|path| !is_hidden_path(root, path))
}
