//! Live reloading of the build manifest.
//!
//! The build subsystem's contract is to make the runtime reload the
//! manifest after every successful rebuild. In an embedded setup the
//! build calls [`crate::server::AppService::reload_manifest`] directly;
//! the dev workflow instead watches the manifest file itself and treats a
//! write as the rebuild signal.
//!
//! A reload swaps one `Arc` pointer: the new router (carrying the new
//! manifest snapshot) replaces the old wholesale, so requests in flight
//! keep the view they started with and new requests see the replacement.
//! When the new file fails to parse, `Manifest::load` yields an empty
//! manifest and every path falls back to the error view — the previous
//! snapshot is not resurrected, matching the load-never-throws contract.

use std::sync::Arc;

use arc_swap::ArcSwap;
use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{error, info};

use crate::manifest::{Manifest, ManifestStore};
use crate::router::Router;

/// Watch the manifest file and rebuild the [`Router`] when it changes.
///
/// The callback receives the fresh manifest snapshot so callers can do
/// additional work (cache warmups, logging) per reload.
pub fn watch_manifest<F>(
    store: Arc<ManifestStore>,
    router: Arc<ArcSwap<Router>>,
    mut on_reload: F,
) -> notify::Result<RecommendedWatcher>
where
    F: FnMut(&Arc<Manifest>) + Send + 'static,
{
    let path = store.path().to_path_buf();

    let mut watcher = RecommendedWatcher::new(
        move |res: Result<notify::Event, notify::Error>| match res {
            Ok(event) => {
                if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    let manifest = store.reload();
                    router.store(Arc::new(Router::from_manifest(Arc::clone(&manifest))));
                    info!(routes = manifest.len(), "manifest change applied");
                    on_reload(&manifest);
                }
            }
            Err(err) => error!(error = %err, "manifest watch error"),
        },
        Config::default(),
    )?;

    watcher.watch(&path, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}
