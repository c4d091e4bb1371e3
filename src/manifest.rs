//! Build manifest loading and snapshot management.
//!
//! The manifest is the only contract between the build subsystem and the
//! runtime: a JSON object mapping route names to the client assets of that
//! page. The runtime never scans the filesystem for pages; what the
//! manifest names is what exists.
//!
//! Entry order is preserved from the JSON document because route matching
//! precedence is manifest order (see [`crate::router`]).
//!
//! [`ManifestStore`] holds the current snapshot behind an `ArcSwap`:
//! reloads replace the whole manifest atomically, so concurrent readers
//! always observe a fully-formed old or new version, never a partial one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Reserved route name used as the fallback for unmatched paths and as the
/// error view. Excluded from route matching.
pub const ERROR_ROUTE: &str = "_error";

/// Client asset lists for one route, as emitted by the build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetList {
    #[serde(default)]
    pub styles: Vec<String>,
    #[serde(default)]
    pub scripts: Vec<String>,
}

/// Route-name to asset-list mapping, in manifest document order.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    entries: Vec<(String, AssetList)>,
    index: HashMap<String, usize>,
}

impl Manifest {
    /// Read the manifest file.
    ///
    /// Never fails: a missing file, unreadable file, or parse error yields
    /// an empty manifest, which downstream treats as "no routes, fall back
    /// to `_error`".
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "manifest not readable, starting empty");
                return Self::default();
            }
        };
        match serde_json::from_str::<serde_json::Value>(&content) {
            Ok(value) => Self::from_json(&value),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "manifest parse failed, starting empty");
                Self::default()
            }
        }
    }

    /// Build a manifest from a parsed JSON document, keeping object order.
    /// Entries that do not fit the asset-list shape are skipped.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        let mut manifest = Self::default();
        let Some(object) = value.as_object() else {
            warn!("manifest root is not an object, starting empty");
            return manifest;
        };
        for (name, entry) in object {
            match serde_json::from_value::<AssetList>(entry.clone()) {
                Ok(assets) => manifest.insert(name.clone(), assets),
                Err(err) => {
                    warn!(route = %name, error = %err, "skipping malformed manifest entry");
                }
            }
        }
        manifest
    }

    fn insert(&mut self, name: String, assets: AssetList) {
        if let Some(&pos) = self.index.get(&name) {
            self.entries[pos].1 = assets;
        } else {
            self.index.insert(name.clone(), self.entries.len());
            self.entries.push((name, assets));
        }
    }

    /// Look up one route's assets.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AssetList> {
        self.index.get(name).map(|&pos| &self.entries[pos].1)
    }

    /// Look up one route's assets, falling back to the `_error` entry, then
    /// to an empty list when even `_error` is absent.
    #[must_use]
    pub fn get_or_error(&self, name: &str) -> AssetList {
        self.get(name)
            .or_else(|| self.get(ERROR_ROUTE))
            .cloned()
            .unwrap_or_default()
    }

    /// Entries in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AssetList)> {
        self.entries.iter().map(|(name, assets)| (name.as_str(), assets))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Process-wide holder of the current manifest snapshot.
///
/// The build subsystem is contractually required to trigger [`reload`]
/// after every successful rebuild (`hot_reload` wires this up in dev).
/// In production the snapshot loaded at startup lives for the process.
///
/// [`reload`]: ManifestStore::reload
pub struct ManifestStore {
    path: PathBuf,
    current: ArcSwap<Manifest>,
}

impl ManifestStore {
    /// Create a store and load the manifest once.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        let manifest = Manifest::load(&path);
        info!(path = %path.display(), routes = manifest.len(), "manifest loaded");
        Self {
            path,
            current: ArcSwap::from_pointee(manifest),
        }
    }

    /// Current snapshot. Cheap; safe to hold across await/suspend points.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Manifest> {
        self.current.load_full()
    }

    /// Re-read the manifest file and swap the snapshot in wholesale.
    ///
    /// Readers holding the previous `Arc` keep a consistent view; new
    /// readers see the replacement. Returns the new snapshot.
    pub fn reload(&self) -> Arc<Manifest> {
        let manifest = Arc::new(Manifest::load(&self.path));
        info!(path = %self.path.display(), routes = manifest.len(), "manifest reloaded");
        self.current.store(Arc::clone(&manifest));
        manifest
    }

    /// Asset lookup with the `_error` fallback, against the current snapshot.
    #[must_use]
    pub fn get(&self, name: &str) -> AssetList {
        self.current.load().get_or_error(name)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
