//! Compiled page module resolution and caching.
//!
//! The build subsystem compiles every page into a JSON module under the
//! server views directory:
//!
//! ```json
//! {
//!   "component": "<template source>",
//!   "data_fn": "blog_post",
//!   "config": { "methods": ["get", "post"] }
//! }
//! ```
//!
//! `component` is the page's template (its primary export), `data_fn`
//! optionally names a registered server-side data function, and
//! `config.methods` gates HTTP methods (lowercased, default `{get}`).
//!
//! Loading policy is a capability chosen once at startup, not a mode flag
//! checked at every call site: [`CachingSource`] loads each path at most
//! once for the process lifetime (correct because production bundles are
//! immutable files), while [`HotReloadingSource`] re-reads and
//! re-evaluates the module on every lookup, trading work for freshness.
//!
//! The reserved `_document`, `_app` and `_error` names resolve exactly
//! like ordinary routes; the build guarantees fallback files exist, so the
//! loader has no special-casing of its own.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Deserialize;
use tracing::debug;

/// Reserved name of the document (outer HTML shell) module.
pub const DOCUMENT_VIEW: &str = "_document";
/// Reserved name of the app (component wrapper) module.
pub const APP_VIEW: &str = "_app";

/// A compiled page module was missing or failed to evaluate.
#[derive(Debug, Clone)]
pub struct ModuleLoadError {
    pub path: PathBuf,
    detail: String,
}

impl ModuleLoadError {
    pub(crate) fn new(path: &Path, detail: impl fmt::Display) -> Self {
        Self {
            path: path.to_path_buf(),
            detail: detail.to_string(),
        }
    }
}

impl fmt::Display for ModuleLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to load page module {}: {}",
            self.path.display(),
            self.detail
        )
    }
}

impl std::error::Error for ModuleLoadError {}

/// In-memory form of one compiled page module.
#[derive(Debug)]
pub struct PageModule {
    /// Route name the module was resolved for.
    pub name: String,
    /// Template source of the page component.
    pub component: String,
    /// Name of the registered server-side data function, if the page has
    /// one.
    pub data_fn: Option<String>,
    /// Allowed HTTP methods, lowercase.
    pub methods: HashSet<String>,
}

impl PageModule {
    /// Method gate. `method` is matched case-insensitively.
    #[must_use]
    pub fn allows_method(&self, method: &str) -> bool {
        self.methods.contains(&method.to_ascii_lowercase())
    }
}

/// On-disk shape of a module file.
#[derive(Deserialize)]
struct PageModuleFile {
    component: String,
    #[serde(default)]
    data_fn: Option<String>,
    #[serde(default)]
    config: ModuleConfig,
}

#[derive(Deserialize, Default)]
struct ModuleConfig {
    #[serde(default)]
    methods: Option<MethodsField>,
}

/// `config.methods` accepts a single string or an array of strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum MethodsField {
    One(String),
    Many(Vec<String>),
}

fn normalize_methods(field: Option<MethodsField>) -> HashSet<String> {
    match field {
        None => HashSet::from(["get".to_string()]),
        Some(MethodsField::One(method)) => HashSet::from([method.to_ascii_lowercase()]),
        Some(MethodsField::Many(methods)) => methods
            .into_iter()
            .map(|m| m.to_ascii_lowercase())
            .collect(),
    }
}

/// Read and evaluate one module file. Evaluation includes compiling the
/// component template, so a broken template fails here rather than at
/// render time.
fn read_module(name: &str, path: &Path) -> Result<Arc<PageModule>, ModuleLoadError> {
    let content =
        std::fs::read_to_string(path).map_err(|err| ModuleLoadError::new(path, err))?;
    let file: PageModuleFile =
        serde_json::from_str(&content).map_err(|err| ModuleLoadError::new(path, err))?;

    {
        let mut env = minijinja::Environment::new();
        env.add_template("page.html", &file.component)
            .map_err(|err| ModuleLoadError::new(path, err))?;
    }

    debug!(module = %name, path = %path.display(), "page module evaluated");
    Ok(Arc::new(PageModule {
        name: name.to_string(),
        component: file.component,
        data_fn: file.data_fn,
        methods: normalize_methods(file.config.methods),
    }))
}

/// Strategy for turning a module path into a [`PageModule`].
pub trait ModuleSource: Send + Sync {
    fn load(&self, name: &str, path: &Path) -> Result<Arc<PageModule>, ModuleLoadError>;
}

/// Production source: at most one disk load per path for the process
/// lifetime. Lookups after the first return the identical `Arc`.
#[derive(Default)]
pub struct CachingSource {
    cache: DashMap<PathBuf, Arc<PageModule>>,
}

impl ModuleSource for CachingSource {
    fn load(&self, name: &str, path: &Path) -> Result<Arc<PageModule>, ModuleLoadError> {
        if let Some(cached) = self.cache.get(path) {
            return Ok(Arc::clone(&cached));
        }
        let module = read_module(name, path)?;
        self.cache
            .insert(path.to_path_buf(), Arc::clone(&module));
        Ok(module)
    }
}

/// Development source: no cache, every lookup re-reads the file so edits
/// are visible on the next request.
pub struct HotReloadingSource;

impl ModuleSource for HotReloadingSource {
    fn load(&self, name: &str, path: &Path) -> Result<Arc<PageModule>, ModuleLoadError> {
        read_module(name, path)
    }
}

/// The `_document`/`_app`/page triple a render needs, resolved through
/// the same source.
#[derive(Clone)]
pub struct PageBundle {
    pub document: Arc<PageModule>,
    pub app: Arc<PageModule>,
    pub page: Arc<PageModule>,
}

/// Resolves route names to compiled page modules.
pub struct ComponentLoader {
    views_dir: PathBuf,
    source: Box<dyn ModuleSource>,
}

impl ComponentLoader {
    /// Create a loader rooted at the compiled views directory. The loading
    /// policy is fixed here: caching unless `dev`.
    #[must_use]
    pub fn new(views_dir: PathBuf, dev: bool) -> Self {
        let views_dir = if views_dir.is_absolute() {
            views_dir
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(&views_dir))
                .unwrap_or(views_dir)
        };
        let source: Box<dyn ModuleSource> = if dev {
            Box::new(HotReloadingSource)
        } else {
            Box::new(CachingSource::default())
        };
        Self { views_dir, source }
    }

    /// Absolute path of the compiled module for a route name.
    #[must_use]
    pub fn module_path(&self, name: &str) -> PathBuf {
        self.views_dir.join(format!("{name}.json"))
    }

    /// Resolve one route name to its page module.
    pub fn resolve(&self, name: &str) -> Result<Arc<PageModule>, ModuleLoadError> {
        let path = self.module_path(name);
        self.source.load(name, &path)
    }

    /// Resolve the document/app/page triple for a route.
    pub fn resolve_bundle(&self, name: &str) -> Result<PageBundle, ModuleLoadError> {
        let document = self.resolve(DOCUMENT_VIEW)?;
        let app = self.resolve(APP_VIEW)?;
        let page = self.resolve(name)?;
        Ok(PageBundle {
            document,
            app,
            page,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_module(dir: &Path, name: &str, value: &serde_json::Value) -> PathBuf {
        let path = dir.join(format!("{name}.json"));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, serde_json::to_string(value).unwrap()).unwrap();
        path
    }

    #[test]
    fn methods_default_to_get() {
        let dir = tempfile::tempdir().unwrap();
        write_module(dir.path(), "index", &json!({"component": "<p>hi</p>"}));
        let loader = ComponentLoader::new(dir.path().to_path_buf(), false);
        let module = loader.resolve("index").unwrap();
        assert!(module.allows_method("GET"));
        assert!(module.allows_method("get"));
        assert!(!module.allows_method("POST"));
    }

    #[test]
    fn methods_accept_string_or_array() {
        let dir = tempfile::tempdir().unwrap();
        write_module(
            dir.path(),
            "single",
            &json!({"component": "", "config": {"methods": "POST"}}),
        );
        write_module(
            dir.path(),
            "many",
            &json!({"component": "", "config": {"methods": ["Get", "PUT"]}}),
        );
        let loader = ComponentLoader::new(dir.path().to_path_buf(), false);

        let single = loader.resolve("single").unwrap();
        assert!(single.allows_method("post"));
        assert!(!single.allows_method("get"));

        let many = loader.resolve("many").unwrap();
        assert!(many.allows_method("get"));
        assert!(many.allows_method("put"));
    }

    #[test]
    fn missing_module_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ComponentLoader::new(dir.path().to_path_buf(), false);
        assert!(loader.resolve("nope").is_err());
    }

    #[test]
    fn broken_template_fails_at_load_time() {
        let dir = tempfile::tempdir().unwrap();
        write_module(
            dir.path(),
            "broken",
            &json!({"component": "{% for x in %}"}),
        );
        let loader = ComponentLoader::new(dir.path().to_path_buf(), false);
        assert!(loader.resolve("broken").is_err());
    }

    #[test]
    fn nested_route_names_map_into_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        write_module(dir.path(), "blog/_id", &json!({"component": "post"}));
        let loader = ComponentLoader::new(dir.path().to_path_buf(), false);
        let module = loader.resolve("blog/_id").unwrap();
        assert_eq!(module.component, "post");
    }

    #[test]
    fn caching_source_is_reference_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_module(dir.path(), "index", &json!({"component": "v1"}));
        let loader = ComponentLoader::new(dir.path().to_path_buf(), false);

        let first = loader.resolve("index").unwrap();
        // Rewrite the file: a cached loader must not notice.
        std::fs::write(&path, json!({"component": "v2"}).to_string()).unwrap();
        let second = loader.resolve("index").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.component, "v1");
    }

    #[test]
    fn hot_reloading_source_sees_edits() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_module(dir.path(), "index", &json!({"component": "v1"}));
        let loader = ComponentLoader::new(dir.path().to_path_buf(), true);

        assert_eq!(loader.resolve("index").unwrap().component, "v1");
        std::fs::write(&path, json!({"component": "v2"}).to_string()).unwrap();
        assert_eq!(loader.resolve("index").unwrap().component, "v2");
    }
}
