//! The request pipeline.
//!
//! [`AppService`] is the `may_minihttp` service handling every request.
//! The stage order is fixed: identification header → static asset serving
//! (production) / dev middleware hook (development) → user middleware →
//! route handler → terminal error handler. Each in-flight request runs in
//! its own coroutine; all shared state is read through atomic snapshots,
//! so no stage blocks another request.

use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use may_minihttp::{HttpService, Request, Response};
use serde_json::{Map, Value};
use tracing::{error, warn};

use super::request::{parse_request, ParsedRequest};
use super::response::{bare_error, write_response, ResponseParts};
use crate::config::Config;
use crate::context::{PageContext, RenderContext};
use crate::error::PipelineError;
use crate::loader::{ComponentLoader, ModuleLoadError};
use crate::manifest::{ManifestStore, ERROR_ROUTE};
use crate::middleware::{resolve_entries, Middleware, MiddlewareEntry, ResolvedMiddleware};
use crate::registry::DataFnRegistry;
use crate::renderer::Renderer;
use crate::router::{ParamVec, Router};
use crate::static_files::StaticFiles;

/// Value of the `X-Powered-By` identification header.
pub const POWERED_BY: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

type SetupHook = Box<dyn FnOnce(Vec<MiddlewareEntry>) -> Vec<MiddlewareEntry> + Send + Sync>;

pub struct AppService {
    config: Arc<Config>,
    store: Arc<ManifestStore>,
    router: Arc<ArcSwap<Router>>,
    loader: Arc<ComponentLoader>,
    registry: Arc<DataFnRegistry>,
    renderer: Renderer,
    entries: Vec<MiddlewareEntry>,
    setup: Option<SetupHook>,
    middlewares: Arc<Vec<ResolvedMiddleware>>,
    dev_middleware: Option<Arc<dyn Middleware>>,
    static_files: Option<StaticFiles>,
    static_mount: String,
    pub watcher: Option<notify::RecommendedWatcher>,
}

impl Clone for AppService {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            store: Arc::clone(&self.store),
            router: Arc::clone(&self.router),
            loader: Arc::clone(&self.loader),
            registry: Arc::clone(&self.registry),
            renderer: self.renderer.clone(),
            entries: self.entries.clone(),
            setup: None,
            middlewares: Arc::clone(&self.middlewares),
            dev_middleware: self.dev_middleware.clone(),
            static_files: self.static_files.clone(),
            static_mount: self.static_mount.clone(),
            watcher: None,
        }
    }
}

impl AppService {
    /// Build the service: load the manifest, derive the route table, pick
    /// the module loading policy, and set up static serving (production,
    /// local public path only).
    #[must_use]
    pub fn new(config: Config, registry: DataFnRegistry) -> Self {
        let store = Arc::new(ManifestStore::new(config.manifest_path()));
        let router = Arc::new(ArcSwap::from_pointee(Router::from_manifest(
            store.snapshot(),
        )));
        let loader = Arc::new(ComponentLoader::new(config.views_dir(), config.dev));
        let renderer = Renderer::new(&config.globals);

        let serve_static = !config.dev && !config.server.public_path.starts_with("http");
        let static_files = serve_static.then(|| StaticFiles::new(config.static_root()));
        let static_mount = config.static_mount();

        Self {
            config: Arc::new(config),
            store,
            router,
            loader,
            registry: Arc::new(registry),
            renderer,
            entries: Vec::new(),
            setup: None,
            middlewares: Arc::new(Vec::new()),
            dev_middleware: None,
            static_files,
            static_mount,
            watcher: None,
        }
    }

    /// Append a user middleware entry. Entries run in registration order
    /// once [`ready`](AppService::ready) has resolved them.
    pub fn use_middleware(&mut self, entry: MiddlewareEntry) {
        self.entries.push(entry);
    }

    /// Install a hook that may reorder or insert middleware entries right
    /// before they are frozen.
    pub fn setup_middleware<F>(&mut self, hook: F)
    where
        F: FnOnce(Vec<MiddlewareEntry>) -> Vec<MiddlewareEntry> + Send + Sync + 'static,
    {
        self.setup = Some(Box::new(hook));
    }

    /// Development-time middleware taking the place of built-in static
    /// serving (the bundler's asset server).
    pub fn set_dev_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        self.dev_middleware = Some(middleware);
    }

    /// Freeze the middleware chain. Call after registration, before
    /// starting the server.
    pub fn ready(&mut self) {
        let entries = std::mem::take(&mut self.entries);
        let entries = match self.setup.take() {
            Some(hook) => hook(entries),
            None => entries,
        };
        self.middlewares = Arc::new(resolve_entries(entries));
    }

    /// Re-read the manifest and swap in a router derived from the new
    /// snapshot. The build subsystem calls this (directly or through the
    /// manifest watcher) after every successful rebuild.
    pub fn reload_manifest(&self) {
        let manifest = self.store.reload();
        self.router.store(Arc::new(Router::from_manifest(manifest)));
    }

    /// Watch the manifest file and reload on change (dev workflow).
    pub fn enable_watch(&mut self) -> notify::Result<()> {
        let watcher = crate::hot_reload::watch_manifest(
            Arc::clone(&self.store),
            Arc::clone(&self.router),
            |_| {},
        )?;
        self.watcher = Some(watcher);
        Ok(())
    }

    /// Current manifest snapshot (test and embedding hook).
    #[must_use]
    pub fn manifest(&self) -> Arc<crate::manifest::Manifest> {
        self.store.snapshot()
    }

    /// Full pipeline for one parsed request, excluding `after` hooks.
    fn handle(&self, req: &ParsedRequest) -> ResponseParts {
        // Static assets: production only; a miss falls through to routing.
        if let Some(static_files) = &self.static_files {
            if req.method == "GET" || req.method == "HEAD" {
                if let Some(rest) = self.static_path(&req.pathname) {
                    if let Ok((bytes, content_type)) = static_files.load(rest) {
                        let mut parts = ResponseParts::new();
                        parts.set_header("Content-Type", content_type);
                        if req.method != "HEAD" {
                            parts.body = bytes;
                        }
                        return parts;
                    }
                }
            }
        }

        // Dev middleware hook (the bundler's asset server).
        if self.config.dev {
            if let Some(middleware) = &self.dev_middleware {
                if let Some(parts) = middleware.before(req) {
                    return parts;
                }
            }
        }

        // User middleware, in configured order.
        for middleware in self.middlewares.iter() {
            if middleware.applies_to(&req.pathname) {
                if let Some(parts) = middleware.handler.before(req) {
                    return parts;
                }
            }
        }

        match self.route_handler(req) {
            Ok(parts) => parts,
            Err(err) => self.render_error(req, &err),
        }
    }

    /// Path below the static mount, when the request is under it.
    fn static_path<'a>(&self, pathname: &'a str) -> Option<&'a str> {
        let rest = pathname.strip_prefix(&self.static_mount)?;
        let rest = rest.strip_prefix('/')?;
        (!rest.is_empty()).then_some(rest)
    }

    /// Match, load, gate, and run the page.
    fn route_handler(&self, req: &ParsedRequest) -> Result<ResponseParts, PipelineError> {
        let router = self.router.load_full();
        let matched = router.match_path(&req.pathname)?;
        if matched.name == ERROR_ROUTE {
            return Err(PipelineError::RouteNotFound);
        }

        let bundle = self.loader.resolve_bundle(&matched.name)?;
        if !bundle.page.allows_method(req.method.as_str()) {
            return Err(PipelineError::MethodNotAllowed);
        }

        let data_fn = match &bundle.page.data_fn {
            Some(name) => Some(self.registry.get(name).ok_or_else(|| {
                ModuleLoadError::new(
                    &self.loader.module_path(&matched.name),
                    format!("data function '{name}' is not registered"),
                )
            })?),
            None => None,
        };

        let ctx = RenderContext::new(
            req.clone(),
            matched.params,
            matched.name,
            matched.assets,
            bundle,
            self.renderer.clone(),
            None,
        );

        match data_fn {
            None => Ok(ctx.render(None)?),
            Some(data_fn) => {
                let page_ctx = PageContext::new(ctx);
                match catch_unwind(AssertUnwindSafe(|| data_fn(page_ctx))) {
                    Ok(Ok(parts)) => Ok(parts),
                    Ok(Err(err)) => Err(PipelineError::DataFetch(err)),
                    Err(panic) => Err(PipelineError::DataFetch(anyhow::anyhow!(
                        "data function panicked: {}",
                        panic_message(panic.as_ref())
                    ))),
                }
            }
        }
    }

    /// Terminal error handler: render the `_error` view through the same
    /// loader/renderer path, falling back to a bare response when even
    /// that fails.
    fn render_error(&self, req: &ParsedRequest, err: &PipelineError) -> ResponseParts {
        let status = err.status_code();
        let message = err.public_message(self.config.dev);
        if status >= 500 {
            error!(
                request_id = %req.request_id,
                method = %req.method,
                path = %req.pathname,
                status,
                error = %err,
                "request failed"
            );
        } else {
            warn!(
                request_id = %req.request_id,
                method = %req.method,
                path = %req.pathname,
                status,
                "request rejected"
            );
        }

        let attempt = (|| -> Result<ResponseParts, PipelineError> {
            let router = self.router.load_full();
            let assets = router.manifest().get_or_error(ERROR_ROUTE);
            let bundle = self.loader.resolve_bundle(ERROR_ROUTE)?;

            let mut base = Map::new();
            base.insert("statusCode".to_string(), Value::from(status));
            base.insert("message".to_string(), Value::from(message.as_str()));

            let ctx = RenderContext::new(
                req.clone(),
                ParamVec::new(),
                ERROR_ROUTE.to_string(),
                assets,
                bundle,
                self.renderer.clone(),
                Some(base),
            );
            let mut parts = ctx.render(None)?;
            parts.status = status;
            Ok(parts)
        })();

        attempt.unwrap_or_else(|fallback_err| {
            error!(
                request_id = %req.request_id,
                error = %fallback_err,
                "error view failed, responding bare"
            );
            bare_error(status)
        })
    }
}

impl HttpService for AppService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let parsed = parse_request(req);
        let start = Instant::now();

        let mut parts = self.handle(&parsed);
        parts.set_header_if_absent("X-Powered-By", POWERED_BY);

        let latency = start.elapsed();
        for middleware in self.middlewares.iter() {
            if middleware.applies_to(&parsed.pathname) {
                middleware.handler.after(&parsed, &mut parts, latency);
            }
        }

        write_response(res, parts);
        Ok(())
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
