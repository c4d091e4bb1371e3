//! # trellis
//!
//! **trellis** is a manifest-driven server-side-rendering runtime for Rust,
//! powered by the `may` coroutine runtime.
//!
//! ## Overview
//!
//! A build subsystem (bundler) compiles a project's pages into client
//! assets and server page modules, and emits a `manifest.json` describing
//! what pages exist. trellis is the runtime half: it derives routes from
//! the manifest, matches incoming requests, loads the compiled page
//! module, runs the page's optional server-side data function, and renders
//! a full HTML document.
//!
//! ## Architecture
//!
//! - **[`manifest`]** - manifest loading and atomic snapshot management
//! - **[`router`]** - route derivation from manifest keys and path matching
//! - **[`loader`]** - page module resolution with cached / hot loading policies
//! - **[`registry`]** - server-side data function registry
//! - **[`context`]** - per-request render/error/redirect/json façade
//! - **[`renderer`]** - document/app/component template rendering
//! - **[`server`]** - HTTP service, request pipeline, response write-out
//! - **[`middleware`]** - pluggable request/response middleware
//! - **[`static_files`]** - built client asset serving
//! - **[`hot_reload`]** - manifest watching for the dev workflow
//! - **[`error`]** - pipeline failure taxonomy
//! - **[`pages`]** - framework fallback `_document`/`_app`/`_error` views
//!
//! ## Request handling flow
//!
//! ```text
//! request
//!   → X-Powered-By identification
//!   → static assets (prod) / dev middleware hook (dev)
//!   → user middleware (in configured order)
//!   → route handler:
//!       match path against manifest-derived routes
//!       resolve _document/_app/page modules
//!       gate the HTTP method
//!       run data function | render immediately
//!   → terminal error handler (_error view; bare fallback)
//! ```
//!
//! Route precedence is manifest document order, first match wins. An
//! unmatched path renders the `_error` view with a 404; a method the page
//! does not allow is answered with the same 404 so route existence is not
//! disclosed; malformed percent-encoding is a 400.
//!
//! ## Quick start
//!
//! ```no_run
//! use trellis::config::Config;
//! use trellis::registry::DataFnRegistry;
//! use trellis::server::{AppService, HttpServer};
//!
//! let config = Config::default();
//! let mut registry = DataFnRegistry::new();
//! registry.register("greeting_props", |ctx| {
//!     let name = ctx.param("name").unwrap_or("world").to_string();
//!     Ok(ctx.render(Some(serde_json::json!({ "name": name })))?)
//! });
//!
//! let addr = config.bind_addr();
//! let mut service = AppService::new(config, registry);
//! service.ready();
//! let handle = HttpServer(service).start(addr).unwrap();
//! handle.join().unwrap();
//! ```
//!
//! ## Runtime considerations
//!
//! trellis uses the `may` coroutine runtime, not tokio or async-std. Each
//! request runs in a lightweight coroutine; the stack size is configurable
//! via `TRELLIS_STACK_SIZE`. Shared state (manifest, route table) is read
//! through `arc-swap` snapshots and replaced wholesale on reload, so
//! readers never observe a partial update; the production component cache
//! grows monotonically and is never invalidated, which is correct because
//! production bundles are immutable files.

pub mod config;
pub mod context;
pub mod error;
pub mod hot_reload;
pub mod ids;
pub mod loader;
pub mod manifest;
pub mod middleware;
pub mod pages;
pub mod registry;
pub mod renderer;
pub mod router;
pub mod server;
pub mod static_files;

pub use config::Config;
pub use context::{PageContext, RenderContext};
pub use error::{HttpError, PipelineError};
pub use loader::{ComponentLoader, PageBundle, PageModule};
pub use manifest::{AssetList, Manifest, ManifestStore, ERROR_ROUTE};
pub use registry::{DataFnRegistry, DataFnResult};
pub use renderer::Renderer;
pub use router::{RouteMatch, Router};
pub use server::{AppService, HttpServer, ResponseParts, ServerHandle};
