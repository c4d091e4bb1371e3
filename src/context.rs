//! Per-request render context.
//!
//! The context is the façade a page's server-side data function works
//! against: request data on one side, response-producing operations on the
//! other. Terminal operations (`render`, `error`, `redirect`, `json`,
//! `jsonp`) consume the context by value and return the finished response
//! parts, so "call exactly one of them" is enforced by ownership rather
//! than convention.
//!
//! Two shapes exist on purpose: [`RenderContext`] carries the operations
//! every route gets, and [`PageContext`] — built only for non-error routes
//! — additionally carries `error`. The error view renders through a bare
//! `RenderContext`, so an error page can never recurse into in-page error
//! presentation.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::reason_phrase;
use crate::loader::PageBundle;
use crate::manifest::AssetList;
use crate::renderer::{RenderAssets, RenderError, Renderer};
use crate::router::ParamVec;
use crate::server::request::ParsedRequest;
use crate::server::ResponseParts;

/// Redirect argument forms: `"/url"`, `(301, "/url")` or `("/url", 301)`.
pub trait IntoRedirect {
    fn into_redirect(self) -> (String, u16);
}

impl IntoRedirect for &str {
    fn into_redirect(self) -> (String, u16) {
        (self.to_string(), 302)
    }
}

impl IntoRedirect for String {
    fn into_redirect(self) -> (String, u16) {
        (self, 302)
    }
}

impl IntoRedirect for (u16, &str) {
    fn into_redirect(self) -> (String, u16) {
        (self.1.to_string(), self.0)
    }
}

impl IntoRedirect for (&str, u16) {
    fn into_redirect(self) -> (String, u16) {
        (self.0.to_string(), self.1)
    }
}

impl IntoRedirect for (u16, String) {
    fn into_redirect(self) -> (String, u16) {
        (self.1, self.0)
    }
}

impl IntoRedirect for (String, u16) {
    fn into_redirect(self) -> (String, u16) {
        (self.0, self.1)
    }
}

/// Context available to every route, including the error view.
pub struct RenderContext {
    req: ParsedRequest,
    params: HashMap<String, String>,
    route_name: String,
    assets: AssetList,
    bundle: PageBundle,
    renderer: Renderer,
    base_props: Option<Map<String, Value>>,
    res: ResponseParts,
}

impl RenderContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        req: ParsedRequest,
        params: ParamVec,
        route_name: String,
        assets: AssetList,
        bundle: PageBundle,
        renderer: Renderer,
        base_props: Option<Map<String, Value>>,
    ) -> Self {
        let params = params
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        Self {
            req,
            params,
            route_name,
            assets,
            bundle,
            renderer,
            base_props,
            res: ResponseParts::new(),
        }
    }

    /// The parsed request this context was built for.
    #[must_use]
    pub fn request(&self) -> &ParsedRequest {
        &self.req
    }

    /// Matched route name.
    #[must_use]
    pub fn route_name(&self) -> &str {
        &self.route_name
    }

    /// Path parameters extracted by the matcher.
    #[must_use]
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Query parameters.
    #[must_use]
    pub fn query(&self) -> &HashMap<String, String> {
        &self.req.query_params
    }

    /// Request header lookup, case-insensitive.
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.req.get_header(name)
    }

    /// Set a response header.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.res.set_header(name, value);
    }

    /// Set the response status code for a subsequent `render`/`json`.
    pub fn status(&mut self, code: u16) {
        self.res.status = code;
    }

    /// Set the `Location` header. `"back"` resolves to the referring URL,
    /// or `/` when the request carries no referrer.
    pub fn location(&mut self, url: &str) {
        let target = if url == "back" {
            self.req
                .get_header("referer")
                .or_else(|| self.req.get_header("referrer"))
                .unwrap_or("/")
                .to_string()
        } else {
            url.to_string()
        };
        self.res.set_header("Location", encode_url(&target));
    }

    /// Redirect and end the response with no body. Default status 302;
    /// both `(status, url)` and `(url, status)` argument orders work.
    #[must_use]
    pub fn redirect(mut self, target: impl IntoRedirect) -> ResponseParts {
        let (url, status) = target.into_redirect();
        debug!(route = %self.route_name, status, url = %url, "redirect");
        self.status(status);
        self.location(&url);
        self.res.body = Vec::new();
        self.res
    }

    /// Serialize a JSON response. `null` produces an empty body.
    #[must_use]
    pub fn json(mut self, value: &Value) -> ResponseParts {
        self.res
            .set_header("Content-Type", "application/json; charset=utf-8");
        let body = stringify(value);
        self.finish(body.into_bytes())
    }

    /// JSONP response wrapped in a guarded callback invocation. The
    /// leading `/**/` and the U+2028/U+2029 escapes mitigate content
    /// sniffing and illegal-in-JS line separators respectively.
    #[must_use]
    pub fn jsonp(mut self, value: &Value, callback: Option<&str>) -> ResponseParts {
        let callback = callback.unwrap_or("callback");
        let json = stringify(value)
            .replace('\u{2028}', "\\u2028")
            .replace('\u{2029}', "\\u2029");
        let body = format!("/**/ typeof {callback} === 'function' && {callback}({json});");
        self.res
            .set_header("Content-Type", "application/json; charset=utf-8");
        self.finish(body.into_bytes())
    }

    /// Render the route's document and respond with it.
    ///
    /// `extra` merges over the context's base props (the error pipeline
    /// seeds those with `{statusCode, message}`); `None` with no base
    /// props renders a props-less page.
    pub fn render(mut self, extra: Option<Value>) -> Result<ResponseParts, RenderError> {
        let props = merge_props(self.base_props.take(), extra);
        let assets = RenderAssets {
            document: &self.bundle.document.component,
            app: &self.bundle.app.component,
            component: &self.bundle.page.component,
            assets: &self.assets,
        };
        let html = self.renderer.render(&assets, props.as_ref())?;
        self.res
            .set_header("Content-Type", "text/html; charset=utf-8");
        Ok(self.finish(html.into_bytes()))
    }

    /// Attach the body unless the request was a `HEAD`.
    fn finish(mut self, body: Vec<u8>) -> ResponseParts {
        if self.req.method != "HEAD" {
            self.res.body = body;
        }
        self.res
    }
}

/// Context for non-error routes: everything [`RenderContext`] offers plus
/// in-page error presentation.
pub struct PageContext {
    ctx: RenderContext,
}

impl PageContext {
    pub(crate) fn new(ctx: RenderContext) -> Self {
        Self { ctx }
    }

    /// Render an error through the *current* route's document and app —
    /// in-page error presentation without redirecting to the error view.
    ///
    /// `props` should carry `statusCode` (500 when absent); `message`
    /// falls back to the standard reason phrase. The response status is
    /// left as previously set.
    pub fn error(self, props: Value) -> Result<ResponseParts, RenderError> {
        let mut map = match props {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let status = map
            .get("statusCode")
            .and_then(Value::as_u64)
            .map_or(500, |s| s as u16);
        map.insert("statusCode".to_string(), Value::from(status));
        let needs_message = !matches!(map.get("message"), Some(Value::String(_)));
        if needs_message {
            map.insert(
                "message".to_string(),
                Value::from(reason_phrase(status)),
            );
        }
        self.ctx.render(Some(Value::Object(map)))
    }

    /// See [`RenderContext::render`].
    pub fn render(self, extra: Option<Value>) -> Result<ResponseParts, RenderError> {
        self.ctx.render(extra)
    }

    /// See [`RenderContext::redirect`].
    #[must_use]
    pub fn redirect(self, target: impl IntoRedirect) -> ResponseParts {
        self.ctx.redirect(target)
    }

    /// See [`RenderContext::json`].
    #[must_use]
    pub fn json(self, value: &Value) -> ResponseParts {
        self.ctx.json(value)
    }

    /// See [`RenderContext::jsonp`].
    #[must_use]
    pub fn jsonp(self, value: &Value, callback: Option<&str>) -> ResponseParts {
        self.ctx.jsonp(value, callback)
    }
}

impl Deref for PageContext {
    type Target = RenderContext;

    fn deref(&self) -> &Self::Target {
        &self.ctx
    }
}

impl DerefMut for PageContext {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.ctx
    }
}

/// JSON serialization with the original "empty for null" behavior.
fn stringify(value: &Value) -> String {
    if value.is_null() {
        return String::new();
    }
    serde_json::to_string(value).unwrap_or_default()
}

fn merge_props(base: Option<Map<String, Value>>, extra: Option<Value>) -> Option<Value> {
    match (base, extra) {
        (None, None) => None,
        (Some(base), None) => Some(Value::Object(base)),
        (None, Some(extra)) => Some(extra),
        (Some(mut base), Some(Value::Object(extra))) => {
            base.extend(extra);
            Some(Value::Object(base))
        }
        // A non-object value cannot merge; it replaces the base outright.
        (Some(_), Some(extra)) => Some(extra),
    }
}

/// Minimal URL encoding for the `Location` header: percent-encode
/// everything outside the RFC 3986 URL character set. CR/LF can never
/// reach the header, which closes off response splitting.
fn encode_url(url: &str) -> String {
    const KEEP: &[u8] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~:/?#[]@!$&'()*+,;=%";
    let mut out = String::with_capacity(url.len());
    for byte in url.bytes() {
        if KEEP.contains(&byte) {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}
