//! HTML document rendering.
//!
//! A render is a pure, synchronous function of its inputs: the three
//! template sources (document, app, page component), the asset lists, and
//! the props. No I/O happens here and nothing is cached between calls —
//! the same inputs produce byte-identical output, which keeps tests
//! reproducible and upstream HTTP caching meaningful.
//!
//! Flow mirrors the classic document/app split:
//!
//! 1. `app.html` renders the body markup, wrapping the page component
//!    (`{% include "page.html" %}`).
//! 2. Templates may emit out-of-band head markup through the `head(tag)`
//!    function; tags accumulate per render, in emission order.
//! 3. `document.html` receives the body, the collected head markup, asset
//!    lists, props, and the serialized props for client hydration, and
//!    produces the full document.
//! 4. A doctype declaration is prepended.

use std::fmt;
use std::sync::{Arc, Mutex};

use minijinja::{context, Environment};
use serde_json::Value;

use crate::config::Globals;
use crate::manifest::AssetList;

/// Document/App rendering failed.
#[derive(Debug, Clone)]
pub struct RenderError {
    detail: String,
}

impl RenderError {
    fn new(detail: impl fmt::Display) -> Self {
        Self {
            detail: detail.to_string(),
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "render failed: {}", self.detail)
    }
}

impl std::error::Error for RenderError {}

impl From<minijinja::Error> for RenderError {
    fn from(err: minijinja::Error) -> Self {
        RenderError::new(err)
    }
}

/// Everything one render needs, assembled fresh per call.
pub struct RenderAssets<'a> {
    pub document: &'a str,
    pub app: &'a str,
    pub component: &'a str,
    pub assets: &'a AssetList,
}

/// Renders assembled page bundles into HTML documents.
#[derive(Clone)]
pub struct Renderer {
    mount_id: String,
    state_var: String,
}

impl Renderer {
    #[must_use]
    pub fn new(globals: &Globals) -> Self {
        Self {
            mount_id: globals.mount_id.clone(),
            state_var: globals.state_var.clone(),
        }
    }

    /// Render a full document.
    ///
    /// `props` is `None` when the page has no server-side props; the
    /// document then omits the client state script.
    pub fn render(
        &self,
        assets: &RenderAssets<'_>,
        props: Option<&Value>,
    ) -> Result<String, RenderError> {
        let mut env = Environment::new();
        env.add_template("page.html", assets.component)?;
        env.add_template("app.html", assets.app)?;
        env.add_template("document.html", assets.document)?;

        // Per-render head collector; templates call head("<title>...") to
        // contribute markup outside their own position in the tree.
        let head_tags: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        {
            let head_tags = Arc::clone(&head_tags);
            env.add_function("head", move |tag: String| {
                if let Ok(mut tags) = head_tags.lock() {
                    tags.push(tag);
                }
                String::new()
            });
        }

        let body = env
            .get_template("app.html")?
            .render(context! { props => props })?;

        let head = head_tags
            .lock()
            .map(|tags| tags.join("\n"))
            .unwrap_or_default();

        let props_json = match props {
            Some(value) => Some(escape_for_inline_script(
                &serde_json::to_string(value).map_err(RenderError::new)?,
            )),
            None => None,
        };

        let content = env.get_template("document.html")?.render(context! {
            body => body,
            head => head,
            styles => &assets.assets.styles,
            scripts => &assets.assets.scripts,
            props => props,
            props_json => props_json,
            state_var => &self.state_var,
            mount_id => &self.mount_id,
        })?;

        Ok(format!("<!doctype html>{content}"))
    }
}

/// Escape a JSON string for embedding in an inline `<script>` element:
/// `<`, `>` and `&` become `\uXXXX` escapes so user data can never close
/// the script element or open a comment.
#[must_use]
pub fn escape_for_inline_script(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            _ => out.push(c),
        }
    }
    out
}
