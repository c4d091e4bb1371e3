//! Router core - hot path for request routing.
//!
//! Routes are not configured anywhere; they are derived from manifest keys.
//! A key mirrors the page's file path (`blog/_id`, `docs/index`), and the
//! derived pattern strips a trailing `index` segment and turns `_name`
//! segments into named parameters. Matching precedence is manifest document
//! order, first match wins — a parameterized route declared before a
//! literal one shadows it, and that is the contract, not an accident.

use std::sync::Arc;

use regex::Regex;
use smallvec::SmallVec;
use tracing::{debug, info, warn};

use crate::error::MalformedPathError;
use crate::manifest::{AssetList, Manifest, ERROR_ROUTE};

/// Maximum number of path parameters before heap allocation.
/// Route patterns rarely carry more than a couple of `_name` segments.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage for the hot path.
///
/// Names come from the route table built at load time (`Arc<str>`, O(1)
/// clone); values are per-request strings decoded from the URL.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Result of matching a request path against the route table.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// Manifest key of the matched page, or `_error` when nothing matched.
    pub name: String,
    /// Percent-decoded path parameters in pattern order.
    pub params: ParamVec,
    /// Client assets of the matched page.
    pub assets: AssetList,
}

impl RouteMatch {
    /// Get a path parameter by name.
    #[inline]
    #[must_use]
    pub fn get_param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

struct RoutePattern {
    name: String,
    route: String,
    regex: Regex,
    param_names: Vec<Arc<str>>,
}

/// Matches request paths against patterns derived from one manifest
/// snapshot.
///
/// The router owns the `Arc<Manifest>` it was built from, so a single
/// router swap replaces routes and asset lists together; a request that
/// grabbed a router keeps one coherent view for its whole lifetime.
pub struct Router {
    patterns: Vec<RoutePattern>,
    manifest: Arc<Manifest>,
}

impl Router {
    /// Derive the route table from a manifest snapshot.
    ///
    /// Every key except `_error` contributes one pattern, in manifest
    /// order.
    #[must_use]
    pub fn from_manifest(manifest: Arc<Manifest>) -> Self {
        let mut patterns = Vec::with_capacity(manifest.len().saturating_sub(1));
        for (name, _) in manifest.iter() {
            if name == ERROR_ROUTE {
                continue;
            }
            let route = derive_route(name);
            match compile_route(&route) {
                Ok((regex, param_names)) => patterns.push(RoutePattern {
                    name: name.to_string(),
                    route,
                    regex,
                    param_names,
                }),
                Err(err) => {
                    warn!(route = %name, error = %err, "skipping manifest key with uncompilable pattern");
                }
            }
        }

        let routes_summary: Vec<&str> =
            patterns.iter().take(10).map(|p| p.route.as_str()).collect();
        info!(
            routes_count = patterns.len(),
            routes_summary = ?routes_summary,
            "routing table loaded"
        );

        Self { patterns, manifest }
    }

    /// The manifest snapshot this router was derived from.
    #[must_use]
    pub fn manifest(&self) -> &Arc<Manifest> {
        &self.manifest
    }

    /// Match a request path.
    ///
    /// The whole path is percent-validated up front: a malformed escape
    /// sequence is a `MalformedPathError` (HTTP 400) even when no route
    /// would have matched, never a silent no-match. Matching is exact,
    /// case-insensitive, and trailing-slash-strict; parameter values are
    /// strictly percent-decoded. When nothing matches, the `_error`
    /// fallback is returned with empty params.
    pub fn match_path(&self, pathname: &str) -> Result<RouteMatch, MalformedPathError> {
        percent_decode_strict(pathname).ok_or_else(|| MalformedPathError::new(pathname))?;

        for pattern in &self.patterns {
            let Some(captures) = pattern.regex.captures(pathname) else {
                continue;
            };
            let mut params = ParamVec::new();
            for (pos, name) in pattern.param_names.iter().enumerate() {
                if let Some(value) = captures.get(pos + 1) {
                    let decoded = percent_decode_strict(value.as_str())
                        .ok_or_else(|| MalformedPathError::new(pathname))?;
                    params.push((Arc::clone(name), decoded));
                }
            }
            debug!(path = %pathname, route = %pattern.route, name = %pattern.name, "route matched");
            return Ok(RouteMatch {
                name: pattern.name.clone(),
                params,
                assets: self.manifest.get_or_error(&pattern.name),
            });
        }

        debug!(path = %pathname, "no route matched, falling back to error view");
        Ok(RouteMatch {
            name: ERROR_ROUTE.to_string(),
            params: ParamVec::new(),
            assets: self.manifest.get_or_error(ERROR_ROUTE),
        })
    }
}

/// Derive the route pattern for a manifest key.
///
/// A trailing `index` segment is stripped and `_name` segments become
/// `:name` parameters: `"index"` → `/`, `"blog/_id"` → `/blog/:id`,
/// `"docs/index"` → `/docs`.
#[must_use]
pub fn derive_route(key: &str) -> String {
    let mut segments: Vec<&str> = key.split('/').filter(|s| !s.is_empty()).collect();
    if segments.last() == Some(&"index") {
        segments.pop();
    }
    if segments.is_empty() {
        return "/".to_string();
    }
    let mut route = String::with_capacity(key.len() + 1);
    for segment in segments {
        route.push('/');
        if let Some(param) = segment.strip_prefix('_') {
            route.push(':');
            route.push_str(param);
        } else {
            route.push_str(segment);
        }
    }
    route
}

/// Compile a derived route into an anchored case-insensitive regex plus
/// its parameter names in capture order.
fn compile_route(route: &str) -> Result<(Regex, Vec<Arc<str>>), regex::Error> {
    if route == "/" {
        return Ok((Regex::new(r"(?i)^/$")?, Vec::new()));
    }

    let mut pattern = String::with_capacity(route.len() + 8);
    pattern.push_str("(?i)^");
    let mut param_names = Vec::new();

    for segment in route.split('/').filter(|s| !s.is_empty()) {
        if let Some(param) = segment.strip_prefix(':') {
            pattern.push_str("/([^/]+)");
            param_names.push(Arc::<str>::from(param));
        } else {
            pattern.push('/');
            pattern.push_str(&regex::escape(segment));
        }
    }

    pattern.push('$');
    Ok((Regex::new(&pattern)?, param_names))
}

/// Strict percent-decoding.
///
/// Unlike the lossy decoders that pass malformed sequences through, this
/// rejects a `%` that is not followed by two hex digits, and byte
/// sequences that do not form valid UTF-8 — both must surface as an error
/// the pipeline can map to HTTP 400.
#[must_use]
pub fn percent_decode_strict(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut pos = 0;
    while pos < bytes.len() {
        let byte = bytes[pos];
        if byte == b'%' {
            let hi = bytes.get(pos + 1).copied().and_then(hex_value)?;
            let lo = bytes.get(pos + 2).copied().and_then(hex_value)?;
            out.push(hi * 16 + lo);
            pos += 3;
        } else {
            out.push(byte);
            pos += 1;
        }
    }
    String::from_utf8(out).ok()
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn router(manifest: serde_json::Value) -> Router {
        Router::from_manifest(Arc::new(Manifest::from_json(&manifest)))
    }

    fn site() -> Router {
        router(json!({
            "_error": {"styles": [], "scripts": []},
            "index": {"styles": ["/s.css"], "scripts": ["/a.js"]},
            "blog/index": {"styles": [], "scripts": []},
            "blog/_id": {"styles": [], "scripts": []},
            "docs/_section/_page": {"styles": [], "scripts": []},
        }))
    }

    #[test]
    fn derive_route_shapes() {
        assert_eq!(derive_route("index"), "/");
        assert_eq!(derive_route("about"), "/about");
        assert_eq!(derive_route("docs/index"), "/docs");
        assert_eq!(derive_route("blog/_id"), "/blog/:id");
        assert_eq!(derive_route("docs/_section/_page"), "/docs/:section/:page");
    }

    #[test]
    fn root_path_matches_index() {
        let m = site().match_path("/").unwrap();
        assert_eq!(m.name, "index");
        assert!(m.params.is_empty());
        assert_eq!(m.assets.scripts, vec!["/a.js"]);
    }

    #[test]
    fn parameter_extraction() {
        let m = site().match_path("/docs/intro/install").unwrap();
        assert_eq!(m.name, "docs/_section/_page");
        assert_eq!(m.get_param("section"), Some("intro"));
        assert_eq!(m.get_param("page"), Some("install"));
    }

    #[test]
    fn matching_is_case_insensitive() {
        let m = site().match_path("/BLOG").unwrap();
        assert_eq!(m.name, "blog/index");
    }

    #[test]
    fn trailing_slash_is_strict() {
        let m = site().match_path("/blog/").unwrap();
        assert_eq!(m.name, ERROR_ROUTE);
    }

    #[test]
    fn no_partial_matches() {
        let m = site().match_path("/blog/7/comments").unwrap();
        assert_eq!(m.name, ERROR_ROUTE);
    }

    #[test]
    fn params_are_percent_decoded() {
        let m = site().match_path("/blog/hello%20world").unwrap();
        assert_eq!(m.get_param("id"), Some("hello world"));
    }

    #[test]
    fn unmatched_path_falls_back_to_error_route() {
        let m = site().match_path("/nothing/here").unwrap();
        assert_eq!(m.name, ERROR_ROUTE);
        assert!(m.params.is_empty());
    }

    #[test]
    fn malformed_escape_is_an_error_even_without_a_match() {
        assert!(site().match_path("/%").is_err());
        assert!(site().match_path("/nothing/%zz").is_err());
        assert!(site().match_path("/blog/%e0%a4").is_err()); // truncated UTF-8
    }

    #[test]
    fn manifest_order_decides_precedence() {
        // "a/index" is declared before "a/_id": the literal wins for /a,
        // and the parameterized route takes everything else under /a/.
        let r = router(json!({
            "a/index": {"styles": [], "scripts": []},
            "a/_id": {"styles": [], "scripts": []},
            "_error": {"styles": [], "scripts": []},
        }));
        let m = r.match_path("/a/5").unwrap();
        assert_eq!(m.name, "a/_id");
        assert_eq!(m.get_param("id"), Some("5"));

        // Declared the other way around, the parameterized route shadows
        // the literal: first-match-in-manifest-order is the rule, literal
        // routes get no special priority.
        let r = router(json!({
            "a/_id": {"styles": [], "scripts": []},
            "a/b": {"styles": [], "scripts": []},
            "_error": {"styles": [], "scripts": []},
        }));
        let m = r.match_path("/a/b").unwrap();
        assert_eq!(m.name, "a/_id");
        assert_eq!(m.get_param("id"), Some("b"));
    }

    #[test]
    fn strict_decode() {
        assert_eq!(percent_decode_strict("plain"), Some("plain".to_string()));
        assert_eq!(percent_decode_strict("%41%2F"), Some("A/".to_string()));
        assert!(percent_decode_strict("%").is_none());
        assert!(percent_decode_strict("%4").is_none());
        assert!(percent_decode_strict("%gg").is_none());
        assert!(percent_decode_strict("%ff").is_none()); // invalid UTF-8
    }
}
