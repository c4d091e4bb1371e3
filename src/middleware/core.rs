use std::sync::Arc;
use std::time::Duration;

use crate::server::request::ParsedRequest;
use crate::server::ResponseParts;

/// Hooks around the route handler.
///
/// `before` may short-circuit the pipeline by returning a response;
/// `after` observes (and may amend) the response on the way out.
pub trait Middleware: Send + Sync {
    fn before(&self, _req: &ParsedRequest) -> Option<ResponseParts> {
        None
    }
    fn after(&self, _req: &ParsedRequest, _res: &mut ResponseParts, _latency: Duration) {}
}

/// Registration form of one user middleware.
///
/// Entries are resolved into a uniform `(mount path, handler)` sequence
/// once at setup, so the request path does no type inspection.
#[derive(Clone)]
pub enum MiddlewareEntry {
    /// Runs for every request.
    Bare(Arc<dyn Middleware>),
    /// Runs only for paths under `route`.
    Mounted {
        route: String,
        handler: Arc<dyn Middleware>,
    },
}

/// One resolved `(mount, handler)` pair.
#[derive(Clone)]
pub struct ResolvedMiddleware {
    pub mount: String,
    pub handler: Arc<dyn Middleware>,
}

impl ResolvedMiddleware {
    /// Mount check: `/` matches everything, otherwise the pathname must
    /// equal the mount or continue it at a `/` boundary.
    #[must_use]
    pub fn applies_to(&self, pathname: &str) -> bool {
        if self.mount == "/" {
            return true;
        }
        match pathname.strip_prefix(self.mount.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

/// Flatten registration entries into the uniform ordered sequence.
#[must_use]
pub fn resolve_entries(entries: Vec<MiddlewareEntry>) -> Vec<ResolvedMiddleware> {
    entries
        .into_iter()
        .map(|entry| match entry {
            MiddlewareEntry::Bare(handler) => ResolvedMiddleware {
                mount: "/".to_string(),
                handler,
            },
            MiddlewareEntry::Mounted { route, handler } => ResolvedMiddleware {
                mount: if route.is_empty() {
                    "/".to_string()
                } else {
                    route.trim_end_matches('/').to_string()
                },
                handler,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nop;
    impl Middleware for Nop {}

    fn mounted(route: &str) -> ResolvedMiddleware {
        let entries = vec![MiddlewareEntry::Mounted {
            route: route.to_string(),
            handler: Arc::new(Nop),
        }];
        resolve_entries(entries).remove(0)
    }

    #[test]
    fn bare_entries_mount_at_root() {
        let resolved = resolve_entries(vec![MiddlewareEntry::Bare(Arc::new(Nop))]);
        assert_eq!(resolved[0].mount, "/");
        assert!(resolved[0].applies_to("/anything"));
    }

    #[test]
    fn mounted_entries_match_at_segment_boundaries() {
        let api = mounted("/api");
        assert!(api.applies_to("/api"));
        assert!(api.applies_to("/api/users"));
        assert!(!api.applies_to("/apiv2"));
        assert!(!api.applies_to("/other"));
    }

    #[test]
    fn trailing_slash_on_mount_is_normalized() {
        let api = mounted("/api/");
        assert!(api.applies_to("/api"));
        assert!(api.applies_to("/api/users"));
    }
}
