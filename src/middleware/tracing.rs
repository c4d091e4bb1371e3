use std::time::Duration;

use tracing::info;

use super::Middleware;
use crate::server::request::ParsedRequest;
use crate::server::ResponseParts;

/// Structured request/response logging.
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn before(&self, req: &ParsedRequest) -> Option<ResponseParts> {
        info!(
            request_id = %req.request_id,
            method = %req.method,
            path = %req.pathname,
            "request received"
        );
        None
    }

    fn after(&self, req: &ParsedRequest, res: &mut ResponseParts, latency: Duration) {
        info!(
            request_id = %req.request_id,
            method = %req.method,
            path = %req.pathname,
            status = res.status,
            latency_ms = latency.as_millis() as u64,
            "request completed"
        );
    }
}
