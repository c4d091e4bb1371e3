//! HTTP request parsing.

use std::collections::HashMap;
use std::io::Read;

use http::Method;
use may_minihttp::Request;
use tracing::debug;

use crate::ids::RequestId;

/// Parsed HTTP request data used by the service and exposed to data
/// functions through the render context.
#[derive(Debug, Clone, Default)]
pub struct ParsedRequest {
    /// Correlation id: inbound `X-Request-Id` when valid, else fresh.
    pub request_id: RequestId,
    /// HTTP method.
    pub method: Method,
    /// Path component of the request target, query string removed.
    pub pathname: String,
    /// Raw query string (no leading `?`), empty when absent.
    pub query_string: String,
    /// Parsed query parameters.
    pub query_params: HashMap<String, String>,
    /// Headers with lowercase names.
    pub headers: HashMap<String, String>,
    /// Cookies from the `Cookie` header.
    pub cookies: HashMap<String, String>,
    /// Request body, when one was sent.
    pub body: Option<String>,
}

impl ParsedRequest {
    /// Header lookup by lowercase-insensitive name.
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// Parse cookies from the lowercase header map.
#[must_use]
pub fn parse_cookies(headers: &HashMap<String, String>) -> HashMap<String, String> {
    headers
        .get("cookie")
        .map(|c| {
            c.split(';')
                .filter_map(|pair| {
                    let mut parts = pair.trim().splitn(2, '=');
                    let name = parts.next()?.trim().to_string();
                    let value = parts.next().unwrap_or("").trim().to_string();
                    Some((name, value))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Parse and URL-decode query string parameters from a request target.
#[must_use]
pub fn parse_query_params(target: &str) -> HashMap<String, String> {
    match target.find('?') {
        Some(pos) => url::form_urlencoded::parse(target[pos + 1..].as_bytes())
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        None => HashMap::new(),
    }
}

/// Extract everything the pipeline needs from a raw request.
pub fn parse_request(req: Request) -> ParsedRequest {
    let method = req.method().parse::<Method>().unwrap_or(Method::GET);
    let raw_path = req.path().to_string();
    let pathname = raw_path
        .split('?')
        .next()
        .unwrap_or("/")
        .to_string();
    let query_string = raw_path
        .find('?')
        .map(|pos| raw_path[pos + 1..].to_string())
        .unwrap_or_default();

    let headers: HashMap<String, String> = req
        .headers()
        .iter()
        .map(|h| {
            (
                h.name.to_ascii_lowercase(),
                String::from_utf8_lossy(h.value).to_string(),
            )
        })
        .collect();

    let cookies = parse_cookies(&headers);
    let query_params = parse_query_params(&raw_path);
    let request_id =
        RequestId::from_header_or_new(headers.get("x-request-id").map(String::as_str));

    let body = {
        let mut body_str = String::new();
        match req.body().read_to_string(&mut body_str) {
            Ok(size) if size > 0 => Some(body_str),
            _ => None,
        }
    };

    debug!(
        request_id = %request_id,
        method = %method,
        path = %pathname,
        header_count = headers.len(),
        has_body = body.is_some(),
        "request parsed"
    );

    ParsedRequest {
        request_id,
        method,
        pathname,
        query_string,
        query_params,
        headers,
        cookies,
        body,
    }
}
