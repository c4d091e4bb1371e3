//! Response accumulation and transport write-out.
//!
//! Context operations and middleware build a [`ResponseParts`] value; the
//! service writes it to the `may_minihttp` response exactly once at the
//! end of the pipeline.

use may_minihttp::Response;

use crate::error::reason_phrase;

/// Accumulated response state for one request.
#[derive(Debug, Clone)]
pub struct ResponseParts {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ResponseParts {
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Set a header, replacing any existing value (case-insensitive name
    /// match).
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    /// Set a header only when absent.
    pub fn set_header_if_absent(&mut self, name: &str, value: impl Into<String>) {
        if self.get_header(name).is_none() {
            self.headers.push((name.to_string(), value.into()));
        }
    }

    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

impl Default for ResponseParts {
    fn default() -> Self {
        Self::new()
    }
}

/// Template-free terminal fallback used when even the error view cannot
/// be rendered. Must not involve the loader or renderer.
#[must_use]
pub fn bare_error(status: u16) -> ResponseParts {
    let mut parts = ResponseParts::new();
    parts.status = status;
    parts.set_header("Content-Type", "text/plain; charset=utf-8");
    parts.body = format!("{} {}", status, reason_phrase(status)).into_bytes();
    parts
}

/// Write accumulated parts to the transport response.
pub fn write_response(res: &mut Response, parts: ResponseParts) {
    res.status_code(parts.status as usize, reason_phrase(parts.status));
    for (name, value) in &parts.headers {
        // may_minihttp wants 'static header lines; requests are short-lived
        // relative to the process so the leak is bounded by response count.
        let header = format!("{name}: {value}").into_boxed_str();
        res.header(Box::leak(header));
    }
    res.body_vec(parts.body);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_header_replaces_case_insensitively() {
        let mut parts = ResponseParts::new();
        parts.set_header("Content-Type", "text/plain");
        parts.set_header("content-type", "text/html");
        assert_eq!(parts.headers.len(), 1);
        assert_eq!(parts.get_header("CONTENT-TYPE"), Some("text/html"));
    }

    #[test]
    fn set_header_if_absent_keeps_existing() {
        let mut parts = ResponseParts::new();
        parts.set_header("X-Powered-By", "custom");
        parts.set_header_if_absent("X-Powered-By", "trellis/0");
        assert_eq!(parts.get_header("x-powered-by"), Some("custom"));
    }

    #[test]
    fn bare_error_is_plain_text() {
        let parts = bare_error(500);
        assert_eq!(parts.status, 500);
        assert_eq!(
            parts.get_header("content-type"),
            Some("text/plain; charset=utf-8")
        );
        assert_eq!(parts.body, b"500 Internal Server Error");
    }
}
