//! Failure taxonomy for the request pipeline.
//!
//! Every failure the pipeline can produce is classified into one of the
//! [`PipelineError`] variants so the terminal error handler can derive a
//! status code and a client-safe message without inspecting error strings.
//! Data functions signal explicit HTTP failures by returning an
//! [`HttpError`] inside their `anyhow::Error`; everything else is
//! normalized to a 500 with a non-leaking message outside dev mode.

use std::fmt;

use crate::loader::ModuleLoadError;
use crate::renderer::RenderError;

/// Standard reason phrase for an HTTP status code.
///
/// Used for response status lines, for synthesizing error-page messages
/// when none is supplied, and as the generic public message for 5xx
/// failures in production.
#[must_use]
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        412 => "Precondition Failed",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        415 => "Unsupported Media Type",
        416 => "Range Not Satisfiable",
        418 => "I'm a teapot",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        _ => "Unknown",
    }
}

/// An error carrying an explicit HTTP status and public message.
///
/// Data functions return this (wrapped in `anyhow::Error`) when a failure
/// should surface with a specific status instead of the generic 500, e.g.
/// `Err(HttpError::from_status(403).into())`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    pub status: u16,
    pub message: String,
}

impl HttpError {
    #[must_use]
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Build an error whose message is the standard reason phrase.
    #[must_use]
    pub fn from_status(status: u16) -> Self {
        Self {
            status,
            message: reason_phrase(status).to_string(),
        }
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status, self.message)
    }
}

impl std::error::Error for HttpError {}

/// A request path containing a malformed percent-encoding sequence.
///
/// Surfaced as HTTP 400 by the pipeline, distinct from a no-match (404).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedPathError {
    pub path: String,
}

impl MalformedPathError {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl fmt::Display for MalformedPathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed percent-encoding in path {:?}", self.path)
    }
}

impl std::error::Error for MalformedPathError {}

/// Classified failure produced while handling one request.
///
/// `RouteNotFound` and `MethodNotAllowed` both map to 404: answering 405
/// for a known path would reveal that the route exists.
#[derive(Debug)]
pub enum PipelineError {
    /// No route pattern matched the request path.
    RouteNotFound,
    /// The route exists but does not allow the request method.
    MethodNotAllowed,
    /// The request path contains malformed percent-encoding.
    MalformedPath(MalformedPathError),
    /// A compiled page module was missing or failed to evaluate.
    ModuleLoad(ModuleLoadError),
    /// The page's server-side data function failed or panicked.
    DataFetch(anyhow::Error),
    /// Document/App rendering failed.
    Render(RenderError),
}

impl PipelineError {
    /// HTTP status this failure maps to.
    ///
    /// A `DataFetch` carrying an explicit [`HttpError`] keeps that status;
    /// every other data failure is a 500.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineError::RouteNotFound | PipelineError::MethodNotAllowed => 404,
            PipelineError::MalformedPath(_) => 400,
            PipelineError::ModuleLoad(_) | PipelineError::Render(_) => 500,
            PipelineError::DataFetch(err) => err
                .downcast_ref::<HttpError>()
                .map_or(500, |http| http.status),
        }
    }

    /// Message safe to embed in the client-facing error page.
    ///
    /// Outside dev mode, 5xx detail is replaced by the reason phrase; the
    /// original error is only ever written to the server log.
    #[must_use]
    pub fn public_message(&self, dev: bool) -> String {
        let status = self.status_code();
        if let PipelineError::DataFetch(err) = self {
            if let Some(http) = err.downcast_ref::<HttpError>() {
                return http.message.clone();
            }
        }
        if status >= 500 && !dev {
            return reason_phrase(status).to_string();
        }
        match self {
            PipelineError::RouteNotFound | PipelineError::MethodNotAllowed => {
                reason_phrase(404).to_string()
            }
            PipelineError::MalformedPath(err) => err.to_string(),
            PipelineError::ModuleLoad(err) => err.to_string(),
            PipelineError::DataFetch(err) => err.to_string(),
            PipelineError::Render(err) => err.to_string(),
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::RouteNotFound => write!(f, "no route matched"),
            PipelineError::MethodNotAllowed => write!(f, "method not allowed for route"),
            PipelineError::MalformedPath(err) => err.fmt(f),
            PipelineError::ModuleLoad(err) => err.fmt(f),
            PipelineError::DataFetch(err) => write!(f, "data function failed: {err}"),
            PipelineError::Render(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<MalformedPathError> for PipelineError {
    fn from(err: MalformedPathError) -> Self {
        PipelineError::MalformedPath(err)
    }
}

impl From<ModuleLoadError> for PipelineError {
    fn from(err: ModuleLoadError) -> Self {
        PipelineError::ModuleLoad(err)
    }
}

impl From<RenderError> for PipelineError {
    fn from(err: RenderError) -> Self {
        PipelineError::Render(err)
    }
}
