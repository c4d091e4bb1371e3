//! HTTP server and request pipeline.

pub mod http_server;
pub mod request;
pub mod response;
pub mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use request::{parse_request, ParsedRequest};
pub use response::{bare_error, write_response, ResponseParts};
pub use service::{AppService, POWERED_BY};
