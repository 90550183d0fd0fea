//! Tag keys for HTTP client and server spans.

/// Span type for HTTP request spans.
pub const TYPE: &str = "http";

/// Resource naming scheme for templated routes (e.g. `/users/:id`).
pub const TEMPLATE: &str = "template";

/// Full URL of the request.
pub const URL: &str = "http.url";

/// Older spelling of [`URL`], kept only so existing adapters can migrate.
#[deprecated(note = "use `http::URL` instead")]
pub const URI: &str = "http.uri";

/// HTTP request method.
pub const METHOD: &str = "http.method";

/// HTTP response status code.
pub const STATUS_CODE: &str = "http.status_code";
