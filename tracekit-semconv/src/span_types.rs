//! Span type vocabulary. One of these goes in a span's `span_type` field so
//! the backend can group spans by the kind of work they represent.

/// HTTP request handling.
pub const HTTP: &str = "http";

/// Database query.
pub const DB: &str = "db";

/// Time spent waiting in a queue before processing.
pub const QUEUE: &str = "queue";

/// Background job execution.
pub const JOB: &str = "job";

/// Worker-pool task execution.
pub const WORKER: &str = "worker";

/// Work done by an upstream process before the request reached this one.
pub const UPSTREAM: &str = "upstream";
