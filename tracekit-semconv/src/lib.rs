//! # Tracekit Semantic Conventions
//!
//! Reserved tag keys, span types and header names shared by every
//! instrumentation adapter. Adapters must use these constants (exact
//! spelling matters for cross-adapter consistency) rather than inline
//! string literals.
#![deny(missing_docs, unreachable_pub, missing_debug_implementations)]

pub mod app_types;
pub mod errors;
pub mod http;
pub mod net;
pub mod span_types;

/// Numeric tag holding the time a request spent waiting in a queue before
/// being processed, in whole seconds. Never negative; a negative computed
/// value indicates clock skew and must be discarded rather than recorded.
pub const QUEUEING: &str = "queueing";

/// Inbound header carrying the trace id of a distributed trace.
pub const HTTP_HEADER_TRACE_ID: &str = "x-trace-id";

/// Inbound header carrying the parent span id of a distributed trace.
pub const HTTP_HEADER_PARENT_ID: &str = "x-parent-id";

/// Inbound header carrying the upstream request start time, in the fixed
/// format `t=<unix-seconds>.<milliseconds>`.
pub const HTTP_HEADER_REQUEST_START: &str = "x-request-start";
