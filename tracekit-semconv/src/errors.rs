//! Tag keys under which a span records the error that failed it.

/// Human readable error message.
pub const MSG: &str = "error.msg";

/// Error kind or class name.
pub const TYPE: &str = "error.type";

/// Stack trace or backtrace captured with the error, newline separated.
pub const STACK: &str = "error.stack";
