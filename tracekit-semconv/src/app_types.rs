//! Application type vocabulary used when registering a service.

/// Web application or HTTP server.
pub const WEB: &str = "web";

/// Database or storage engine.
pub const DB: &str = "db";

/// Cache layer.
pub const CACHE: &str = "cache";

/// Background worker process.
pub const WORKER: &str = "worker";
