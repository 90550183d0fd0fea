//! Tag keys describing the remote endpoint of outbound calls.

/// Hostname of the remote endpoint.
pub const TARGET_HOST: &str = "out.host";

/// Port of the remote endpoint.
pub const TARGET_PORT: &str = "out.port";
