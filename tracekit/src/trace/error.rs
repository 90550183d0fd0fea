use std::sync::PoisonError;
use std::time::Duration;
use thiserror::Error;

/// A specialized `Result` type for recorder lifecycle operations.
pub type TraceResult<T> = Result<T, TraceError>;

/// Errors returned by recorder lifecycle operations.
///
/// Span mutation deliberately has no error channel: tag, metric and error
/// setters are best-effort and log dropped writes instead of surfacing
/// failures to the instrumented code. Only `force_flush` and `shutdown`
/// report outcomes.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TraceError {
    /// A flush or shutdown did not complete before the configured timeout.
    #[error("operation timed out after {} ms", .0.as_millis())]
    TimedOut(Duration),

    /// The recorder was already shut down.
    #[error("recorder already shutdown")]
    AlreadyShutdown,

    /// Other failures not covered by the variants above.
    #[error("{0}")]
    Other(String),
}

impl From<String> for TraceError {
    fn from(err_msg: String) -> Self {
        TraceError::Other(err_msg)
    }
}

impl From<&'static str> for TraceError {
    fn from(err_msg: &'static str) -> Self {
        TraceError::Other(err_msg.into())
    }
}

impl<T> From<PoisonError<T>> for TraceError {
    fn from(err: PoisonError<T>) -> Self {
        TraceError::Other(err.to_string())
    }
}
