//! # Span
//!
//! A `Span` represents one timed unit of work. Each trace consists of one
//! or more spans: a root span that typically covers the end-to-end latency
//! of a request, and optionally nested sub-spans for its sub-operations.
//!
//! A span is created through a [`Tracer`], mutated by the call stack that
//! owns it (tags, metrics, resource, error state) while open, and finished
//! exactly once. On the first finish the span stamps its end time and
//! hands an immutable export representation to the tracer's bound
//! recorder; finishing again is a no-op. A span that is never finished is
//! never recorded.
//!
//! [`Tracer`]: crate::trace::Tracer
use crate::trace::{SpanId, TraceId, Tracer};
use serde::Serialize;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use tracekit_semconv::errors;
use tracing::debug;

/// Error state of a span. `Ok` maps to the wire value 0, `Error` to 1.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SpanStatus {
    /// The unit of work completed without error.
    #[default]
    Ok,
    /// The unit of work failed. Details live under the `error.*` tags.
    Error,
}

impl SpanStatus {
    fn as_u32(self) -> u32 {
        match self {
            SpanStatus::Ok => 0,
            SpanStatus::Error => 1,
        }
    }
}

/// Single timed operation within a trace.
#[derive(Debug)]
pub struct Span {
    pub(crate) span_id: SpanId,
    pub(crate) trace_id: TraceId,
    pub(crate) parent_id: SpanId,
    pub(crate) name: Cow<'static, str>,
    pub(crate) service: Option<Cow<'static, str>>,
    pub(crate) resource: Option<Cow<'static, str>>,
    pub(crate) span_type: Option<Cow<'static, str>>,
    pub(crate) start_time: SystemTime,
    pub(crate) end_time: Option<SystemTime>,
    pub(crate) meta: HashMap<String, String>,
    pub(crate) metrics: HashMap<String, f64>,
    pub(crate) status: SpanStatus,
    pub(crate) sampled: bool,
    pub(crate) tracer: Tracer,
}

impl Span {
    /// The identifier of this span, unique within the process.
    pub fn span_id(&self) -> SpanId {
        self.span_id
    }

    /// The identifier shared by every span in this trace.
    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// The identifier of the parent span, [`SpanId::INVALID`] for roots.
    pub fn parent_id(&self) -> SpanId {
        self.parent_id
    }

    /// The operation name. A stable, low-cardinality string such as
    /// `http.request` or `sidekiq.job`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The logical service owning this span, if one was set or inherited.
    pub fn service(&self) -> Option<&str> {
        self.service.as_deref()
    }

    /// The specific operation target (e.g. `GET /users`). Falls back to
    /// the span name when unset, so it always resolves to a value.
    pub fn resource(&self) -> &str {
        self.resource.as_deref().unwrap_or(&self.name)
    }

    /// The span type category, e.g. `http` or `db`.
    pub fn span_type(&self) -> Option<&str> {
        self.span_type.as_deref()
    }

    /// Wall-clock instant at which the operation started.
    pub fn start_time(&self) -> SystemTime {
        self.start_time
    }

    /// Wall-clock instant at which the span was finished, `None` while
    /// the span is still open.
    pub fn end_time(&self) -> Option<SystemTime> {
        self.end_time
    }

    /// Whether the span has been finished.
    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }

    /// Error state of the span.
    pub fn status(&self) -> SpanStatus {
        self.status
    }

    /// Whether this span is a candidate for sampling. Defaults to `true`;
    /// reserved for future sampling decisions.
    pub fn sampled(&self) -> bool {
        self.sampled
    }

    /// Set the sampling flag.
    pub fn set_sampled(&mut self, sampled: bool) {
        self.sampled = sampled;
    }

    /// Replace the owning service name.
    pub fn set_service(&mut self, service: impl Into<Cow<'static, str>>) {
        self.service = Some(service.into());
    }

    /// Replace the resource. Middleware often sets this late, once the
    /// routed operation is known.
    pub fn set_resource(&mut self, resource: impl Into<Cow<'static, str>>) {
        self.resource = Some(resource.into());
    }

    /// Replace the span type.
    pub fn set_span_type(&mut self, span_type: impl Into<Cow<'static, str>>) {
        self.span_type = Some(span_type.into());
    }

    /// Set the given key / value tag pair on the span. The value is
    /// coerced to its string representation; keys are unique and a second
    /// write wins. A valid example is:
    ///
    /// ```
    /// # let tracer = tracekit::trace::Tracer::builder().build();
    /// # let mut span = tracer.start("http.request");
    /// span.set_tag("http.method", "GET");
    /// ```
    pub fn set_tag(&mut self, key: impl Into<String>, value: impl fmt::Display) {
        self.meta.insert(key.into(), value.to_string());
    }

    /// Return the tag with the given key, `None` if it doesn't exist.
    pub fn get_tag(&self, key: &str) -> Option<&str> {
        self.meta.get(key).map(String::as_str)
    }

    /// Set the given key / value metric pair on the span. Values must be
    /// finite; a NaN or infinite value is dropped with a diagnostic and
    /// any prior value for the key is kept.
    pub fn set_metric(&mut self, key: impl Into<String>, value: f64) {
        let key = key.into();
        if !value.is_finite() {
            debug!(
                key = key.as_str(),
                value, "unable to set non-finite metric, ignoring it"
            );
            return;
        }
        self.metrics.insert(key, value);
    }

    /// Return the metric with the given key, `None` if it doesn't exist.
    pub fn get_metric(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).copied()
    }

    /// Mark the span with the given error.
    ///
    /// Sets the status to [`SpanStatus::Error`] and records the error's
    /// message, type name and source chain under the reserved `error.*`
    /// tags. Errors without a message or source chain only get the type
    /// tag.
    pub fn set_error<E: std::error::Error>(&mut self, err: &E) {
        self.status = SpanStatus::Error;
        self.meta.insert(
            errors::TYPE.to_string(),
            std::any::type_name::<E>().to_string(),
        );

        let msg = err.to_string();
        if !msg.is_empty() {
            self.meta.insert(errors::MSG.to_string(), msg);
        }

        let mut chain = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }
        if !chain.is_empty() {
            self.meta.insert(errors::STACK.to_string(), chain.join("\n"));
        }
    }

    /// Rebind this span under the given parent, inheriting the parent's
    /// service if none was explicitly set. Passing `None` resets the span
    /// to root semantics: `trace_id` becomes the span's own id and
    /// `parent_id` becomes [`SpanId::INVALID`].
    pub fn set_parent(&mut self, parent: Option<&Span>) {
        match parent {
            Some(parent) => {
                self.trace_id = parent.trace_id;
                self.parent_id = parent.span_id;
                if self.service.is_none() {
                    self.service = parent.service.clone();
                }
            }
            None => {
                self.trace_id = TraceId::from(self.span_id);
                self.parent_id = SpanId::INVALID;
            }
        }
    }

    /// Mark the span finished at the current time and submit it to the
    /// bound recorder.
    pub fn finish(&mut self) {
        self.finish_at(SystemTime::now());
    }

    /// Mark the span finished at the given time and submit it.
    ///
    /// Idempotent: only the first call stamps the end time and hands the
    /// span off; later calls are no-ops, so there is no double counting
    /// and no double handoff. A `finish_time` earlier than the start time
    /// is passed through uncorrected and yields a negative duration.
    pub fn finish_at(&mut self, finish_time: SystemTime) {
        if self.is_finished() {
            return;
        }
        self.end_time = Some(finish_time);
        let data = self.exported_data();
        self.tracer.record(data);
    }

    /// Convert the information in this span into its deterministic export
    /// representation. The start timestamp and duration are only present
    /// once the span is finished.
    pub fn exported_data(&self) -> SpanData {
        let (start, duration) = match self.end_time {
            Some(end_time) => (
                Some(nanos_since_epoch(self.start_time)),
                Some(signed_duration_nanos(self.start_time, end_time)),
            ),
            None => (None, None),
        };

        SpanData {
            span_id: self.span_id,
            trace_id: self.trace_id,
            parent_id: self.parent_id,
            name: self.name.to_string(),
            service: self.service.as_ref().map(|s| s.to_string()),
            resource: self.resource().to_string(),
            span_type: self.span_type.as_ref().map(|s| s.to_string()),
            meta: self.meta.clone(),
            metrics: self.metrics.clone(),
            error: self.status.as_u32(),
            start,
            duration,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Span(name:{},sid:{},tid:{},pid:{})",
            self.name, self.span_id, self.trace_id, self.parent_id
        )
    }
}

/// Immutable export representation of a finished span, as handed to a
/// [`Recorder`].
///
/// `start` is nanoseconds since the Unix epoch and `duration` is the
/// signed span length in nanoseconds; both are `None` for spans exported
/// before they were finished. A negative duration is possible when a
/// caller supplied an out-of-order finish time and is deliberately not
/// clamped.
///
/// [`Recorder`]: crate::trace::Recorder
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SpanData {
    /// Span identifier.
    pub span_id: SpanId,
    /// Trace identifier.
    pub trace_id: TraceId,
    /// Parent span identifier, [`SpanId::INVALID`] for roots.
    pub parent_id: SpanId,
    /// Operation name.
    pub name: String,
    /// Owning service, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Resolved resource; never empty, falls back to the name.
    pub resource: String,
    /// Span type category.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub span_type: Option<String>,
    /// String tags.
    pub meta: HashMap<String, String>,
    /// Numeric metrics.
    pub metrics: HashMap<String, f64>,
    /// Error flag: 0 ok, 1 error.
    pub error: u32,
    /// Start timestamp in nanoseconds since the Unix epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<u64>,
    /// Duration in nanoseconds. May be negative, see type docs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
}

fn nanos_since_epoch(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

fn signed_duration_nanos(start: SystemTime, end: SystemTime) -> i64 {
    match end.duration_since(start) {
        Ok(elapsed) => elapsed.as_nanos() as i64,
        Err(err) => -(err.duration().as_nanos() as i64),
    }
}
