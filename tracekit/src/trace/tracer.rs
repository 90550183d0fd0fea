//! # Tracer
//!
//! The `Tracer` mints identifiers, applies the parent binding rules that
//! stitch spans into traces, and owns the [`Recorder`] that receives
//! finished spans.
//!
//! Parent binding, applied at span start:
//! 1. an explicit parent [`Span`] supplied on the builder wins: the child
//!    adopts its trace id and span id;
//! 2. otherwise explicit numeric ids (e.g. parsed from inbound
//!    propagation headers) are adopted directly, supporting cross-process
//!    continuation where the parent span is not locally representable;
//! 3. otherwise the new span is a trace root.
use crate::trace::{
    IdGenerator, NoopRecorder, RandomIdGenerator, Recorder, Span, SpanData, SpanId, SpanStatus,
    TraceId, TraceResult,
};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

/// `Tracer` creates spans and hands them to the bound [`Recorder`] once
/// finished. Cloning is cheap and clones share all state.
#[derive(Clone, Debug)]
pub struct Tracer {
    inner: Arc<TracerInner>,
}

#[derive(Debug)]
struct TracerInner {
    id_generator: Box<dyn IdGenerator>,
    recorder: Box<dyn Recorder>,
    default_service: Option<Cow<'static, str>>,
    enabled: AtomicBool,
}

impl Tracer {
    /// Start building a new `Tracer`.
    pub fn builder() -> TracerBuilder {
        TracerBuilder::default()
    }

    /// Whether finished spans are currently submitted to the recorder.
    pub fn enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Relaxed)
    }

    /// Enable or disable span submission. A disabled tracer still mints
    /// spans, so they remain usable as parents, but drops them at record
    /// time.
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Returns a new span builder for an operation with the given name.
    pub fn span_builder<'a>(&self, name: impl Into<Cow<'static, str>>) -> SpanBuilder<'a> {
        SpanBuilder::from_name(name)
    }

    /// Start a new root span with default options.
    pub fn start(&self, name: impl Into<Cow<'static, str>>) -> Span {
        self.build(SpanBuilder::from_name(name))
    }

    /// Start a span from a builder, applying the parent binding rules.
    ///
    /// Never fails; missing options degrade to defaults.
    pub fn build(&self, builder: SpanBuilder<'_>) -> Span {
        let span_id = self.inner.id_generator.next_id();

        // Explicit parent span wins over explicit numeric ids; with
        // neither the span is its own trace root.
        let (trace_id, parent_id, inherited_service) = match builder.parent {
            Some(parent) => (parent.trace_id, parent.span_id, parent.service.clone()),
            None => (
                builder.trace_id.unwrap_or_else(|| TraceId::from(span_id)),
                builder.parent_id.unwrap_or(SpanId::INVALID),
                None,
            ),
        };

        let service = builder
            .service
            .or(inherited_service)
            .or_else(|| self.inner.default_service.clone());

        Span {
            span_id,
            trace_id,
            parent_id,
            name: builder.name,
            service,
            resource: builder.resource,
            span_type: builder.span_type,
            start_time: builder.start_time.unwrap_or_else(SystemTime::now),
            end_time: None,
            meta: HashMap::new(),
            metrics: HashMap::new(),
            status: SpanStatus::Ok,
            sampled: builder.sampled.unwrap_or(true),
            tracer: self.clone(),
        }
    }

    /// Run `f` inside a root span with the given name, finishing the span
    /// when `f` returns.
    pub fn in_span<T, F>(&self, name: impl Into<Cow<'static, str>>, f: F) -> T
    where
        F: FnOnce(&mut Span) -> T,
    {
        self.with_span(SpanBuilder::from_name(name), f)
    }

    /// Run `f` inside a span built from `builder`, finishing the span
    /// when `f` returns.
    pub fn with_span<T, F>(&self, builder: SpanBuilder<'_>, f: F) -> T
    where
        F: FnOnce(&mut Span) -> T,
    {
        let mut span = self.build(builder);
        let result = f(&mut span);
        span.finish();
        result
    }

    /// Run a fallible operation inside a span built from `builder`.
    ///
    /// An `Err` is recorded on the span for visibility and then returned
    /// unchanged; the tracing layer is transparent to failures in the
    /// traced code. The span is finished either way.
    pub fn try_with_span<T, E, F>(&self, builder: SpanBuilder<'_>, f: F) -> Result<T, E>
    where
        E: std::error::Error,
        F: FnOnce(&mut Span) -> Result<T, E>,
    {
        let mut span = self.build(builder);
        let result = f(&mut span);
        if let Err(err) = &result {
            span.set_error(err);
        }
        span.finish();
        result
    }

    /// Force the recorder to flush buffered spans.
    pub fn force_flush(&self) -> TraceResult<()> {
        self.inner.recorder.force_flush()
    }

    /// Shut down the recorder, flushing what it holds.
    pub fn shutdown(&self) -> TraceResult<()> {
        self.inner.recorder.shutdown()
    }

    /// Submit a finished span to the recorder. Called exactly once per
    /// span, from the first `finish`.
    pub(crate) fn record(&self, span: SpanData) {
        if !self.enabled() {
            debug!(name = span.name.as_str(), "tracer disabled, dropping span");
            return;
        }
        self.inner.recorder.record(span);
    }
}

/// Builder for [`Tracer`].
#[derive(Debug)]
pub struct TracerBuilder {
    id_generator: Option<Box<dyn IdGenerator>>,
    recorder: Option<Box<dyn Recorder>>,
    default_service: Option<Cow<'static, str>>,
    enabled: bool,
}

impl Default for TracerBuilder {
    fn default() -> Self {
        TracerBuilder {
            id_generator: None,
            recorder: None,
            default_service: None,
            enabled: true,
        }
    }
}

impl TracerBuilder {
    /// Use the given [`IdGenerator`] instead of the random default.
    pub fn with_id_generator(mut self, id_generator: impl IdGenerator + 'static) -> Self {
        self.id_generator = Some(Box::new(id_generator));
        self
    }

    /// Bind the [`Recorder`] that receives finished spans. Without one
    /// the tracer discards everything it produces.
    pub fn with_recorder(mut self, recorder: impl Recorder + 'static) -> Self {
        self.recorder = Some(Box::new(recorder));
        self
    }

    /// Service applied to spans that neither set one explicitly nor
    /// inherit one from a parent.
    pub fn with_default_service(mut self, service: impl Into<Cow<'static, str>>) -> Self {
        self.default_service = Some(service.into());
        self
    }

    /// Start the tracer enabled or disabled.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Build the configured [`Tracer`].
    pub fn build(self) -> Tracer {
        Tracer {
            inner: Arc::new(TracerInner {
                id_generator: self
                    .id_generator
                    .unwrap_or_else(|| Box::new(RandomIdGenerator::default())),
                recorder: self.recorder.unwrap_or_else(|| Box::new(NoopRecorder)),
                default_service: self.default_service,
                enabled: AtomicBool::new(self.enabled),
            }),
        }
    }
}

/// Options for starting a new [`Span`].
///
/// ```
/// use tracekit::trace::Tracer;
/// use tracekit_semconv::span_types;
///
/// let tracer = Tracer::builder().build();
/// let span = tracer
///     .span_builder("sql.query")
///     .with_service("billing-db")
///     .with_resource("SELECT FROM invoices")
///     .with_span_type(span_types::DB)
///     .start(&tracer);
/// ```
#[derive(Clone, Debug, Default)]
pub struct SpanBuilder<'a> {
    /// Operation name.
    pub name: Cow<'static, str>,
    /// Owning service; inherited from the parent or the tracer default
    /// when unset.
    pub service: Option<Cow<'static, str>>,
    /// Operation target; resolves to the name when unset.
    pub resource: Option<Cow<'static, str>>,
    /// Span type category.
    pub span_type: Option<Cow<'static, str>>,
    /// Start instant; defaults to now.
    pub start_time: Option<SystemTime>,
    /// Sampling flag; defaults to `true`.
    pub sampled: Option<bool>,
    /// Explicit parent span. Takes precedence over `trace_id` and
    /// `parent_id`.
    pub parent: Option<&'a Span>,
    /// Externally assigned trace id for cross-process continuation.
    pub trace_id: Option<TraceId>,
    /// Externally assigned parent id for cross-process continuation.
    pub parent_id: Option<SpanId>,
}

impl<'a> SpanBuilder<'a> {
    /// Create a builder for an operation with the given name.
    pub fn from_name(name: impl Into<Cow<'static, str>>) -> Self {
        SpanBuilder {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the owning service.
    pub fn with_service(mut self, service: impl Into<Cow<'static, str>>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Set the resource.
    pub fn with_resource(mut self, resource: impl Into<Cow<'static, str>>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Set the span type.
    pub fn with_span_type(mut self, span_type: impl Into<Cow<'static, str>>) -> Self {
        self.span_type = Some(span_type.into());
        self
    }

    /// Override the start time.
    pub fn with_start_time(mut self, start_time: SystemTime) -> Self {
        self.start_time = Some(start_time);
        self
    }

    /// Set the sampling flag.
    pub fn with_sampled(mut self, sampled: bool) -> Self {
        self.sampled = Some(sampled);
        self
    }

    /// Bind the new span under an explicit parent span.
    pub fn with_parent(mut self, parent: &'a Span) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Adopt externally assigned ids, e.g. parsed from inbound
    /// propagation headers. A `None` field falls back to root semantics
    /// for that field.
    pub fn with_continuation(mut self, trace_id: Option<TraceId>, parent_id: Option<SpanId>) -> Self {
        self.trace_id = trace_id;
        self.parent_id = parent_id;
        self
    }

    /// Start the span through the given tracer.
    pub fn start(self, tracer: &Tracer) -> Span {
        tracer.build(self)
    }
}
