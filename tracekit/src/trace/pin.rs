//! # Pin
//!
//! A `Pin` ties tracing metadata (service, app, app type) and a [`Tracer`]
//! handle together so a call site can attach them to the client object it
//! instruments. The association is explicit: the integration stores the
//! pin in its own struct (or an association table keyed by the host
//! object) and passes it down the call chain, instead of mutating the
//! host object at runtime.
//!
//! ```
//! use tracekit::trace::{Pin, Tracer};
//! use tracekit_semconv::app_types;
//!
//! let tracer = Tracer::builder().build();
//! let pin = Pin::new("http-client", tracer)
//!     .with_app("typhoeus")
//!     .with_app_type(app_types::WEB);
//!
//! let mut span = pin.start("web.external");
//! span.set_resource("GET");
//! span.finish();
//! ```
use crate::trace::{Span, SpanBuilder, Tracer};
use std::borrow::Cow;
use std::fmt;

/// Tracing metadata a call site attaches to the object it instruments.
#[derive(Clone, Debug)]
pub struct Pin {
    service: Cow<'static, str>,
    app: Option<Cow<'static, str>>,
    app_type: Option<Cow<'static, str>>,
    tracer: Tracer,
}

impl Pin {
    /// Create a pin for the given service, bound to a tracer.
    pub fn new(service: impl Into<Cow<'static, str>>, tracer: Tracer) -> Self {
        Pin {
            service: service.into(),
            app: None,
            app_type: None,
            tracer,
        }
    }

    /// Name of the instrumented library or framework.
    pub fn with_app(mut self, app: impl Into<Cow<'static, str>>) -> Self {
        self.app = Some(app.into());
        self
    }

    /// Application type of the instrumented component, from
    /// `tracekit_semconv::app_types`.
    pub fn with_app_type(mut self, app_type: impl Into<Cow<'static, str>>) -> Self {
        self.app_type = Some(app_type.into());
        self
    }

    /// The service spans started through this pin belong to.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// The instrumented library name, if set.
    pub fn app(&self) -> Option<&str> {
        self.app.as_deref()
    }

    /// The application type, if set.
    pub fn app_type(&self) -> Option<&str> {
        self.app_type.as_deref()
    }

    /// The tracer this pin is bound to.
    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// Returns a span builder carrying the pin's service.
    pub fn span_builder<'a>(&self, name: impl Into<Cow<'static, str>>) -> SpanBuilder<'a> {
        SpanBuilder::from_name(name).with_service(self.service.clone())
    }

    /// Start a span for this pin's service.
    pub fn start(&self, name: impl Into<Cow<'static, str>>) -> Span {
        self.tracer.build(self.span_builder(name))
    }

    /// Run `f` inside a span for this pin's service, finishing the span
    /// when `f` returns.
    pub fn in_span<T, F>(&self, name: impl Into<Cow<'static, str>>, f: F) -> T
    where
        F: FnOnce(&mut Span) -> T,
    {
        self.tracer.with_span(self.span_builder(name), f)
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pin(service:{},app:{},app_type:{})",
            self.service,
            self.app.as_deref().unwrap_or(""),
            self.app_type.as_deref().unwrap_or("")
        )
    }
}
