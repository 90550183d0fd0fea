//! # Tracekit
//!
//! Tracekit is the span lifecycle and trace-assembly core of a distributed
//! tracing framework. It owns the [`trace::Span`] entity, the parent/child
//! and trace-id propagation rules that stitch spans created at unrelated
//! call sites into one coherent trace tree, and the handoff contract
//! between span creation and an asynchronous export pipeline.
//!
//! Instrumentation is best-effort by design: span setters never fail and
//! never unwind into the traced business logic, and handing a finished
//! span to a [`trace::Recorder`] never blocks the caller. The worst-case
//! effect of a tracing bug is a missing or malformed span, never an
//! application crash or an altered return value.
//!
//! ```
//! use tracekit::trace::{InMemoryRecorder, Tracer};
//!
//! let recorder = InMemoryRecorder::default();
//! let tracer = Tracer::builder()
//!     .with_recorder(recorder.clone())
//!     .with_default_service("web-app")
//!     .build();
//!
//! let mut span = tracer.start("http.request");
//! span.set_tag(tracekit_semconv::http::METHOD, "GET");
//! span.set_resource("GET /users");
//! span.finish();
//!
//! assert_eq!(recorder.get_finished_spans().unwrap().len(), 1);
//! ```
#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unreachable_pub,
    unused
)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]
#![cfg_attr(test, deny(warnings))]

pub mod trace;
