//! # Tracekit Trace Core
//!
//! The trace core consists of a few main structs:
//!
//! * The [`Tracer`] struct, which mints identifiers, binds spans to their
//!   parents and hands finished spans to the recorder.
//! * The [`Span`] struct, a mutable object storing information about the
//!   current operation execution.
//! * The [`Recorder`] trait, the narrow handoff contract to whatever
//!   buffers and exports finished spans.
mod error;
mod id_generator;
mod pin;
mod propagation;
mod recorder;
mod span;
mod tracer;

pub use error::{TraceError, TraceResult};
pub use id_generator::{IdGenerator, RandomIdGenerator, SequenceIdGenerator, SpanId, TraceId};
pub use pin::Pin;
pub use propagation::{parse_request_start_header, parse_trace_headers, queue_delay_seconds};
pub use recorder::{
    BufferConfig, BufferConfigBuilder, BufferedRecorder, BufferedRecorderBuilder, InMemoryRecorder,
    NoopRecorder, Recorder, SpanSink,
};
pub use span::{Span, SpanData, SpanStatus};
pub use tracer::{SpanBuilder, Tracer, TracerBuilder};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracing_in_span() {
        // Arrange
        let recorder = InMemoryRecorder::default();
        let tracer = Tracer::builder().with_recorder(recorder.clone()).build();

        // Act
        tracer.in_span("span_name", |_span| {});

        // Assert
        let exported_spans = recorder
            .get_finished_spans()
            .expect("Spans are expected to be exported.");
        assert_eq!(exported_spans.len(), 1);
        assert_eq!(exported_spans[0].name, "span_name");
    }

    #[test]
    fn tracing_tracer_start() {
        // Arrange
        let recorder = InMemoryRecorder::default();
        let tracer = Tracer::builder().with_recorder(recorder.clone()).build();

        // Act
        let mut span = tracer.start("span_name");
        span.set_tag("key1", "value1");
        span.finish();

        // Assert
        let exported_spans = recorder
            .get_finished_spans()
            .expect("Spans are expected to be exported.");
        assert_eq!(exported_spans.len(), 1);
        let span = &exported_spans[0];
        assert_eq!(span.name, "span_name");
        assert_eq!(span.meta.get("key1").unwrap(), "value1");
    }
}
