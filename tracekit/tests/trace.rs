//! End-to-end scenarios exercising span creation, hierarchy binding,
//! recorder handoff and header parsing together.
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracekit::trace::{
    parse_request_start_header, parse_trace_headers, BufferConfig, BufferedRecorder,
    InMemoryRecorder, SequenceIdGenerator, SpanId, Tracer,
};
use tracekit_semconv::{http, span_types};

fn test_tracer() -> (Tracer, InMemoryRecorder) {
    let recorder = InMemoryRecorder::default();
    let tracer = Tracer::builder()
        .with_recorder(recorder.clone())
        .with_id_generator(SequenceIdGenerator::new())
        .build();
    (tracer, recorder)
}

#[test]
fn queue_wait_span_measures_time_queued() {
    // A request spent ten seconds queued upstream before we saw it.
    let (tracer, recorder) = test_tracer();
    let queued_at = SystemTime::now() - Duration::from_secs(10);

    tracer
        .span_builder("request.queue")
        .with_service("request_queue")
        .with_span_type(span_types::HTTP)
        .with_resource("Request Queue")
        .with_start_time(queued_at)
        .start(&tracer)
        .finish();

    let spans = recorder.get_finished_spans().unwrap();
    assert_eq!(spans.len(), 1);
    let span = &spans[0];
    assert_eq!(span.name, "request.queue");
    assert_eq!(span.parent_id, SpanId::INVALID);
    assert_eq!(span.resource, "Request Queue");
    assert_eq!(span.error, 0);

    let duration = span.duration.unwrap();
    let ten_seconds = 10_000_000_000i64;
    // allow a second of scheduling jitter
    assert!(
        (duration - ten_seconds).abs() < 1_000_000_000,
        "duration {duration}"
    );
}

#[test]
fn timing_header_drives_the_start_time() {
    let parsed = parse_request_start_header(Some("t=1700000000.500"));
    assert_eq!(
        parsed,
        UNIX_EPOCH + Duration::new(1_700_000_000, 500_000_000)
    );

    let before = SystemTime::now();
    let fallback = parse_request_start_header(None);
    assert!(fallback >= before && fallback <= SystemTime::now());
}

#[test]
fn finish_order_does_not_affect_trace_assembly() {
    let (tracer, recorder) = test_tracer();

    let mut root = tracer
        .span_builder("web.request")
        .with_service("web-app")
        .start(&tracer);
    let mut child = tracer
        .span_builder("sql.query")
        .with_parent(&root)
        .start(&tracer);

    // finish the child first, then the root
    child.finish();
    root.finish();

    let spans = recorder.get_finished_spans().unwrap();
    assert_eq!(spans.len(), 2);
    let (child, root) = (&spans[0], &spans[1]);
    assert_eq!(child.trace_id, root.trace_id);
    assert_eq!(root.trace_id.to_u64(), root.span_id.to_u64());
    assert_eq!(child.parent_id, root.span_id);
    assert_eq!(child.service.as_deref(), Some("web-app"));
}

#[test]
fn trace_continues_across_process_boundaries() {
    let (tracer, recorder) = test_tracer();

    // Ids as they would arrive on inbound request headers.
    let (trace_id, parent_id) = parse_trace_headers(Some("424242"), Some("99"));
    tracer
        .span_builder("web.request")
        .with_continuation(trace_id, parent_id)
        .start(&tracer)
        .finish();

    // A malformed parent header degrades that field to root semantics.
    let (trace_id, parent_id) = parse_trace_headers(Some("424242"), Some("bogus"));
    tracer
        .span_builder("web.request")
        .with_continuation(trace_id, parent_id)
        .start(&tracer)
        .finish();

    let spans = recorder.get_finished_spans().unwrap();
    assert_eq!(spans[0].trace_id.to_u64(), 424242);
    assert_eq!(spans[0].parent_id.to_u64(), 99);
    assert_eq!(spans[1].trace_id.to_u64(), 424242);
    assert_eq!(spans[1].parent_id, SpanId::INVALID);
}

#[test]
fn exported_span_serializes_deterministically() {
    let (tracer, _) = test_tracer();
    let start = UNIX_EPOCH + Duration::from_secs(1_700_000_000);

    let mut span = tracer
        .span_builder("http.request")
        .with_service("web-app")
        .with_span_type(span_types::HTTP)
        .with_start_time(start)
        .start(&tracer);
    span.set_tag(http::METHOD, "GET");
    span.set_metric("queueing", 3.0);
    span.finish_at(start + Duration::from_secs(2));

    let value = serde_json::to_value(span.exported_data()).unwrap();
    assert_eq!(value["span_id"], 1);
    assert_eq!(value["trace_id"], 1);
    assert_eq!(value["parent_id"], 0);
    assert_eq!(value["name"], "http.request");
    assert_eq!(value["service"], "web-app");
    assert_eq!(value["resource"], "http.request");
    assert_eq!(value["type"], "http");
    assert_eq!(value["meta"]["http.method"], "GET");
    assert_eq!(value["metrics"]["queueing"], 3.0);
    assert_eq!(value["error"], 0);
    assert_eq!(value["start"], 1_700_000_000_000_000_000u64);
    assert_eq!(value["duration"], 2_000_000_000u64);
}

#[test]
fn spans_flow_through_the_buffered_recorder() {
    let sink = InMemoryRecorder::default();
    let recorder = BufferedRecorder::new(sink.clone(), BufferConfig::default());
    let tracer = Tracer::builder()
        .with_recorder(recorder)
        .with_default_service("web-app")
        .build();

    let mut root = tracer.start("web.request");
    tracer
        .span_builder("sql.query")
        .with_parent(&root)
        .start(&tracer)
        .finish();
    root.finish();

    tracer.force_flush().unwrap();

    let spans = sink.get_finished_spans().unwrap();
    assert_eq!(spans.len(), 2);
    assert_eq!(spans[0].name, "sql.query");
    assert_eq!(spans[1].name, "web.request");
    assert_eq!(spans[0].trace_id, spans[1].trace_id);
    assert_eq!(spans[0].parent_id, spans[1].span_id);
}

#[test]
fn concurrent_span_creation_yields_distinct_ids() {
    let (tracer, recorder) = test_tracer();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let tracer = tracer.clone();
            std::thread::spawn(move || {
                for _ in 0..100 {
                    tracer.start("worker.task").finish();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let spans = recorder.get_finished_spans().unwrap();
    assert_eq!(spans.len(), 800);
    let mut ids: Vec<_> = spans.iter().map(|span| span.span_id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 800);
}
