//! # Recorder Handoff
//!
//! A [`Recorder`] accepts finished spans and is responsible for buffering
//! and eventual export. The contract with the span core is narrow:
//! `record` is called exactly once per span, only after the span is
//! finished, and must return quickly without propagating errors back into
//! the traced code. A slow or broken downstream must never block traced
//! business logic.
//!
//! Retry and backoff policy belongs to whatever sits behind the recorder
//! (a [`SpanSink`] for the buffered implementation); this module only
//! guarantees the fire-and-forget handoff.
use crate::trace::{SpanData, TraceError, TraceResult};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{sync_channel, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Maximum number of spans held in the buffered recorder queue.
pub(crate) const TRACEKIT_MAX_QUEUE_SIZE: &str = "TRACEKIT_MAX_QUEUE_SIZE";
/// Default maximum queue size.
pub(crate) const TRACEKIT_MAX_QUEUE_SIZE_DEFAULT: usize = 2_048;
/// Delay interval in milliseconds between two consecutive exports.
pub(crate) const TRACEKIT_SCHEDULE_DELAY: &str = "TRACEKIT_SCHEDULE_DELAY";
/// Default delay interval between two consecutive exports.
pub(crate) const TRACEKIT_SCHEDULE_DELAY_DEFAULT: u64 = 5_000;
/// Maximum batch size, must be less than or equal to the queue size.
pub(crate) const TRACEKIT_MAX_EXPORT_BATCH_SIZE: &str = "TRACEKIT_MAX_EXPORT_BATCH_SIZE";
/// Default maximum batch size.
pub(crate) const TRACEKIT_MAX_EXPORT_BATCH_SIZE_DEFAULT: usize = 512;

/// Receives finished spans from the tracing core.
///
/// The core guarantees it calls [`record`](Recorder::record) exactly once
/// per span, only after the span's end time is set, and never for an
/// unfinished span. Implementations must not block the calling thread for
/// unbounded time and must swallow downstream failures.
pub trait Recorder: Send + Sync + fmt::Debug {
    /// Accept a finished span for buffering and eventual export.
    fn record(&self, span: SpanData);

    /// Export everything currently buffered.
    fn force_flush(&self) -> TraceResult<()>;

    /// Flush and release resources. Implementations should tolerate
    /// multiple calls.
    fn shutdown(&self) -> TraceResult<()>;
}

/// A [`Recorder`] that discards every span. Bound by default when a
/// tracer is built without a recorder.
#[derive(Clone, Debug, Default)]
pub struct NoopRecorder;

impl Recorder for NoopRecorder {
    fn record(&self, _span: SpanData) {}

    fn force_flush(&self) -> TraceResult<()> {
        Ok(())
    }

    fn shutdown(&self) -> TraceResult<()> {
        Ok(())
    }
}

/// An in-memory recorder that stores finished spans in a `Vec`.
///
/// Useful for testing and debugging. Clones share the same storage, so a
/// clone handed to a tracer can be inspected from the test body.
#[derive(Clone, Debug, Default)]
pub struct InMemoryRecorder {
    spans: Arc<Mutex<Vec<SpanData>>>,
}

impl InMemoryRecorder {
    /// Returns the finished spans received so far.
    ///
    /// # Errors
    ///
    /// Returns a `TraceError` if the internal lock cannot be acquired.
    pub fn get_finished_spans(&self) -> TraceResult<Vec<SpanData>> {
        self.spans
            .lock()
            .map(|spans_guard| spans_guard.iter().cloned().collect())
            .map_err(TraceError::from)
    }

    /// Clears the internal storage.
    pub fn reset(&self) {
        let _ = self.spans.lock().map(|mut spans_guard| spans_guard.clear());
    }
}

impl Recorder for InMemoryRecorder {
    fn record(&self, span: SpanData) {
        let _ = self
            .spans
            .lock()
            .map(|mut spans_guard| spans_guard.push(span));
    }

    fn force_flush(&self) -> TraceResult<()> {
        Ok(())
    }

    fn shutdown(&self) -> TraceResult<()> {
        Ok(())
    }
}

impl SpanSink for InMemoryRecorder {
    fn export(&mut self, batch: Vec<SpanData>) -> TraceResult<()> {
        self.spans
            .lock()
            .map(|mut spans_guard| spans_guard.extend(batch))
            .map_err(TraceError::from)
    }
}

/// Downstream consumer of span batches drained from a [`BufferedRecorder`].
///
/// This is where a transport crate plugs in; the sink runs on the
/// recorder's dedicated thread, so it may block without affecting traced
/// code.
pub trait SpanSink: Send + fmt::Debug {
    /// Export a batch of spans. Called from the recorder thread.
    fn export(&mut self, batch: Vec<SpanData>) -> TraceResult<()>;

    /// Release any resources held by the sink.
    fn shutdown(&mut self) {}
}

/// Configuration for a [`BufferedRecorder`].
#[derive(Clone, Copy, Debug)]
pub struct BufferConfig {
    max_queue_size: usize,
    scheduled_delay: Duration,
    max_export_batch_size: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        BufferConfigBuilder::default().build()
    }
}

impl BufferConfig {
    /// Start building a config. Environment variables override the
    /// defaults; builder values override the environment.
    pub fn builder() -> BufferConfigBuilder {
        BufferConfigBuilder::default()
    }
}

/// Builder for [`BufferConfig`].
#[derive(Clone, Copy, Debug)]
pub struct BufferConfigBuilder {
    max_queue_size: usize,
    scheduled_delay: Duration,
    max_export_batch_size: usize,
}

impl Default for BufferConfigBuilder {
    /// Create a builder seeded from the `TRACEKIT_MAX_QUEUE_SIZE`,
    /// `TRACEKIT_SCHEDULE_DELAY` (milliseconds) and
    /// `TRACEKIT_MAX_EXPORT_BATCH_SIZE` environment variables where set.
    fn default() -> Self {
        BufferConfigBuilder {
            max_queue_size: env_usize(TRACEKIT_MAX_QUEUE_SIZE, TRACEKIT_MAX_QUEUE_SIZE_DEFAULT),
            scheduled_delay: Duration::from_millis(env_u64(
                TRACEKIT_SCHEDULE_DELAY,
                TRACEKIT_SCHEDULE_DELAY_DEFAULT,
            )),
            max_export_batch_size: env_usize(
                TRACEKIT_MAX_EXPORT_BATCH_SIZE,
                TRACEKIT_MAX_EXPORT_BATCH_SIZE_DEFAULT,
            ),
        }
    }
}

impl BufferConfigBuilder {
    /// Set the maximum number of spans queued before drops start.
    pub fn with_max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.max_queue_size = max_queue_size;
        self
    }

    /// Set the delay between two consecutive exports.
    pub fn with_scheduled_delay(mut self, scheduled_delay: Duration) -> Self {
        self.scheduled_delay = scheduled_delay;
        self
    }

    /// Set the maximum number of spans exported in one batch.
    pub fn with_max_export_batch_size(mut self, max_export_batch_size: usize) -> Self {
        self.max_export_batch_size = max_export_batch_size;
        self
    }

    /// Build the config. The batch size is clamped to the queue size.
    pub fn build(self) -> BufferConfig {
        BufferConfig {
            max_queue_size: self.max_queue_size,
            scheduled_delay: self.scheduled_delay,
            max_export_batch_size: self.max_export_batch_size.min(self.max_queue_size),
        }
    }
}

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

/// Messages exchanged between the caller threads and the export thread.
#[allow(clippy::large_enum_variant)]
#[derive(Debug)]
enum BufferMessage {
    RecordSpan(SpanData),
    ForceFlush(SyncSender<TraceResult<()>>),
    Shutdown(SyncSender<TraceResult<()>>),
}

/// A [`Recorder`] with a bounded queue and a dedicated background thread
/// draining to a [`SpanSink`].
///
/// `record` is a non-blocking `try_send`: when the queue is full the span
/// is dropped and counted rather than making the caller wait.
#[derive(Debug)]
pub struct BufferedRecorder {
    message_sender: SyncSender<BufferMessage>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
    forceflush_timeout: Duration,
    shutdown_timeout: Duration,
    is_shutdown: AtomicBool,
    dropped_span_count: Arc<AtomicUsize>,
}

impl BufferedRecorder {
    /// Creates a new `BufferedRecorder` draining to `sink`.
    pub fn new<S>(mut sink: S, config: BufferConfig) -> Self
    where
        S: SpanSink + 'static,
    {
        let (message_sender, message_receiver) = sync_channel(config.max_queue_size);

        let handle = thread::Builder::new()
            .name("tracekit.buffered_recorder".to_string())
            .spawn(move || {
                let mut spans = Vec::with_capacity(config.max_export_batch_size);
                let mut last_export_time = Instant::now();

                loop {
                    let timeout = config
                        .scheduled_delay
                        .saturating_sub(last_export_time.elapsed());
                    match message_receiver.recv_timeout(timeout) {
                        Ok(BufferMessage::RecordSpan(span)) => {
                            spans.push(span);
                            if spans.len() >= config.max_export_batch_size
                                || last_export_time.elapsed() >= config.scheduled_delay
                            {
                                export_batch(&mut sink, &mut spans);
                                last_export_time = Instant::now();
                            }
                        }
                        Ok(BufferMessage::ForceFlush(sender)) => {
                            let result = sink.export(spans.split_off(0));
                            let _ = sender.send(result);
                            last_export_time = Instant::now();
                        }
                        Ok(BufferMessage::Shutdown(sender)) => {
                            let result = sink.export(spans.split_off(0));
                            sink.shutdown();
                            let _ = sender.send(result);
                            break;
                        }
                        Err(RecvTimeoutError::Timeout) => {
                            if last_export_time.elapsed() >= config.scheduled_delay {
                                export_batch(&mut sink, &mut spans);
                                last_export_time = Instant::now();
                            }
                        }
                        Err(RecvTimeoutError::Disconnected) => {
                            debug!("channel disconnected, shutting down recorder thread");
                            export_batch(&mut sink, &mut spans);
                            break;
                        }
                    }
                }
            })
            .expect("Failed to spawn thread");

        BufferedRecorder {
            message_sender,
            handle: Mutex::new(Some(handle)),
            forceflush_timeout: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(5),
            is_shutdown: AtomicBool::new(false),
            dropped_span_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Start building a `BufferedRecorder` draining to `sink`.
    pub fn builder<S>(sink: S) -> BufferedRecorderBuilder<S>
    where
        S: SpanSink + 'static,
    {
        BufferedRecorderBuilder {
            sink,
            config: BufferConfig::default(),
        }
    }

    /// Number of spans dropped because the queue was full or closed.
    pub fn dropped_span_count(&self) -> usize {
        self.dropped_span_count.load(Ordering::Relaxed)
    }
}

/// Builder for [`BufferedRecorder`].
#[derive(Debug)]
pub struct BufferedRecorderBuilder<S> {
    sink: S,
    config: BufferConfig,
}

impl<S> BufferedRecorderBuilder<S>
where
    S: SpanSink + 'static,
{
    /// Replace the config assembled from defaults and the environment.
    pub fn with_config(mut self, config: BufferConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the recorder and start its export thread.
    pub fn build(self) -> BufferedRecorder {
        BufferedRecorder::new(self.sink, self.config)
    }
}

fn export_batch<S: SpanSink>(sink: &mut S, spans: &mut Vec<SpanData>) {
    if spans.is_empty() {
        return;
    }
    if let Err(err) = sink.export(spans.split_off(0)) {
        debug!(error = %err, "buffered recorder export failed");
    }
}

impl Recorder for BufferedRecorder {
    fn record(&self, span: SpanData) {
        if self.is_shutdown.load(Ordering::Relaxed) {
            debug!("recorder is shutdown, dropping span");
            return;
        }
        let result = self.message_sender.try_send(BufferMessage::RecordSpan(span));

        if let Err(err) = result {
            // Count quietly after the first drop to avoid flooding the
            // diagnostics of an already overloaded process.
            if self.dropped_span_count.fetch_add(1, Ordering::Relaxed) == 0 {
                warn!(
                    full = matches!(err, TrySendError::Full(_)),
                    "buffered recorder dropped a span; further drops are counted silently"
                );
            }
        }
    }

    fn force_flush(&self) -> TraceResult<()> {
        if self.is_shutdown.load(Ordering::Relaxed) {
            return Err(TraceError::AlreadyShutdown);
        }
        let (sender, receiver) = sync_channel(1);
        self.message_sender
            .try_send(BufferMessage::ForceFlush(sender))
            .map_err(|_| TraceError::from("failed to send flush message"))?;

        receiver
            .recv_timeout(self.forceflush_timeout)
            .map_err(|_| TraceError::TimedOut(self.forceflush_timeout))?
    }

    fn shutdown(&self) -> TraceResult<()> {
        if self.is_shutdown.swap(true, Ordering::Relaxed) {
            return Err(TraceError::AlreadyShutdown);
        }

        let dropped = self.dropped_span_count.load(Ordering::Relaxed);
        if dropped > 0 {
            warn!(count = dropped, "spans were dropped before shutdown");
        }

        let (sender, receiver) = sync_channel(1);
        self.message_sender
            .try_send(BufferMessage::Shutdown(sender))
            .map_err(|_| TraceError::from("failed to send shutdown message"))?;

        let result = receiver
            .recv_timeout(self.shutdown_timeout)
            .map_err(|_| TraceError::TimedOut(self.shutdown_timeout))?;

        if let Ok(mut handle_guard) = self.handle.lock() {
            if let Some(handle) = handle_guard.take() {
                handle
                    .join()
                    .map_err(|_| TraceError::from("recorder thread panicked during shutdown"))?;
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::Tracer;

    fn finished_span(tracer: &Tracer, name: &'static str) -> SpanData {
        let mut span = tracer.start(name);
        span.finish();
        span.exported_data()
    }

    #[test]
    fn buffered_recorder_delivers_on_flush() {
        let sink = InMemoryRecorder::default();
        let recorder = BufferedRecorder::new(sink.clone(), BufferConfig::default());
        let tracer = Tracer::builder().build();

        recorder.record(finished_span(&tracer, "one"));
        recorder.record(finished_span(&tracer, "two"));
        recorder.force_flush().unwrap();

        let spans = sink.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].name, "one");
        assert_eq!(spans[1].name, "two");
    }

    #[test]
    fn buffered_recorder_flushes_on_shutdown() {
        let sink = InMemoryRecorder::default();
        let recorder = BufferedRecorder::new(sink.clone(), BufferConfig::default());
        let tracer = Tracer::builder().build();

        recorder.record(finished_span(&tracer, "late"));
        recorder.shutdown().unwrap();

        assert_eq!(sink.get_finished_spans().unwrap().len(), 1);
        assert!(matches!(
            recorder.shutdown(),
            Err(TraceError::AlreadyShutdown)
        ));
    }

    #[test]
    fn record_after_shutdown_drops_silently() {
        let sink = InMemoryRecorder::default();
        let recorder = BufferedRecorder::new(sink.clone(), BufferConfig::default());
        let tracer = Tracer::builder().build();

        recorder.shutdown().unwrap();
        recorder.record(finished_span(&tracer, "ghost"));

        assert!(sink.get_finished_spans().unwrap().is_empty());
    }

    #[test]
    fn batch_size_triggers_export_without_flush() {
        let sink = InMemoryRecorder::default();
        let config = BufferConfig::builder()
            .with_max_queue_size(16)
            .with_max_export_batch_size(2)
            .with_scheduled_delay(Duration::from_secs(60))
            .build();
        let recorder = BufferedRecorder::new(sink.clone(), config);
        let tracer = Tracer::builder().build();

        recorder.record(finished_span(&tracer, "a"));
        recorder.record(finished_span(&tracer, "b"));

        // The export happens on the recorder thread; poll briefly.
        let deadline = Instant::now() + Duration::from_secs(5);
        while sink.get_finished_spans().unwrap().len() < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(sink.get_finished_spans().unwrap().len(), 2);
    }

    #[test]
    fn config_builder_clamps_batch_to_queue() {
        let config = BufferConfig::builder()
            .with_max_queue_size(8)
            .with_max_export_batch_size(512)
            .build();
        assert_eq!(config.max_export_batch_size, 8);
    }

    #[test]
    fn config_reads_environment_overrides() {
        temp_env::with_vars(
            [
                (TRACEKIT_MAX_QUEUE_SIZE, Some("4096")),
                (TRACEKIT_SCHEDULE_DELAY, Some("250")),
                (TRACEKIT_MAX_EXPORT_BATCH_SIZE, Some("128")),
            ],
            || {
                let config = BufferConfig::default();
                assert_eq!(config.max_queue_size, 4096);
                assert_eq!(config.scheduled_delay, Duration::from_millis(250));
                assert_eq!(config.max_export_batch_size, 128);
            },
        );
    }

    #[test]
    fn config_ignores_malformed_environment() {
        temp_env::with_vars([(TRACEKIT_MAX_QUEUE_SIZE, Some("lots"))], || {
            let config = BufferConfig::default();
            assert_eq!(config.max_queue_size, TRACEKIT_MAX_QUEUE_SIZE_DEFAULT);
        });
    }
}
