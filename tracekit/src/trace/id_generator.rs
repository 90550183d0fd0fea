//! Identifier generation for spans and traces.
use rand::{rngs, Rng, SeedableRng};
use serde::Serialize;
use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A 64-bit span identifier, unique within the process.
///
/// The zero value is reserved: a span whose `parent_id` is
/// [`SpanId::INVALID`] is a trace root.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SpanId(u64);

impl SpanId {
    /// The reserved zero identifier. Never minted by an [`IdGenerator`].
    pub const INVALID: SpanId = SpanId(0);

    /// Return the underlying `u64` value.
    pub fn to_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for SpanId {
    fn from(value: u64) -> Self {
        SpanId(value)
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 64-bit trace identifier, shared by every span in one trace.
///
/// A root span uses its own span id as trace id, so trace ids come out of
/// the same 64-bit id space as span ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TraceId(u64);

impl TraceId {
    /// The reserved zero identifier.
    pub const INVALID: TraceId = TraceId(0);

    /// Return the underlying `u64` value.
    pub fn to_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for TraceId {
    fn from(value: u64) -> Self {
        TraceId(value)
    }
}

impl From<SpanId> for TraceId {
    fn from(id: SpanId) -> Self {
        TraceId(id.0)
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Interface for generating span identifiers.
///
/// Implementations must be safe to call concurrently from multiple threads
/// without producing duplicates or blocking for unbounded time, and must
/// never return [`SpanId::INVALID`].
pub trait IdGenerator: Send + Sync + fmt::Debug {
    /// Generate a new unique identifier.
    fn next_id(&self) -> SpanId;
}

/// Default [`IdGenerator`] implementation.
///
/// Generates ids using a per-thread random number generator, re-rolling
/// the reserved zero value.
#[derive(Clone, Debug, Default)]
pub struct RandomIdGenerator {
    _private: (),
}

impl IdGenerator for RandomIdGenerator {
    fn next_id(&self) -> SpanId {
        CURRENT_RNG.with(|rng| {
            let mut rng = rng.borrow_mut();
            loop {
                let id = rng.random::<u64>();
                if id != 0 {
                    return SpanId(id);
                }
            }
        })
    }
}

thread_local! {
    /// Store random number generator for each thread
    static CURRENT_RNG: RefCell<rngs::SmallRng> = RefCell::new(rngs::SmallRng::from_os_rng());
}

/// [`IdGenerator`] implementation that increments an atomic counter for
/// each new id. This helps produce predictable ids for testing.
#[derive(Clone, Debug)]
pub struct SequenceIdGenerator(Arc<AtomicU64>);

impl SequenceIdGenerator {
    /// Create a new [`SequenceIdGenerator`] starting at 1.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SequenceIdGenerator {
    fn default() -> Self {
        Self(Arc::new(AtomicU64::new(1)))
    }
}

impl IdGenerator for SequenceIdGenerator {
    fn next_id(&self) -> SpanId {
        SpanId(self.0.fetch_add(1, Ordering::SeqCst))
    }
}
