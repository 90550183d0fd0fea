//! Inbound propagation and timing header parsing.
//!
//! These helpers sit on the request path of HTTP and queue adapters, so
//! none of them can fail: malformed or missing input degrades to `None`
//! or to "now", with at most a debug-level diagnostic. A tracing bug must
//! never surface into request handling.
use crate::trace::{SpanId, TraceId};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Parse distributed-tracing headers into an externally assigned
/// trace/parent id pair.
///
/// Each header is parsed independently as a decimal `u64`; a missing,
/// malformed or zero value yields `None` for that field, and the span
/// hierarchy then falls back to root semantics for whichever field is
/// absent.
pub fn parse_trace_headers(
    trace_id: Option<&str>,
    parent_id: Option<&str>,
) -> (Option<TraceId>, Option<SpanId>) {
    (
        parse_id(trace_id).map(TraceId::from),
        parse_id(parent_id).map(SpanId::from),
    )
}

fn parse_id(header: Option<&str>) -> Option<u64> {
    let header = header?;
    match header.trim().parse::<u64>() {
        Ok(0) => {
            debug!(header, "ignoring reserved zero id in propagation header");
            None
        }
        Ok(id) => Some(id),
        Err(_) => {
            debug!(header, "ignoring malformed propagation header");
            None
        }
    }
}

/// Parse a request timing header in the fixed format
/// `t=<unix-seconds>.<fraction>`, falling back to the current time when
/// the header is absent or malformed.
///
/// Upstream proxies and application servers set this header at the moment
/// a request is queued; the resulting instant is used as the start time
/// of a queue-wait span.
pub fn parse_request_start_header(header: Option<&str>) -> SystemTime {
    header
        .and_then(parse_timing_header)
        .unwrap_or_else(SystemTime::now)
}

/// Compute the time a request spent queued, in whole seconds, from a
/// timing header.
///
/// Returns `None` when the header is absent or malformed, and also when
/// the computed delay is negative: a start time in the future indicates
/// clock skew between hosts, not a real measurement, and is discarded
/// rather than recorded.
pub fn queue_delay_seconds(header: Option<&str>, now: SystemTime) -> Option<u64> {
    let queued_at = header.and_then(parse_timing_header)?;
    match now.duration_since(queued_at) {
        Ok(delay) => Some(delay.as_secs()),
        Err(_) => {
            debug!(header, "request timing header out of range");
            None
        }
    }
}

fn parse_timing_header(header: &str) -> Option<SystemTime> {
    let value = header.trim().strip_prefix("t=")?;
    let (seconds, fraction) = value.split_once('.')?;

    let seconds: u64 = seconds.parse().ok()?;
    if fraction.is_empty() || fraction.len() > 9 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // interpret the fraction as a decimal, e.g. ".5" and ".500" are both
    // 500 milliseconds
    let nanos: u32 = format!("{fraction:0<9}").parse().ok()?;

    Some(UNIX_EPOCH + Duration::new(seconds, nanos))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_trace_headers() {
        let (trace_id, parent_id) = parse_trace_headers(Some("7777"), Some("8888"));
        assert_eq!(trace_id, Some(TraceId::from(7777)));
        assert_eq!(parent_id, Some(SpanId::from(8888)));
    }

    #[test]
    fn malformed_headers_yield_none_per_field() {
        let (trace_id, parent_id) = parse_trace_headers(Some("7777"), Some("not-a-number"));
        assert_eq!(trace_id, Some(TraceId::from(7777)));
        assert_eq!(parent_id, None);

        assert_eq!(parse_trace_headers(None, None), (None, None));
        assert_eq!(parse_trace_headers(Some(""), Some("-1")), (None, None));
        // ids out of the 64-bit range are malformed, not truncated
        let over = u128::from(u64::MAX) + 1;
        let (trace_id, _) = parse_trace_headers(Some(&over.to_string()), None);
        assert_eq!(trace_id, None);
    }

    #[test]
    fn zero_ids_are_rejected() {
        assert_eq!(parse_trace_headers(Some("0"), Some("0")), (None, None));
    }

    #[test]
    fn parses_timing_header() {
        let parsed = parse_request_start_header(Some("t=1700000000.500"));
        assert_eq!(
            parsed,
            UNIX_EPOCH + Duration::new(1_700_000_000, 500_000_000)
        );
    }

    #[test]
    fn short_fraction_is_a_decimal() {
        let parsed = parse_request_start_header(Some("t=1700000000.5"));
        assert_eq!(
            parsed,
            UNIX_EPOCH + Duration::new(1_700_000_000, 500_000_000)
        );
    }

    #[test]
    fn missing_or_malformed_timing_header_falls_back_to_now() {
        for header in [
            None,
            Some("1700000000.500"),
            Some("t=not-a-time"),
            Some("t=1700000000"),
            Some("t=1700000000."),
            Some("t=1700000000.12e4"),
        ] {
            let before = SystemTime::now();
            let parsed = parse_request_start_header(header);
            let after = SystemTime::now();
            assert!(parsed >= before && parsed <= after, "header {header:?}");
        }
    }

    #[test]
    fn queue_delay_in_whole_seconds() {
        let now = UNIX_EPOCH + Duration::new(1_700_000_010, 900_000_000);
        assert_eq!(
            queue_delay_seconds(Some("t=1700000000.500"), now),
            Some(10)
        );
    }

    #[test]
    fn negative_queue_delay_is_discarded() {
        let now = UNIX_EPOCH + Duration::from_secs(1_699_999_999);
        assert_eq!(queue_delay_seconds(Some("t=1700000000.500"), now), None);
    }

    #[test]
    fn queue_delay_requires_a_parseable_header() {
        let now = SystemTime::now();
        assert_eq!(queue_delay_seconds(None, now), None);
        assert_eq!(queue_delay_seconds(Some("garbage"), now), None);
    }
}
