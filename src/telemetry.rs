//! Telemetry metric name constants.
//!
//! Centralised metric names for clickmask operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `clickmask_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `encoder` / `decoder`: implementation name (e.g. "http", "onnx")
//! - `mode`: decode path: "points" or "auto"
//! - `status`: outcome: "ok" or "error"
//! - `stage`: which result was discarded: "encode" or "decode"

/// Total encode requests issued by sessions.
///
/// Labels: `encoder`, `status` ("ok" | "error").
pub const ENCODE_REQUESTS_TOTAL: &str = "clickmask_encode_requests_total";

/// Encode round-trip duration in seconds.
///
/// Labels: `encoder`.
pub const ENCODE_DURATION_SECONDS: &str = "clickmask_encode_duration_seconds";

/// Total decoder passes run by sessions.
///
/// Labels: `decoder`, `mode` ("points" | "auto"), `status` ("ok" | "error").
pub const DECODE_REQUESTS_TOTAL: &str = "clickmask_decode_requests_total";

/// Decoder pass duration in seconds.
///
/// Labels: `decoder`, `mode`.
pub const DECODE_DURATION_SECONDS: &str = "clickmask_decode_duration_seconds";

/// Results dropped because a newer request superseded them or the session
/// was disposed.
///
/// Labels: `stage` ("encode" | "decode").
pub const STALE_RESULTS_TOTAL: &str = "clickmask_stale_results_total";
