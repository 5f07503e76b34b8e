use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock time as microseconds since the Unix epoch, for stamping the
/// `timestamp` field of an outgoing packet (spec §6).
///
/// Saturates to `u64::MAX`/`0` instead of panicking on clock skew; a
/// packet's latency accounting is best-effort, not safety-critical.
#[must_use]
pub fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_micros()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
