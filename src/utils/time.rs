use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// Wall clock in milliseconds since the epoch; 0 if the clock predates it
pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
