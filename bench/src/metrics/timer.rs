use std::time::{Duration, Instant};

/// Run `f` and return its result with the wall time it took.
#[inline]
pub fn timed<T>(f: impl FnOnce() -> T) -> (T, Duration) {
    let start = Instant::now();
    let out = f();
    (out, start.elapsed())
}

/// Duration in whole nanoseconds, saturating at `u64::MAX`.
pub fn as_nanos_u64(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}
