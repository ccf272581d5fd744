//! Monotonic clock helpers for deadlines.

use std::time::{Duration, Instant};

/// Upper bound applied to delays that would overflow `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Current monotonic time.
#[inline]
#[must_use]
pub fn now() -> Instant {
    Instant::now()
}

/// Absolute deadline `delay` after `from`, saturating at roughly a century out.
#[must_use]
pub fn deadline_from(from: Instant, delay: Duration) -> Instant {
    from.checked_add(delay)
        .or_else(|| from.checked_add(FAR_FUTURE))
        .unwrap_or(from)
}

/// Absolute deadline `delay` from now.
#[must_use]
pub fn deadline_after(delay: Duration) -> Instant {
    deadline_from(now(), delay)
}

/// Signed nanoseconds from `now` until `deadline`; zero or negative means due.
#[must_use]
pub fn nanos_until(deadline: Instant, now: Instant) -> i128 {
    match deadline.checked_duration_since(now) {
        Some(ahead) => i128::try_from(ahead.as_nanos()).unwrap_or(i128::MAX),
        None => -i128::try_from(now.duration_since(deadline).as_nanos()).unwrap_or(i128::MAX),
    }
}
