use std::fmt::Debug;

use time::OffsetDateTime;

/// Wall-clock source for deadlines. Attempts store absolute deadlines, so the
/// clock must survive process restarts (no monotonic-only sources here).
pub trait Clock: Debug + Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Whole seconds from `now` until `deadline`, rounded up, floored at zero.
pub fn seconds_until(deadline: OffsetDateTime, now: OffsetDateTime) -> u64 {
    let remaining = deadline - now;
    if remaining.is_negative() || remaining.is_zero() {
        return 0;
    }

    let whole = remaining.whole_seconds() as u64;
    if remaining.subsec_nanoseconds() > 0 {
        whole + 1
    } else {
        whole
    }
}
