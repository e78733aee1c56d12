use time::{Duration, OffsetDateTime};

use crate::core::time::seconds_until;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Untimed attempt.
    Disabled,
    Running { remaining: u64 },
    /// Reached zero on this tick. Reported once per countdown.
    Expired,
    AlreadyExpired,
}

/// Remaining time for an attempt, anchored to an absolute deadline so a
/// rehydrated attempt keeps counting from where the wall clock is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    deadline: Option<OffsetDateTime>,
    remaining: u64,
    expired: bool,
}

impl Countdown {
    pub fn disabled() -> Self {
        Self { deadline: None, remaining: 0, expired: false }
    }

    pub fn arm(now: OffsetDateTime, duration_seconds: Option<u64>) -> Self {
        match duration_seconds.filter(|seconds| *seconds > 0) {
            Some(seconds) => Self {
                deadline: Some(now + Duration::seconds(seconds as i64)),
                remaining: seconds,
                expired: false,
            },
            None => Self::disabled(),
        }
    }

    pub fn resume(deadline: Option<OffsetDateTime>, now: OffsetDateTime) -> Self {
        match deadline {
            Some(deadline) => {
                Self { deadline: Some(deadline), remaining: seconds_until(deadline, now), expired: false }
            }
            None => Self::disabled(),
        }
    }

    pub fn deadline(&self) -> Option<OffsetDateTime> {
        self.deadline
    }

    pub fn remaining(&self) -> Option<u64> {
        self.deadline.map(|_| self.remaining)
    }

    /// Remaining time never goes up, even if the wall clock steps backwards.
    pub fn tick(&mut self, now: OffsetDateTime) -> Tick {
        let Some(deadline) = self.deadline else {
            return Tick::Disabled;
        };
        if self.expired {
            return Tick::AlreadyExpired;
        }

        self.remaining = self.remaining.min(seconds_until(deadline, now));
        if self.remaining == 0 {
            self.expired = true;
            return Tick::Expired;
        }

        Tick::Running { remaining: self.remaining }
    }
}
