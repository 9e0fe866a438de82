//! Deadlines and timer futures.
//!
//! A [`Deadline`] is either absent, an absolute instant, or a duration that
//! is converted to `now + duration` when the accepting operation starts.
//! [`sleep`] and [`sleep_until`] are pure-timer waits: a poll request with
//! no file descriptor.

use std::time::{Duration, Instant};

use crate::error::Result;
use crate::io::Readiness;

/// A point in time an operation must not outlive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    /// No deadline; wait indefinitely.
    None,
    /// An absolute monotonic time point.
    At(Instant),
    /// A duration, resolved against the clock when the operation starts.
    After(Duration),
}

impl Deadline {
    /// Resolves the deadline to an absolute instant, using `now` as the
    /// start of the accepting operation.
    #[must_use]
    pub fn resolve(self, now: Instant) -> Option<Instant> {
        match self {
            Self::None => None,
            Self::At(at) => Some(at),
            Self::After(after) => Some(now + after),
        }
    }

    /// Returns true if no deadline is set.
    #[must_use]
    pub const fn is_none(self) -> bool {
        matches!(self, Self::None)
    }
}

impl From<Instant> for Deadline {
    fn from(at: Instant) -> Self {
        Self::At(at)
    }
}

impl From<Duration> for Deadline {
    fn from(after: Duration) -> Self {
        Self::After(after)
    }
}

impl From<Option<Instant>> for Deadline {
    fn from(at: Option<Instant>) -> Self {
        at.map_or(Self::None, Self::At)
    }
}

impl From<Option<Duration>> for Deadline {
    fn from(after: Option<Duration>) -> Self {
        after.map_or(Self::None, Self::After)
    }
}

/// Suspends the current fiber for the given duration.
///
/// Installs a pure-timer leaf in the await graph; the reactor fires it when
/// the deadline passes. The expiry is the success path here, so the timer's
/// "timed out" completion maps to `Ok(())`.
pub async fn sleep(duration: Duration) -> Result<()> {
    sleep_until(Instant::now() + duration).await
}

/// Suspends the current fiber until the given instant.
pub async fn sleep_until(deadline: Instant) -> Result<()> {
    match Readiness::timer(deadline).await {
        Err(e) if e.is_timeout() => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_none() {
        assert_eq!(Deadline::None.resolve(Instant::now()), None);
    }

    #[test]
    fn resolve_absolute_passes_through() {
        let at = Instant::now() + Duration::from_secs(5);
        assert_eq!(Deadline::At(at).resolve(Instant::now()), Some(at));
    }

    #[test]
    fn resolve_relative_adds_to_now() {
        let now = Instant::now();
        let resolved = Deadline::After(Duration::from_millis(250)).resolve(now);
        assert_eq!(resolved, Some(now + Duration::from_millis(250)));
    }

    #[test]
    fn conversions() {
        let now = Instant::now();
        assert_eq!(Deadline::from(now), Deadline::At(now));
        assert_eq!(
            Deadline::from(Duration::from_secs(1)),
            Deadline::After(Duration::from_secs(1))
        );
        assert_eq!(Deadline::from(None::<Duration>), Deadline::None);
        assert!(Deadline::from(None::<Instant>).is_none());
    }
}
