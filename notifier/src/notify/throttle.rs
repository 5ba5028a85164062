use super::{NotifyError, Notifier};
use common::JobOffer;
use governor::clock::{Clock, DefaultClock};
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use tracing::debug;

type SendLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rate limit around another notifier. Each send waits for a permit,
/// blocking the run until the quota allows it.
pub struct Throttled<N> {
    inner: N,
    limiter: SendLimiter,
    clock: DefaultClock,
}

impl<N: Notifier> Throttled<N> {
    pub fn with_quota(inner: N, quota: Quota) -> Self {
        let clock = DefaultClock::default();
        Self {
            inner,
            limiter: RateLimiter::direct_with_clock(quota, clock.clone()),
            clock,
        }
    }

    /// At most `max_sends` per minute; a zero limit is treated as one.
    pub fn per_minute(inner: N, max_sends: u32) -> Self {
        let max_sends = NonZeroU32::new(max_sends).unwrap_or(NonZeroU32::MIN);
        Self::with_quota(inner, Quota::per_minute(max_sends))
    }

    fn wait_for_permit(&self) {
        while let Err(not_until) = self.limiter.check() {
            let wait = not_until.wait_time_from(self.clock.now());
            debug!(wait_ms = wait.as_millis() as u64, "Send rate limit reached, waiting");
            std::thread::sleep(wait);
        }
    }
}

impl<N: Notifier> Notifier for Throttled<N> {
    fn notify(&self, offer: &JobOffer) -> Result<(), NotifyError> {
        self.wait_for_permit();
        self.inner.notify(offer)
    }
}
