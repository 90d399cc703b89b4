//! Pipeline-wide request rate gate

use crate::events::{EventSink, NoopSink, RunEvent};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Waits shorter than this are not reported
const REPORT_THRESHOLD: Duration = Duration::from_millis(1);

/// Token bucket shared by every remote call of a run.
///
/// Refills at `rps` per second with a burst of `max(1, floor(rps))`.
pub struct RateGate {
    limiter: DefaultDirectRateLimiter,
    rps: f64,
    sink: Arc<dyn EventSink>,
}

impl RateGate {
    /// Build a gate for a positive request rate.
    ///
    /// Non-positive or non-finite rates yield `None`; callers validate first.
    pub fn new(rps: f64) -> Option<Self> {
        let period = Self::refill_period(rps)?;
        let burst = NonZeroU32::new((rps.floor() as u32).max(1))?;
        let quota = Quota::with_period(period)?.allow_burst(burst);

        Some(Self {
            limiter: RateLimiter::direct(quota),
            rps,
            sink: Arc::new(NoopSink),
        })
    }

    /// Interval between refills, floored at one nanosecond.
    ///
    /// `None` for non-positive, non-finite or vanishingly small rates.
    pub fn refill_period(rps: f64) -> Option<Duration> {
        if !rps.is_finite() || rps <= 0.0 {
            return None;
        }
        let period = Duration::try_from_secs_f64(1.0 / rps).ok()?;
        Some(period.max(Duration::from_nanos(1)))
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn rps(&self) -> f64 {
        self.rps
    }

    /// Wait until one more request is permitted
    pub async fn acquire(&self) {
        let start = Instant::now();
        self.limiter.until_ready().await;
        let waited = start.elapsed();
        if waited >= REPORT_THRESHOLD {
            self.sink.emit(&RunEvent::RateLimitWait {
                limit_rps: self.rps,
                waited,
            });
        }
    }
}

impl std::fmt::Debug for RateGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateGate").field("rps", &self.rps).finish()
    }
}
