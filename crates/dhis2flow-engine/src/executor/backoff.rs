use std::time::Duration;

/// Exponential delay between step attempts, capped at `max`.
///
/// Delays never decrease from one retry to the next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub initial: Duration,
    pub multiplier: f64,
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            multiplier: 2.0,
            max: Duration::from_secs(60),
        }
    }
}

impl Backoff {
    /// Retry immediately
    pub fn none() -> Self {
        Self::fixed(Duration::ZERO)
    }

    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial: delay,
            multiplier: 1.0,
            max: delay,
        }
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay(&self, retry: u32) -> Duration {
        let multiplier = if self.multiplier.is_finite() {
            self.multiplier.max(1.0)
        } else {
            1.0
        };
        let exponent = retry.saturating_sub(1).min(64) as i32;
        let secs = self.initial.as_secs_f64() * multiplier.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max.as_secs_f64()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_curve() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay(1), Duration::from_secs(1));
        assert_eq!(backoff.delay(2), Duration::from_secs(2));
        assert_eq!(backoff.delay(3), Duration::from_secs(4));
        assert_eq!(backoff.delay(10), Duration::from_secs(60));
        assert_eq!(backoff.delay(1000), Duration::from_secs(60));
    }

    #[test]
    fn test_non_decreasing_even_with_shrinking_multiplier() {
        let backoff = Backoff {
            initial: Duration::from_millis(100),
            multiplier: 0.5,
            max: Duration::from_secs(1),
        };
        let delays: Vec<Duration> = (1..10).map(|r| backoff.delay(r)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_none_and_fixed() {
        assert_eq!(Backoff::none().delay(5), Duration::ZERO);
        assert_eq!(
            Backoff::fixed(Duration::from_millis(250)).delay(3),
            Duration::from_millis(250)
        );
    }
}
