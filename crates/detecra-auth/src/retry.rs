use std::time::Duration;

/// Bounded retry for profile provisioning.
///
/// `max_attempts` counts every attempt, the first one included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backoff {
    Fixed(Duration),
    Exponential { initial: Duration, max: Duration },
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, backoff: Backoff::Fixed(delay) }
    }

    pub fn exponential(max_attempts: u32, initial: Duration, max: Duration) -> Self {
        Self { max_attempts, backoff: Backoff::Exponential { initial, max } }
    }

    /// Retries without sleeping in between.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::fixed(max_attempts, Duration::ZERO)
    }

    /// Delay to wait after the failed `attempt` (1-based), or `None` once attempts are exhausted.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }

        Some(match self.backoff {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { initial, max } => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                initial.saturating_mul(factor).min(max)
            }
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(1))
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::RetryPolicy;

    #[test]
    fn when_using_default_policy_then_three_attempts_are_spaced_by_one_second() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.delay_after(1), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_after(2), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_after(3), None);
    }

    #[test]
    fn when_backoff_is_exponential_then_delay_doubles_up_to_max() {
        let policy = RetryPolicy::exponential(5, Duration::from_millis(100), Duration::from_millis(300));

        assert_eq!(policy.delay_after(1), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay_after(2), Some(Duration::from_millis(200)));
        assert_eq!(policy.delay_after(3), Some(Duration::from_millis(300)));
        assert_eq!(policy.delay_after(4), Some(Duration::from_millis(300)));
        assert_eq!(policy.delay_after(5), None);
    }

    #[test]
    fn when_single_attempt_is_allowed_then_nothing_is_retried() {
        assert_eq!(RetryPolicy::immediate(1).delay_after(1), None);
        assert_eq!(RetryPolicy::immediate(0).delay_after(1), None);
    }
}
