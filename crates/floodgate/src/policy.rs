use core::time::Duration;

/// What a worker does with an item whose processing attempt failed.
///
/// The default, [`FailurePolicy::Drop`], reports the failure and moves on:
/// there is no retry and no dead-letter queue. Retrying is opt-in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Report the failure and discard the item.
    #[default]
    Drop,

    /// Re-run the item on the same worker, up to `max_attempts` attempts in
    /// total, sleeping `backoff` between attempts. The item is dropped after
    /// the last failed attempt.
    Retry { max_attempts: u32, backoff: Duration },
}

impl FailurePolicy {
    /// Total number of attempts an item gets, including the first.
    pub const fn max_attempts(&self) -> u32 {
        match self {
            Self::Drop => 1,
            Self::Retry { max_attempts, .. } => *max_attempts,
        }
    }

    pub(crate) const fn backoff(&self) -> Duration {
        match self {
            Self::Drop => Duration::ZERO,
            Self::Retry { backoff, .. } => *backoff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_allows_a_single_attempt() {
        let policy = FailurePolicy::default();
        assert_eq!(policy, FailurePolicy::Drop);
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.backoff(), Duration::ZERO);
    }

    #[test]
    fn retry_reports_its_budget() {
        let policy = FailurePolicy::Retry {
            max_attempts: 3,
            backoff: Duration::from_millis(5),
        };
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.backoff(), Duration::from_millis(5));
    }
}
