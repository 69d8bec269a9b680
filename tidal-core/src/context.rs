use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Identity and deadline of one update cycle.
///
/// Every network call made during the cycle is bounded by `deadline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleContext {
    pub id: Uuid,
    pub deadline: Instant,
}

impl CycleContext {
    pub fn new(timeout: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            deadline: Instant::now() + timeout,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// The shorter of `limit` and the time left in the cycle.
    pub fn bounded(&self, limit: Duration) -> Duration {
        limit.min(self.remaining())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_tracking() {
        let ctx = CycleContext::new(Duration::from_secs(10));
        assert_eq!(ctx.remaining(), Duration::from_secs(10));
        assert_eq!(ctx.bounded(Duration::from_secs(5)), Duration::from_secs(5));

        tokio::time::advance(Duration::from_secs(7)).await;
        assert_eq!(ctx.bounded(Duration::from_secs(5)), Duration::from_secs(3));
        assert!(!ctx.is_expired());

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(ctx.remaining(), Duration::ZERO);
        assert!(ctx.is_expired());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = CycleContext::new(Duration::from_secs(1));
        let b = CycleContext::new(Duration::from_secs(1));
        assert_ne!(a.id, b.id);
    }
}
