use std::time::Duration;

use tokio::time::Instant;

/// Wall-clock deadline of a whole judging call.
///
/// Every blocking step (reading competitor output, writing to it, invoking
/// the interactor) takes a `&Deadline` and bounds itself by [`Deadline::at`]
/// or by [`Deadline::capped`], so expiry is observed inside the blocking
/// call rather than between protocol steps.
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    started: Instant,
    limit: Duration,
}

impl Deadline {
    pub fn start(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    pub fn at(&self) -> Instant {
        self.started + self.limit
    }

    pub fn limit_ms(&self) -> u64 {
        self.limit.as_millis() as u64
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn expired(&self) -> bool {
        self.elapsed() >= self.limit
    }

    /// Elapsed time in milliseconds, never more than the limit.
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed().min(self.limit).as_millis() as u64
    }

    /// The earlier of `now + timeout` and the deadline itself.
    pub fn capped(&self, timeout: Duration) -> Instant {
        (Instant::now() + timeout).min(self.at())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_expiry_and_clipping() {
        let deadline = Deadline::start(Duration::from_millis(500));
        assert!(!deadline.expired());

        tokio::time::advance(Duration::from_millis(200)).await;
        assert_eq!(deadline.elapsed_ms(), 200);
        assert!(!deadline.expired());

        tokio::time::advance(Duration::from_millis(900)).await;
        assert!(deadline.expired());
        assert_eq!(deadline.elapsed_ms(), 500);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capped_never_exceeds_deadline() {
        let deadline = Deadline::start(Duration::from_millis(1500));

        let short = deadline.capped(Duration::from_secs(1));
        assert_eq!(short, Instant::now() + Duration::from_secs(1));

        tokio::time::advance(Duration::from_millis(1000)).await;
        assert_eq!(deadline.capped(Duration::from_secs(1)), deadline.at());
    }
}
