//! Export file polling.
//!
//! Export commands answer immediately with the URL of a file the server is
//! still writing. The file is polled with doubling delays until it exists,
//! the timeout passes, or the caller cancels.

use crate::config::ExportConfig;
use crate::error::ClientError;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Shortest wait between two polls.
pub const MIN_POLL_DELAY: Duration = Duration::from_millis(100);

/// Polling parameters for [`crate::Client::fetch_export`].
#[derive(Debug, Clone)]
pub struct ExportPoll {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub timeout: Duration,
    pub cancel: CancellationToken,
}

impl Default for ExportPoll {
    fn default() -> Self {
        Self::from_config(&ExportConfig::default())
    }
}

impl ExportPoll {
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            initial_delay: config.initial_delay().max(MIN_POLL_DELAY),
            max_delay: config.max_delay().max(MIN_POLL_DELAY),
            timeout: config.timeout(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_delay = initial.max(MIN_POLL_DELAY);
        self.max_delay = max.max(self.initial_delay);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Delay before the first poll.
    pub(crate) fn first_delay(&self) -> Duration {
        self.initial_delay.max(MIN_POLL_DELAY)
    }

    /// Delay following `current`.
    pub(crate) fn next_delay(&self, current: Duration) -> Duration {
        current
            .saturating_mul(2)
            .min(self.max_delay)
            .max(MIN_POLL_DELAY)
    }

    /// Sleeps for `delay` unless cancelled first.
    pub(crate) async fn wait(&self, delay: Duration) -> Result<(), ClientError> {
        if self.cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ClientError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_delays_double_up_to_max() {
        let poll = ExportPoll::default()
            .with_delays(Duration::from_millis(100), Duration::from_millis(350));
        let mut delay = poll.initial_delay;
        let mut seen = vec![delay];
        for _ in 0..4 {
            delay = poll.next_delay(delay);
            seen.push(delay);
        }
        let millis: Vec<u128> = seen.iter().map(Duration::as_millis).collect();
        assert_eq!(millis, vec![100, 200, 350, 350, 350]);
    }

    #[test]
    fn test_max_delay_not_below_initial() {
        let poll = ExportPoll::default().with_delays(Duration::from_secs(2), Duration::from_secs(1));
        assert_eq!(poll.max_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_zero_delays_clamped() {
        let poll = ExportPoll::default().with_delays(Duration::ZERO, Duration::ZERO);
        assert_eq!(poll.initial_delay, MIN_POLL_DELAY);
        assert_eq!(poll.max_delay, MIN_POLL_DELAY);
        assert_eq!(poll.next_delay(Duration::ZERO), MIN_POLL_DELAY);

        let poll = ExportPoll::from_config(&ExportConfig {
            initial_delay_ms: 0,
            max_delay_ms: 0,
            timeout_secs: 1,
        });
        assert_eq!(poll.first_delay(), MIN_POLL_DELAY);
        assert_eq!(poll.next_delay(poll.first_delay()), MIN_POLL_DELAY);

        let mut poll = ExportPoll::default();
        poll.initial_delay = Duration::ZERO;
        poll.max_delay = Duration::ZERO;
        assert_eq!(poll.first_delay(), MIN_POLL_DELAY);
        assert_eq!(poll.next_delay(Duration::from_millis(1)), MIN_POLL_DELAY);
    }

    #[tokio::test]
    async fn test_wait_sleeps() {
        let poll = ExportPoll::default();
        let started = Instant::now();
        poll.wait(Duration::from_millis(20)).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_wait_cancelled() {
        let token = CancellationToken::new();
        let poll = ExportPoll::default().with_cancel(token.clone());

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let err = poll.wait(Duration::from_secs(30)).await.unwrap_err();
        assert!(matches!(err, ClientError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(30));

        assert!(matches!(
            poll.wait(Duration::from_millis(1)).await,
            Err(ClientError::Cancelled)
        ));
    }
}
