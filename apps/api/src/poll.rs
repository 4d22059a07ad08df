//! Bounded polling helper for artifacts that appear asynchronously (e.g. an
//! analysis payload still being written by an in-flight run). Fixed attempt
//! count and interval; never an unbounded wait.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Ready(T),
    TimedOut,
}

/// Probes up to `attempts` times, sleeping `interval` between tries.
/// `Ok(None)` from the probe means "not there yet"; a probe error is a real
/// failure and propagates immediately.
pub async fn poll_until<T, F, Fut>(
    attempts: u32,
    interval: Duration,
    mut probe: F,
) -> Result<PollOutcome<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    for attempt in 1..=attempts {
        if let Some(value) = probe().await? {
            return Ok(PollOutcome::Ready(value));
        }
        if attempt < attempts {
            tokio::time::sleep(interval).await;
        }
    }
    Ok(PollOutcome::TimedOut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_ready_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let outcome = poll_until(5, Duration::from_secs(1), || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok(if n >= 3 { Some(n) } else { None }) }
        })
        .await
        .unwrap();
        assert_eq!(outcome, PollOutcome::Ready(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_times_out_after_bounded_attempts() {
        let calls = AtomicU32::new(0);
        let outcome: PollOutcome<()> = poll_until(4, Duration::from_secs(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(None) }
        })
        .await
        .unwrap();
        assert_eq!(outcome, PollOutcome::TimedOut);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_poll_until_propagates_probe_error() {
        let result: Result<PollOutcome<()>> = poll_until(3, Duration::from_millis(1), || async {
            Err(anyhow::anyhow!("store unreachable"))
        })
        .await;
        assert!(result.is_err());
    }
}
