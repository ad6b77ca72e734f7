use std::{future::Future, time::Duration};

use crate::ports::Sleeper;

/// Bounded retry with a fixed cooldown between attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first one included. Zero behaves like one.
    pub max_attempts: u32,
    pub cooldown: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, cooldown: Duration) -> Self {
        Self {
            max_attempts,
            cooldown,
        }
    }

    /// Rate-limited deletes get exactly one more try.
    pub fn rate_limited_delete(cooldown: Duration) -> Self {
        Self::new(2, cooldown)
    }

    /// Run `op` until `should_retry` rejects its output or attempts run out.
    /// The last output is returned as-is.
    pub async fn run<T, Fut>(
        &self,
        sleeper: &dyn Sleeper,
        should_retry: impl Fn(&T) -> bool,
        op: impl FnMut() -> Fut,
    ) -> T
    where
        Fut: Future<Output = T>,
    {
        self.run_unless(sleeper, || false, should_retry, op).await
    }

    /// Like [`RetryPolicy::run`], but gives up with the last output once
    /// `stopped` holds. Checked before and after every cooldown, so no retry
    /// starts after a stop request that arrived mid-cooldown.
    pub async fn run_unless<T, Fut>(
        &self,
        sleeper: &dyn Sleeper,
        stopped: impl Fn() -> bool,
        should_retry: impl Fn(&T) -> bool,
        mut op: impl FnMut() -> Fut,
    ) -> T
    where
        Fut: Future<Output = T>,
    {
        let max = self.max_attempts.max(1);
        let mut attempt = 1u32;
        loop {
            let out = op().await;
            if attempt >= max || !should_retry(&out) || stopped() {
                return out;
            }
            tracing::debug!(attempt, cooldown_ms = self.cooldown.as_millis() as u64, "retrying");
            sleeper.sleep(self.cooldown).await;
            if stopped() {
                return out;
            }
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSleeper {
        sleeps: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
        }
    }

    #[tokio::test]
    async fn stops_at_first_accepted_output() {
        let sleeper = RecordingSleeper::default();
        let calls = Mutex::new(0u32);
        let out = RetryPolicy::new(5, Duration::from_secs(1))
            .run(&sleeper, |v: &u32| *v < 3, || {
                let mut c = calls.lock().unwrap();
                *c += 1;
                let v = *c;
                async move { v }
            })
            .await;

        assert_eq!(out, 3);
        assert_eq!(*calls.lock().unwrap(), 3);
        assert_eq!(sleeper.sleeps.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let sleeper = RecordingSleeper::default();
        let calls = Mutex::new(0u32);
        let out = RetryPolicy::rate_limited_delete(Duration::from_secs(5))
            .run(&sleeper, |_: &bool| true, || {
                *calls.lock().unwrap() += 1;
                async { false }
            })
            .await;

        assert!(!out);
        assert_eq!(*calls.lock().unwrap(), 2);
        assert_eq!(
            *sleeper.sleeps.lock().unwrap(),
            vec![Duration::from_secs(5)]
        );
    }

    /// Raises its flag while "sleeping", like a stop request landing
    /// mid-cooldown.
    struct StopDuringSleep {
        flag: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl Sleeper for StopDuringSleep {
        async fn sleep(&self, _duration: Duration) {
            self.flag.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn stop_during_cooldown_skips_the_retry() {
        let sleeper = StopDuringSleep {
            flag: std::sync::atomic::AtomicBool::new(false),
        };
        let calls = Mutex::new(0u32);
        let out = RetryPolicy::rate_limited_delete(Duration::from_secs(5))
            .run_unless(
                &sleeper,
                || sleeper.flag.load(std::sync::atomic::Ordering::SeqCst),
                |v: &&str| *v == "limited",
                || {
                    *calls.lock().unwrap() += 1;
                    async { "limited" }
                },
            )
            .await;

        assert_eq!(out, "limited");
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn already_stopped_never_sleeps() {
        let sleeper = RecordingSleeper::default();
        let calls = Mutex::new(0u32);
        RetryPolicy::new(3, Duration::from_secs(1))
            .run_unless(&sleeper, || true, |_: &()| true, || {
                *calls.lock().unwrap() += 1;
                async {}
            })
            .await;

        assert_eq!(*calls.lock().unwrap(), 1);
        assert!(sleeper.sleeps.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_attempts_still_runs_once() {
        let sleeper = RecordingSleeper::default();
        let calls = Mutex::new(0u32);
        RetryPolicy::new(0, Duration::from_secs(1))
            .run(&sleeper, |_: &()| true, || {
                *calls.lock().unwrap() += 1;
                async {}
            })
            .await;

        assert_eq!(*calls.lock().unwrap(), 1);
        assert!(sleeper.sleeps.lock().unwrap().is_empty());
    }
}
