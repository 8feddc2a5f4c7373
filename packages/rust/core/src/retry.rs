//! Bounded retry with a fixed backoff, and the timed-wait primitive it uses.

use std::time::Duration;

use tracing::{debug, warn};

/// Why the pipeline is waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseReason {
    /// Between two attempts of the same operation.
    Retry,
    /// After a dispatched row, to respect external-service throttling.
    RowPacing,
}

/// A plain timed wait. Swappable so tests can observe waits without sleeping.
pub trait Pacer: Send + Sync {
    fn pause(&self, duration: Duration, reason: PauseReason);
}

/// Blocks the current thread for the requested duration.
pub struct ThreadPacer;

impl Pacer for ThreadPacer {
    fn pause(&self, duration: Duration, reason: PauseReason) {
        if duration.is_zero() {
            return;
        }
        debug!(?reason, delay_ms = duration.as_millis(), "pausing");
        std::thread::sleep(duration);
    }
}

/// How a retried operation ultimately failed.
#[derive(Debug)]
pub enum Exhausted<E> {
    /// The policy allows zero attempts; the operation never ran.
    NoAttempts,
    /// Every attempt failed; `last` is the final error.
    Failed { attempts: u32, last: E },
}

/// Up to `max_attempts` tries with `backoff` between consecutive tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Run `op` until it succeeds or the attempts are used up.
    ///
    /// `op` receives the 1-based attempt number. The pacer is called between
    /// attempts only, never after the last one.
    pub fn run<T, E>(
        &self,
        pacer: &dyn Pacer,
        mut op: impl FnMut(u32) -> Result<T, E>,
    ) -> Result<T, Exhausted<E>>
    where
        E: std::fmt::Display,
    {
        let mut last = None;

        for attempt in 1..=self.max_attempts {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(attempt, max_attempts = self.max_attempts, error = %e, "attempt failed");
                    last = Some(e);
                    if attempt < self.max_attempts {
                        pacer.pause(self.backoff, PauseReason::Retry);
                    }
                }
            }
        }

        match last {
            Some(last) => Err(Exhausted::Failed {
                attempts: self.max_attempts,
                last,
            }),
            None => Err(Exhausted::NoAttempts),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPacer {
        pauses: Mutex<Vec<(Duration, PauseReason)>>,
    }

    impl Pacer for RecordingPacer {
        fn pause(&self, duration: Duration, reason: PauseReason) {
            self.pauses.lock().unwrap().push((duration, reason));
        }
    }

    #[test]
    fn permanent_failure_uses_every_attempt() {
        let pacer = RecordingPacer::default();
        let policy = RetryPolicy::new(3, Duration::from_secs(2));
        let mut calls = 0;

        let result: Result<(), _> = policy.run(&pacer, |_| {
            calls += 1;
            Err("relay refused")
        });

        assert_eq!(calls, 3);
        match result {
            Err(Exhausted::Failed { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last, "relay refused");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        let pauses = pacer.pauses.lock().unwrap();
        assert_eq!(pauses.len(), 2);
        assert!(
            pauses
                .iter()
                .all(|p| *p == (Duration::from_secs(2), PauseReason::Retry))
        );
    }

    #[test]
    fn success_stops_retrying() {
        let pacer = RecordingPacer::default();
        let policy = RetryPolicy::new(5, Duration::from_millis(10));

        let result = policy.run(&pacer, |attempt| {
            if attempt < 2 { Err("flaky") } else { Ok(attempt) }
        });

        assert_eq!(result.unwrap(), 2);
        assert_eq!(pacer.pauses.lock().unwrap().len(), 1);
    }

    #[test]
    fn zero_attempts_never_runs_or_waits() {
        let pacer = RecordingPacer::default();
        let policy = RetryPolicy::new(0, Duration::from_secs(1));
        let mut calls = 0;

        let result: Result<(), Exhausted<&str>> = policy.run(&pacer, |_| {
            calls += 1;
            Ok(())
        });

        assert!(matches!(result, Err(Exhausted::NoAttempts)));
        assert_eq!(calls, 0);
        assert!(pacer.pauses.lock().unwrap().is_empty());
    }

    #[test]
    fn thread_pacer_skips_zero_delay() {
        let start = std::time::Instant::now();
        ThreadPacer.pause(Duration::ZERO, PauseReason::RowPacing);
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
