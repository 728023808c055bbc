/*!

The condition poller that every wait in the harness is built on.

A condition is an async closure performing one observation. It reports `Ok(true)` when the awaited
state has been reached and `Ok(false)` when it has not. Observation failures are reported as a
[`CheckError`]: transient ones are logged and retried exactly like `Ok(false)`, fatal ones stop the
poll immediately.

!*/

use crate::error::{self, BoxedError, Error, Result};
use log::{debug, info};
use snafu::ensure;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// The outcome of a single observation made by a poll condition.
pub type CheckResult = std::result::Result<bool, CheckError>;

/// An error raised by a poll condition.
#[derive(Debug)]
pub enum CheckError {
    /// The observation could not be made this time (e.g. the object does not exist yet). The
    /// poll continues.
    Transient(BoxedError),
    /// The condition can never be satisfied. The poll stops and the error is returned.
    Fatal(BoxedError),
}

impl CheckError {
    pub fn transient<E: Into<BoxedError>>(e: E) -> Self {
        CheckError::Transient(e.into())
    }

    pub fn fatal<E: Into<BoxedError>>(e: E) -> Self {
        CheckError::Fatal(e.into())
    }
}

impl Display for CheckError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckError::Transient(e) => write!(f, "{}", e),
            CheckError::Fatal(e) => write!(f, "fatal: {}", e),
        }
    }
}

/// Reports a wrong observation. It is retried exactly like `Ok(false)`, but `observed` is kept as
/// the reason in the timeout error.
pub fn mismatch<S: Into<String>>(observed: S) -> CheckResult {
    Err(CheckError::Transient(observed.into().into()))
}

/// Lets a condition classify any error with `?`.
pub trait CheckResultExt<T> {
    fn transient(self) -> std::result::Result<T, CheckError>;
    fn fatal(self) -> std::result::Result<T, CheckError>;
}

impl<T, E> CheckResultExt<T> for std::result::Result<T, E>
where
    E: Into<BoxedError>,
{
    fn transient(self) -> std::result::Result<T, CheckError> {
        self.map_err(CheckError::transient)
    }

    fn fatal(self) -> std::result::Result<T, CheckError> {
        self.map_err(CheckError::fatal)
    }
}

/// How often and for how long to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSpec {
    interval: Duration,
    timeout: Duration,
    immediate: bool,
}

impl PollSpec {
    /// `interval` must be non-zero and no longer than `timeout`.
    pub fn new(interval: Duration, timeout: Duration) -> Result<Self> {
        ensure!(
            !interval.is_zero() && timeout >= interval,
            error::InvalidPollSpecSnafu { interval, timeout }
        );
        Ok(Self {
            interval,
            timeout,
            immediate: false,
        })
    }

    /// Check the condition once before the first sleep instead of after it.
    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Poll `check` until it is satisfied, it fails fatally, or `spec.timeout()` has elapsed.
/// `what` names the awaited condition in logs and in the timeout error. On success the number of
/// attempts is returned.
pub async fn poll<F, Fut>(spec: PollSpec, what: &str, mut check: F) -> Result<u32>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CheckResult>,
{
    let start = Instant::now();
    let mut attempts = 0u32;
    let mut last = None;
    loop {
        if attempts > 0 || !spec.immediate {
            sleep(spec.interval).await;
        }
        attempts += 1;
        match check().await {
            Ok(true) => {
                debug!("'{}' satisfied after {} attempt(s)", what, attempts);
                return Ok(attempts);
            }
            Ok(false) => {
                debug!("'{}' not satisfied yet (attempt {})", what, attempts);
                last = None;
            }
            Err(CheckError::Transient(e)) => {
                info!("'{}' not observable yet (attempt {}): {}", what, attempts, e);
                last = Some(e.to_string());
            }
            Err(CheckError::Fatal(source)) => {
                return Err(Error::Aborted {
                    what: what.to_string(),
                    source,
                });
            }
        }
        if start.elapsed() >= spec.timeout {
            return Err(Error::Timeout {
                what: what.to_string(),
                timeout: spec.timeout,
                attempts,
                last,
            });
        }
    }
}

/// Retry `operation` until it succeeds, returning its value. Every error is treated as transient
/// and the last one is carried in the timeout error.
pub async fn eventually<T, E, F, Fut>(spec: PollSpec, what: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Into<BoxedError>,
{
    let slot = Mutex::new(None);
    poll(spec, what, || {
        let attempt = operation();
        let slot = &slot;
        async move {
            let value = attempt.await.transient()?;
            if let Ok(mut guard) = slot.lock() {
                *guard = Some(value);
            }
            Ok::<_, CheckError>(true)
        }
    })
    .await?;
    slot.into_inner()
        .ok()
        .flatten()
        .ok_or_else(|| Error::Missing {
            what: "value".to_string(),
            from: what.to_string(),
        })
}

/// Shorthand for `PollSpec::new(Duration::from_secs(interval), Duration::from_secs(timeout))`.
pub fn secs(interval: u64, timeout: u64) -> Result<PollSpec> {
    PollSpec::new(Duration::from_secs(interval), Duration::from_secs(timeout))
}
