//! Bounded retry executor.
//!
//! [`try_do`] only counts attempts and decides when to stop; the unit of work
//! decides whether a failure is worth retrying and does any sleeping itself.
//! [`RetryPolicy::call`] is the wrapper the engine puts around every node call:
//! fixed delay between attempts, every client error retried.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::error::{ClientError, FeedError};

/// Outcome of a failed attempt.
#[derive(Debug)]
pub enum Attempt<E> {
    /// Transient failure; try again if the budget allows.
    Retry(E),
    /// Final failure; stop immediately.
    Abort(E),
}

/// Error returned by [`try_do`].
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every allowed attempt asked to be retried.
    #[error("exceeded retry limit after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    /// The work reported a final error.
    #[error("{0}")]
    Aborted(E),
}

impl<E> RetryError<E> {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    /// The underlying error, regardless of how the loop ended.
    pub fn into_inner(self) -> E {
        match self {
            Self::Exhausted { last, .. } => last,
            Self::Aborted(e) => e,
        }
    }
}

/// Run `work` until it succeeds, aborts, or has been retried `limit` times.
///
/// `work` receives the 1-based attempt number. Work that keeps asking for a
/// retry is invoked `limit + 1` times in total.
pub async fn try_do<T, E, F, Fut>(limit: u32, mut work: F) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, Attempt<E>>>,
{
    let mut attempt = 1u32;
    loop {
        match work(attempt).await {
            Ok(value) => return Ok(value),
            Err(Attempt::Abort(e)) => return Err(RetryError::Aborted(e)),
            Err(Attempt::Retry(e)) => {
                if attempt > limit {
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: e,
                    });
                }
                attempt += 1;
            }
        }
    }
}

/// Fixed-delay retry policy for node calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub limit: u32,
    /// Sleep between attempts.
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn new(limit: u32, timeout: Duration) -> Self {
        Self { limit, timeout }
    }

    /// Call `f`, retrying any [`ClientError`].
    ///
    /// `operation` names the call in logs and in the returned [`FeedError`].
    /// A zero limit runs `f` once; its failure is reported as exhausted after
    /// one attempt.
    pub async fn call<T, F, Fut>(&self, operation: &'static str, mut f: F) -> Result<T, FeedError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let limit = self.limit;
        let timeout = self.timeout;
        let result: Result<T, RetryError<ClientError>> = try_do(limit, |attempt| {
            let fut = f();
            async move {
                match fut.await {
                    Ok(value) => Ok(value),
                    Err(e) => {
                        if attempt <= limit {
                            tracing::warn!(
                                operation,
                                attempt,
                                transient = e.is_retryable(),
                                delay_ms = timeout.as_millis() as u64,
                                error = %e,
                                "node call failed, retrying"
                            );
                            tokio::time::sleep(timeout).await;
                        } else {
                            tracing::error!(operation, attempt, error = %e, "retry limit reached");
                        }
                        Err(Attempt::Retry(e))
                    }
                }
            }
        })
        .await;

        result.map_err(|e| match e {
            RetryError::Exhausted { attempts, last } => FeedError::RetryExhausted {
                operation,
                attempts,
                source: last,
            },
            // Not produced: every failure above is `Attempt::Retry`.
            RetryError::Aborted(source) => FeedError::RetryExhausted {
                operation,
                attempts: 1,
                source,
            },
        })
    }
}
