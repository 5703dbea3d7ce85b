// Copyright 2025 Nimbus Cloud LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The retry loops used by the client libraries.
//!
//! The loops call an inner function until it succeeds, the retry policy is
//! exhausted, or the error is not retryable. In between attempts they wait
//! the amount of time prescribed by the backoff policy. The asynchronous
//! variants never block a thread: both the attempt and the backoff wait are
//! suspension points, and the caller's runtime supplies the worker threads.

use super::Result;
use super::backoff_policy::BackoffPolicy;
use super::error::Error;
use super::retry_policy::RetryPolicy;
use super::retry_result::RetryResult;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

enum RetryLoopAttempt {
    // The first attempt
    Initial,
    // (Attempt count, backoff delay, previous error)
    Retry(u32, Duration, Error),
}

impl RetryLoopAttempt {
    fn count(&self) -> u32 {
        match self {
            RetryLoopAttempt::Initial => 0,
            RetryLoopAttempt::Retry(count, _, _) => *count,
        }
    }
}

/// Runs the retry loop for a given function.
///
/// This function calls an inner function as long as (1) the retry policy has
/// not expired, and (2) the inner function has not returned a successful
/// request.
///
/// In between calls the function waits the amount of time prescribed by the
/// backoff policy, using `sleep` to implement any sleep.
pub async fn retry_loop<F, S, Response>(
    inner: F,
    sleep: S,
    idempotent: bool,
    retry_policy: Arc<dyn RetryPolicy>,
    backoff_policy: Arc<dyn BackoffPolicy>,
) -> Result<Response>
where
    F: AsyncFnMut(Option<Duration>) -> Result<Response> + Send,
    S: AsyncFn(Duration) -> () + Send,
{
    // A token that is never cancelled.
    let cancel = CancellationToken::new();
    retry_loop_with_cancel(inner, sleep, idempotent, retry_policy, backoff_policy, cancel).await
}

/// Runs the retry loop for a given function, with caller-initiated
/// cancellation.
///
/// The loop behaves as [retry_loop] until `cancel` fires. Cancellation
/// short-circuits the loop at the next suspension point: a pending backoff
/// wait is abandoned, an in-flight attempt is dropped, and no further
/// attempts are made. The loop resolves with a [cancelled][Error::cancelled]
/// error. Because the loop is a single future, the result is reported
/// exactly once no matter which path terminates it.
pub async fn retry_loop_with_cancel<F, S, Response>(
    mut inner: F,
    sleep: S,
    idempotent: bool,
    retry_policy: Arc<dyn RetryPolicy>,
    backoff_policy: Arc<dyn BackoffPolicy>,
    cancel: CancellationToken,
) -> Result<Response>
where
    F: AsyncFnMut(Option<Duration>) -> Result<Response> + Send,
    S: AsyncFn(Duration) -> () + Send,
{
    let loop_start = tokio::time::Instant::now().into_std();
    let mut attempt_state = RetryLoopAttempt::Initial;
    loop {
        let mut attempt_count = attempt_state.count();
        let remaining_time = retry_policy.remaining_time(loop_start, attempt_count);

        if let RetryLoopAttempt::Retry(_, delay, prev_error) = attempt_state {
            if remaining_time.is_some_and(|remaining| remaining < delay) {
                return Err(Error::exhausted(prev_error));
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(Error::cancelled(prev_error));
                }
                _ = sleep(delay) => {}
            }
        }
        attempt_count += 1;
        let result = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(Error::cancelled(CANCELLED_IN_FLIGHT));
            }
            r = inner(remaining_time) => r,
        };
        match result {
            Ok(r) => {
                return Ok(r);
            }
            Err(e) => {
                let flow = retry_policy.on_error(loop_start, attempt_count, idempotent, e);
                let delay = backoff_policy.on_failure(loop_start, attempt_count);
                match flow {
                    RetryResult::Permanent(e) => return Err(e),
                    // Callers distinguish "the budget ran out" from "the
                    // request is known to be wrong".
                    RetryResult::Exhausted(e) => return Err(Error::exhausted(e)),
                    RetryResult::Continue(e) => {
                        attempt_state = RetryLoopAttempt::Retry(attempt_count, delay, e);
                        continue;
                    }
                }
            }
        };
    }
}

const CANCELLED_IN_FLIGHT: &str = "the caller cancelled an in-flight attempt";

/// Runs the retry loop for a given function, blocking the calling thread.
///
/// This is the synchronous analogue of [retry_loop]: the calling thread is
/// occupied for the entire retry sequence, including the backoff sleeps. The
/// decision logic is identical.
///
/// # Parameters
/// * `inner` - the function to call. It receives the remaining time budget.
/// * `sleep` - implements the backoff wait, usually `std::thread::sleep`.
/// * `idempotent` - whether the operation is safe to attempt more than once.
/// * `retry_policy` - decides if the loop may continue after an error.
/// * `backoff_policy` - prescribes the delay before the next attempt.
pub fn retry_loop_blocking<F, S, Response>(
    mut inner: F,
    mut sleep: S,
    idempotent: bool,
    retry_policy: Arc<dyn RetryPolicy>,
    backoff_policy: Arc<dyn BackoffPolicy>,
) -> Result<Response>
where
    F: FnMut(Option<Duration>) -> Result<Response>,
    S: FnMut(Duration),
{
    let loop_start = std::time::Instant::now();
    let mut attempt_state = RetryLoopAttempt::Initial;
    loop {
        let mut attempt_count = attempt_state.count();
        let remaining_time = retry_policy.remaining_time(loop_start, attempt_count);

        if let RetryLoopAttempt::Retry(_, delay, prev_error) = attempt_state {
            if remaining_time.is_some_and(|remaining| remaining < delay) {
                return Err(Error::exhausted(prev_error));
            }
            sleep(delay);
        }
        attempt_count += 1;
        match inner(remaining_time) {
            Ok(r) => {
                return Ok(r);
            }
            Err(e) => {
                let flow = retry_policy.on_error(loop_start, attempt_count, idempotent, e);
                let delay = backoff_policy.on_failure(loop_start, attempt_count);
                match flow {
                    RetryResult::Permanent(e) => return Err(e),
                    RetryResult::Exhausted(e) => return Err(Error::exhausted(e)),
                    RetryResult::Continue(e) => {
                        attempt_state = RetryLoopAttempt::Retry(attempt_count, delay, e);
                        continue;
                    }
                }
            }
        };
    }
}
