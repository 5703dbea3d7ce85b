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

//! Defines the traits for retry policies and some common implementations.
//!
//! The client libraries automatically retry RPCs when (1) they fail due to
//! transient errors **and** the RPC is [idempotent], (2) or failed before an
//! RPC was started. That is, when it is safe to attempt the RPC more than
//! once.
//!
//! # Example
//! ```
//! # use nimbus_gax::retry_policy::*;
//! use std::time::Duration;
//! // Retry for at most 10 seconds or at most 5 attempts: whichever limit is
//! // reached first stops the retry loop.
//! let policy = TransientErrors
//!     .with_time_limit(Duration::from_secs(10))
//!     .with_attempt_limit(5);
//! ```
//!
//! [idempotent]: https://en.wikipedia.org/wiki/Idempotence

use crate::error::Error;
use crate::retry_result::RetryResult;

/// Determines how errors are handled in the retry loop.
///
/// Implementations of this trait determine if errors are retryable, and for
/// how long the retry loop may continue.
pub trait RetryPolicy: Send + Sync + std::fmt::Debug {
    /// Query the retry policy after an error.
    ///
    /// # Parameters
    /// * `loop_start` - when the retry loop started.
    /// * `attempt_count` - the number of attempts. This method is always
    ///   called after the first attempt.
    /// * `idempotent` - if `true` assume the operation is idempotent. Many
    ///   more errors are retryable on idempotent operations.
    /// * `error` - the last error when attempting the request.
    fn on_error(
        &self,
        loop_start: std::time::Instant,
        attempt_count: u32,
        idempotent: bool,
        error: Error,
    ) -> RetryResult;

    /// The remaining time in the retry policy.
    ///
    /// For policies based on time, this returns the remaining time in the
    /// policy. The retry loop can use this value to adjust the next RPC
    /// timeout. For policies that are not time based this returns `None`.
    ///
    /// # Parameters
    /// * `loop_start` - when the retry loop started.
    /// * `attempt_count` - the number of attempts.
    fn remaining_time(
        &self,
        _loop_start: std::time::Instant,
        _attempt_count: u32,
    ) -> Option<std::time::Duration> {
        None
    }
}

/// Extension trait for [RetryPolicy].
pub trait RetryPolicyExt: RetryPolicy + Sized {
    /// Decorate a [RetryPolicy] to limit the total elapsed time in the retry
    /// loop.
    ///
    /// # Example
    /// ```
    /// # use nimbus_gax::retry_policy::*;
    /// # use nimbus_gax::error::{Error, rpc::Code, rpc::Status};
    /// use std::time::{Duration, Instant};
    /// let policy = TransientErrors.with_time_limit(Duration::from_secs(10));
    /// let loop_start = Instant::now() - Duration::from_secs(20);
    /// assert!(policy.on_error(loop_start, 1, true, transient_error()).is_exhausted());
    ///
    /// fn transient_error() -> Error { Error::service(Status::default().set_code(Code::Unavailable)) }
    /// ```
    fn with_time_limit(self, maximum_duration: std::time::Duration) -> LimitedElapsedTime<Self> {
        LimitedElapsedTime::custom(self, maximum_duration)
    }

    /// Decorate a [RetryPolicy] to limit the number of attempts.
    ///
    /// # Example
    /// ```
    /// # use nimbus_gax::retry_policy::*;
    /// # use nimbus_gax::error::{Error, rpc::Code, rpc::Status};
    /// use std::time::Instant;
    /// let policy = TransientErrors.with_attempt_limit(3);
    /// assert!(policy.on_error(Instant::now(), 1, true, transient_error()).is_continue());
    /// assert!(policy.on_error(Instant::now(), 3, true, transient_error()).is_exhausted());
    ///
    /// fn transient_error() -> Error { Error::service(Status::default().set_code(Code::Unavailable)) }
    /// ```
    fn with_attempt_limit(self, maximum_attempts: u32) -> LimitedAttemptCount<Self> {
        LimitedAttemptCount::custom(self, maximum_attempts)
    }
}

impl<T: RetryPolicy> RetryPolicyExt for T {}

/// A retry policy that retries only transient errors.
///
/// This policy should be decorated to limit the number of retry attempts or
/// the duration of the retry loop.
///
/// The retry decision for server-side errors is based only on the status
/// code, and the only retryable status code is [Unavailable]. I/O errors are
/// ambiguous, the request may or may not have reached the service, so they
/// are retried only on idempotent operations. Errors generated before the
/// RPC started, such as transient failures to fetch an access token, are
/// always retryable.
///
/// [Unavailable]: crate::error::rpc::Code::Unavailable
#[derive(Clone, Debug)]
pub struct TransientErrors;

impl RetryPolicy for TransientErrors {
    fn on_error(
        &self,
        _loop_start: std::time::Instant,
        _attempt_count: u32,
        idempotent: bool,
        error: Error,
    ) -> RetryResult {
        if error.is_transient_and_before_rpc() {
            // The operation never left the client, it is safe to retry even
            // if the operation is not idempotent.
            return RetryResult::Continue(error);
        }
        if !idempotent {
            return RetryResult::Permanent(error);
        }
        if error.is_io() {
            return RetryResult::Continue(error);
        }
        if let Some(status) = error.status() {
            return if status.code == crate::error::rpc::Code::Unavailable {
                RetryResult::Continue(error)
            } else {
                RetryResult::Permanent(error)
            };
        }
        RetryResult::Permanent(error)
    }
}

/// A retry policy decorator that limits the total time in the retry loop.
///
/// This policy decorates an inner policy and limits the duration of retry
/// loops. While the time spent in the retry loop (including time in backoff)
/// is less than the prescribed duration the `on_error()` method returns the
/// results of the inner policy. After that time it returns
/// [Exhausted][RetryResult::Exhausted] if the inner policy returns
/// [Continue][RetryResult::Continue].
///
/// The `remaining_time()` function returns the remaining time. This is always
/// [Duration::ZERO][std::time::Duration::ZERO] once or after the policy's
/// deadline is reached.
///
/// # Parameters
/// * `P` - the inner retry policy, defaults to [TransientErrors].
#[derive(Debug)]
pub struct LimitedElapsedTime<P = TransientErrors>
where
    P: RetryPolicy,
{
    inner: P,
    maximum_duration: std::time::Duration,
}

impl LimitedElapsedTime {
    /// Creates a new instance, with the default inner policy.
    pub fn new(maximum_duration: std::time::Duration) -> Self {
        Self {
            inner: TransientErrors,
            maximum_duration,
        }
    }
}

impl<P> LimitedElapsedTime<P>
where
    P: RetryPolicy,
{
    /// Creates a new instance with a custom inner policy.
    pub fn custom(inner: P, maximum_duration: std::time::Duration) -> Self {
        Self {
            inner,
            maximum_duration,
        }
    }
}

impl<P> RetryPolicy for LimitedElapsedTime<P>
where
    P: RetryPolicy + 'static,
{
    fn on_error(
        &self,
        start: std::time::Instant,
        count: u32,
        idempotent: bool,
        error: Error,
    ) -> RetryResult {
        match self.inner.on_error(start, count, idempotent, error) {
            RetryResult::Permanent(e) => RetryResult::Permanent(e),
            RetryResult::Exhausted(e) => RetryResult::Exhausted(e),
            RetryResult::Continue(e) => {
                if std::time::Instant::now() >= start + self.maximum_duration {
                    RetryResult::Exhausted(e)
                } else {
                    RetryResult::Continue(e)
                }
            }
        }
    }

    fn remaining_time(
        &self,
        start: std::time::Instant,
        attempt_count: u32,
    ) -> Option<std::time::Duration> {
        let deadline = start + self.maximum_duration;
        let remaining = deadline.saturating_duration_since(std::time::Instant::now());
        if let Some(inner) = self.inner.remaining_time(start, attempt_count) {
            return Some(std::cmp::min(remaining, inner));
        }
        Some(remaining)
    }
}

/// A retry policy decorator that limits the number of attempts.
///
/// This policy decorates an inner policy and limits the total number of
/// attempts. Note that `on_error()` is called only after an attempt.
/// Therefore, setting the maximum number of attempts to 0 or 1 results in no
/// retry attempts.
///
/// The policy passes through the results from the inner policy as long as
/// `attempt_count < maximum_attempts`. Once the maximum number of attempts
/// is reached, the policy returns [Exhausted][RetryResult::Exhausted] if the
/// inner policy returns [Continue][RetryResult::Continue].
///
/// # Parameters
/// * `P` - the inner retry policy, defaults to [TransientErrors].
#[derive(Debug)]
pub struct LimitedAttemptCount<P = TransientErrors>
where
    P: RetryPolicy,
{
    inner: P,
    maximum_attempts: u32,
}

impl LimitedAttemptCount {
    /// Creates a new instance, with the default inner policy.
    pub fn new(maximum_attempts: u32) -> Self {
        Self {
            inner: TransientErrors,
            maximum_attempts,
        }
    }
}

impl<P> LimitedAttemptCount<P>
where
    P: RetryPolicy,
{
    /// Creates a new instance with a custom inner policy.
    pub fn custom(inner: P, maximum_attempts: u32) -> Self {
        Self {
            inner,
            maximum_attempts,
        }
    }
}

impl<P> RetryPolicy for LimitedAttemptCount<P>
where
    P: RetryPolicy,
{
    fn on_error(
        &self,
        start: std::time::Instant,
        count: u32,
        idempotent: bool,
        error: Error,
    ) -> RetryResult {
        match self.inner.on_error(start, count, idempotent, error) {
            RetryResult::Permanent(e) => RetryResult::Permanent(e),
            RetryResult::Exhausted(e) => RetryResult::Exhausted(e),
            RetryResult::Continue(e) => {
                if count >= self.maximum_attempts {
                    RetryResult::Exhausted(e)
                } else {
                    RetryResult::Continue(e)
                }
            }
        }
    }

    fn remaining_time(
        &self,
        start: std::time::Instant,
        attempt_count: u32,
    ) -> Option<std::time::Duration> {
        self.inner.remaining_time(start, attempt_count)
    }
}
