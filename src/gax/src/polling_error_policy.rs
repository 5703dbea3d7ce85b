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

//! Defines the types for polling error policies.
//!
//! # Example
//! ```
//! # use nimbus_gax::polling_error_policy::*;
//! use std::time::Duration;
//! // Poll for at most 15 minutes or at most 50 attempts: whichever limit is
//! // reached first stops the polling loop.
//! let policy = TransientErrors
//!     .with_time_limit(Duration::from_secs(15 * 60))
//!     .with_attempt_limit(50);
//! ```
//!
//! The client libraries automatically poll long-running and
//! eventually-consistent operations and need to (1) distinguish between
//! transient and permanent errors, and (2) provide a mechanism to limit the
//! polling loop duration even when every poll succeeds but the operation has
//! not completed.
//!
//! We provide a trait that applications may implement to customize the
//! behavior of the polling loop, and some common implementations that should
//! meet most needs.

use crate::error::Error;
use crate::loop_state::LoopState;

/// Determines how errors are handled in the polling loop.
///
/// Implementations of this trait determine if polling errors may resolve in
/// future attempts, and for how long the polling loop may continue.
pub trait PollingErrorPolicy: Send + Sync + std::fmt::Debug {
    /// Query the polling policy after an error.
    ///
    /// # Parameters
    /// * `loop_start` - when the polling loop started.
    /// * `attempt_count` - the number of attempts. This includes the initial
    ///   attempt, so it is always non-zero.
    /// * `error` - the last error when attempting the request.
    fn on_error(
        &self,
        loop_start: std::time::Instant,
        attempt_count: u32,
        error: Error,
    ) -> LoopState;

    /// Called when the operation is successfully polled, but has not
    /// completed yet.
    ///
    /// Returning an error stops the polling loop. The common implementations
    /// return an [Exhausted] report once their time or attempt budget is
    /// spent, so a slow operation is reported as a timeout rather than a
    /// hard failure.
    fn on_in_progress(
        &self,
        _loop_start: std::time::Instant,
        _attempt_count: u32,
        _operation_name: &str,
    ) -> Option<Error> {
        None
    }
}

/// Extension trait for [PollingErrorPolicy].
pub trait PollingErrorPolicyExt: PollingErrorPolicy + Sized {
    /// Decorate a [PollingErrorPolicy] to limit the total elapsed time in
    /// the polling loop.
    ///
    /// While the time spent in the polling loop (including time in backoff)
    /// is less than the prescribed duration the `on_error()` method returns
    /// the results of the inner policy. After that time it returns
    /// [Exhausted][LoopState::Exhausted] if the inner policy returns
    /// [Continue][LoopState::Continue].
    fn with_time_limit(self, maximum_duration: std::time::Duration) -> LimitedElapsedTime<Self> {
        LimitedElapsedTime::custom(self, maximum_duration)
    }

    /// Decorate a [PollingErrorPolicy] to limit the number of poll attempts.
    ///
    /// This policy decorates an inner policy and limits the total number of
    /// attempts. Note that `on_error()` is called only after a polling
    /// attempt.
    ///
    /// The policy passes through the results from the inner policy as long
    /// as `attempt_count < maximum_attempts`. Once the maximum number of
    /// attempts is reached, the policy returns
    /// [Exhausted][LoopState::Exhausted] if the inner policy returns
    /// [Continue][LoopState::Continue].
    fn with_attempt_limit(self, maximum_attempts: u32) -> LimitedAttemptCount<Self> {
        LimitedAttemptCount::custom(self, maximum_attempts)
    }
}

impl<T: PollingErrorPolicy> PollingErrorPolicyExt for T {}

/// A polling policy that continues only on transient errors.
///
/// This policy should be decorated to limit the number of polling attempts
/// or the duration of the polling loop.
///
/// The policy examines the status code to determine if the polling loop may
/// continue: the only retryable status code is [Unavailable]. I/O errors and
/// transient errors generated before the poll request left the client also
/// continue the loop; polling is always idempotent.
///
/// [Unavailable]: crate::error::rpc::Code::Unavailable
#[derive(Clone, Debug)]
pub struct TransientErrors;

impl PollingErrorPolicy for TransientErrors {
    fn on_error(
        &self,
        _loop_start: std::time::Instant,
        _attempt_count: u32,
        error: Error,
    ) -> LoopState {
        if error.is_transient_and_before_rpc() {
            return LoopState::Continue(error);
        }
        if error.is_io() {
            return LoopState::Continue(error);
        }
        if let Some(status) = error.status() {
            return if status.code == crate::error::rpc::Code::Unavailable {
                LoopState::Continue(error)
            } else {
                LoopState::Permanent(error)
            };
        }
        LoopState::Permanent(error)
    }
}

/// A polling policy that continues on any error.
///
/// This policy must be decorated to limit the number of polling attempts or
/// the duration of the polling loop.
#[derive(Clone, Debug)]
pub struct AlwaysContinue;

impl PollingErrorPolicy for AlwaysContinue {
    fn on_error(
        &self,
        _loop_start: std::time::Instant,
        _attempt_count: u32,
        error: Error,
    ) -> LoopState {
        LoopState::Continue(error)
    }
}

/// A polling policy decorator that limits the total time in the polling
/// loop.
///
/// # Parameters
/// * `P` - the inner polling policy, defaults to [TransientErrors].
#[derive(Debug)]
pub struct LimitedElapsedTime<P = TransientErrors>
where
    P: PollingErrorPolicy,
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
    P: PollingErrorPolicy,
{
    /// Creates a new instance with a custom inner policy.
    pub fn custom(inner: P, maximum_duration: std::time::Duration) -> Self {
        Self {
            inner,
            maximum_duration,
        }
    }

    fn in_progress_impl(&self, start: std::time::Instant, operation_name: &str) -> Option<Error> {
        let now = std::time::Instant::now();
        if now < start + self.maximum_duration {
            return None;
        }
        Some(Error::exhausted(Exhausted::new(
            operation_name,
            "elapsed time",
            format!("{:?}", now.saturating_duration_since(start)),
            format!("{:?}", self.maximum_duration),
        )))
    }
}

impl<P> PollingErrorPolicy for LimitedElapsedTime<P>
where
    P: PollingErrorPolicy + 'static,
{
    fn on_error(&self, start: std::time::Instant, count: u32, error: Error) -> LoopState {
        match self.inner.on_error(start, count, error) {
            LoopState::Permanent(e) => LoopState::Permanent(e),
            LoopState::Exhausted(e) => LoopState::Exhausted(e),
            LoopState::Continue(e) => {
                if std::time::Instant::now() >= start + self.maximum_duration {
                    LoopState::Exhausted(e)
                } else {
                    LoopState::Continue(e)
                }
            }
        }
    }

    fn on_in_progress(
        &self,
        start: std::time::Instant,
        count: u32,
        operation_name: &str,
    ) -> Option<Error> {
        self.inner
            .on_in_progress(start, count, operation_name)
            .or_else(|| self.in_progress_impl(start, operation_name))
    }
}

/// A polling policy decorator that limits the number of attempts.
///
/// # Parameters
/// * `P` - the inner polling policy, defaults to [TransientErrors].
#[derive(Debug)]
pub struct LimitedAttemptCount<P = TransientErrors>
where
    P: PollingErrorPolicy,
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
    P: PollingErrorPolicy,
{
    /// Creates a new instance with a custom inner policy.
    pub fn custom(inner: P, maximum_attempts: u32) -> Self {
        Self {
            inner,
            maximum_attempts,
        }
    }

    fn in_progress_impl(&self, count: u32, operation_name: &str) -> Option<Error> {
        if count < self.maximum_attempts {
            return None;
        }
        Some(Error::exhausted(Exhausted::new(
            operation_name,
            "attempt count",
            count.to_string(),
            self.maximum_attempts.to_string(),
        )))
    }
}

impl<P> PollingErrorPolicy for LimitedAttemptCount<P>
where
    P: PollingErrorPolicy,
{
    fn on_error(&self, start: std::time::Instant, count: u32, error: Error) -> LoopState {
        match self.inner.on_error(start, count, error) {
            LoopState::Permanent(e) => LoopState::Permanent(e),
            LoopState::Exhausted(e) => LoopState::Exhausted(e),
            LoopState::Continue(e) => {
                if count >= self.maximum_attempts {
                    LoopState::Exhausted(e)
                } else {
                    LoopState::Continue(e)
                }
            }
        }
    }

    fn on_in_progress(
        &self,
        start: std::time::Instant,
        count: u32,
        operation_name: &str,
    ) -> Option<Error> {
        self.inner
            .on_in_progress(start, count, operation_name)
            .or_else(|| self.in_progress_impl(count, operation_name))
    }
}

/// Indicates that a retry or polling loop has been exhausted.
#[derive(Debug)]
pub struct Exhausted {
    operation_name: String,
    limit_name: &'static str,
    value: String,
    limit: String,
}

impl Exhausted {
    pub fn new(
        operation_name: &str,
        limit_name: &'static str,
        value: String,
        limit: String,
    ) -> Self {
        Self {
            operation_name: operation_name.to_string(),
            limit_name,
            value,
            limit,
        }
    }
}

impl std::fmt::Display for Exhausted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "polling loop for {} exhausted, {} value ({}) exceeds limit ({})",
            self.operation_name, self.limit_name, self.value, self.limit
        )
    }
}

impl std::error::Error for Exhausted {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CredentialsError;
    use crate::error::rpc::{Code, Status};
    use std::time::{Duration, Instant};

    mockall::mock! {
        #[derive(Debug)]
        Policy {}
        impl PollingErrorPolicy for Policy {
            fn on_error(&self, loop_start: std::time::Instant, attempt_count: u32, error: Error) -> LoopState;
            fn on_in_progress(&self, loop_start: std::time::Instant, attempt_count: u32, operation_name: &str) -> Option<Error>;
        }
    }

    #[test]
    fn transient_errors() {
        let p = TransientErrors;
        let now = Instant::now();
        assert!(p.on_in_progress(now, 1, "unused").is_none());
        assert!(p.on_error(now, 1, unavailable()).is_continue());
        assert!(p.on_error(now, 1, permission_denied()).is_permanent());
        assert!(
            p.on_error(now, 1, Error::io(io_source()))
                .is_continue()
        );
        let auth = Error::authentication(CredentialsError::from_str(true, "transient"));
        assert!(p.on_error(now, 1, auth).is_continue());
        let auth = Error::authentication(CredentialsError::from_str(false, "permanent"));
        assert!(p.on_error(now, 1, auth).is_permanent());
        assert!(p.on_error(now, 1, Error::other("err")).is_permanent());
    }

    #[test]
    fn always_continue() {
        let p = AlwaysContinue;
        let now = Instant::now();
        assert!(p.on_in_progress(now, 1, "unused").is_none());
        assert!(p.on_error(now, 1, permission_denied()).is_continue());
    }

    #[test]
    fn time_limit_on_error() {
        let policy = TransientErrors.with_time_limit(Duration::from_secs(10));
        let now = Instant::now();
        assert!(policy.on_error(now, 1, unavailable()).is_continue());
        assert!(policy.on_error(now, 1, permission_denied()).is_permanent());

        let start = Instant::now() - Duration::from_secs(20);
        assert!(policy.on_error(start, 1, unavailable()).is_exhausted());
        // Exhaustion is monotonic.
        assert!(policy.on_error(start, 2, unavailable()).is_exhausted());
    }

    #[test]
    fn time_limit_on_in_progress() {
        let policy = AlwaysContinue.with_time_limit(Duration::from_secs(10));
        let now = Instant::now();
        assert!(policy.on_in_progress(now, 1, "op-001").is_none());

        let start = Instant::now() - Duration::from_secs(20);
        let err = policy.on_in_progress(start, 1, "op-001").unwrap();
        assert!(err.is_exhausted(), "{err:?}");
        let msg = format!("{err}");
        assert!(msg.contains("op-001"), "{msg}");
        assert!(msg.contains("elapsed time"), "{msg}");
    }

    #[test]
    fn attempt_limit_on_error() {
        let policy = AlwaysContinue.with_attempt_limit(3);
        let now = Instant::now();
        assert!(policy.on_error(now, 1, unavailable()).is_continue());
        assert!(policy.on_error(now, 2, unavailable()).is_continue());
        assert!(policy.on_error(now, 3, unavailable()).is_exhausted());
        assert!(policy.on_error(now, 4, unavailable()).is_exhausted());
    }

    #[test]
    fn attempt_limit_on_in_progress() {
        let policy = AlwaysContinue.with_attempt_limit(3);
        let now = Instant::now();
        assert!(policy.on_in_progress(now, 2, "op-001").is_none());
        let err = policy.on_in_progress(now, 3, "op-001").unwrap();
        assert!(err.is_exhausted(), "{err:?}");
        let msg = format!("{err}");
        assert!(msg.contains("attempt count"), "{msg}");
    }

    #[test]
    fn decorators_pass_inner_results() {
        let mut inner = MockPolicy::new();
        inner
            .expect_on_error()
            .once()
            .returning(|_, _, e| LoopState::Permanent(e));
        inner
            .expect_on_in_progress()
            .once()
            .returning(|_, _, name| Some(Error::other(format!("inner says stop {name}"))));
        let policy = inner.with_time_limit(Duration::from_secs(60));
        let now = Instant::now();
        assert!(policy.on_error(now, 1, unavailable()).is_permanent());
        let err = policy.on_in_progress(now, 1, "op-001").unwrap();
        assert!(format!("{err}").contains("inner says stop"), "{err:?}");
    }

    #[test]
    fn compose_limits() {
        let policy = AlwaysContinue
            .with_time_limit(Duration::from_secs(60))
            .with_attempt_limit(2);
        let now = Instant::now();
        assert!(policy.on_error(now, 1, unavailable()).is_continue());
        assert!(policy.on_error(now, 2, unavailable()).is_exhausted());
        assert!(policy.on_in_progress(now, 1, "op-001").is_none());
        assert!(policy.on_in_progress(now, 2, "op-001").is_some());
    }

    fn unavailable() -> Error {
        Error::service(
            Status::default()
                .set_code(Code::Unavailable)
                .set_message("try-again"),
        )
    }

    fn permission_denied() -> Error {
        Error::service(
            Status::default()
                .set_code(Code::PermissionDenied)
                .set_message("uh-oh"),
        )
    }

    fn io_source() -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")
    }
}
