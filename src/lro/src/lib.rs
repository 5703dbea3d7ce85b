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

//! Types and functions to make long-running operations easier to use and to
//! require less boilerplate.
//!
//! Some services take a long time to complete a request, longer than the
//! deadline of any single RPC. These services return an operation token that
//! is polled until the work completes. The [Poller] trait, and the
//! [new_poller] factory, package the polling loop so client libraries only
//! provide two closures: one to start the operation and one to query its
//! progress.

use gax::Result;
use gax::error::Error;
use gax::loop_state::LoopState;
use gax::polling_backoff_policy::PollingBackoffPolicy;
use gax::polling_error_policy::PollingErrorPolicy;
use std::sync::Arc;

mod details;

/// The result of polling a long-running operation.
///
/// # Parameters
/// * `R` - the response type. This is the type returned when the operation
///   completes successfully.
/// * `M` - the metadata type. While operations are in progress the service
///   may return values of this type describing partial progress.
#[derive(Debug)]
pub enum PollingResult<R, M> {
    /// The operation is still in progress.
    InProgress(Option<M>),
    /// The operation completed. This includes the result.
    Completed(Result<R>),
    /// An error trying to poll the operation.
    ///
    /// Not all errors indicate that the operation failed. For example, the
    /// poll may fail because it was not possible to connect to the service.
    /// Such transient errors may disappear in the next polling attempt.
    ///
    /// Other errors will never recover. For example, an error with a
    /// [NotFound][gax::error::rpc::Code::NotFound] or
    /// [PermissionDenied][gax::error::rpc::Code::PermissionDenied] code will
    /// never recover.
    PollingError(Error),
}

/// A snapshot of a long-running operation, with typed responses.
///
/// The start and query closures given to [new_poller] return values of this
/// type. `InProgress` carries the token used to poll again, and any progress
/// metadata the service included. A missing token stops the polling loop.
#[derive(Clone, Debug, PartialEq)]
pub enum Operation<R, M> {
    /// The operation has not completed.
    InProgress {
        /// The token used to query the status of the operation.
        token: Option<String>,
        /// Service-specific progress metadata, if any.
        metadata: Option<M>,
    },
    /// The operation completed successfully.
    Done(R),
}

/// The trait implemented by long-running operation helpers.
///
/// # Parameters
/// * `R` - the response type, that is, the type of response included when the
///   long-running operation completes successfully.
/// * `M` - the metadata type, that is, the type returned by the service when
///   the long-running operation is still in progress.
pub trait Poller<R, M>: Send + sealed::Poller {
    /// Query the current status of the long-running operation.
    fn poll(&mut self) -> impl Future<Output = Option<PollingResult<R, M>>> + Send;

    /// Poll the long-running operation until it completes.
    fn until_done(self) -> impl Future<Output = Result<R>> + Send;
}

/// Creates a new `impl Poller<R, M>` from the closures provided by a client
/// library.
///
/// # Parameters
/// * `polling_error_policy` - decides if a polling error is recoverable, and
///   enforces limits on the number of attempts or the total polling time.
/// * `polling_backoff_policy` - prescribes how long to wait between polls.
/// * `start` - starts the operation. This closure captures all the request
///   parameters and request options, including any retry options.
/// * `query` - queries the status of the operation started by `start`. It
///   receives the operation token as its only input parameter.
pub fn new_poller<R, M, S, SF, Q, QF>(
    polling_error_policy: Arc<dyn PollingErrorPolicy>,
    polling_backoff_policy: Arc<dyn PollingBackoffPolicy>,
    start: S,
    query: Q,
) -> impl Poller<R, M>
where
    R: Send,
    M: Send,
    S: FnOnce() -> SF + Send + Sync,
    SF: Future<Output = Result<Operation<R, M>>> + Send + 'static,
    Q: Fn(String) -> QF + Send + Sync + Clone,
    QF: Future<Output = Result<Operation<R, M>>> + Send + 'static,
{
    PollerImpl::new(polling_error_policy, polling_backoff_policy, start, query)
}

/// An implementation of `Poller` based on closures.
///
/// Each instance drives a single operation. The policies are consulted with
/// the loop start time and the attempt count, so sharing a policy between
/// pollers never leaks progress from one operation into another.
struct PollerImpl<S, Q> {
    error_policy: Arc<dyn PollingErrorPolicy>,
    backoff_policy: Arc<dyn PollingBackoffPolicy>,
    start: Option<S>,
    query: Q,
    operation: Option<String>,
    loop_start: std::time::Instant,
    attempt_count: u32,
}

impl<S, Q> PollerImpl<S, Q> {
    pub fn new(
        error_policy: Arc<dyn PollingErrorPolicy>,
        backoff_policy: Arc<dyn PollingBackoffPolicy>,
        start: S,
        query: Q,
    ) -> Self {
        Self {
            error_policy,
            backoff_policy,
            start: Some(start),
            query,
            operation: None,
            loop_start: std::time::Instant::now(),
            attempt_count: 0,
        }
    }
}

impl<S, Q> sealed::Poller for PollerImpl<S, Q> {}

impl<R, M, S, SF, Q, QF> Poller<R, M> for PollerImpl<S, Q>
where
    R: Send,
    M: Send,
    S: FnOnce() -> SF + Send + Sync,
    SF: Future<Output = Result<Operation<R, M>>> + Send + 'static,
    Q: Fn(String) -> QF + Send + Sync + Clone,
    QF: Future<Output = Result<Operation<R, M>>> + Send + 'static,
{
    async fn poll(&mut self) -> Option<PollingResult<R, M>> {
        if let Some(start) = self.start.take() {
            self.loop_start = std::time::Instant::now();
            let result = start().await;
            let (op, poll) = details::handle_start(result);
            self.operation = op;
            return Some(poll);
        }
        if let Some(name) = self.operation.take() {
            self.attempt_count += 1;
            let query = self.query.clone();
            let result = query(name.clone()).await;
            let (op, poll) = details::handle_poll(
                self.error_policy.clone(),
                self.loop_start,
                self.attempt_count,
                name,
                result,
            );
            self.operation = op;
            return Some(poll);
        }
        None
    }

    async fn until_done(mut self) -> Result<R> {
        while let Some(p) = self.poll().await {
            match p {
                // Return, the operation completed or the polling policy is
                // exhausted.
                PollingResult::Completed(r) => return r,
                // Continue, the operation was successfully polled and the
                // polling policy was queried.
                PollingResult::InProgress(_) => (),
                // Continue, the polling policy was queried and decided the
                // error is recoverable.
                PollingResult::PollingError(_) => (),
            }
            let period = self
                .backoff_policy
                .wait_period(self.loop_start, self.attempt_count);
            tokio::time::sleep(period).await;
        }
        // `poll()` returns `None` without a `Completed` result only when the
        // service sent an in-progress snapshot without a polling token. The
        // loop cannot make progress without a token.
        Err(Error::exhausted(
            "the operation is in progress but the service did not return a polling token",
        ))
    }
}

mod sealed {
    pub trait Poller {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use gax::error::rpc::{Code, Status};
    use gax::exponential_backoff::ExponentialBackoffBuilder;
    use gax::polling_error_policy::{AlwaysContinue, PollingErrorPolicyExt, TransientErrors};
    use std::time::Duration;

    type TestOperation = Operation<u64, String>;

    fn test_backoff() -> Arc<dyn PollingBackoffPolicy> {
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_delay(Duration::from_millis(1))
            .with_maximum_delay(Duration::from_millis(1))
            .clamp();
        Arc::new(backoff)
    }

    fn transient() -> Error {
        Error::service(
            Status::default()
                .set_code(Code::Unavailable)
                .set_message("try-again"),
        )
    }

    fn permanent() -> Error {
        Error::service(
            Status::default()
                .set_code(Code::Aborted)
                .set_message("operation-aborted"),
        )
    }

    #[tokio::test]
    async fn poll_basic_flow() {
        let start = || async move {
            Ok(TestOperation::InProgress {
                token: Some("op-001".to_string()),
                metadata: Some("25%".to_string()),
            })
        };
        let query = |_: String| async move { Ok(TestOperation::Done(42)) };

        let mut poller =
            new_poller(Arc::new(AlwaysContinue), test_backoff(), start, query);
        let p0 = poller.poll().await;
        match p0.unwrap() {
            PollingResult::InProgress(m) => {
                assert_eq!(m.as_deref(), Some("25%"));
            }
            r => panic!("{r:?}"),
        }

        let p1 = poller.poll().await;
        match p1.unwrap() {
            PollingResult::Completed(r) => {
                assert_eq!(r.unwrap(), 42);
            }
            r => panic!("{r:?}"),
        }

        let p2 = poller.poll().await;
        assert!(p2.is_none(), "{p2:?}");
    }

    #[tokio::test]
    async fn until_done_success() {
        let start = || async move {
            Ok(TestOperation::InProgress {
                token: Some("op-001".to_string()),
                metadata: None,
            })
        };
        let query = |_: String| async move { Ok(TestOperation::Done(42)) };

        let got = new_poller(Arc::new(AlwaysContinue), test_backoff(), start, query)
            .until_done()
            .await;
        assert!(matches!(got, Ok(42)), "{got:?}");
    }

    #[tokio::test]
    async fn until_done_success_with_transient() {
        let start = || async move {
            Ok(TestOperation::InProgress {
                token: Some("op-001".to_string()),
                metadata: None,
            })
        };
        let query_count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let query = move |token: String| {
            let count = query_count.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
            async move {
                assert_eq!(token, "op-001");
                match count {
                    1 => Err(transient()),
                    _ => Ok(TestOperation::Done(42)),
                }
            }
        };

        let got = new_poller(Arc::new(AlwaysContinue), test_backoff(), start, query)
            .until_done()
            .await;
        assert!(matches!(got, Ok(42)), "{got:?}");
    }

    #[tokio::test]
    async fn until_done_start_error() {
        let start = || async move { Err::<TestOperation, _>(permanent()) };
        let query = |_: String| async move { Ok(TestOperation::Done(42)) };

        let got = new_poller(Arc::new(AlwaysContinue), test_backoff(), start, query)
            .until_done()
            .await;
        let err = got.unwrap_err();
        assert_eq!(err.status(), permanent().status(), "{err:?}");
    }

    #[tokio::test]
    async fn until_done_permanent_poll_error() {
        let start = || async move {
            Ok(TestOperation::InProgress {
                token: Some("op-001".to_string()),
                metadata: None,
            })
        };
        let query = |_: String| async move { Err::<TestOperation, _>(permanent()) };

        let got = new_poller(Arc::new(TransientErrors), test_backoff(), start, query)
            .until_done()
            .await;
        let err = got.unwrap_err();
        assert_eq!(err.status(), permanent().status(), "{err:?}");
    }

    #[tokio::test]
    async fn until_done_attempt_limit() {
        // The operation never completes, the policy runs out of attempts and
        // the loop reports a timeout.
        let start = || async move {
            Ok(TestOperation::InProgress {
                token: Some("op-001".to_string()),
                metadata: None,
            })
        };
        let query = |token: String| async move {
            Ok(TestOperation::InProgress {
                token: Some(token),
                metadata: None,
            })
        };

        let got = new_poller(
            Arc::new(AlwaysContinue.with_attempt_limit(3)),
            test_backoff(),
            start,
            query,
        )
        .until_done()
        .await;
        let err = got.unwrap_err();
        assert!(err.is_exhausted(), "{err:?}");
    }

    #[tokio::test]
    async fn poll_missing_token_stops() {
        // A service may return an in-progress snapshot without a token. The
        // loop cannot make progress and stops polling.
        let start = || async move {
            Ok(TestOperation::InProgress {
                token: None,
                metadata: Some("unknown".to_string()),
            })
        };
        let query = |_: String| async move { Ok(TestOperation::Done(42)) };

        let mut poller =
            new_poller(Arc::new(AlwaysContinue), test_backoff(), start, query);
        let p0 = poller.poll().await;
        assert!(
            matches!(p0, Some(PollingResult::InProgress(_))),
            "{p0:?}"
        );
        let p1 = poller.poll().await;
        assert!(p1.is_none(), "{p1:?}");
    }

    #[tokio::test]
    async fn until_done_missing_token() {
        // The loop stops when a token-less snapshot arrives, and the caller
        // gets an error instead of hanging or panicking.
        let start = || async move {
            Ok(TestOperation::InProgress {
                token: None,
                metadata: Some("unknown".to_string()),
            })
        };
        let query = |_: String| async move { Ok(TestOperation::Done(42)) };

        let got = new_poller(Arc::new(AlwaysContinue), test_backoff(), start, query)
            .until_done()
            .await;
        let err = got.unwrap_err();
        assert!(err.is_exhausted(), "{err:?}");
        assert!(err.to_string().contains("polling token"), "{err:?}");
    }
}
