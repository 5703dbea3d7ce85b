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

//! Drives an object copy to completion.
//!
//! Large or cross-location copies are not completed in a single call. The
//! service copies a chunk, reports its progress, and returns a token the
//! client sends back to continue. [rewrite_object_until_done] packages that
//! loop, reporting progress to the application after every response.

use crate::model::{Object, RewriteObjectRequest, RewriteProgress, RewriteResponse};
use crate::stub::Storage;
use gax::Result;
use gax::error::Error;
use gax::polling_backoff_policy::PollingBackoffPolicy;
use gax::polling_error_policy::PollingErrorPolicy;
use lro::{Operation, Poller, PollingResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// The error type for copy responses that violate the copy protocol.
///
/// These errors indicate a bug, either in the service or in the client
/// library. The loop reports them and stops rather than risk looping
/// forever, or worse, reporting a partial copy as complete.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum RewriteError {
    #[error(
        "the service previously copied {offset} bytes, but now reports only {persisted} as copied"
    )]
    UnexpectedRewind { offset: u64, persisted: u64 },

    #[error("the service reports {persisted} bytes as copied, but the object is only {size} bytes")]
    TooMuchProgress { persisted: u64, size: u64 },

    #[error("the service reports the copy as done after copying {persisted} of {size} bytes")]
    Incomplete { persisted: u64, size: u64 },

    #[error("the service reports the copy as done but did not include the destination object")]
    MissingResource,

    #[error("the service reports the copy as in progress but did not include a rewrite token")]
    MissingToken,

    #[error("the service reports all {size} bytes as copied but the copy is not marked as done")]
    DoneFlagMissing { size: u64 },
}

/// Copies an object, continuing the copy until it completes.
///
/// Each response is validated against the copy protocol, and then reported
/// to `on_progress`. In between calls the loop waits the amount of time
/// prescribed by the backoff policy. The error policy decides if a failed
/// call is recoverable, and bounds the total time and number of calls.
pub async fn rewrite_object_until_done<F>(
    stub: Arc<dyn Storage>,
    request: RewriteObjectRequest,
    error_policy: Arc<dyn PollingErrorPolicy>,
    backoff_policy: Arc<dyn PollingBackoffPolicy>,
    mut on_progress: F,
) -> Result<Object>
where
    F: FnMut(RewriteProgress) + Send,
{
    let progress = Arc::new(ProgressCell::default());

    let start_stub = stub.clone();
    let start_request = request.clone();
    let start_progress = progress.clone();
    let start = move || async move {
        let response = start_stub.rewrite_object(start_request).await?;
        as_operation(&start_progress, response)
    };
    let query_progress = progress.clone();
    let query = move |token: String| {
        let stub = stub.clone();
        let request = request.clone().set_rewrite_token(token);
        let progress = query_progress.clone();
        async move {
            let response = stub.rewrite_object(request).await?;
            as_operation(&progress, response)
        }
    };

    let loop_start = std::time::Instant::now();
    let mut attempt_count = 0_u32;
    let mut poller = lro::new_poller(error_policy, backoff_policy.clone(), start, query);
    while let Some(p) = poller.poll().await {
        match p {
            PollingResult::Completed(Ok(object)) => {
                on_progress(progress.snapshot());
                return Ok(object);
            }
            PollingResult::Completed(Err(e)) => return Err(e),
            PollingResult::InProgress(Some(m)) => on_progress(m),
            PollingResult::InProgress(None) => (),
            // Protocol violations stop the copy even under a permissive
            // error policy.
            PollingResult::PollingError(e) if e.is_deserialization() => return Err(e),
            PollingResult::PollingError(_) => (),
        }
        attempt_count += 1;
        let period = backoff_policy.wait_period(loop_start, attempt_count);
        tokio::time::sleep(period).await;
    }
    // We can only get here if `poll()` returns `None`, but it only returns
    // `None` after it returned `PollingResult::Completed` and therefore this
    // is never reached.
    unreachable!("the loop exits via the `Completed` branch");
}

/// The last reported progress, shared between the polling closures and the
/// driver loop.
#[derive(Debug, Default)]
struct ProgressCell {
    bytes: AtomicU64,
    size: AtomicU64,
}

impl ProgressCell {
    fn snapshot(&self) -> RewriteProgress {
        RewriteProgress {
            total_bytes_rewritten: self.bytes.load(Ordering::Acquire),
            object_size: self.size.load(Ordering::Acquire),
        }
    }
}

fn as_operation(
    progress: &ProgressCell,
    response: RewriteResponse,
) -> Result<Operation<Object, RewriteProgress>> {
    let persisted = response.total_bytes_rewritten;
    let size = response.object_size;
    if persisted > size {
        return Err(Error::deser(RewriteError::TooMuchProgress {
            persisted,
            size,
        }));
    }
    let offset = progress.bytes.load(Ordering::Acquire);
    if persisted < offset {
        return Err(Error::deser(RewriteError::UnexpectedRewind {
            offset,
            persisted,
        }));
    }
    progress.bytes.store(persisted, Ordering::Release);
    progress.size.store(size, Ordering::Release);

    if response.done {
        if persisted != size {
            return Err(Error::deser(RewriteError::Incomplete { persisted, size }));
        }
        return match response.resource {
            Some(object) => Ok(Operation::Done(object)),
            None => Err(Error::deser(RewriteError::MissingResource)),
        };
    }
    if persisted == size {
        return Err(Error::deser(RewriteError::DoneFlagMissing { size }));
    }
    if response.rewrite_token.is_empty() {
        return Err(Error::deser(RewriteError::MissingToken));
    }
    Ok(Operation::InProgress {
        token: Some(response.rewrite_token),
        metadata: Some(RewriteProgress {
            total_bytes_rewritten: persisted,
            object_size: size,
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gax::error::rpc::{Code, Status};
    use gax::exponential_backoff::ExponentialBackoffBuilder;
    use gax::polling_error_policy::{AlwaysContinue, PollingErrorPolicyExt, TransientErrors};
    use std::error::Error as _;
    use std::time::Duration;

    mockall::mock! {
        #[derive(Debug)]
        Storage {}
        #[async_trait::async_trait]
        impl crate::stub::Storage for Storage {
            async fn rewrite_object(
                &self,
                req: RewriteObjectRequest,
            ) -> gax::Result<RewriteResponse>;
        }
    }

    fn test_request() -> RewriteObjectRequest {
        RewriteObjectRequest::new()
            .set_source_bucket("projects/_/buckets/source")
            .set_source_object("object-to-copy")
            .set_destination_bucket("projects/_/buckets/dest")
            .set_destination_name("copied-object")
    }

    fn test_backoff() -> Arc<dyn PollingBackoffPolicy> {
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_delay(Duration::from_millis(1))
            .with_maximum_delay(Duration::from_millis(1))
            .clamp();
        Arc::new(backoff)
    }

    fn in_progress(persisted: u64, size: u64, token: &str) -> RewriteResponse {
        RewriteResponse::new()
            .set_total_bytes_rewritten(persisted)
            .set_object_size(size)
            .set_done(false)
            .set_rewrite_token(token)
    }

    fn done(size: u64) -> RewriteResponse {
        RewriteResponse::new()
            .set_total_bytes_rewritten(size)
            .set_object_size(size)
            .set_done(true)
            .set_resource(Object::new().set_name("copied-object"))
    }

    fn rewrite_error(err: &Error) -> Option<&RewriteError> {
        err.source().and_then(|e| e.downcast_ref::<RewriteError>())
    }

    #[tokio::test]
    async fn copy_reports_progress() -> anyhow::Result<()> {
        let mut stub = MockStorage::new();
        let mut seq = mockall::Sequence::new();
        stub.expect_rewrite_object()
            .once()
            .in_sequence(&mut seq)
            .withf(|req| req.rewrite_token.is_empty())
            .returning(|_| Ok(in_progress(40, 100, "token-1")));
        stub.expect_rewrite_object()
            .once()
            .in_sequence(&mut seq)
            .withf(|req| req.rewrite_token == "token-1")
            .returning(|_| Ok(done(100)));

        let mut progress = Vec::new();
        let object = rewrite_object_until_done(
            Arc::new(stub),
            test_request(),
            Arc::new(TransientErrors),
            test_backoff(),
            |p| progress.push(p),
        )
        .await?;
        assert_eq!(object.name, "copied-object");
        assert_eq!(
            progress,
            vec![
                RewriteProgress {
                    total_bytes_rewritten: 40,
                    object_size: 100
                },
                RewriteProgress {
                    total_bytes_rewritten: 100,
                    object_size: 100
                },
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn copy_feeds_token_back() -> anyhow::Result<()> {
        let mut stub = MockStorage::new();
        let mut seq = mockall::Sequence::new();
        for (persisted, token) in [(10_u64, "token-1"), (20, "token-2"), (30, "token-3")] {
            stub.expect_rewrite_object()
                .once()
                .in_sequence(&mut seq)
                .returning(move |_| Ok(in_progress(persisted, 100, token)));
        }
        stub.expect_rewrite_object()
            .once()
            .in_sequence(&mut seq)
            .withf(|req| req.rewrite_token == "token-3")
            .returning(|_| Ok(done(100)));

        let object = rewrite_object_until_done(
            Arc::new(stub),
            test_request(),
            Arc::new(TransientErrors),
            test_backoff(),
            |_| {},
        )
        .await?;
        assert_eq!(object.name, "copied-object");
        Ok(())
    }

    #[tokio::test]
    async fn copy_survives_transient_errors() -> anyhow::Result<()> {
        let mut stub = MockStorage::new();
        let mut seq = mockall::Sequence::new();
        stub.expect_rewrite_object()
            .once()
            .in_sequence(&mut seq)
            .returning(|_| Ok(in_progress(40, 100, "token-1")));
        stub.expect_rewrite_object()
            .once()
            .in_sequence(&mut seq)
            .returning(|_| {
                Err(Error::service(
                    Status::default()
                        .set_code(Code::Unavailable)
                        .set_message("try-again"),
                ))
            });
        stub.expect_rewrite_object()
            .once()
            .in_sequence(&mut seq)
            .withf(|req| req.rewrite_token == "token-1")
            .returning(|_| Ok(done(100)));

        let object = rewrite_object_until_done(
            Arc::new(stub),
            test_request(),
            Arc::new(TransientErrors),
            test_backoff(),
            |_| {},
        )
        .await?;
        assert_eq!(object.name, "copied-object");
        Ok(())
    }

    #[tokio::test]
    async fn copy_polling_budget_exhausted() {
        let mut stub = MockStorage::new();
        let mut counter = 0_u64;
        stub.expect_rewrite_object().returning(move |_| {
            counter += 10;
            Ok(in_progress(counter, 1_000_000, "token-1"))
        });

        let result = rewrite_object_until_done(
            Arc::new(stub),
            test_request(),
            Arc::new(AlwaysContinue.with_attempt_limit(3)),
            test_backoff(),
            |_| {},
        )
        .await;
        let err = result.unwrap_err();
        assert!(err.is_exhausted(), "{err:?}");
    }

    #[tokio::test]
    async fn too_much_progress() {
        let mut stub = MockStorage::new();
        stub.expect_rewrite_object()
            .once()
            .returning(|_| Ok(in_progress(150, 100, "token-1")));

        let result = rewrite_object_until_done(
            Arc::new(stub),
            test_request(),
            Arc::new(TransientErrors),
            test_backoff(),
            |_| {},
        )
        .await;
        let err = result.unwrap_err();
        assert!(err.is_deserialization(), "{err:?}");
        assert!(
            matches!(
                rewrite_error(&err),
                Some(RewriteError::TooMuchProgress {
                    persisted: 150,
                    size: 100
                })
            ),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn unexpected_rewind() {
        let mut stub = MockStorage::new();
        let mut seq = mockall::Sequence::new();
        stub.expect_rewrite_object()
            .once()
            .in_sequence(&mut seq)
            .returning(|_| Ok(in_progress(50, 100, "token-1")));
        stub.expect_rewrite_object()
            .once()
            .in_sequence(&mut seq)
            .returning(|_| Ok(in_progress(40, 100, "token-2")));

        let result = rewrite_object_until_done(
            Arc::new(stub),
            test_request(),
            Arc::new(TransientErrors),
            test_backoff(),
            |_| {},
        )
        .await;
        let err = result.unwrap_err();
        assert!(
            matches!(
                rewrite_error(&err),
                Some(RewriteError::UnexpectedRewind {
                    offset: 50,
                    persisted: 40
                })
            ),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn done_without_all_bytes() {
        let mut stub = MockStorage::new();
        stub.expect_rewrite_object().once().returning(|_| {
            Ok(RewriteResponse::new()
                .set_total_bytes_rewritten(40_u64)
                .set_object_size(100_u64)
                .set_done(true)
                .set_resource(Object::new().set_name("copied-object")))
        });

        let result = rewrite_object_until_done(
            Arc::new(stub),
            test_request(),
            Arc::new(TransientErrors),
            test_backoff(),
            |_| {},
        )
        .await;
        let err = result.unwrap_err();
        assert!(
            matches!(
                rewrite_error(&err),
                Some(RewriteError::Incomplete {
                    persisted: 40,
                    size: 100
                })
            ),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn done_without_resource() {
        let mut stub = MockStorage::new();
        stub.expect_rewrite_object().once().returning(|_| {
            Ok(RewriteResponse::new()
                .set_total_bytes_rewritten(100_u64)
                .set_object_size(100_u64)
                .set_done(true))
        });

        let result = rewrite_object_until_done(
            Arc::new(stub),
            test_request(),
            Arc::new(TransientErrors),
            test_backoff(),
            |_| {},
        )
        .await;
        let err = result.unwrap_err();
        assert!(
            matches!(rewrite_error(&err), Some(RewriteError::MissingResource)),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn in_progress_without_token() {
        let mut stub = MockStorage::new();
        stub.expect_rewrite_object()
            .once()
            .returning(|_| Ok(in_progress(40, 100, "")));

        let result = rewrite_object_until_done(
            Arc::new(stub),
            test_request(),
            Arc::new(TransientErrors),
            test_backoff(),
            |_| {},
        )
        .await;
        let err = result.unwrap_err();
        assert!(
            matches!(rewrite_error(&err), Some(RewriteError::MissingToken)),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn all_bytes_copied_but_not_done() {
        // A permissive error policy must not mask protocol violations.
        let mut stub = MockStorage::new();
        stub.expect_rewrite_object()
            .once()
            .returning(|_| Ok(in_progress(100, 100, "token-1")));

        let result = rewrite_object_until_done(
            Arc::new(stub),
            test_request(),
            Arc::new(AlwaysContinue),
            test_backoff(),
            |_| {},
        )
        .await;
        let err = result.unwrap_err();
        assert!(
            matches!(
                rewrite_error(&err),
                Some(RewriteError::DoneFlagMissing { size: 100 })
            ),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn permanent_error_stops_the_copy() {
        let mut stub = MockStorage::new();
        stub.expect_rewrite_object().once().returning(|_| {
            Err(Error::service(
                Status::default()
                    .set_code(Code::PermissionDenied)
                    .set_message("uh-oh"),
            ))
        });

        let result = rewrite_object_until_done(
            Arc::new(stub),
            test_request(),
            Arc::new(TransientErrors),
            test_backoff(),
            |_| {},
        )
        .await;
        let err = result.unwrap_err();
        assert_eq!(
            err.status().map(|s| s.code),
            Some(Code::PermissionDenied),
            "{err:?}"
        );
    }
}
