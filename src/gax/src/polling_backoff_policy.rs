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

//! Defines the trait for polling backoff policies.
//!
//! The client libraries can automatically poll long-running operations until
//! completion. When doing so they may backoff between polling attempts to
//! avoid overloading the service.
//!
//! These policies should not be confused with retry backoff policies. Their
//! purpose is different, and their implementation is too. Notably, polling
//! backoff policies should not use jitter, while retry policies should.
//!
//! The most common implementation is truncated [exponential backoff]
//! **without** jitter. The backoff period grows exponentially until some
//! limit is reached. This works well when the expected execution time is not
//! known in advance.
//!
//! # Example
//! ```
//! # use nimbus_gax::exponential_backoff::{Error, ExponentialBackoffBuilder};
//! use std::time::Duration;
//!
//! let policy = ExponentialBackoffBuilder::new()
//!     .with_initial_delay(Duration::from_millis(100))
//!     .with_maximum_delay(Duration::from_secs(5))
//!     .with_scaling(4.0)
//!     .build()?;
//! // `policy` implements the `PollingBackoffPolicy` trait.
//! # Ok::<(), Error>(())
//! ```
//!
//! [Exponential backoff]: https://en.wikipedia.org/wiki/Exponential_backoff

/// Defines the trait implemented by all polling backoff strategies.
pub trait PollingBackoffPolicy: Send + Sync + std::fmt::Debug {
    /// Returns the wait period before the next polling attempt.
    ///
    /// # Parameters
    /// * `loop_start` - when the polling loop started.
    /// * `attempt_count` - the number of poll queries. This method is always
    ///   called after the first attempt.
    fn wait_period(
        &self,
        loop_start: std::time::Instant,
        attempt_count: u32,
    ) -> std::time::Duration;
}
