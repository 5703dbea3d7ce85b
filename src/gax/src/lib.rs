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

//! Nimbus APIs helpers.
//!
//! This crate contains a number of types and functions used in the
//! implementation of the Nimbus Cloud Client Libraries for Rust. It provides
//! the error model shared by all the clients, and the retry, backoff,
//! idempotency, and polling policies that make RPCs resilient to transient
//! failures.

/// An alias of [std::result::Result] where the error is always [crate::error::Error].
///
/// This is the result type used by all functions wrapping RPCs.
pub type Result<T> = std::result::Result<T, crate::error::Error>;

/// The core error types used by the client libraries.
pub mod error;

pub mod backoff_policy;
pub mod exponential_backoff;
pub mod idempotency_policy;
pub mod loop_state;
pub mod polling_backoff_policy;
pub mod polling_error_policy;
pub mod retry_loop;
pub mod retry_policy;
pub mod retry_result;

#[cfg(test)]
mod mock_rng;
