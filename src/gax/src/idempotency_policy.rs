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

//! Defines the trait for idempotency policies and some common
//! implementations.
//!
//! Retrying a request that mutates state is only safe when repeating the
//! request has the same net effect as performing it once. The retry loops
//! consult an idempotency policy exactly once, before the first attempt, to
//! classify the request. The classification is independent of any error the
//! request later returns.
//!
//! # Example
//! ```
//! # use nimbus_gax::idempotency_policy::*;
//! let policy = StrictIdempotency;
//! let read = RequestInfo::new(Verb::Get);
//! assert!(policy.is_idempotent(&read));
//! let blind_write = RequestInfo::new(Verb::Update);
//! assert!(!policy.is_idempotent(&blind_write));
//! let guarded_write = RequestInfo::new(Verb::Update).with_precondition();
//! assert!(policy.is_idempotent(&guarded_write));
//! ```

/// The verb of a request, as seen by the idempotency policies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verb {
    /// Read a single resource.
    Get,
    /// List resources.
    List,
    /// Create a new resource.
    Insert,
    /// Replace an existing resource.
    Update,
    /// Delete a resource.
    Delete,
}

impl Verb {
    /// Returns `true` if the verb does not mutate state.
    pub fn is_read(&self) -> bool {
        matches!(self, Verb::Get | Verb::List)
    }
}

/// Describes a call site for the idempotency policies.
#[derive(Clone, Copy, Debug)]
pub struct RequestInfo {
    verb: Verb,
    has_precondition: bool,
}

impl RequestInfo {
    /// Creates a descriptor for a request without preconditions.
    pub fn new(verb: Verb) -> Self {
        Self {
            verb,
            has_precondition: false,
        }
    }

    /// Marks the request as guarded by a server-enforced precondition, such
    /// as an `if-generation-match` constraint. The server evaluates the
    /// precondition exactly once, so repeating the request is safe.
    pub fn with_precondition(mut self) -> Self {
        self.has_precondition = true;
        self
    }

    /// The verb of the request.
    pub fn verb(&self) -> Verb {
        self.verb
    }

    /// Whether the request carries a server-enforced precondition.
    pub fn has_precondition(&self) -> bool {
        self.has_precondition
    }
}

/// Determines if a request is safe to retry.
pub trait IdempotencyPolicy: Send + Sync + std::fmt::Debug {
    /// Classify `request` as safe-to-retry or not.
    fn is_idempotent(&self, request: &RequestInfo) -> bool;
}

/// An idempotency policy that treats every request as idempotent.
///
/// Useful for administrative operations where duplicate side effects are
/// harmless, or when the application guards mutations by other means.
#[derive(Clone, Debug)]
pub struct AlwaysRetry;

impl IdempotencyPolicy for AlwaysRetry {
    fn is_idempotent(&self, _request: &RequestInfo) -> bool {
        true
    }
}

/// An idempotency policy that only treats requests as idempotent when
/// repeating them is provably safe.
///
/// Reads are always idempotent. Mutations are idempotent only when guarded
/// by a server-enforced precondition.
#[derive(Clone, Debug)]
pub struct StrictIdempotency;

impl IdempotencyPolicy for StrictIdempotency {
    fn is_idempotent(&self, request: &RequestInfo) -> bool {
        request.verb().is_read() || request.has_precondition()
    }
}
