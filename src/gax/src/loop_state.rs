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

//! Polling loop control types.
//!
//! Applications only need to use these types when implementing their own
//! polling policies.

use crate::error::Error;

/// The verdict a polling policy renders on a polling error.
///
/// Polling loops differ from retry loops in that the operation already
/// started on the service side. The policy decides whether the loop keeps
/// asking for status or gives up and reports the error.
#[derive(Debug)]
pub enum LoopState {
    /// Polling again cannot help. The loop stops and reports this error.
    Permanent(Error),

    /// The error is retryable, but the policy's budget ran out.
    Exhausted(Error),

    /// The error is retryable and the loop should poll again.
    Continue(Error),
}

impl LoopState {
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted(_))
    }

    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue(_))
    }

    /// Consumes the verdict and returns the error that triggered it.
    pub fn into_inner(self) -> Error {
        match self {
            Self::Permanent(e) | Self::Exhausted(e) | Self::Continue(e) => e,
        }
    }
}
