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

//! Retry loop control types.
//!
//! Applications only need to use these types when implementing their own
//! retry policies.

use crate::error::Error;

/// The verdict a retry policy renders on an attempt failure.
///
/// Each variant carries the error that triggered the decision, so the retry
/// loop can report it to the caller when the loop stops.
#[derive(Debug)]
pub enum RetryResult {
    /// Retrying cannot help. The loop stops and reports this error.
    Permanent(Error),

    /// The error is retryable, but the policy's budget ran out.
    ///
    /// Policies with an attempt or elapsed time limit return this variant
    /// once the limit is reached, even for errors they would otherwise
    /// retry.
    Exhausted(Error),

    /// The error is retryable and the budget allows another attempt.
    Continue(Error),
}

impl RetryResult {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::rpc::{Code, Status};
    use test_case::test_case;

    fn service_error(code: Code) -> Error {
        Error::service(Status::default().set_code(code))
    }

    #[test_case(RetryResult::Permanent(service_error(Code::PermissionDenied)), (true, false, false))]
    #[test_case(RetryResult::Exhausted(service_error(Code::Unavailable)), (false, true, false))]
    #[test_case(RetryResult::Continue(service_error(Code::Unavailable)), (false, false, true))]
    fn predicates(verdict: RetryResult, want: (bool, bool, bool)) {
        let got = (
            verdict.is_permanent(),
            verdict.is_exhausted(),
            verdict.is_continue(),
        );
        assert_eq!(got, want, "{verdict:?}");
    }

    #[test]
    fn into_inner_returns_triggering_error() {
        let verdict = RetryResult::Permanent(service_error(Code::PermissionDenied));
        let err = verdict.into_inner();
        assert_eq!(err.status().map(|s| s.code), Some(Code::PermissionDenied));
    }
}
