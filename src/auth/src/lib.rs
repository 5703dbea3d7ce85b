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

//! Authentication components for the Nimbus Cloud Client Libraries for Rust.
//!
//! This crate fetches and caches access tokens. The cache refreshes expired
//! tokens with a single request no matter how many callers are waiting, and
//! the underlying token fetch is retried using the same policies as any other
//! RPC in these client libraries.

/// An alias of [std::result::Result] where the error is always
/// [CredentialsError].
pub type Result<T> = std::result::Result<T, CredentialsError>;

pub use gax::error::CredentialsError;

pub mod credentials;
pub mod token;

mod headers_util;
mod retry;
mod token_cache;
