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

//! Helpers for the object storage service.
//!
//! This crate contains the client-side machinery for object copies and for
//! end-to-end integrity validation:
//!
//! - [rewrite::rewrite_object_until_done] continues a chunked copy until the
//!   service reports it complete, validating the copy protocol and
//!   reporting progress along the way.
//! - [checksum::StreamValidator] accumulates digests over transferred bytes
//!   and compares them against the digests declared by the service.

pub mod checksum;
pub mod model;
pub mod rewrite;
pub mod stub;

pub use checksum::ChecksumMismatch;
pub use rewrite::RewriteError;
