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

//! The transport trait for the object storage service.

use crate::model::{RewriteObjectRequest, RewriteResponse};
use gax::Result;

/// The messages sent to the object storage service.
///
/// Transport implementations handle serialization, endpoint resolution, and
/// per-request retries. The copy helpers in this crate only depend on this
/// trait, so they can be tested without a service.
#[async_trait::async_trait]
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Copies data from a source object to a destination object.
    ///
    /// A single call copies at most one service-defined chunk. The caller
    /// continues the copy by resending the request with the
    /// [rewrite_token][RewriteObjectRequest::rewrite_token] from the
    /// previous response.
    async fn rewrite_object(&self, req: RewriteObjectRequest) -> Result<RewriteResponse>;
}
