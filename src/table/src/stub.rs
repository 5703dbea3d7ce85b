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

//! The transport trait for the table administration service.

use crate::model::{CheckConsistencyResponse, GenerateConsistencyTokenResponse};
use gax::Result;

/// The messages sent to the table administration service.
///
/// Transport implementations handle serialization, endpoint resolution, and
/// per-request retries. The polling helpers in this crate only depend on this
/// trait, so they can be tested without a service.
#[async_trait::async_trait]
pub trait TableAdmin: Send + Sync + std::fmt::Debug {
    /// Generates a consistency token for the given table.
    async fn generate_consistency_token(
        &self,
        table_name: &str,
    ) -> Result<GenerateConsistencyTokenResponse>;

    /// Checks whether the mutations prior to the token's creation have
    /// replicated.
    async fn check_consistency(
        &self,
        table_name: &str,
        consistency_token: &str,
    ) -> Result<CheckConsistencyResponse>;
}
