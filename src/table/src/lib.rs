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

//! Helpers for the table administration service.
//!
//! Tables are replicated, and mutations take some time to reach every
//! replica. The service exposes eventual consistency through tokens: the
//! client generates a token, then checks the token until the service reports
//! that all mutations issued before the token was created are visible
//! everywhere. [wait_for_consistency] packages the generate-then-check loop.

use gax::Result;
use gax::polling_backoff_policy::PollingBackoffPolicy;
use gax::polling_error_policy::PollingErrorPolicy;
use lro::{Operation, Poller};
use std::sync::Arc;

pub mod model;
pub mod stub;

/// Waits until the mutations applied to a table have replicated.
///
/// Generates a consistency token for `table_name` and then checks it until
/// the service reports the table as consistent. The error policy bounds the
/// total time and the number of checks. When the budget runs out before the
/// table converges the result is an [exhausted][gax::error::Error::is_exhausted]
/// error, so callers can distinguish a slow table from a broken one.
pub async fn wait_for_consistency(
    stub: Arc<dyn stub::TableAdmin>,
    table_name: &str,
    error_policy: Arc<dyn PollingErrorPolicy>,
    backoff_policy: Arc<dyn PollingBackoffPolicy>,
) -> Result<()> {
    let start_stub = stub.clone();
    let start_table = table_name.to_string();
    let start = move || async move {
        let response = start_stub.generate_consistency_token(&start_table).await?;
        Ok(Operation::InProgress {
            token: Some(response.consistency_token),
            metadata: None::<()>,
        })
    };
    let query_table = table_name.to_string();
    let query = move |token: String| {
        let stub = stub.clone();
        let table_name = query_table.clone();
        async move {
            let response = stub.check_consistency(&table_name, &token).await?;
            if response.consistent {
                Ok(Operation::Done(()))
            } else {
                Ok(Operation::InProgress {
                    token: Some(token),
                    metadata: None,
                })
            }
        }
    };
    lro::new_poller(error_policy, backoff_policy, start, query)
        .until_done()
        .await
}
