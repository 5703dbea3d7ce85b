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

//! Access tokens and the trait to fetch them.

use crate::Result;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// An access token, as minted by an authorization server.
#[derive(Clone, PartialEq)]
pub struct Token {
    /// The secret value sent to services in the `Authorization:` header.
    pub token: String,

    /// The token scheme, typically `"Bearer"`.
    pub token_type: String,

    /// When the token stops being accepted, or `None` for tokens that do
    /// not expire.
    ///
    /// The `Instant` only has meaning within the current process. Let the
    /// library refresh tokens rather than persisting this value.
    pub expires_at: Option<Instant>,

    /// Extra attributes reported by the authorization server, such as the
    /// granted scopes.
    pub metadata: Option<HashMap<String, String>>,
}

impl Token {
    /// Returns `true` if the token expires within the next `slack` period.
    ///
    /// Tokens without an expiration never report as expiring.
    pub fn expires_within(&self, slack: Duration) -> bool {
        self.expires_at
            .is_some_and(|e| e <= Instant::now() + slack)
    }
}

// The token value must not leak into logs.
impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("token", &"[redacted]")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("metadata", &self.metadata)
            .finish()
    }
}

#[async_trait::async_trait]
pub(crate) trait TokenProvider: std::fmt::Debug + Send + Sync {
    async fn token(&self) -> Result<Token>;
}
