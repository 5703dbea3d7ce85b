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

//! Credential types for the client libraries.

pub mod user_account;

use crate::Result;
use crate::token::Token;
use http::HeaderMap;
use std::sync::Arc;

/// The header used to bill requests to a different project.
pub(crate) const QUOTA_PROJECT_KEY: &str = "x-nimbus-user-project";

/// An implementation of [crate::credentials::CredentialsProvider].
///
/// Represents a [Credentials] used to obtain auth tokens and the
/// corresponding request headers.
///
/// In general, [Credentials][credentials-link] are "digital object that
/// provide proof of identity", the archetype may be a username and password
/// combination, but a private RSA key may be a better example.
///
/// [credentials-link]: https://cloud.nimbus.dev/docs/authentication#credentials
#[derive(Clone, Debug)]
pub struct Credentials {
    pub(crate) inner: Arc<dyn dynamic::CredentialsProvider>,
}

impl Credentials {
    /// Asynchronously retrieves a token.
    ///
    /// Returns a [Token][crate::token::Token] for the current credentials.
    /// The underlying implementation refreshes the token as needed.
    pub async fn token(&self) -> Result<Token> {
        self.inner.token().await
    }

    /// Asynchronously constructs the auth headers.
    ///
    /// Different auth tokens are sent via different headers. The
    /// [Credentials] constructs the headers (and header values) that should
    /// be sent with a request.
    pub async fn headers(&self) -> Result<HeaderMap> {
        self.inner.headers().await
    }
}

pub(crate) mod dynamic {
    use super::{HeaderMap, Result, Token};

    /// A dyn-compatible, crate-private version of `Credentials`.
    #[async_trait::async_trait]
    pub trait CredentialsProvider: Send + Sync + std::fmt::Debug {
        /// Asynchronously retrieves a token.
        async fn token(&self) -> Result<Token>;

        /// Asynchronously constructs the auth headers.
        async fn headers(&self) -> Result<HeaderMap>;
    }
}
