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

use crate::Result;
use crate::token::{Token, TokenProvider};
use gax::backoff_policy::BackoffPolicy;
use gax::error::CredentialsError;
use gax::exponential_backoff::ExponentialBackoff;
use gax::retry_loop::retry_loop;
use gax::retry_policy::RetryPolicy;
use std::sync::Arc;

/// A retrying decorator for [TokenProvider].
///
/// Token fetches run under the same retry loop as any other RPC, with
/// policies private to the provider. Without a retry policy the decorator is
/// a pass-through.
#[derive(Debug)]
pub(crate) struct TokenProviderWithRetry<T: TokenProvider> {
    inner: Arc<T>,
    retry_policy: Option<Arc<dyn RetryPolicy>>,
    backoff_policy: Arc<dyn BackoffPolicy>,
}

#[derive(Debug)]
pub(crate) struct Builder<T: TokenProvider> {
    inner: Arc<T>,
    retry_policy: Option<Arc<dyn RetryPolicy>>,
    backoff_policy: Option<Arc<dyn BackoffPolicy>>,
}

impl<T: TokenProvider> Builder<T> {
    pub(crate) fn new(inner: T) -> Self {
        Self {
            inner: Arc::new(inner),
            retry_policy: None,
            backoff_policy: None,
        }
    }

    pub(crate) fn with_retry_policy(mut self, retry_policy: Arc<dyn RetryPolicy>) -> Self {
        self.retry_policy = Some(retry_policy);
        self
    }

    pub(crate) fn with_backoff_policy(mut self, backoff_policy: Arc<dyn BackoffPolicy>) -> Self {
        self.backoff_policy = Some(backoff_policy);
        self
    }

    pub(crate) fn build(self) -> TokenProviderWithRetry<T> {
        let backoff_policy = self
            .backoff_policy
            .unwrap_or_else(|| Arc::new(ExponentialBackoff::default()));
        TokenProviderWithRetry {
            inner: self.inner,
            retry_policy: self.retry_policy,
            backoff_policy,
        }
    }
}

#[async_trait::async_trait]
impl<T: TokenProvider + 'static> TokenProvider for TokenProviderWithRetry<T> {
    async fn token(&self) -> Result<Token> {
        match self.retry_policy.clone() {
            None => self.inner.token().await,
            Some(policy) => self.execute_retry_loop(policy).await,
        }
    }
}

// Searches the source chain for the `CredentialsError` that triggered the
// failure. The retry loop may wrap it more than once, e.g. when the policy
// is exhausted.
fn retryable_source(error: &gax::error::Error) -> bool {
    let mut source = std::error::Error::source(error);
    while let Some(e) = source {
        if let Some(c) = e.downcast_ref::<CredentialsError>() {
            return c.is_retryable();
        }
        source = e.source();
    }
    false
}

impl<T> TokenProviderWithRetry<T>
where
    T: TokenProvider,
{
    async fn execute_retry_loop(&self, retry_policy: Arc<dyn RetryPolicy>) -> Result<Token> {
        let inner = self.inner.clone();
        let sleep = async |d| tokio::time::sleep(d).await;
        retry_loop(
            move |_| {
                let inner = inner.clone();
                async move { inner.token().await.map_err(gax::error::Error::authentication) }
            },
            sleep,
            true, // token fetching is idempotent
            retry_policy,
            self.backoff_policy.clone(),
        )
        .await
        .map_err(|e| CredentialsError::new(retryable_source(&e), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tests::MockTokenProvider;
    use gax::exponential_backoff::ExponentialBackoffBuilder;
    use gax::retry_policy::{RetryPolicyExt, TransientErrors};
    use mockall::Sequence;
    use std::time::Duration;

    fn test_backoff() -> Arc<dyn BackoffPolicy> {
        Arc::new(
            ExponentialBackoffBuilder::new()
                .with_initial_delay(Duration::from_millis(1))
                .with_maximum_delay(Duration::from_millis(1))
                .clamp(),
        )
    }

    fn test_policy(max_attempts: u32) -> Arc<dyn RetryPolicy> {
        Arc::new(TransientErrors.with_attempt_limit(max_attempts))
    }

    #[tokio::test]
    async fn success_on_first_try() {
        let mut mock = MockTokenProvider::new();
        let token = Token {
            token: "test-token".to_string(),
            token_type: "Bearer".to_string(),
            expires_at: None,
            metadata: None,
        };
        mock.expect_token().times(1).return_once(|| Ok(token));

        let provider = Builder::new(mock)
            .with_retry_policy(test_policy(2))
            .with_backoff_policy(test_backoff())
            .build();

        let token = provider.token().await.unwrap();
        assert_eq!(token.token, "test-token");
    }

    #[tokio::test]
    async fn success_after_retry() {
        let mut mock = MockTokenProvider::new();
        let mut seq = Sequence::new();
        mock.expect_token()
            .times(1)
            .in_sequence(&mut seq)
            .return_once(|| Err(CredentialsError::from_str(true, "transient error")));
        mock.expect_token()
            .times(1)
            .in_sequence(&mut seq)
            .return_once(|| {
                Ok(Token {
                    token: "test-token".to_string(),
                    token_type: "Bearer".to_string(),
                    expires_at: None,
                    metadata: None,
                })
            });

        let provider = Builder::new(mock)
            .with_retry_policy(test_policy(2))
            .with_backoff_policy(test_backoff())
            .build();

        let token = provider.token().await.unwrap();
        assert_eq!(token.token, "test-token");
    }

    #[tokio::test]
    async fn retry_exhausted() {
        let mut mock = MockTokenProvider::new();
        mock.expect_token()
            .times(2)
            .returning(|| Err(CredentialsError::from_str(true, "transient error")));

        let provider = Builder::new(mock)
            .with_retry_policy(test_policy(2))
            .with_backoff_policy(test_backoff())
            .build();

        let error = provider.token().await.unwrap_err();
        assert!(error.is_retryable(), "{error}");
        assert!(error.to_string().contains("transient error"), "{error}");
    }

    #[tokio::test]
    async fn non_transient_error() {
        let mut mock = MockTokenProvider::new();
        mock.expect_token()
            .times(1)
            .returning(|| Err(CredentialsError::from_str(false, "bad credentials")));

        let provider = Builder::new(mock)
            .with_retry_policy(test_policy(2))
            .with_backoff_policy(test_backoff())
            .build();

        let error = provider.token().await.unwrap_err();
        assert!(!error.is_retryable(), "{error}");
        assert!(error.to_string().contains("bad credentials"), "{error}");
    }

    #[tokio::test]
    async fn no_retry_policy_is_pass_through() {
        let mut mock = MockTokenProvider::new();
        mock.expect_token()
            .times(1)
            .returning(|| Err(CredentialsError::from_str(true, "transient error")));

        let provider = Builder::new(mock).build();

        let error = provider.token().await.unwrap_err();
        assert!(error.is_retryable(), "{error}");
    }
}
