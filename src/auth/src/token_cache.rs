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
use gax::error::CredentialsError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

/// Tokens within this much of their expiration are refreshed early. The
/// margin absorbs clock skew and the latency of the request that will carry
/// the token.
pub(crate) const EXPIRY_SLACK: Duration = Duration::from_secs(30);

/// A caching decorator for [TokenProvider].
///
/// The cache holds the last fetched token and returns clones of it until it
/// approaches expiration. Refreshes are single-flight: the first caller to
/// observe a stale token performs the fetch, and concurrent callers wait
/// for that one result instead of issuing their own requests.
#[derive(Debug)]
pub(crate) struct TokenCache<T>
where
    T: TokenProvider,
{
    // The last fetch outcome, a token or an error.
    slot: Arc<Mutex<Result<Token>>>,

    // Held for the duration of a refresh. `try_lock()` failing means some
    // other task is already fetching.
    refresh_in_progress: Arc<Mutex<()>>,
    // Wakes the tasks parked behind an in-flight refresh.
    refresh_done: Arc<Notify>,

    inner: Arc<T>,
}

// Derived `Clone` would require `T: Clone`. All fields are `Arc`s, so the
// bound is not needed.
impl<T: TokenProvider> Clone for TokenCache<T> {
    fn clone(&self) -> TokenCache<T> {
        TokenCache {
            slot: self.slot.clone(),
            refresh_in_progress: self.refresh_in_progress.clone(),
            refresh_done: self.refresh_done.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<T: TokenProvider> TokenCache<T> {
    pub(crate) fn new(inner: T) -> TokenCache<T> {
        TokenCache {
            slot: Arc::new(Mutex::new(Err(CredentialsError::from_str(
                true,
                "the token cache is empty, no token has been fetched yet",
            )))),
            refresh_in_progress: Arc::new(Mutex::new(())),
            refresh_done: Arc::new(Notify::new()),
            inner: Arc::new(inner),
        }
    }

    async fn cached(&self) -> Result<Token> {
        self.slot.lock().await.clone()
    }
}

fn usable(outcome: &Result<Token>) -> bool {
    match outcome {
        Ok(t) => !t.expires_within(EXPIRY_SLACK),
        Err(_) => false,
    }
}

#[async_trait::async_trait]
impl<T: TokenProvider + 'static> TokenProvider for TokenCache<T> {
    async fn token(&self) -> Result<Token> {
        let cached = self.cached().await;
        if usable(&cached) {
            return cached;
        }

        let Ok(guard) = self.refresh_in_progress.try_lock() else {
            // Another task is already fetching. Park until it publishes its
            // outcome, then read that outcome from the slot.
            self.refresh_done.notified().await;
            return self.cached().await;
        };

        // This task fetches, publishes the outcome for everyone parked
        // behind the refresh, and returns it directly.
        let outcome = self.inner.token().await;
        *self.slot.lock().await = outcome.clone();
        drop(guard);
        self.refresh_done.notify_waiters();
        outcome
    }
}
