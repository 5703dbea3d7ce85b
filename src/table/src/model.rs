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

//! Request and response messages for the table administration service.

use serde::{Deserialize, Serialize};

/// The response message for generating a consistency token.
///
/// The token captures the state of a table at the time of the request. It can
/// then be checked, repeatedly if necessary, to see if all the mutations up
/// to that point have been replicated.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct GenerateConsistencyTokenResponse {
    /// The generated consistency token.
    pub consistency_token: String,
}

impl GenerateConsistencyTokenResponse {
    /// Sets the value of [consistency_token][GenerateConsistencyTokenResponse::consistency_token].
    pub fn set_consistency_token<T: Into<String>>(mut self, v: T) -> Self {
        self.consistency_token = v.into();
        self
    }
}

/// The response message for checking a consistency token.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct CheckConsistencyResponse {
    /// True only if the token has been consumed, that is, all mutations prior
    /// to the token's creation have been replicated.
    pub consistent: bool,
}

impl CheckConsistencyResponse {
    /// Sets the value of [consistent][CheckConsistencyResponse::consistent].
    pub fn set_consistent<T: Into<bool>>(mut self, v: T) -> Self {
        self.consistent = v.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_response_serde() -> anyhow::Result<()> {
        let response =
            GenerateConsistencyTokenResponse::default().set_consistency_token("token-001");
        let got = serde_json::to_value(&response)?;
        let want = serde_json::json!({"consistencyToken": "token-001"});
        assert_eq!(got, want);
        let roundtrip = serde_json::from_value::<GenerateConsistencyTokenResponse>(got)?;
        assert_eq!(roundtrip, response);
        Ok(())
    }

    #[test]
    fn check_response_serde() -> anyhow::Result<()> {
        let response = CheckConsistencyResponse::default().set_consistent(true);
        let got = serde_json::to_value(&response)?;
        let want = serde_json::json!({"consistent": true});
        assert_eq!(got, want);
        let roundtrip = serde_json::from_value::<CheckConsistencyResponse>(got)?;
        assert_eq!(roundtrip, response);
        Ok(())
    }

    #[test]
    fn check_response_defaults() -> anyhow::Result<()> {
        let got = serde_json::from_value::<CheckConsistencyResponse>(serde_json::json!({}))?;
        assert!(!got.consistent);
        Ok(())
    }
}
