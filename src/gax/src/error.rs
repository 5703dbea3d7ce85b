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

//! The error types used by the client libraries.

mod credentials;
pub use credentials::CredentialsError;

pub mod rpc;

use rpc::Status;

/// A boxed error type.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The core error type for the client libraries.
///
/// Most applications will just return the error or log it, without any
/// further action. However, some applications may need to interrogate the
/// error details. This type offers a series of predicates to determine the
/// error kind, and accessors to query the most common error details.
/// Applications can query the error [source][std::error::Error::source] for
/// deeper information.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<BoxError>,
}

impl Error {
    /// Creates an error with the information returned by the service.
    pub fn service(status: Status) -> Self {
        Self {
            kind: ErrorKind::Service(status),
            source: None,
        }
    }

    /// The status, if any, returned by the service.
    pub fn status(&self) -> Option<&Status> {
        match &self.kind {
            ErrorKind::Service(status) => Some(status),
            _ => None,
        }
    }

    /// Creates an error representing an exhausted policy.
    ///
    /// The retry and polling loops return this error when the policy stops
    /// the loop even though the last failure was retryable. The source is the
    /// last error observed, so callers can distinguish "gave up" from "known
    /// to be wrong".
    pub fn exhausted<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Exhausted,
            source: Some(source.into()),
        }
    }

    /// Returns `true` if a retry or polling policy was exhausted before the
    /// operation completed.
    pub fn is_exhausted(&self) -> bool {
        matches!(&self.kind, ErrorKind::Exhausted)
    }

    /// Creates an error representing a cancelled operation.
    ///
    /// This is returned when the caller aborts an operation while an attempt
    /// or a backoff timer is outstanding. The source is the last error
    /// observed before cancellation, if any.
    pub fn cancelled<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Cancelled,
            source: Some(source.into()),
        }
    }

    /// Returns `true` if the operation was cancelled by the caller.
    pub fn is_cancelled(&self) -> bool {
        matches!(&self.kind, ErrorKind::Cancelled)
    }

    /// Creates an error representing a problem deserializing a response or
    /// a malformed response from the service.
    pub fn deser<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Deserialization,
            source: Some(source.into()),
        }
    }

    /// Returns `true` if the error is a response deserialization problem.
    pub fn is_deserialization(&self) -> bool {
        matches!(&self.kind, ErrorKind::Deserialization)
    }

    /// Creates an error representing a failure to create the authentication
    /// headers for a request.
    pub fn authentication(source: CredentialsError) -> Self {
        Self {
            kind: ErrorKind::Authentication,
            source: Some(source.into()),
        }
    }

    /// Returns `true` if the error happened while creating the
    /// authentication headers.
    pub fn is_authentication(&self) -> bool {
        matches!(&self.kind, ErrorKind::Authentication)
    }

    /// Creates an error representing an I/O problem sending the request or
    /// receiving the response.
    ///
    /// The request may or may not have reached the service, so these errors
    /// are ambiguous for non-idempotent operations.
    pub fn io<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Io,
            source: Some(source.into()),
        }
    }

    /// Returns `true` if the error is an I/O problem.
    pub fn is_io(&self) -> bool {
        matches!(&self.kind, ErrorKind::Io)
    }

    /// Creates an uncategorized error.
    pub fn other<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Other,
            source: Some(source.into()),
        }
    }

    /// The error was generated before the RPC started and is transient.
    pub(crate) fn is_transient_and_before_rpc(&self) -> bool {
        if !matches!(&self.kind, ErrorKind::Authentication) {
            return false;
        }
        self.source
            .as_ref()
            .and_then(|e| e.downcast_ref::<CredentialsError>())
            .map(|e| e.is_retryable())
            .unwrap_or(false)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.kind, &self.source) {
            (ErrorKind::Service(status), _) => {
                write!(
                    f,
                    "the service reports an error with code {} described as: {}",
                    status.code, status.message
                )
            }
            (ErrorKind::Authentication, Some(e)) => {
                write!(f, "cannot create the authentication headers {e}")
            }
            (ErrorKind::Deserialization, Some(e)) => {
                write!(f, "cannot deserialize the response {e}")
            }
            (ErrorKind::Exhausted, Some(e)) => {
                write!(f, "{e}")
            }
            (ErrorKind::Cancelled, Some(e)) => {
                write!(f, "the operation was cancelled, the last error was {e}")
            }
            (ErrorKind::Io, Some(e)) => {
                write!(f, "a problem sending the request or receiving the response {e}")
            }
            (ErrorKind::Other, Some(e)) => {
                write!(f, "an unclassified problem making a request: {e}")
            }
            (_, None) => unreachable!("no constructor allows this"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error))
    }
}

/// The type of error held by an [Error] instance.
#[derive(Debug)]
enum ErrorKind {
    Service(Status),
    Authentication,
    Deserialization,
    Exhausted,
    Cancelled,
    Io,
    /// An uncategorized error.
    Other,
}
