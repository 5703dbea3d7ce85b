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

//! End-to-end integrity checks for object transfers.
//!
//! The client library computes a digest of the data as it is transferred,
//! and compares it against the digests declared by the service. The service
//! declares digests in the object metadata, or in the `x-nimbus-hash`
//! response header, or both.

use crate::model::ObjectChecksums;
use gax::Result;
use gax::error::Error;

pub(crate) mod details;

/// The error type for checksum comparisons.
///
/// By default the client library computes a checksum of the transferred data
/// and compares it against the value returned by the service.
///
/// # Troubleshooting
///
/// Data integrity problems are notoriously difficult to root cause. If you
/// are using pre-existing, or pre-computed checksum values, you may want to
/// verify the source data.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum ChecksumMismatch {
    #[error("mismatched CRC32C values, got {got:08x}, want {want:08x}")]
    Crc32c { got: u32, want: u32 },
    #[error("mismatched MD5 values, got {got:?}, want {want:?}")]
    Md5 {
        got: bytes::Bytes,
        want: bytes::Bytes,
    },
    #[error("mismatched CRC32C and MD5 values, got {got:?}, want {want:?}")]
    Both {
        got: Box<ObjectChecksums>,
        want: Box<ObjectChecksums>,
    },
}

/// Validates the integrity of a single object transfer.
///
/// The validator accumulates digests over the transferred bytes, and records
/// the digests declared by the service as they become known. [finish][StreamValidator::finish]
/// consumes the validator, so no more data can be accumulated after the
/// comparison is made.
///
/// An absent server-side digest does not participate in the comparison. The
/// service omits MD5 hashes for composed objects, and omits all digests on
/// some partial responses, neither condition is an integrity failure.
#[derive(Debug)]
pub struct StreamValidator {
    checksum: details::Checksum,
    offset: u64,
    received: Option<ObjectChecksums>,
}

impl StreamValidator {
    /// Creates a validator computing both CRC32C and MD5 digests.
    pub fn new() -> Self {
        Self::with_checksum(details::Checksum {
            crc32c: Some(details::Crc32c::default()),
            md5_hash: Some(details::Md5::default()),
        })
    }

    /// Creates a validator computing only the CRC32C digest.
    ///
    /// This is the default for most transfers, computing MD5 hashes is
    /// expensive and the service does not report them for all objects.
    pub fn crc32c_only() -> Self {
        Self::with_checksum(details::Checksum {
            crc32c: Some(details::Crc32c::default()),
            md5_hash: None,
        })
    }

    fn with_checksum(checksum: details::Checksum) -> Self {
        Self {
            checksum,
            offset: 0,
            received: None,
        }
    }

    /// Accumulates the next chunk of transferred data.
    pub fn update(&mut self, data: &bytes::Bytes) {
        self.checksum.update(self.offset, data);
        self.offset += data.len() as u64;
    }

    /// Records the digests declared in the object metadata.
    ///
    /// Absent or empty values never overwrite a previously recorded digest.
    pub fn process_metadata(&mut self, checksums: &ObjectChecksums) {
        let known = self.received.get_or_insert_default();
        details::update(known, checksums.clone());
    }

    /// Records the digests declared in a `x-nimbus-hash` header value.
    ///
    /// The header value is a comma separated list of `crc32c=<base64>` and
    /// `md5=<base64>` entries. Unparseable entries are ignored, the service
    /// never requires the client to validate.
    pub fn process_hash_header(&mut self, value: &str) {
        let declared = ObjectChecksums::new()
            .set_or_clear_crc32c(details::header_to_crc32c(value))
            .set_md5_hash(details::header_to_md5_hash(value));
        let known = self.received.get_or_insert_default();
        details::update(known, declared);
    }

    /// Completes the validation.
    ///
    /// Returns the computed digests if they match every digest the service
    /// declared, or a [deserialization][Error::is_deserialization] error with
    /// a [ChecksumMismatch] source otherwise.
    pub fn finish(self) -> Result<ObjectChecksums> {
        let computed = self.checksum.finalize();
        details::validate(&computed, &self.received).map_err(Error::deser)?;
        Ok(computed)
    }
}

impl Default for StreamValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::prelude::BASE64_STANDARD;
    use std::error::Error as _;

    fn data() -> bytes::Bytes {
        bytes::Bytes::from_static(b"the quick brown fox jumps over the lazy dog")
    }

    fn computed_checksums() -> ObjectChecksums {
        let digest = md5::compute(data());
        ObjectChecksums::new()
            .set_crc32c(crc32c::crc32c(&data()))
            .set_md5_hash(bytes::Bytes::from_owner(Vec::from_iter(digest.0)))
    }

    fn hash_header() -> String {
        let crc32c = BASE64_STANDARD.encode(crc32c::crc32c(&data()).to_be_bytes());
        let md5 = BASE64_STANDARD.encode(md5::compute(data()).0);
        format!("crc32c={crc32c},md5={md5}")
    }

    #[test]
    fn matching_metadata() -> anyhow::Result<()> {
        let mut validator = StreamValidator::new();
        for chunk in [&data()[..16], &data()[16..]] {
            validator.update(&bytes::Bytes::copy_from_slice(chunk));
        }
        validator.process_metadata(&computed_checksums());
        let got = validator.finish()?;
        assert_eq!(got, computed_checksums());
        Ok(())
    }

    #[test]
    fn matching_header() -> anyhow::Result<()> {
        let mut validator = StreamValidator::new();
        validator.update(&data());
        validator.process_hash_header(&hash_header());
        let got = validator.finish()?;
        assert_eq!(got, computed_checksums());
        Ok(())
    }

    #[test]
    fn no_declared_digests() -> anyhow::Result<()> {
        // The service did not declare any digests. There is nothing to
        // compare against, and the transfer is accepted.
        let mut validator = StreamValidator::new();
        validator.update(&data());
        let got = validator.finish()?;
        assert_eq!(got, computed_checksums());
        Ok(())
    }

    #[test]
    fn corrupt_stream_detected() {
        let mut validator = StreamValidator::new();
        validator.update(&bytes::Bytes::from_static(b"the quick brown fox"));
        validator.process_metadata(&computed_checksums());
        let err = validator.finish().unwrap_err();
        assert!(err.is_deserialization(), "{err:?}");
        assert!(
            matches!(
                err.source()
                    .and_then(|e| e.downcast_ref::<ChecksumMismatch>()),
                Some(ChecksumMismatch::Both { .. })
            ),
            "{err:?}"
        );
    }

    #[test]
    fn crc32c_only_ignores_md5() -> anyhow::Result<()> {
        // The server declares an MD5 hash but the validator does not compute
        // one. The MD5 value does not participate in the comparison.
        let mut validator = StreamValidator::crc32c_only();
        validator.update(&data());
        validator.process_metadata(&computed_checksums());
        let got = validator.finish()?;
        assert_eq!(got.crc32c, Some(crc32c::crc32c(&data())));
        assert!(got.md5_hash.is_empty());
        Ok(())
    }

    #[test]
    fn header_never_overwrites_metadata() {
        // A later response without digests must not erase the digests
        // declared earlier.
        let mut validator = StreamValidator::new();
        validator.update(&bytes::Bytes::from_static(b"the quick brown fox"));
        validator.process_metadata(&computed_checksums());
        validator.process_hash_header("");
        let err = validator.finish().unwrap_err();
        assert!(err.is_deserialization(), "{err:?}");
    }

    #[test]
    fn unparseable_header_ignored() -> anyhow::Result<()> {
        let mut validator = StreamValidator::new();
        validator.update(&data());
        validator.process_hash_header("crc32c=!!!not-base64!!!,md5=also-bad");
        let got = validator.finish()?;
        assert_eq!(got, computed_checksums());
        Ok(())
    }
}
