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

use super::{ChecksumMismatch, ObjectChecksums};
use base64::Engine;
use base64::prelude::BASE64_STANDARD;

/// Fills the gaps in `known` from `computed`, never overwriting a digest the
/// caller already has.
pub fn update(known: &mut ObjectChecksums, computed: ObjectChecksums) {
    if known.crc32c.is_none() {
        known.crc32c = computed.crc32c;
    }
    if known.md5_hash.is_empty() {
        known.md5_hash = computed.md5_hash;
    }
}

/// Compare the received object checksums vs. the computed checksums.
///
/// A `None` crc32c or an empty md5 hash sits out the comparison. That
/// accounts for digests disabled on the client (only CRC32C is on by
/// default) and for digests the service does not report (composed objects
/// often lack an MD5 hash).
pub fn validate(
    expected: &ObjectChecksums,
    received: &Option<ObjectChecksums>,
) -> Result<(), ChecksumMismatch> {
    let Some(recv) = received else {
        return Ok(());
    };
    let crc32c_mismatch = expected
        .crc32c
        .zip(recv.crc32c)
        .filter(|(e, r)| e != r)
        .map(|(want, got)| (got, want));
    let md5_mismatch = (!expected.md5_hash.is_empty()
        && !recv.md5_hash.is_empty()
        && expected.md5_hash != recv.md5_hash)
        .then(|| (recv.md5_hash.clone(), expected.md5_hash.clone()));

    match (crc32c_mismatch, md5_mismatch) {
        (None, None) => Ok(()),
        (Some((got, want)), None) => Err(ChecksumMismatch::Crc32c { got, want }),
        (None, Some((got, want))) => Err(ChecksumMismatch::Md5 { got, want }),
        (Some((crc_got, crc_want)), Some((md5_got, md5_want))) => {
            let got = ObjectChecksums::new()
                .set_crc32c(crc_got)
                .set_md5_hash(md5_got);
            let want = ObjectChecksums::new()
                .set_crc32c(crc_want)
                .set_md5_hash(md5_want);
            Err(ChecksumMismatch::Both {
                got: Box::new(got),
                want: Box::new(want),
            })
        }
    }
}

/// Extracts the CRC32C checksum from a `x-nimbus-hash` header value.
///
/// The checksum is base64-encoded in big-endian order.
pub fn header_to_crc32c(value: &str) -> Option<u32> {
    decode_hash_entry(value, "crc32c=")
        .and_then(|b| <[u8; 4]>::try_from(b.as_slice()).ok())
        .map(u32::from_be_bytes)
}

/// Extracts the MD5 hash from a `x-nimbus-hash` header value.
pub fn header_to_md5_hash(value: &str) -> bytes::Bytes {
    decode_hash_entry(value, "md5=")
        .map(bytes::Bytes::from_owner)
        .unwrap_or_default()
}

// The header value is a comma separated list of `<name>=<base64>` entries.
fn decode_hash_entry(value: &str, prefix: &str) -> Option<Vec<u8>> {
    value
        .split(',')
        .map(str::trim)
        .find_map(|v| v.strip_prefix(prefix))
        .and_then(|encoded| BASE64_STANDARD.decode(encoded).ok())
}

/// Computes a checksum or hash for object transfers.
#[derive(Clone, Debug)]
pub struct Checksum {
    pub crc32c: Option<Crc32c>,
    pub md5_hash: Option<Md5>,
}

impl Checksum {
    pub fn update(&mut self, offset: u64, data: &bytes::Bytes) {
        if let Some(crc32c) = &mut self.crc32c {
            crc32c.update(offset, data);
        }
        if let Some(md5) = &mut self.md5_hash {
            md5.update(offset, data);
        }
    }

    pub fn finalize(&self) -> ObjectChecksums {
        let mut res = ObjectChecksums::new();
        if let Some(crc32c) = &self.crc32c {
            res = res.set_crc32c(crc32c.finalize());
        }
        if let Some(md5) = &self.md5_hash {
            res = res.set_md5_hash(md5.finalize());
        }
        res
    }
}

/// Accumulates the CRC32C checksum over a stream of chunks.
#[derive(Clone, Debug, Default)]
pub struct Crc32c {
    checksum: u32,
    offset: u64,
}

impl Crc32c {
    fn update(&mut self, offset: u64, data: &bytes::Bytes) {
        self.offset = advance(self.offset, offset, data, |data| {
            self.checksum = crc32c::crc32c_append(self.checksum, data)
        })
    }

    fn finalize(&self) -> u32 {
        self.checksum
    }
}

/// Accumulates the MD5 hash over a stream of chunks.
#[derive(Clone, Default)]
pub struct Md5 {
    hasher: md5::Context,
    offset: u64,
}

impl Md5 {
    fn update(&mut self, offset: u64, data: &bytes::Bytes) {
        self.offset = advance(self.offset, offset, data, |data| {
            self.hasher.consume(data);
        });
    }

    fn finalize(&self) -> bytes::Bytes {
        let digest = self.hasher.clone().finalize();
        bytes::Bytes::from_owner(Vec::from_iter(digest.0))
    }
}

impl std::fmt::Debug for Md5 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Md5")
            .field("hasher", &"(opaque)")
            .field("offset", &self.offset)
            .finish()
    }
}

// Uploads replay chunks after a resumed interruption. A chunk overlapping
// `current` contributes only the bytes at or past `current`; chunks entirely
// before or after it leave the digest untouched.
fn advance<F>(current: u64, offset: u64, data: &bytes::Bytes, hash: F) -> u64
where
    F: FnOnce(&bytes::Bytes),
{
    let end = offset + data.len() as u64;
    if !(offset..end).contains(&current) {
        return current;
    }
    let fresh = data.clone().split_off((current - offset) as usize);
    hash(&fresh);
    end
}
