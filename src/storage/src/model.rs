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

//! Request and response messages for the object storage service.

use serde::{Deserialize, Serialize};

/// Message used for storing full (not subrange) object checksums.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct ObjectChecksums {
    /// CRC32C digest of the object data. Computed by the service for all
    /// written objects.
    pub crc32c: Option<u32>,

    /// 128 bit MD5 hash of the object data. Not all objects have one, for
    /// example, the service does not compute MD5 hashes for composed
    /// objects. An empty value means "not reported".
    pub md5_hash: bytes::Bytes,
}

impl ObjectChecksums {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value of [crc32c][ObjectChecksums::crc32c].
    pub fn set_crc32c<T: Into<u32>>(mut self, v: T) -> Self {
        self.crc32c = Some(v.into());
        self
    }

    /// Sets or clears the value of [crc32c][ObjectChecksums::crc32c].
    pub fn set_or_clear_crc32c<T: Into<u32>>(mut self, v: Option<T>) -> Self {
        self.crc32c = v.map(|x| x.into());
        self
    }

    /// Sets the value of [md5_hash][ObjectChecksums::md5_hash].
    pub fn set_md5_hash<T: Into<bytes::Bytes>>(mut self, v: T) -> Self {
        self.md5_hash = v.into();
        self
    }
}

/// An object stored in a bucket.
///
/// Only the fields needed by the copy and integrity helpers are included
/// here. The full resource has many more attributes.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct Object {
    /// The name of this object.
    pub name: String,

    /// The name of the bucket containing this object.
    pub bucket: String,

    /// Content-Length of the object data in bytes.
    pub size: i64,

    /// The checksums of the complete object, as reported by the service.
    pub checksums: Option<ObjectChecksums>,
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value of [name][Object::name].
    pub fn set_name<T: Into<String>>(mut self, v: T) -> Self {
        self.name = v.into();
        self
    }

    /// Sets the value of [bucket][Object::bucket].
    pub fn set_bucket<T: Into<String>>(mut self, v: T) -> Self {
        self.bucket = v.into();
        self
    }

    /// Sets the value of [size][Object::size].
    pub fn set_size<T: Into<i64>>(mut self, v: T) -> Self {
        self.size = v.into();
        self
    }

    /// Sets the value of [checksums][Object::checksums].
    pub fn set_checksums<T: Into<ObjectChecksums>>(mut self, v: T) -> Self {
        self.checksums = Some(v.into());
        self
    }
}

/// The request message for copying an object, possibly over multiple calls.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct RewriteObjectRequest {
    /// The name of the bucket containing the source object.
    pub source_bucket: String,

    /// The name of the source object.
    pub source_object: String,

    /// The name of the bucket containing the destination object.
    pub destination_bucket: String,

    /// The name of the destination object.
    pub destination_name: String,

    /// Include this field (from the previous rewrite response) on each
    /// rewrite request after the first one, until the rewrite response
    /// 'done' flag is true.
    pub rewrite_token: String,
}

impl RewriteObjectRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value of [source_bucket][RewriteObjectRequest::source_bucket].
    pub fn set_source_bucket<T: Into<String>>(mut self, v: T) -> Self {
        self.source_bucket = v.into();
        self
    }

    /// Sets the value of [source_object][RewriteObjectRequest::source_object].
    pub fn set_source_object<T: Into<String>>(mut self, v: T) -> Self {
        self.source_object = v.into();
        self
    }

    /// Sets the value of [destination_bucket][RewriteObjectRequest::destination_bucket].
    pub fn set_destination_bucket<T: Into<String>>(mut self, v: T) -> Self {
        self.destination_bucket = v.into();
        self
    }

    /// Sets the value of [destination_name][RewriteObjectRequest::destination_name].
    pub fn set_destination_name<T: Into<String>>(mut self, v: T) -> Self {
        self.destination_name = v.into();
        self
    }

    /// Sets the value of [rewrite_token][RewriteObjectRequest::rewrite_token].
    pub fn set_rewrite_token<T: Into<String>>(mut self, v: T) -> Self {
        self.rewrite_token = v.into();
        self
    }
}

/// A rewrite response.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct RewriteResponse {
    /// The total bytes written so far, which can be used to provide a
    /// waiting user with a progress indicator. This property is always
    /// present in the response.
    pub total_bytes_rewritten: u64,

    /// The total size of the object being copied in bytes. This property is
    /// always present in the response.
    pub object_size: u64,

    /// `true` if the copy is finished; otherwise, `false` if the copy is in
    /// progress. This property is always present in the response.
    pub done: bool,

    /// A token to use in subsequent requests to continue copying data. This
    /// token is present in the response only when there is more data to
    /// copy.
    pub rewrite_token: String,

    /// A resource containing the metadata for the copied-to object. This
    /// property is present in the response only when copying completes.
    pub resource: Option<Object>,
}

impl RewriteResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value of [total_bytes_rewritten][RewriteResponse::total_bytes_rewritten].
    pub fn set_total_bytes_rewritten<T: Into<u64>>(mut self, v: T) -> Self {
        self.total_bytes_rewritten = v.into();
        self
    }

    /// Sets the value of [object_size][RewriteResponse::object_size].
    pub fn set_object_size<T: Into<u64>>(mut self, v: T) -> Self {
        self.object_size = v.into();
        self
    }

    /// Sets the value of [done][RewriteResponse::done].
    pub fn set_done<T: Into<bool>>(mut self, v: T) -> Self {
        self.done = v.into();
        self
    }

    /// Sets the value of [rewrite_token][RewriteResponse::rewrite_token].
    pub fn set_rewrite_token<T: Into<String>>(mut self, v: T) -> Self {
        self.rewrite_token = v.into();
        self
    }

    /// Sets the value of [resource][RewriteResponse::resource].
    pub fn set_resource<T: Into<Object>>(mut self, v: T) -> Self {
        self.resource = Some(v.into());
        self
    }
}

/// The progress of a rewrite operation, as reported to progress callbacks.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct RewriteProgress {
    /// The total bytes written so far.
    pub total_bytes_rewritten: u64,

    /// The total size of the object being copied in bytes.
    pub object_size: u64,
}
