// This file is part of graph-replica.
// Copyright (C) 2026 Graph Replica Contributors
// SPDX-License-Identifier: Apache-2.0
// Licensed under the Apache License, Version 2.0 (the "License");
// You may not use this file except in compliance with the License.
// You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use derive_more::{AsRef, From};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display};

/// Fixed-size byte array, e.g. a fork ID or a block hash, displayed as hex.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, AsRef, Serialize, Deserialize)]
#[as_ref([u8])]
pub struct ByteArray<const N: usize>(#[serde(with = "serde_bytes_array")] pub [u8; N]);

impl<const N: usize> Default for ByteArray<N> {
    fn default() -> Self {
        Self([0u8; N])
    }
}

impl<const N: usize> ByteArray<N> {
    pub fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }
}

impl<const N: usize> Debug for ByteArray<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex_encoded = const_hex::encode(self.0);
        if hex_encoded.len() <= 8 {
            write!(f, "ByteArray({hex_encoded})")
        } else {
            write!(f, "ByteArray({}…)", &hex_encoded[0..8])
        }
    }
}

impl<const N: usize> Display for ByteArray<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", const_hex::encode(self.0))
    }
}

mod serde_bytes_array {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer, const N: usize>(
        data: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        const_hex::encode(data).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        let hex_encoded = String::deserialize(deserializer)?;
        let bytes = const_hex::decode(&hex_encoded).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("invalid byte array length"))
    }
}

/// Variable-length byte buffer, e.g. an opaque graph-store-assigned identifier.
#[derive(Clone, Default, PartialEq, Eq, From, AsRef, Serialize, Deserialize)]
#[as_ref([u8])]
pub struct ByteVec(pub Vec<u8>);

impl Debug for ByteVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteVec({} bytes)", self.0.len())
    }
}

impl From<&[u8]> for ByteVec {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_truncates_long_hashes() {
        let array = ByteArray([1u8; 32]);
        let debug = format!("{array:?}");
        assert!(debug.starts_with("ByteArray("));
        assert!(debug.ends_with("…)"));
    }

    #[test]
    fn display_is_full_hex() {
        let array = ByteArray([0xabu8; 4]);
        assert_eq!(array.to_string(), "abababab");
    }
}
