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

use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifies one of the many chains served by a single process, e.g. `spkccT_`. Used to select
/// the graph store instance and schema for a batch of operations (component C10).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NetworkPrefix(String);

impl NetworkPrefix {
    pub fn new(prefix: impl Into<String>) -> Result<Self, NetworkPrefixError> {
        let prefix = prefix.into();

        if prefix.is_empty() {
            return Err(NetworkPrefixError::Empty);
        }

        if !prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(NetworkPrefixError::InvalidCharacters(prefix));
        }

        Ok(Self(prefix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for NetworkPrefix {
    type Error = NetworkPrefixError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NetworkPrefix> for String {
    fn from(prefix: NetworkPrefix) -> Self {
        prefix.0
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NetworkPrefixError {
    #[error("network prefix must not be empty")]
    Empty,

    #[error("network prefix {0:?} contains characters other than ASCII alphanumerics and '_'")]
    InvalidCharacters(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_prefix() {
        assert_eq!(
            NetworkPrefix::new("spkccT_").unwrap().as_str(),
            "spkccT_"
        );
    }

    #[test]
    fn rejects_empty_and_invalid() {
        assert_eq!(NetworkPrefix::new(""), Err(NetworkPrefixError::Empty));
        assert!(matches!(
            NetworkPrefix::new("spk ccT_"),
            Err(NetworkPrefixError::InvalidCharacters(_))
        ));
    }
}
