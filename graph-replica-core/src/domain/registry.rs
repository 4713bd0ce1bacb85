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

//! Network Registry (C10, spec §6): maps a network prefix (e.g. `spkccT_`) to the
//! [NetworkRegistryEntry] describing which chain it is, persisted as a single JSON document and
//! rewritten on every registration change.

use crate::domain::NetworkRegistryEntry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read registry document at {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write registry document at {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("registry document at {path} is not valid JSON")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize registry document")]
    Serialize(#[source] serde_json::Error),

    #[error("prefix {0:?} is not registered")]
    NotFound(String),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(flatten)]
    entries: BTreeMap<String, NetworkRegistryEntry>,
}

/// Owns the on-disk JSON document and keeps an in-memory mirror current with it. Every mutating
/// call is read-modify-write: the whole document is reloaded, patched, and rewritten, matching
/// spec.md §6's "rewritten on registration change" (no partial-document updates).
#[derive(Debug)]
pub struct NetworkRegistry {
    path: PathBuf,
}

impl NetworkRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        NetworkRegistry { path: path.into() }
    }

    fn load(&self) -> Result<Document, RegistryError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|source| RegistryError::Parse {
                path: self.path.clone(),
                source,
            }),
            Err(source) if source.kind() == io::ErrorKind::NotFound => Ok(Document::default()),
            Err(source) => Err(RegistryError::Read { path: self.path.clone(), source }),
        }
    }

    fn save(&self, document: &Document) -> Result<(), RegistryError> {
        let contents =
            serde_json::to_string_pretty(document).map_err(RegistryError::Serialize)?;
        std::fs::write(&self.path, contents).map_err(|source| RegistryError::Write {
            path: self.path.clone(),
            source,
        })
    }

    pub fn get(&self, prefix: &str) -> Result<Option<NetworkRegistryEntry>, RegistryError> {
        Ok(self.load()?.entries.get(prefix).cloned())
    }

    pub fn list(&self) -> Result<BTreeMap<String, NetworkRegistryEntry>, RegistryError> {
        Ok(self.load()?.entries)
    }

    /// Registers or overwrites `prefix`'s entry, rewriting the whole document.
    pub fn register(
        &self,
        prefix: impl Into<String>,
        entry: NetworkRegistryEntry,
    ) -> Result<(), RegistryError> {
        let mut document = self.load()?;
        document.entries.insert(prefix.into(), entry);
        self.save(&document)
    }

    pub fn deregister(&self, prefix: &str) -> Result<(), RegistryError> {
        let mut document = self.load()?;
        if document.entries.remove(prefix).is_none() {
            return Err(RegistryError::NotFound(prefix.to_string()));
        }
        self.save(&document)
    }
}

pub fn default_path() -> PathBuf {
    Path::new("network-registry.json").to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph_replica_common::domain::protocol::Token;

    fn sample_entry() -> NetworkRegistryEntry {
        NetworkRegistryEntry {
            name: "SPK Network".to_string(),
            description: "Hive-anchored storage network".to_string(),
            tokens: vec![Token::Larynx, Token::Spk, Token::Broca],
            endpoints: vec!["https://spktest.dlux.io".to_string()],
            schema_path: "schemas/spk.graphql".to_string(),
        }
    }

    #[test]
    fn register_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let registry = NetworkRegistry::new(dir.path().join("registry.json"));

        registry.register("spkccT_", sample_entry()).unwrap();
        let fetched = registry.get("spkccT_").unwrap();
        assert_eq!(fetched, Some(sample_entry()));
    }

    #[test]
    fn missing_document_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registry = NetworkRegistry::new(dir.path().join("does-not-exist.json"));
        assert!(registry.list().unwrap().is_empty());
    }

    #[test]
    fn deregister_unknown_prefix_errors() {
        let dir = tempfile::tempdir().unwrap();
        let registry = NetworkRegistry::new(dir.path().join("registry.json"));
        assert!(matches!(
            registry.deregister("nope"),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn register_is_read_modify_write_not_additive_in_memory_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        let registry_a = NetworkRegistry::new(path.clone());
        let registry_b = NetworkRegistry::new(path.clone());

        registry_a.register("spkccT_", sample_entry()).unwrap();
        registry_b
            .register(
                "spkcc_",
                NetworkRegistryEntry { name: "Mainnet".to_string(), ..sample_entry() },
            )
            .unwrap();

        let entries = registry_a.list().unwrap();
        assert_eq!(entries.len(), 2, "second writer must see the first's entry on reload");
    }
}
