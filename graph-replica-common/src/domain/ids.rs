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

//! Identifiers used to stitch entities together within and across mutation batches.
//!
//! The source protocol mints ad-hoc "blank node" identifiers ad-lib and mixes them with already
//! resolved store identifiers. This module formalizes that as a small tagged union (spec.md §9)
//! so the rest of the code never has to guess which kind of reference it is holding.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An identifier not yet known to the graph store, to be resolved on commit (a "blank node").
/// Stable within a single mutation batch: the same logical entity must reuse the same [LocalId].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize)]
pub struct LocalId(pub String);

impl LocalId {
    /// Builds a local id for an account, replacing characters the store would reject in a blank
    /// node label. The `username` field carried by the entity itself is left untouched (spec.md
    /// §4.2).
    pub fn for_account(username: &str) -> Self {
        let label: String = username
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();

        Self(format!("account_{label}"))
    }

    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }
}

/// An identifier already assigned by the graph store, e.g. returned in a prior mutation's uid
/// map or resolved via a lookup query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize)]
pub struct StoredId(pub u64);

/// A reference by a natural-key field (e.g. a username) that the store itself will resolve via
/// an upsert, rather than by any kind of synthetic id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize)]
pub struct NameRef(pub String);

/// A reference to another entity within a mutation batch: either already resolved, pending
/// resolution as a blank node, or deferred to the store's own upsert-by-unique-field behavior.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityRef {
    Local(LocalId),
    Stored(StoredId),
    Name(NameRef),
}

impl EntityRef {
    pub fn is_resolved(&self) -> bool {
        matches!(self, EntityRef::Stored(_) | EntityRef::Name(_))
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Local(id) => write!(f, "{id}"),
            EntityRef::Stored(id) => write!(f, "{id}"),
            EntityRef::Name(name) => write!(f, "{name}"),
        }
    }
}

impl From<LocalId> for EntityRef {
    fn from(id: LocalId) -> Self {
        EntityRef::Local(id)
    }
}

impl From<StoredId> for EntityRef {
    fn from(id: StoredId) -> Self {
        EntityRef::Stored(id)
    }
}

impl From<NameRef> for EntityRef {
    fn from(name: NameRef) -> Self {
        EntityRef::Name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_id_replaces_non_alphanumerics_only_in_label() {
        let id = LocalId::for_account("alice.test-1");
        assert_eq!(id.0, "account_alice_test_1");
    }

    #[test]
    fn resolution_classification() {
        assert!(!EntityRef::from(LocalId::new("x")).is_resolved());
        assert!(EntityRef::from(StoredId(1)).is_resolved());
        assert!(EntityRef::from(NameRef("alice".into())).is_resolved());
    }
}
