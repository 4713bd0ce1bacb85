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

//! Path Accumulator (C4, spec §4.3): a cross-batch memo of `(owner, fullPath) -> file set` so
//! successive contracts appending to the same directory accumulate rather than overwrite.
//!
//! The source holds this as ambient module state; here it is an explicit struct with its own
//! lock (spec §9), with a `start -> use -> end` lifecycle matching the worker's batch boundary.

use graph_replica_common::domain::ids::EntityRef;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};

/// `(owner, fullPath)`.
pub type PathKey = (String, String);

#[derive(Debug, Default)]
struct State {
    /// Files known at each path, across every batch seen so far.
    files: BTreeMap<PathKey, BTreeSet<EntityRefKey>>,
    /// Stable id assigned to a path once registered.
    ids: BTreeMap<PathKey, EntityRef>,
    frozen: bool,
}

/// [EntityRef] isn't `Ord`, so the accumulator keys its file set by a string projection instead
/// of requiring a total order over the reference variants.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct EntityRefKey(String);

impl From<&EntityRef> for EntityRefKey {
    fn from(entity_ref: &EntityRef) -> Self {
        EntityRefKey(entity_ref.to_string())
    }
}

/// Cross-batch, process-lifetime memo. Cheap to clone (shares the lock via an inner `Arc` would
/// be the usual move, but every call site in this workspace holds the accumulator behind its own
/// `Arc`, so this type stays a plain lockable struct for clarity at the call site).
#[derive(Debug, Default)]
pub struct PathAccumulator {
    state: Mutex<State>,
}

impl PathAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unfreezes the accumulator for a new batch. A no-op beyond the freeze flag: accumulated
    /// file sets persist across batches by design.
    pub fn start_batch(&self) {
        self.state.lock().frozen = false;
    }

    /// Freezes the accumulator so no further mutation is possible until the next `start_batch`,
    /// matching the single-threaded-per-batch mutation emission rule (spec §5).
    pub fn end_batch(&self) {
        self.state.lock().frozen = true;
    }

    pub fn register_path(&self, owner: &str, full_path: &str, id: EntityRef) {
        let key = (owner.to_string(), full_path.to_string());
        self.state.lock().ids.insert(key, id);
    }

    pub fn path_id(&self, owner: &str, full_path: &str) -> Option<EntityRef> {
        let key = (owner.to_string(), full_path.to_string());
        self.state.lock().ids.get(&key).cloned()
    }

    /// Adds a file reference to a path's accumulated set. Called even for paths not yet
    /// registered: registration and file accumulation are independent, matching the order files
    /// and paths are discovered while walking a contract's data-file map.
    pub fn add_file_to_path(&self, owner: &str, full_path: &str, file_ref: EntityRef) {
        let mut state = self.state.lock();
        debug_assert!(!state.frozen, "mutating a frozen path accumulator");
        let key = (owner.to_string(), full_path.to_string());
        state
            .files
            .entry(key)
            .or_default()
            .insert(EntityRefKey::from(&file_ref));
    }

    /// The full, accumulated set of files known at `(owner, fullPath)` across every batch so far.
    pub fn get_path_files(&self, owner: &str, full_path: &str) -> Vec<String> {
        let key = (owner.to_string(), full_path.to_string());
        self.state
            .lock()
            .files
            .get(&key)
            .map(|set| set.iter().map(|k| k.0.clone()).collect())
            .unwrap_or_default()
    }

    /// Count of direct children of `full_path` that are accumulated files at or directly under
    /// it, used as a building block for the directory `itemCount` rule (spec §4.3). Computed by
    /// the caller via path structure; this just exposes the raw per-path file count.
    pub fn file_count(&self, owner: &str, full_path: &str) -> usize {
        self.get_path_files(owner, full_path).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph_replica_common::domain::ids::LocalId;

    #[test]
    fn accumulates_across_batches_instead_of_overwriting() {
        let accumulator = PathAccumulator::new();

        accumulator.start_batch();
        accumulator.add_file_to_path("alice", "/TestFolder", LocalId::new("file1").into());
        accumulator.add_file_to_path("alice", "/TestFolder", LocalId::new("file2").into());
        accumulator.end_batch();

        accumulator.start_batch();
        accumulator.add_file_to_path("alice", "/TestFolder", LocalId::new("file3").into());
        accumulator.end_batch();

        assert_eq!(accumulator.file_count("alice", "/TestFolder"), 3);
    }

    #[test]
    fn registered_id_is_recalled() {
        let accumulator = PathAccumulator::new();
        let id: EntityRef = LocalId::new("path_alice_root").into();
        accumulator.register_path("alice", "/", id.clone());
        assert_eq!(accumulator.path_id("alice", "/"), Some(id));
    }
}
