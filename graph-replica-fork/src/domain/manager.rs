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

//! Fork Manager (C3, spec §4.8): tracks every chain fork observed at the tip, picks a canonical
//! one on reconciliation, and prunes orphans once they age out of the retention window.

use crate::domain::fork::{Fork, ForkId, ForkStatus};
use dashmap::DashMap;
use graph_replica_store::domain::store::GraphStore;
use log::{info, warn};
use std::collections::BTreeMap;

/// Default number of blocks of orphaned-fork history kept before [ForkManager::prune_forks] is
/// free to drop it (spec §4.8).
pub const DEFAULT_RETENTION_BLOCKS: u32 = 1000;

pub struct ReconcileInput {
    pub block_num: u32,
    pub consensus_hash: String,
}

#[derive(Debug, Clone, Default)]
pub struct ReconciliationResult {
    pub canonical: Option<ForkId>,
    pub orphaned: Vec<ForkId>,
}

/// Process-memory fork table. Must be rebuilt from the store on boot via
/// [ForkManager::reload_from_store] before new operations are accepted (spec §9).
#[derive(Default)]
pub struct ForkManager {
    forks: DashMap<ForkId, Fork>,
    canonical: parking_lot::Mutex<Option<ForkId>>,
}

impl ForkManager {
    pub fn new() -> Self {
        ForkManager::default()
    }

    /// Returns the fork whose tip matches `parent_hash`, extending it to the new tip, or starts a
    /// new fork rooted at whichever fork (if any) currently ends at `parent_hash`.
    pub fn detect_fork(&self, block_num: u32, block_hash: &str, parent_hash: &str) -> ForkId {
        let continuing = self
            .forks
            .iter()
            .find(|entry| entry.status == ForkStatus::Active && entry.tip_hash == parent_hash)
            .map(|entry| entry.key().clone());

        if let Some(fork_id) = continuing {
            if let Some(mut fork) = self.forks.get_mut(&fork_id) {
                fork.tip_block = block_num;
                fork.tip_hash = block_hash.to_string();
            }
            return fork_id;
        }

        let parent_fork = self
            .forks
            .iter()
            .find(|entry| entry.tip_hash == parent_hash)
            .map(|entry| entry.key().clone());

        let fork_id = ForkId::new(block_hash.to_string());
        let fork = Fork {
            fork_id: fork_id.clone(),
            tip_block: block_num,
            tip_hash: block_hash.to_string(),
            status: ForkStatus::Active,
            parent_fork,
        };
        info!(fork_id:% = fork_id, block_num; "new fork detected");
        self.forks.insert(fork_id.clone(), fork);

        if self.canonical.lock().is_none() {
            *self.canonical.lock() = Some(fork_id.clone());
        }

        fork_id
    }

    pub fn update_fork_status(&self, fork_id: &ForkId, status: ForkStatus, tip_block: u32) {
        if let Some(mut fork) = self.forks.get_mut(fork_id) {
            fork.status = status;
            fork.tip_block = tip_block;
        } else {
            warn!(fork_id:% = fork_id; "update_fork_status on an unknown fork, ignoring");
        }
    }

    /// Orphans every other fork at `block_num`'s height and marks the one matching
    /// `consensus_hash` canonical (spec §4.8, boundary scenario 6).
    pub fn reconcile_forks(&self, input: ReconcileInput) -> ReconciliationResult {
        let mut result = ReconciliationResult::default();

        for mut entry in self.forks.iter_mut() {
            if entry.tip_block != input.block_num {
                continue;
            }
            if entry.tip_hash == input.consensus_hash {
                entry.status = ForkStatus::Active;
                result.canonical = Some(entry.fork_id.clone());
            } else if entry.status != ForkStatus::Orphaned {
                entry.status = ForkStatus::Orphaned;
                result.orphaned.push(entry.fork_id.clone());
            }
        }

        if let Some(canonical) = &result.canonical {
            *self.canonical.lock() = Some(canonical.clone());
        }

        result
    }

    /// Drops orphaned forks whose tip predates `before_block`. Returns the number removed.
    pub fn prune_forks(&self, before_block: u32) -> usize {
        let stale: Vec<ForkId> = self
            .forks
            .iter()
            .filter(|entry| entry.status == ForkStatus::Orphaned && entry.tip_block < before_block)
            .map(|entry| entry.key().clone())
            .collect();

        for fork_id in &stale {
            self.forks.remove(fork_id);
        }

        stale.len()
    }

    /// Orphans every fork whose tip is past `block_num`, used when rolling back to a checkpoint.
    pub fn orphan_forks_after(&self, block_num: u32) {
        for mut entry in self.forks.iter_mut() {
            if entry.tip_block > block_num {
                entry.status = ForkStatus::Orphaned;
            }
        }
    }

    pub fn get_active_forks(&self) -> Vec<Fork> {
        self.forks
            .iter()
            .filter(|entry| entry.status == ForkStatus::Active)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn set_canonical_fork(&self, fork_id: ForkId) {
        *self.canonical.lock() = Some(fork_id);
    }

    pub fn canonical_fork(&self) -> Option<ForkId> {
        self.canonical.lock().clone()
    }

    pub fn get(&self, fork_id: &ForkId) -> Option<Fork> {
        self.forks.get(fork_id).map(|entry| entry.value().clone())
    }

    /// Rebuilds the fork table from whatever the store already has, so a restart does not forget
    /// about in-flight forks (spec §9).
    pub async fn reload_from_store<S: GraphStore>(&self, store: &S) -> Result<(), S::Error> {
        const QUERY: &str = "{ forks(func: type(Fork)) { forkId tipBlock tipHash status parentFork { forkId } canonical } }";

        let response = store.query_global(QUERY, &BTreeMap::new()).await?;
        self.forks.clear();
        *self.canonical.lock() = None;

        let Some(entries) = response.get("forks").and_then(|v| v.as_array()) else {
            return Ok(());
        };

        for entry in entries {
            let Some(fork_id) = entry.get("forkId").and_then(|v| v.as_str()) else {
                continue;
            };
            let fork_id = ForkId::new(fork_id);
            let tip_block = entry.get("tipBlock").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
            let tip_hash =
                entry.get("tipHash").and_then(|v| v.as_str()).unwrap_or_default().to_string();
            let status = match entry.get("status").and_then(|v| v.as_str()) {
                Some("ORPHANED") => ForkStatus::Orphaned,
                Some("FINALIZED") => ForkStatus::Finalized,
                _ => ForkStatus::Active,
            };
            let parent_fork = entry
                .get("parentFork")
                .and_then(|v| v.get("forkId"))
                .and_then(|v| v.as_str())
                .map(ForkId::new);
            let is_canonical = entry.get("canonical").and_then(|v| v.as_bool()).unwrap_or(false);

            self.forks.insert(
                fork_id.clone(),
                Fork { fork_id: fork_id.clone(), tip_block, tip_hash, status, parent_fork },
            );
            if is_canonical {
                *self.canonical.lock() = Some(fork_id);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_fork_extends_matching_tip_and_branches_otherwise() {
        let manager = ForkManager::new();

        let genesis = manager.detect_fork(1, "hash1", "genesis");
        let continued = manager.detect_fork(2, "hash2", "hash1");
        assert_eq!(genesis, continued);
        assert_eq!(manager.get(&continued).unwrap().tip_block, 2);

        let branch = manager.detect_fork(2, "hash2prime", "hash1");
        assert_ne!(branch, continued);
        assert_eq!(manager.get(&branch).unwrap().parent_fork, Some(genesis));
    }

    #[test]
    fn reconcile_forks_picks_consensus_hash_and_orphans_the_rest() {
        let manager = ForkManager::new();
        manager.detect_fork(50, "a", "parent");
        manager.detect_fork(50, "b", "parent");

        let result = manager
            .reconcile_forks(ReconcileInput { block_num: 50, consensus_hash: "b".to_string() });

        assert_eq!(result.canonical, Some(ForkId::new("b")));
        assert_eq!(result.orphaned, vec![ForkId::new("a")]);
        assert_eq!(manager.get(&ForkId::new("a")).unwrap().status, ForkStatus::Orphaned);
        assert_eq!(manager.get(&ForkId::new("b")).unwrap().status, ForkStatus::Active);
        assert_eq!(manager.canonical_fork(), Some(ForkId::new("b")));
    }

    #[test]
    fn prune_forks_only_drops_old_orphans() {
        let manager = ForkManager::new();
        manager.detect_fork(10, "old", "genesis");
        manager.detect_fork(900, "recent", "genesis");
        manager.update_fork_status(&ForkId::new("old"), ForkStatus::Orphaned, 10);
        manager.update_fork_status(&ForkId::new("recent"), ForkStatus::Orphaned, 900);

        let pruned = manager.prune_forks(500);

        assert_eq!(pruned, 1);
        assert!(manager.get(&ForkId::new("old")).is_none());
        assert!(manager.get(&ForkId::new("recent")).is_some());
    }

    #[test]
    fn orphan_forks_after_rollback_point() {
        let manager = ForkManager::new();
        manager.detect_fork(10, "a", "genesis");
        let keep = manager.detect_fork(5, "b", "other-genesis");

        manager.orphan_forks_after(7);

        assert_eq!(manager.get(&ForkId::new("a")).unwrap().status, ForkStatus::Orphaned);
        assert_eq!(manager.get(&keep).unwrap().status, ForkStatus::Active);
    }
}
