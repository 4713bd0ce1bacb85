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

//! Process-local, bounded dedup cache for `process-operation` jobs (spec §4.10). Not a
//! correctness guarantee against replay across restarts — the store's own idempotence (blank
//! node naming plus upserts on unique fields) is. This is a performance optimization only.

use dashmap::DashMap;

/// ~2 hours of blocks at Hive's ~3 second block time (spec §4.10's "TTL ≈ 2 hours of blocks").
pub const DEFAULT_WINDOW_BLOCKS: u32 = 2_400;

pub struct ProcessedOpCache {
    seen: DashMap<String, u32>,
    window_blocks: u32,
}

impl ProcessedOpCache {
    pub fn new(window_blocks: u32) -> Self {
        ProcessedOpCache { seen: DashMap::new(), window_blocks }
    }

    pub fn key(block_num: u32, index: u32, op_type: &str, path: &[String]) -> String {
        format!("{block_num}:{index}:{op_type}:{}", path.join("/"))
    }

    /// Records `key` as seen at `block_num`. Returns `true` if it was already present
    /// (spec §7's `DuplicateOperation`, silently skipped by the caller).
    pub fn check_and_record(&self, key: String, block_num: u32) -> bool {
        match self.seen.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => true,
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(block_num);
                false
            }
        }
    }

    /// Drops entries older than the retention window relative to `current_block_num`. Intended
    /// to run on a periodic sweep task, not per-operation.
    pub fn sweep(&self, current_block_num: u32) -> usize {
        let cutoff = current_block_num.saturating_sub(self.window_blocks);
        let stale: Vec<String> = self
            .seen
            .iter()
            .filter(|entry| *entry.value() < cutoff)
            .map(|entry| entry.key().clone())
            .collect();

        for key in &stale {
            self.seen.remove(key);
        }
        stale.len()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl Default for ProcessedOpCache {
    fn default() -> Self {
        ProcessedOpCache::new(DEFAULT_WINDOW_BLOCKS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_sighting_of_the_same_key_is_flagged_a_duplicate() {
        let cache = ProcessedOpCache::new(100);
        let key = ProcessedOpCache::key(10, 0, "put", &["balances".to_string(), "alice".to_string()]);

        assert!(!cache.check_and_record(key.clone(), 10));
        assert!(cache.check_and_record(key, 10));
    }

    #[test]
    fn sweep_only_drops_entries_outside_the_window() {
        let cache = ProcessedOpCache::new(100);
        cache.check_and_record("old".to_string(), 1);
        cache.check_and_record("recent".to_string(), 950);

        let dropped = cache.sweep(1_000);

        assert_eq!(dropped, 1);
        assert_eq!(cache.len(), 1);
    }
}
