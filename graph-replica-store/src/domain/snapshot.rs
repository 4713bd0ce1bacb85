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

//! Snapshot Controller (C2, spec §4.9): optional block-tagged checkpoints of the graph dataset.
//! Degrades to successful no-ops (with a logged warning) if the backend is unavailable, so
//! ingestion never stalls on a snapshot facility outage.

use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;

pub const DEFAULT_CHECKPOINT_CAP: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointInfo {
    pub block_num: u32,
    pub tag: String,
}

/// Raw commands against whatever facility actually takes the snapshot (spec §4.9 calls this "the
/// snapshot/clone facility of the underlying storage", explicitly out of core scope as an engine).
pub trait SnapshotBackend: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn create(
        &self,
        block_num: u32,
        tag: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn rollback(&self, block_num: u32) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn clone_checkpoint(
        &self,
        block_num: u32,
        name: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn diff(
        &self,
        a: u32,
        b: u32,
    ) -> impl Future<Output = Result<serde_json::Value, Self::Error>> + Send;
}

/// Owns the in-memory checkpoint map and cap/eviction policy on top of a [SnapshotBackend]. Every
/// method degrades to a logged-warning no-op on backend failure (spec §4.9).
pub struct SnapshotController<B> {
    backend: B,
    checkpoints: parking_lot::Mutex<BTreeMap<u32, CheckpointInfo>>,
    cap: usize,
    auto_snapshot_interval: parking_lot::Mutex<Option<u32>>,
}

impl<B: SnapshotBackend> SnapshotController<B> {
    pub fn new(backend: B) -> Self {
        SnapshotController {
            backend,
            checkpoints: parking_lot::Mutex::new(BTreeMap::new()),
            cap: DEFAULT_CHECKPOINT_CAP,
            auto_snapshot_interval: parking_lot::Mutex::new(None),
        }
    }

    pub fn with_cap(mut self, cap: usize) -> Self {
        self.cap = cap;
        self
    }

    pub async fn create_checkpoint(&self, block_num: u32, tag: &str) {
        match self.backend.create(block_num, tag).await {
            Ok(()) => {
                let mut checkpoints = self.checkpoints.lock();
                checkpoints
                    .insert(block_num, CheckpointInfo { block_num, tag: tag.to_string() });
                while checkpoints.len() > self.cap {
                    if let Some(&oldest) = checkpoints.keys().next() {
                        checkpoints.remove(&oldest);
                    }
                }
            }
            Err(error) => warn!(error:err = error; "snapshot backend unavailable, degrading create_checkpoint to a no-op"),
        }
    }

    /// Discards tracked checkpoints newer than `block_num`; the caller is responsible for asking
    /// the Fork Manager to orphan anything after it too (spec §4.9).
    pub async fn rollback_to_checkpoint(&self, block_num: u32) {
        match self.backend.rollback(block_num).await {
            Ok(()) => {
                self.checkpoints.lock().retain(|&b, _| b <= block_num);
            }
            Err(error) => warn!(error:err = error; "snapshot backend unavailable, degrading rollback_to_checkpoint to a no-op"),
        }
    }

    pub async fn clone_checkpoint(&self, block_num: u32, name: &str) {
        if let Err(error) = self.backend.clone_checkpoint(block_num, name).await {
            warn!(error:err = error; "snapshot backend unavailable, degrading clone_checkpoint to a no-op");
        }
    }

    pub fn list_checkpoints(&self) -> Vec<CheckpointInfo> {
        self.checkpoints.lock().values().cloned().collect()
    }

    pub fn get_checkpoint_by_tag(&self, tag: &str) -> Option<CheckpointInfo> {
        self.checkpoints.lock().values().find(|c| c.tag == tag).cloned()
    }

    pub async fn diff_checkpoints(&self, a: u32, b: u32) -> Option<serde_json::Value> {
        match self.backend.diff(a, b).await {
            Ok(diff) => Some(diff),
            Err(error) => {
                warn!(error:err = error; "snapshot backend unavailable, degrading diff_checkpoints to a no-op");
                None
            }
        }
    }

    pub fn enable_auto_snapshots(&self, interval_blocks: u32) {
        *self.auto_snapshot_interval.lock() = Some(interval_blocks);
    }

    pub fn auto_snapshot_interval(&self) -> Option<u32> {
        *self.auto_snapshot_interval.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingBackend {
        creates: AtomicU32,
    }

    impl SnapshotBackend for CountingBackend {
        type Error = Infallible;

        async fn create(&self, _block_num: u32, _tag: &str) -> Result<(), Self::Error> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn rollback(&self, _block_num: u32) -> Result<(), Self::Error> {
            Ok(())
        }

        async fn clone_checkpoint(&self, _block_num: u32, _name: &str) -> Result<(), Self::Error> {
            Ok(())
        }

        async fn diff(&self, _a: u32, _b: u32) -> Result<serde_json::Value, Self::Error> {
            Ok(serde_json::Value::Null)
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("backend unavailable")]
    struct UnavailableError;

    struct UnavailableBackend;

    impl SnapshotBackend for UnavailableBackend {
        type Error = UnavailableError;

        async fn create(&self, _block_num: u32, _tag: &str) -> Result<(), Self::Error> {
            Err(UnavailableError)
        }

        async fn rollback(&self, _block_num: u32) -> Result<(), Self::Error> {
            Err(UnavailableError)
        }

        async fn clone_checkpoint(&self, _block_num: u32, _name: &str) -> Result<(), Self::Error> {
            Err(UnavailableError)
        }

        async fn diff(&self, _a: u32, _b: u32) -> Result<serde_json::Value, Self::Error> {
            Err(UnavailableError)
        }
    }

    #[tokio::test]
    async fn cap_evicts_oldest_checkpoint() {
        let controller = SnapshotController::new(CountingBackend { creates: AtomicU32::new(0) })
            .with_cap(2);

        controller.create_checkpoint(1, "a").await;
        controller.create_checkpoint(2, "b").await;
        controller.create_checkpoint(3, "c").await;

        let tags: Vec<_> = controller.list_checkpoints().into_iter().map(|c| c.tag).collect();
        assert_eq!(tags, vec!["b".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn unavailable_backend_degrades_to_no_op_without_panicking() {
        let controller = SnapshotController::new(UnavailableBackend);
        controller.create_checkpoint(1, "a").await;
        assert!(controller.list_checkpoints().is_empty());
        controller.rollback_to_checkpoint(1).await;
        assert!(controller.diff_checkpoints(1, 2).await.is_none());
    }
}
