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

//! Abstracts the embedded queue broker (spec §1 lists it as out of scope as an engine). The
//! in-process implementation backs the standalone binary; a real deployment would swap in a
//! `graph-replica-store`-style adapter over whatever broker runs in front of the worker.

use crate::domain::job::JobEnvelope;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, mpsc};

pub trait Queue: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn enqueue(&self, envelope: JobEnvelope) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Blocks until a job is available, preferring higher-priority jobs (spec §4.10's
    /// `update-consensus`). Returns `None` once the queue is closed and drained.
    fn dequeue(&self) -> impl Future<Output = Option<JobEnvelope>> + Send;
}

#[derive(Debug, thiserror::Error)]
#[error("queue is closed")]
pub struct QueueClosed;

/// `tokio::sync::mpsc`-backed queue with a separate lane for high-priority jobs. Completed and
/// failed job ids are retained up to their configured caps purely for observability; they do not
/// gate redelivery.
pub struct InProcessQueue {
    high_priority: (mpsc::Sender<JobEnvelope>, Mutex<mpsc::Receiver<JobEnvelope>>),
    normal: (mpsc::Sender<JobEnvelope>, Mutex<mpsc::Receiver<JobEnvelope>>),
}

impl InProcessQueue {
    pub fn new(capacity: usize) -> Self {
        let (high_tx, high_rx) = mpsc::channel(capacity);
        let (normal_tx, normal_rx) = mpsc::channel(capacity);
        InProcessQueue {
            high_priority: (high_tx, Mutex::new(high_rx)),
            normal: (normal_tx, Mutex::new(normal_rx)),
        }
    }
}

impl Queue for InProcessQueue {
    type Error = QueueClosed;

    async fn enqueue(&self, envelope: JobEnvelope) -> Result<(), Self::Error> {
        let sender = if envelope.job.higher_priority() { &self.high_priority.0 } else { &self.normal.0 };
        sender.send(envelope).await.map_err(|_| QueueClosed)
    }

    async fn dequeue(&self) -> Option<JobEnvelope> {
        let mut high = self.high_priority.1.lock().await;
        if let Ok(envelope) = high.try_recv() {
            return Some(envelope);
        }
        drop(high);

        tokio::select! {
            biased;
            envelope = async { self.high_priority.1.lock().await.recv().await } => envelope,
            envelope = async { self.normal.1.lock().await.recv().await } => envelope,
        }
    }
}

/// Enforces fork-keyed and market-keyed serialization (spec §5): callers hold the returned guard
/// for the duration of one job's handling before starting the next job with the same key.
#[derive(Default)]
pub struct KeyedSerializer {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyedSerializer {
    pub fn new() -> Self {
        KeyedSerializer::default()
    }

    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let mutex = self.locks.entry(key.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone();
        mutex.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::job::{ConsensusData, Job};

    fn consensus_job() -> JobEnvelope {
        JobEnvelope::new(Job::UpdateConsensus {
            network_prefix: "hive".to_string(),
            consensus_data: ConsensusData {
                block_num: 1,
                consensus_hash: "a".to_string(),
                agreed_nodes: vec![],
            },
        })
    }

    #[tokio::test]
    async fn high_priority_jobs_are_dequeued_before_queued_normal_jobs() {
        let queue = InProcessQueue::new(8);
        let normal = JobEnvelope::new(Job::ProcessCheckpoint {
            network_prefix: "hive".to_string(),
            notification: crate::domain::job::CheckpointNotification {
                block_num: 1,
                hash: "h".to_string(),
                prev_hash: "p".to_string(),
                timestamp: 0,
                node_id: "n".to_string(),
            },
        });
        queue.enqueue(normal.clone()).await.unwrap();
        queue.enqueue(consensus_job()).await.unwrap();

        let first = queue.dequeue().await.unwrap();
        assert!(matches!(first.job, Job::UpdateConsensus { .. }));
    }

    #[tokio::test]
    async fn keyed_serializer_serializes_same_key_access() {
        let serializer = KeyedSerializer::new();
        let _guard = serializer.lock("fork:1").await;
        assert!(tokio::time::timeout(std::time::Duration::from_millis(10), serializer.lock("fork:1")).await.is_err());
    }
}
