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

use futures::Stream;
use serde::{Serialize, de::DeserializeOwned};

/// A fork identifier: the hash of the block the fork diverged at. Kept as an opaque string
/// rather than a fixed-size byte array since different networks hash blocks to different
/// lengths.
pub type ForkId = String;

/// Marker for events that can be published/subscribed across process boundaries.
pub trait Event: Serialize + DeserializeOwned + Send + Sync + Clone + 'static {
    /// Stable subject/topic name used by queue-backed implementations.
    const SUBJECT: &'static str;
}

/// Publishes [Event]s, e.g. so the Wallet-Indexer-equivalent or read-API caches can react to
/// newly ingested blocks without polling the graph store.
#[trait_variant::make(Send)]
pub trait Publisher
where
    Self: Clone + Send + Sync + 'static,
{
    type Error: std::error::Error + Send + Sync + 'static;

    async fn publish<E: Event>(&mut self, event: &E) -> Result<(), Self::Error>;
}

/// Subscribes to a stream of previously [Publisher]-published [Event]s.
pub trait Subscriber
where
    Self: Clone + Send + Sync + 'static,
{
    type Error: std::error::Error + Send + Sync + 'static;

    fn subscribe<E: Event>(&self) -> impl Stream<Item = Result<E, Self::Error>> + Send;
}

/// Emitted once a `replicate-block` job has been fully applied to the graph store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct OperationBatchIndexed {
    pub fork_id: ForkId,
    pub block_num: u32,
    pub max_processed_index: Option<u64>,
    pub caught_up: bool,
}

impl Event for OperationBatchIndexed {
    const SUBJECT: &'static str = "graph-replica.operation-batch-indexed";
}

/// Emitted when [crate::domain] fork reconciliation chooses a canonical fork and orphans others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct ForkReconciled {
    pub canonical: ForkId,
    pub orphaned: Vec<ForkId>,
    pub block_num: u32,
}

impl Event for ForkReconciled {
    const SUBJECT: &'static str = "graph-replica.fork-reconciled";
}

/// Emitted when a checkpoint (and optionally a snapshot) has been created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct CheckpointCreated {
    pub fork_id: ForkId,
    pub block_num: u32,
    pub snapshot_tag: Option<String>,
}

impl Event for CheckpointCreated {
    const SUBJECT: &'static str = "graph-replica.checkpoint-created";
}

/// No-op [Publisher]/[Subscriber] used where eventing is not wired up yet, following the same
/// degrade-gracefully precedent as the Snapshot Controller.
#[derive(Debug, Clone, Default)]
pub struct NoopPubSub;

impl Publisher for NoopPubSub {
    type Error = std::convert::Infallible;

    async fn publish<E: Event>(&mut self, _event: &E) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Subscriber for NoopPubSub {
    type Error = std::convert::Infallible;

    fn subscribe<E: Event>(&self) -> impl Stream<Item = Result<E, Self::Error>> + Send {
        futures::stream::pending()
    }
}
