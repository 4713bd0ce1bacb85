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

//! Ingest Endpoints (C11, spec §4.10/§6/§1): specified only at the interface with the core. No
//! HTTP server, WebSocket server, or signature verification lives here — those are collaborators
//! this crate does not own.

use crate::domain::job::{BlockData, CheckpointNotification, ConsensusData, JobId};
use graph_replica_core::domain::transformer::Operation;
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;

/// `{account, signature, timestamp}` wrapper required on every inbound REST call (spec §6). The
/// timestamp window (default 5 minutes) and whitelist check are enforced by whatever implements
/// [IngestSource]; this crate only carries the shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedRequest<T> {
    pub account: String,
    pub signature: String,
    pub timestamp: i64,
    #[serde(flatten)]
    pub payload: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicateBlockRequest {
    pub block_num: u32,
    pub block_hash: String,
    pub previous_hash: String,
    pub expected_hash: Option<String>,
    pub lib: u32,
    pub is_lib: Option<bool>,
    pub operations: Vec<Operation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicateConsensusRequest {
    pub block_num: u32,
    pub consensus_hash: String,
    pub agreed_nodes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicateCheckpointRequest {
    pub block_num: u32,
    pub block_hash: String,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("authentication failed: {0}")]
    AuthFailure(String),

    #[error("request outside the allowed timestamp window")]
    TimestampOutOfWindow,

    #[error("queue rejected the job: {0}")]
    QueueUnavailable(String),
}

/// Accepts block/consensus/checkpoint replication requests and feed/checkpoint pushes, turning
/// each into a queued job (spec §6's REST + WebSocket wire shapes). Implemented by whatever HTTP
/// and WebSocket layer a deployment chooses to run in front of the worker.
pub trait IngestSource: Send + Sync {
    fn replicate_block(
        &self,
        network_prefix: &str,
        request: SignedRequest<ReplicateBlockRequest>,
    ) -> impl Future<Output = Result<JobId, IngestError>> + Send;

    fn replicate_consensus(
        &self,
        network_prefix: &str,
        request: SignedRequest<ReplicateConsensusRequest>,
    ) -> impl Future<Output = Result<JobId, IngestError>> + Send;

    fn replicate_checkpoint(
        &self,
        network_prefix: &str,
        request: SignedRequest<ReplicateCheckpointRequest>,
    ) -> impl Future<Output = Result<JobId, IngestError>> + Send;

    /// A single operation or checkpoint notification pushed over the authoring node's WebSocket
    /// stream (spec §6's "Wire — inbound operation stream").
    fn push_operation(
        &self,
        network_prefix: &str,
        block_num: u32,
        operation: Operation,
    ) -> impl Future<Output = Result<JobId, IngestError>> + Send;

    fn push_checkpoint(
        &self,
        network_prefix: &str,
        notification: CheckpointNotification,
    ) -> impl Future<Output = Result<JobId, IngestError>> + Send;
}

impl From<ReplicateBlockRequest> for BlockData {
    fn from(request: ReplicateBlockRequest) -> Self {
        BlockData {
            block_num: request.block_num,
            block_hash: request.block_hash,
            previous_hash: request.previous_hash,
            expected_hash: request.expected_hash,
            lib: request.lib,
            is_lib: request.is_lib,
        }
    }
}

impl From<ReplicateConsensusRequest> for ConsensusData {
    fn from(request: ReplicateConsensusRequest) -> Self {
        ConsensusData {
            block_num: request.block_num,
            consensus_hash: request.consensus_hash,
            agreed_nodes: request.agreed_nodes,
        }
    }
}
