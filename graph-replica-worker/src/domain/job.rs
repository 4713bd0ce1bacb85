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

//! Job kinds dispatched by the Replication Queue Worker (spec §4.10).

use derive_more::Display;
use graph_replica_core::domain::transformer::Operation;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize)]
pub struct JobId(pub uuid::Uuid);

impl JobId {
    pub fn new() -> Self {
        JobId(uuid::Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        JobId::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockData {
    pub block_num: u32,
    pub block_hash: String,
    pub previous_hash: String,
    pub expected_hash: Option<String>,
    pub lib: u32,
    pub is_lib: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusData {
    pub block_num: u32,
    pub consensus_hash: String,
    pub agreed_nodes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointNotification {
    pub block_num: u32,
    pub hash: String,
    pub prev_hash: String,
    pub timestamp: i64,
    pub node_id: String,
}

/// `{type: "put"|"del"|"write_marker", path, data, blockNum, index, forkHash?,
/// prevCheckpointHash?, timestamp?}` wrapped with the network prefix it arrived on (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingOperation {
    pub network_prefix: String,
    pub block_num: u32,
    pub operation: Operation,
    pub fork_hash: Option<String>,
    pub prev_checkpoint_hash: Option<String>,
}

/// The five job kinds of spec §4.10, each carrying exactly the payload its handler needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Job {
    ReplicateBlock { network_prefix: String, block_data: BlockData, operations: Vec<Operation> },
    UpdateConsensus { network_prefix: String, consensus_data: ConsensusData },
    CreateCheckpoint { network_prefix: String, block_data: BlockData },
    ProcessOperation { operation: IncomingOperation, checkpoint_hash: Option<String> },
    ProcessCheckpoint { network_prefix: String, notification: CheckpointNotification },
}

impl Job {
    /// The serialization key jobs must not be dispatched concurrently under (spec §5): fork-keyed
    /// for block-level jobs, market-keyed for DEX operations, otherwise the job's own id (no
    /// serialization constraint).
    pub fn serialization_key(&self) -> String {
        match self {
            Job::ReplicateBlock { network_prefix, block_data, .. } => {
                format!("fork:{network_prefix}:{}", block_data.previous_hash)
            }
            Job::UpdateConsensus { network_prefix, .. } => format!("consensus:{network_prefix}"),
            Job::CreateCheckpoint { network_prefix, .. } => format!("fork:{network_prefix}"),
            Job::ProcessOperation { operation, .. } => {
                if matches!(operation.operation.path.first().map(String::as_str), Some("dex" | "dexb" | "dexs"))
                {
                    let market = operation.operation.path.get(1).cloned().unwrap_or_default();
                    format!("market:{}:{market}", operation.network_prefix)
                } else {
                    format!("op:{}:{}:{}", operation.network_prefix, operation.block_num, operation.operation.index)
                }
            }
            Job::ProcessCheckpoint { network_prefix, notification } => {
                format!("fork:{network_prefix}:{}", notification.hash)
            }
        }
    }

    pub fn higher_priority(&self) -> bool {
        matches!(self, Job::UpdateConsensus { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEnvelope {
    pub id: JobId,
    pub job: Job,
    pub attempt: u32,
}

impl JobEnvelope {
    pub fn new(job: Job) -> Self {
        JobEnvelope { id: JobId::new(), job, attempt: 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(path: &[&str]) -> Operation {
        Operation {
            op_type: graph_replica_core::domain::transformer::OperationType::Put,
            path: path.iter().map(|s| s.to_string()).collect(),
            data: serde_json::Value::Null,
            index: 0,
        }
    }

    #[test]
    fn dex_operations_key_by_market_not_by_individual_operation() {
        let job = Job::ProcessOperation {
            operation: IncomingOperation {
                network_prefix: "hive".to_string(),
                block_num: 1,
                operation: op(&["dexs", "hbd", "sellOrders", "100.000000:tx1"]),
                fork_hash: None,
                prev_checkpoint_hash: None,
            },
            checkpoint_hash: None,
        };
        assert_eq!(job.serialization_key(), "market:hive:hbd");
    }

    #[test]
    fn non_dex_operations_key_individually() {
        let job = Job::ProcessOperation {
            operation: IncomingOperation {
                network_prefix: "hive".to_string(),
                block_num: 5,
                operation: op(&["balances", "alice"]),
                fork_hash: None,
                prev_checkpoint_hash: None,
            },
            checkpoint_hash: None,
        };
        assert_eq!(job.serialization_key(), "op:hive:5:0");
    }
}
