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

//! One handler per [Job] variant (spec §4.10). Each owns exactly the collaborators its job kind
//! touches; `run` wires them to the shared [super::AppState].

use crate::application::account_lookup::StoreAccountLookup;
use crate::application::mutation_batch::to_mutation_batch;
use crate::application::AppState;
use crate::domain::job::{BlockData, CheckpointNotification, ConsensusData, IncomingOperation};
use anyhow::Context;
use fastrace::trace;
use graph_replica_common::domain::pub_sub::{
    CheckpointCreated, ForkReconciled, OperationBatchIndexed, Publisher,
};
use graph_replica_core::domain::transformer::{BlockInfo, Operation, Transformer};
use graph_replica_fork::domain::manager::ReconcileInput;
use graph_replica_store::domain::snapshot::SnapshotBackend;
use graph_replica_store::domain::store::{GraphStore, Transaction};
use log::{info, warn};

#[trace]
pub async fn replicate_block<S: GraphStore, B: SnapshotBackend, P: Publisher>(
    state: &AppState<S, B>,
    publisher: &mut P,
    network_prefix: &str,
    block_data: BlockData,
    operations: Vec<Operation>,
) -> anyhow::Result<()> {
    let fork_id = state.fork_manager.detect_fork(
        block_data.block_num,
        &block_data.block_hash,
        &block_data.previous_hash,
    );

    let lookup = StoreAccountLookup::new(&state.store);
    let block_info = BlockInfo { block_num: block_data.block_num };
    let transformer = Transformer::new(&state.path_accumulator, &state.account_cache);
    let mutations = transformer
        .transform(&operations, block_info, &lookup)
        .await
        .context("transform operations into mutations")?;

    let max_index = operations.iter().map(|op| op.index as u64).max();

    if !mutations.is_empty() {
        let batch = to_mutation_batch(mutations);
        let mut txn = state.store.new_transaction().await.context("open transaction")?;
        txn.mutate(batch).await.context("apply mutation batch")?;
        txn.commit().await.context("commit mutation batch")?;
    }

    publisher
        .publish(&OperationBatchIndexed {
            fork_id: fork_id.to_string(),
            block_num: block_data.block_num,
            max_processed_index: max_index,
            caught_up: block_data.is_lib.unwrap_or(false),
        })
        .await
        .context("publish OperationBatchIndexed")?;

    info!(
        network_prefix,
        fork_id:% = fork_id,
        block_num = block_data.block_num,
        operations = operations.len();
        "block replicated"
    );

    Ok(())
}

#[trace]
pub async fn update_consensus<S: GraphStore, B: SnapshotBackend, P: Publisher>(
    state: &AppState<S, B>,
    publisher: &mut P,
    network_prefix: &str,
    consensus_data: ConsensusData,
) -> anyhow::Result<()> {
    let result = state.fork_manager.reconcile_forks(ReconcileInput {
        block_num: consensus_data.block_num,
        consensus_hash: consensus_data.consensus_hash.clone(),
    });

    if let Some(canonical) = &result.canonical {
        publisher
            .publish(&ForkReconciled {
                canonical: canonical.to_string(),
                orphaned: result.orphaned.iter().map(ToString::to_string).collect(),
                block_num: consensus_data.block_num,
            })
            .await
            .context("publish ForkReconciled")?;
    }

    state.fork_manager.prune_forks(
        consensus_data.block_num.saturating_sub(graph_replica_fork::domain::manager::DEFAULT_RETENTION_BLOCKS),
    );

    info!(
        network_prefix,
        block_num = consensus_data.block_num,
        orphaned = result.orphaned.len();
        "consensus reconciled"
    );

    Ok(())
}

#[trace]
pub async fn create_checkpoint<S: GraphStore, B: SnapshotBackend, P: Publisher>(
    state: &AppState<S, B>,
    publisher: &mut P,
    network_prefix: &str,
    block_data: BlockData,
) -> anyhow::Result<()> {
    let fork_id = state.fork_manager.detect_fork(
        block_data.block_num,
        &block_data.block_hash,
        &block_data.previous_hash,
    );

    let tag = format!("{network_prefix}-{}", block_data.block_hash);
    let snapshot_tag = if let Some(snapshots) = &state.snapshots {
        snapshots.create_checkpoint(block_data.block_num, &tag).await;
        Some(tag)
    } else {
        None
    };

    publisher
        .publish(&CheckpointCreated {
            fork_id: fork_id.to_string(),
            block_num: block_data.block_num,
            snapshot_tag,
        })
        .await
        .context("publish CheckpointCreated")?;

    Ok(())
}

#[trace]
pub async fn process_operation<S: GraphStore, B: SnapshotBackend>(
    state: &AppState<S, B>,
    operation: IncomingOperation,
    checkpoint_hash: Option<String>,
) -> anyhow::Result<()> {
    let dedup_key = crate::domain::processed_ops::ProcessedOpCache::key(
        operation.block_num,
        operation.operation.index,
        match operation.operation.op_type {
            graph_replica_core::domain::transformer::OperationType::Put => "put",
            graph_replica_core::domain::transformer::OperationType::Del => "del",
            graph_replica_core::domain::transformer::OperationType::WriteMarker => "write_marker",
        },
        &operation.operation.path,
    );

    if state.processed_ops.check_and_record(dedup_key, operation.block_num) {
        warn!(
            block_num = operation.block_num,
            index = operation.operation.index;
            "duplicate operation skipped"
        );
        return Ok(());
    }

    let lookup = StoreAccountLookup::new(&state.store);
    let block_info = BlockInfo { block_num: operation.block_num };
    let transformer = Transformer::new(&state.path_accumulator, &state.account_cache);
    let mutations = transformer
        .transform(std::slice::from_ref(&operation.operation), block_info, &lookup)
        .await
        .context("transform single operation")?;

    if mutations.is_empty() {
        return Ok(());
    }

    let batch = to_mutation_batch(mutations);
    let mut txn = state.store.new_transaction().await.context("open transaction")?;
    txn.mutate(batch).await.context("apply mutation batch")?;
    txn.commit().await.context("commit mutation batch")?;

    let _ = checkpoint_hash;
    Ok(())
}

#[trace]
pub async fn process_checkpoint<S: GraphStore, B: SnapshotBackend>(
    state: &AppState<S, B>,
    network_prefix: &str,
    notification: CheckpointNotification,
) -> anyhow::Result<()> {
    let fork_id =
        state.fork_manager.detect_fork(notification.block_num, &notification.hash, &notification.prev_hash);

    info!(
        network_prefix,
        fork_id:% = fork_id,
        block_num = notification.block_num,
        node_id = notification.node_id;
        "checkpoint notification processed"
    );

    Ok(())
}
