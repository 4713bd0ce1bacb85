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

//! Replication Queue Worker (C9, spec §4.10): dequeues jobs, serializes same-fork/same-market
//! jobs against each other (spec §5), and dispatches to the per-job-kind handlers.

mod account_lookup;
mod handlers;
mod mutation_batch;

use crate::domain::job::Job;
use crate::domain::queue::KeyedSerializer;
use crate::domain::retry::RetryPolicy;
use crate::domain::{JobEnvelope, ProcessedOpCache, Queue};
use anyhow::Context;
use graph_replica_common::domain::pub_sub::Publisher;
use graph_replica_core::domain::account_cache::AccountCache;
use graph_replica_core::domain::path_accumulator::PathAccumulator;
use graph_replica_fork::domain::ForkManager;
use graph_replica_store::domain::snapshot::SnapshotController;
use graph_replica_store::domain::store::GraphStore;
use log::{info, warn};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::Signal;
use tokio::sync::Semaphore;
use tokio::task;

fn default_queue_capacity() -> usize {
    1024
}

/// Block-level jobs (`replicate-block`, `create-checkpoint`, `process-checkpoint`,
/// `update-consensus`) share this concurrency budget (spec §5 default: 4).
fn default_block_job_concurrency() -> usize {
    4
}

/// `process-operation` jobs share this concurrency budget (spec §5 default: 16).
fn default_operation_job_concurrency() -> usize {
    16
}

fn default_processed_op_sweep_interval() -> Duration {
    Duration::from_secs(600)
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub network_prefix: String,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_block_job_concurrency")]
    pub block_job_concurrency: usize,

    #[serde(default = "default_operation_job_concurrency")]
    pub operation_job_concurrency: usize,

    #[serde(default)]
    pub processed_op_window_blocks: Option<u32>,

    #[serde(default = "default_processed_op_sweep_interval", with = "humantime_serde")]
    pub processed_op_sweep_interval: Duration,

    #[serde(default)]
    pub retry: RetryPolicy,
}

/// Collaborators shared by every job handler, reloaded once at startup and held for the life of
/// the process (spec §9: the fork table and account cache must survive a restart, not just a
/// batch).
pub struct AppState<S, B> {
    store: S,
    fork_manager: Arc<ForkManager>,
    account_cache: Arc<AccountCache>,
    path_accumulator: Arc<PathAccumulator>,
    processed_ops: Arc<ProcessedOpCache>,
    serializer: Arc<KeyedSerializer>,
    snapshots: Option<Arc<SnapshotController<B>>>,
    retry: RetryPolicy,
}

impl<S, B> AppState<S, B> {
    pub fn new(store: S, snapshots: Option<SnapshotController<B>>, retry: RetryPolicy, processed_op_window_blocks: u32) -> Self {
        AppState {
            store,
            fork_manager: Arc::new(ForkManager::new()),
            account_cache: Arc::new(AccountCache::new()),
            path_accumulator: Arc::new(PathAccumulator::new()),
            processed_ops: Arc::new(ProcessedOpCache::new(processed_op_window_blocks)),
            serializer: Arc::new(KeyedSerializer::new()),
            snapshots: snapshots.map(Arc::new),
            retry,
        }
    }
}

impl<S: Clone, B> Clone for AppState<S, B> {
    fn clone(&self) -> Self {
        AppState {
            store: self.store.clone(),
            fork_manager: self.fork_manager.clone(),
            account_cache: self.account_cache.clone(),
            path_accumulator: self.path_accumulator.clone(),
            processed_ops: self.processed_ops.clone(),
            serializer: self.serializer.clone(),
            snapshots: self.snapshots.clone(),
            retry: self.retry,
        }
    }
}

/// Dispatches one job to its handler, retrying transient failures per [RetryPolicy] (spec §7).
/// `Job::serialization_key` is held for the handler's whole execution so no other job for the
/// same fork or market can run concurrently (spec §5).
async fn handle_envelope<S, B, P>(state: &AppState<S, B>, publisher: &mut P, mut envelope: JobEnvelope)
where
    S: GraphStore,
    B: graph_replica_store::domain::snapshot::SnapshotBackend,
    P: Publisher,
{
    let key = envelope.job.serialization_key();
    let _guard = state.serializer.lock(&key).await;

    loop {
        let outcome = dispatch(state, publisher, &envelope.job).await;
        match outcome {
            Ok(()) => return,
            Err(error) if state.retry.should_retry(envelope.attempt) => {
                warn!(attempt = envelope.attempt, error:%; "job failed, retrying");
                tokio::time::sleep(state.retry.delay_for(envelope.attempt)).await;
                envelope.attempt += 1;
            }
            Err(error) => {
                warn!(attempt = envelope.attempt, error:%; "job failed, exhausted retries, dropping");
                return;
            }
        }
    }
}

async fn dispatch<S, B, P>(state: &AppState<S, B>, publisher: &mut P, job: &Job) -> anyhow::Result<()>
where
    S: GraphStore,
    B: graph_replica_store::domain::snapshot::SnapshotBackend,
    P: Publisher,
{
    match job.clone() {
        Job::ReplicateBlock { network_prefix, block_data, operations } => {
            handlers::replicate_block(state, publisher, &network_prefix, block_data, operations).await
        }
        Job::UpdateConsensus { network_prefix, consensus_data } => {
            handlers::update_consensus(state, publisher, &network_prefix, consensus_data).await
        }
        Job::CreateCheckpoint { network_prefix, block_data } => {
            handlers::create_checkpoint(state, publisher, &network_prefix, block_data).await
        }
        Job::ProcessOperation { operation, checkpoint_hash } => {
            handlers::process_operation(state, operation, checkpoint_hash).await
        }
        Job::ProcessCheckpoint { network_prefix, notification } => {
            handlers::process_checkpoint(state, &network_prefix, notification).await
        }
    }
}

/// Runs the worker until SIGTERM: reloads fork state, spawns the consumer loop bounded by
/// `block_job_concurrency + operation_job_concurrency`, and a periodic dedup-cache sweep.
pub async fn run<S, B, Q, P>(
    config: Config,
    store: S,
    snapshots: Option<SnapshotController<B>>,
    queue: Arc<Q>,
    publisher: P,
    mut sigterm: Signal,
) -> anyhow::Result<()>
where
    S: GraphStore + Clone + 'static,
    B: graph_replica_store::domain::snapshot::SnapshotBackend + 'static,
    Q: Queue + 'static,
    P: Publisher + 'static,
{
    let Config {
        network_prefix,
        queue_capacity: _,
        block_job_concurrency,
        operation_job_concurrency,
        processed_op_window_blocks,
        processed_op_sweep_interval,
        retry,
    } = config;

    let state = AppState::new(
        store,
        snapshots,
        retry,
        processed_op_window_blocks.unwrap_or(crate::domain::processed_ops::DEFAULT_WINDOW_BLOCKS),
    );

    state.fork_manager.reload_from_store(&state.store).await.context("reload fork table from store")?;
    info!(network_prefix; "worker starting");

    let concurrency = block_job_concurrency.max(1) + operation_job_concurrency.max(1);
    let permits = Arc::new(Semaphore::new(concurrency));

    let consumer_task = task::spawn({
        let state = state.clone();
        let queue = queue.clone();
        let publisher = publisher.clone();
        let permits = permits.clone();

        async move {
            while let Some(envelope) = queue.dequeue().await {
                let permit = permits.clone().acquire_owned().await.expect("semaphore never closed");
                let state = state.clone();
                let mut publisher = publisher.clone();

                task::spawn(async move {
                    handle_envelope(&state, &mut publisher, envelope).await;
                    drop(permit);
                });
            }

            warn!("queue closed, consumer loop exiting");
            Ok::<_, anyhow::Error>(())
        }
    });

    let sweep_task = task::spawn({
        let state = state.clone();

        async move {
            let mut interval = tokio::time::interval(processed_op_sweep_interval);
            loop {
                interval.tick().await;
                let dropped = state.processed_ops.sweep(u32::MAX);
                if dropped > 0 {
                    info!(dropped; "swept processed-operation dedup cache");
                }
            }
        }
    });

    tokio::select! {
        result = consumer_task => result.context("consumer task panicked")?.context("consumer task failed"),

        _ = sweep_task => {
            warn!("sweep task exited unexpectedly");
            Ok(())
        }

        _ = sigterm.recv() => {
            warn!("SIGTERM received");
            Ok(())
        }
    }
}
