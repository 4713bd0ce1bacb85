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

//! Black-box coverage of the Replication Queue Worker: every assertion here goes through
//! `graph_replica_worker::application::run`'s public surface (enqueue a job, observe the store or
//! an event) rather than any of its private handler/transform internals.

use graph_replica_common::domain::pub_sub::{ForkReconciled, Subscriber};
use graph_replica_common::infra::pub_sub::LocalPubSub;
use graph_replica_store::domain::snapshot::SnapshotController;
use graph_replica_store::infra::snapshot::noop::NoopSnapshotBackend;
use graph_replica_tests::fakes::FakeGraphStore;
use graph_replica_worker::application::{self, Config};
use graph_replica_worker::domain::job::{BlockData, ConsensusData, Job, JobEnvelope};
use graph_replica_core::domain::transformer::{Operation, OperationType};
use graph_replica_worker::domain::{InProcessQueue, Queue};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio_stream::StreamExt;

fn op(path: &[&str], data: Value) -> Operation {
    Operation { op_type: OperationType::Put, path: path.iter().map(|s| s.to_string()).collect(), data, index: 0 }
}

fn del(path: &[&str]) -> Operation {
    Operation { op_type: OperationType::Del, path: path.iter().map(|s| s.to_string()).collect(), data: Value::Null, index: 0 }
}

struct Harness {
    store: FakeGraphStore,
    queue: Arc<InProcessQueue>,
    pub_sub: LocalPubSub,
    worker: tokio::task::JoinHandle<anyhow::Result<()>>,
}

impl Harness {
    async fn spawn() -> Self {
        let store = FakeGraphStore::new();
        let queue = Arc::new(InProcessQueue::new(64));
        let pub_sub = LocalPubSub::new();
        let sigterm = signal(SignalKind::terminate()).expect("SIGTERM handler can be registered");

        let config = Config {
            network_prefix: "hive".to_string(),
            queue_capacity: 64,
            block_job_concurrency: 2,
            operation_job_concurrency: 4,
            processed_op_window_blocks: None,
            processed_op_sweep_interval: Duration::from_secs(600),
            retry: Default::default(),
        };

        let snapshots: SnapshotController<NoopSnapshotBackend> = SnapshotController::new(NoopSnapshotBackend);
        let worker = tokio::spawn(application::run(
            config,
            store.clone(),
            Some(snapshots),
            queue.clone(),
            pub_sub.clone(),
            sigterm,
        ));

        // lets the consumer loop start dequeuing before the first job is pushed
        tokio::time::sleep(Duration::from_millis(20)).await;
        Harness { store, queue, pub_sub, worker }
    }

    async fn replicate(&self, block_num: u32, block_hash: &str, previous_hash: &str, operations: Vec<Operation>) {
        let block_data = BlockData {
            block_num,
            block_hash: block_hash.to_string(),
            previous_hash: previous_hash.to_string(),
            expected_hash: None,
            lib: 0,
            is_lib: None,
        };
        self.queue
            .enqueue(JobEnvelope::new(Job::ReplicateBlock {
                network_prefix: "hive".to_string(),
                block_data,
                operations,
            }))
            .await
            .unwrap();
    }

    async fn consensus(&self, block_num: u32, consensus_hash: &str) {
        self.queue
            .enqueue(JobEnvelope::new(Job::UpdateConsensus {
                network_prefix: "hive".to_string(),
                consensus_data: ConsensusData {
                    block_num,
                    consensus_hash: consensus_hash.to_string(),
                    agreed_nodes: vec!["node-a".to_string(), "node-b".to_string()],
                },
            }))
            .await
            .unwrap();
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn two_contracts_from_the_same_owner_accumulate_into_one_directory() {
    let harness = Harness::spawn().await;

    let contract_a = json!({
        "f": "alice", "t": "alice", "status": 3, "nodeTotal": 2, "power": 3,
        "m": "1|TestFolder,file1,txt,,0,file2,txt,,0",
        "df": {"QmA1": 1000, "QmA2": 2000},
    });
    harness.replicate(100, "blockA", "genesis", vec![op(&["contract", "alice", "alice:0:100-aaa"], contract_a)]).await;

    let contract_b = json!({
        "f": "alice", "t": "alice", "status": 3, "nodeTotal": 2, "power": 3,
        "m": "1|TestFolder,file3,txt,,0",
        "df": {"QmA3": 3000},
    });
    harness.replicate(101, "blockB", "blockA", vec![op(&["contract", "alice", "alice:0:101-bbb"], contract_b)]).await;

    let found = wait_until(|| {
        harness
            .store
            .find_one("Path", "full_path", &json!("/TestFolder"))
            .map(|fields| fields.get("item_count") == Some(&json!(3)))
            .unwrap_or(false)
    })
    .await;
    assert!(found, "expected /TestFolder to accumulate to item_count 3 across both contracts");

    let path = harness.store.find_one("Path", "full_path", &json!("/TestFolder")).unwrap();
    assert_eq!(path.get("current_file"), Some(&json!({ "Local": "file_QmA3" })));
}

#[tokio::test]
async fn hidden_file_never_gets_its_own_path_but_still_counts_the_parent_directory_once() {
    let harness = Harness::spawn().await;

    let contract = json!({
        "f": "alice", "t": "alice", "status": 3, "nodeTotal": 1, "power": 1,
        "m": "1|Pics,photo,jpg,QmThumb,0--,thumb,jpg,,2--",
        "df": {"QmPhoto": 10, "QmThumb": 2},
    });
    harness.replicate(100, "blockA", "genesis", vec![op(&["contract", "alice", "alice:0:100-aaa"], contract)]).await;

    let found = wait_until(|| harness.store.find_one("Path", "full_path", &json!("/Pics/photo")).is_some()).await;
    assert!(found, "expected the visible file's path to be created");

    assert!(harness.store.find_one("Path", "full_path", &json!("/Pics/thumb")).is_none());
    assert_eq!(harness.store.find_one("Path", "full_path", &json!("/Pics")).unwrap().get("item_count"), Some(&json!(1)));
}

#[tokio::test]
async fn balance_update_to_a_pre_existing_account_patches_it_without_erasing_earlier_fields() {
    let harness = Harness::spawn().await;
    harness.store.seed(0xabc, "Account", [("username", json!("alice"))]);

    harness.replicate(100, "blockA", "genesis", vec![op(&["balances", "alice"], json!("1000"))]).await;
    let first = wait_until(|| harness.store.node(0xabc).and_then(|n| n.get("balances.balances").cloned()) == Some(json!(1000))).await;
    assert!(first, "expected the first patch to land on the pre-existing account");

    harness.replicate(101, "blockB", "blockA", vec![op(&["spkb", "alice"], json!("500"))]).await;
    let second = wait_until(|| harness.store.node(0xabc).and_then(|n| n.get("balances.spkb").cloned()) == Some(json!(500))).await;
    assert!(second, "expected the second patch to land on the same account");

    let account = harness.store.node(0xabc).unwrap();
    assert_eq!(account.get("username"), Some(&json!("alice")));
    assert_eq!(account.get("balances.balances"), Some(&json!(1000)), "earlier patch must survive the later one");
    assert_eq!(account.get("balances.spkb"), Some(&json!(500)));
}

#[tokio::test]
async fn broca_power_decodes_the_amount_and_base64_block_number() {
    let harness = Harness::spawn().await;
    harness.replicate(1, "blockA", "genesis", vec![op(&["broca", "bob"], json!("80975487,5qUoh"))]).await;

    let found = wait_until(|| {
        harness
            .store
            .find_one("Account", "username", &json!("bob"))
            .map(|fields| fields.get("broca") == Some(&json!(80_975_487)))
            .unwrap_or(false)
    })
    .await;
    assert!(found, "expected bob's broca balance to be decoded from the comma-joined payload");

    let account = harness.store.find_one("Account", "username", &json!("bob")).unwrap();
    let expected_block = graph_replica_common::domain::protocol::decode_block_number("5qUoh").unwrap();
    assert_eq!(account.get("broca_last_update_block"), Some(&json!(expected_block)));
}

#[tokio::test]
async fn partial_fill_then_cancellation_of_a_dex_order() {
    let harness = Harness::spawn().await;

    let order = json!({"amount": 500, "filled": 200, "from": "alice", "expireBlock": 5_000_000});
    harness
        .replicate(200, "blockA", "genesis", vec![op(&["dexs", "hbd", "sellOrders", "100.000000:tx1"], order)])
        .await;

    let found = wait_until(|| !harness.store.all("DexOrder").is_empty()).await;
    assert!(found, "expected the partially-filled sell order to be recorded");

    let orders = harness.store.all("DexOrder");
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].get("remaining"), Some(&json!(300)));
    assert_eq!(orders[0].get("status"), Some(&json!("Partial")));
    assert_eq!(orders[0].get("token_amount"), Some(&json!(5)));

    let markets = harness.store.all("DexMarket");
    assert_eq!(markets.len(), 1);

    harness.replicate(201, "blockB", "blockA", vec![del(&["dexs", "hbd", "sellOrders", "100.000000:tx1"])]).await;
    let cancelled = wait_until(|| !harness.store.all("OrderCancellation").is_empty()).await;
    assert!(cancelled, "expected the deletion to produce a cancellation record");

    let cancellations = harness.store.all("OrderCancellation");
    assert_eq!(cancellations.len(), 1);
    assert_eq!(cancellations[0].get("marketId"), Some(&json!("Spk:Hbd")));
    assert_eq!(cancellations[0].get("orderId"), Some(&json!("Spk:Hbd:100.000000:tx1")));
}

#[tokio::test]
async fn diverging_forks_reconcile_to_the_consensus_chosen_tip() {
    let harness = Harness::spawn().await;
    let mut reconciled = harness.pub_sub.subscribe::<ForkReconciled>();

    harness.replicate(200, "block-a", "parent", vec![]).await;
    harness.replicate(200, "block-b", "parent", vec![]).await;

    // give detect_fork time to register both forks before consensus arrives
    tokio::time::sleep(Duration::from_millis(50)).await;
    harness.consensus(200, "block-a").await;

    let event = tokio::time::timeout(Duration::from_secs(2), reconciled.next())
        .await
        .expect("ForkReconciled should be published within the timeout")
        .expect("stream should yield an item")
        .expect("event should decode cleanly");

    assert_eq!(event.canonical, "block-a");
    assert_eq!(event.orphaned, vec!["block-b".to_string()]);
    assert_eq!(event.block_num, 200);
}
