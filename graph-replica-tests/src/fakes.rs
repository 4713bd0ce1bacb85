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

//! An in-memory [GraphStore] standing in for `graph-replica-store::infra::dgraph::DgraphStore`.
//!
//! Mirrors the real adapter's two load-bearing behaviors: a blank node label (`_:label`) gets its
//! uid assigned the first time `mutate` sees it and reuses that uid on every later sighting
//! (`entity_ref_uid` derives every entity's label from its natural key, so that alone reproduces
//! the store's upsert-on-unique-field semantics for every entity type); and a `set` document
//! merges predicate-by-predicate into whatever already lives at that uid rather than replacing
//! the node outright.

use graph_replica_store::domain::store::{GraphStore, MutationBatch, Transaction, UidMap};
use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FakeStoreError {
    #[error("transaction already finished")]
    TransactionFinished,
}

#[derive(Default)]
struct Inner {
    nodes: BTreeMap<u64, Map<String, Value>>,
    labels: BTreeMap<String, u64>,
    next_uid: u64,
}

#[derive(Clone)]
pub struct FakeGraphStore {
    inner: Arc<Mutex<Inner>>,
}

impl FakeGraphStore {
    pub fn new() -> Self {
        FakeGraphStore { inner: Arc::new(Mutex::new(Inner { next_uid: 1, ..Inner::default() })) }
    }

    /// Seeds a node at a fixed uid, as if an earlier run had already created it. `fields` should
    /// not include `uid` or `dgraph.type`.
    pub fn seed(&self, uid: u64, dgraph_type: &str, fields: impl IntoIterator<Item = (&'static str, Value)>) {
        let mut node: Map<String, Value> = fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        node.insert("dgraph.type".to_string(), json!(dgraph_type));
        self.inner.lock().nodes.insert(uid, node);
    }

    pub fn node(&self, uid: u64) -> Option<Map<String, Value>> {
        self.inner.lock().nodes.get(&uid).cloned()
    }

    pub fn all(&self, dgraph_type: &str) -> Vec<Map<String, Value>> {
        self.inner
            .lock()
            .nodes
            .values()
            .filter(|fields| fields.get("dgraph.type").and_then(Value::as_str) == Some(dgraph_type))
            .cloned()
            .collect()
    }

    pub fn find_one(&self, dgraph_type: &str, field: &str, value: &Value) -> Option<Map<String, Value>> {
        self.all(dgraph_type).into_iter().find(|fields| fields.get(field) == Some(value))
    }

    /// Covers exactly the query shapes this workspace actually issues: the account-by-username
    /// lookup in `account_lookup.rs` and the fork-reload query in `fork::domain::manager`. Forks
    /// are never seeded here, so the reload always comes back empty and `ForkManager` starts from
    /// a clean in-memory table, same as a fresh deployment.
    fn run_query(&self, dql: &str, vars: &BTreeMap<String, String>) -> Value {
        if dql.contains("eq(username") {
            let username = vars.get("$username").map(String::as_str).unwrap_or_default();
            let inner = self.inner.lock();
            let hit = inner.nodes.iter().find(|(_, fields)| {
                fields.get("dgraph.type").and_then(Value::as_str) == Some("Account")
                    && fields.get("username").and_then(Value::as_str) == Some(username)
            });
            return match hit {
                Some((uid, _)) => json!({ "account": [{ "uid": format!("0x{uid:x}") }] }),
                None => json!({ "account": [] }),
            };
        }

        json!({})
    }
}

impl Default for FakeGraphStore {
    fn default() -> Self {
        FakeGraphStore::new()
    }
}

impl GraphStore for FakeGraphStore {
    type Error = FakeStoreError;
    type Txn = FakeTransaction;

    async fn apply_schema(&self, _schema: &str) -> Result<(), Self::Error> {
        Ok(())
    }

    async fn query(&self, dql: &str, vars: &BTreeMap<String, String>) -> Result<Value, Self::Error> {
        Ok(self.run_query(dql, vars))
    }

    async fn query_global(&self, dql: &str, vars: &BTreeMap<String, String>) -> Result<Value, Self::Error> {
        Ok(self.run_query(dql, vars))
    }

    async fn health(&self) -> Result<(), Self::Error> {
        Ok(())
    }

    async fn new_transaction(&self) -> Result<Self::Txn, Self::Error> {
        Ok(FakeTransaction { store: self.inner.clone(), finished: false })
    }
}

pub struct FakeTransaction {
    store: Arc<Mutex<Inner>>,
    finished: bool,
}

impl Transaction for FakeTransaction {
    type Error = FakeStoreError;

    async fn mutate(&mut self, batch: MutationBatch) -> Result<UidMap, Self::Error> {
        if self.finished {
            return Err(FakeStoreError::TransactionFinished);
        }

        let mut inner = self.store.lock();
        let mut assigned = BTreeMap::new();

        for doc in batch.set {
            let Value::Object(mut fields) = doc else { continue };
            let Some(Value::String(uid_field)) = fields.remove("uid") else { continue };

            let uid = if let Some(hex) = uid_field.strip_prefix("0x") {
                match u64::from_str_radix(hex, 16) {
                    Ok(uid) => uid,
                    Err(_) => continue,
                }
            } else if let Some(label) = uid_field.strip_prefix("_:") {
                match inner.labels.get(label) {
                    Some(&uid) => uid,
                    None => {
                        let uid = inner.next_uid;
                        inner.next_uid += 1;
                        inner.labels.insert(label.to_string(), uid);
                        assigned.insert(label.to_string(), uid);
                        uid
                    }
                }
            } else {
                continue;
            };

            inner.nodes.entry(uid).or_default().extend(fields);
        }

        // `batch.delete` documents only ever carry a `uid`; there's nothing this store needs to
        // model for them beyond acknowledging the mutate call, since no test asserts on deletion
        // of a whole node.
        Ok(UidMap(assigned))
    }

    /// No staged undo log backs this fake: `mutate` applies eagerly, same as the real store's
    /// `commitNow=false` mutate still assigning uids synchronously. Nothing under test calls
    /// `discard`, so this just marks the transaction finished.
    async fn commit(mut self) -> Result<(), Self::Error> {
        if self.finished {
            return Err(FakeStoreError::TransactionFinished);
        }
        self.finished = true;
        Ok(())
    }

    async fn discard(mut self) -> Result<(), Self::Error> {
        if self.finished {
            return Err(FakeStoreError::TransactionFinished);
        }
        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn repeated_blank_node_label_reuses_the_same_uid() {
        let store = FakeGraphStore::new();
        let mut txn = store.new_transaction().await.unwrap();

        txn.mutate(MutationBatch {
            set: vec![json!({ "uid": "_:alice", "dgraph.type": "Account", "username": "alice", "balances": {"balances": 1} })],
            delete: vec![],
        })
        .await
        .unwrap();
        txn.mutate(MutationBatch {
            set: vec![json!({ "uid": "_:alice", "dgraph.type": "Account", "balances": {"balances": 2} })],
            delete: vec![],
        })
        .await
        .unwrap();
        txn.commit().await.unwrap();

        let accounts = store.all("Account");
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].get("username"), Some(&json!("alice")));
        assert_eq!(accounts[0].get("balances"), Some(&json!({"balances": 2})));
    }

    #[tokio::test]
    async fn set_on_a_stored_uid_merges_rather_than_replaces() {
        let store = FakeGraphStore::new();
        store.seed(0xabc, "Account", [("username", json!("alice"))]);

        let mut txn = store.new_transaction().await.unwrap();
        txn.mutate(MutationBatch {
            set: vec![json!({ "uid": "0xabc", "balances.balances": 1000 })],
            delete: vec![],
        })
        .await
        .unwrap();
        txn.mutate(MutationBatch { set: vec![json!({ "uid": "0xabc", "balances.spkb": 500 })], delete: vec![] })
            .await
            .unwrap();
        txn.commit().await.unwrap();

        let account = store.node(0xabc).unwrap();
        assert_eq!(account.get("username"), Some(&json!("alice")));
        assert_eq!(account.get("balances.balances"), Some(&json!(1000)));
        assert_eq!(account.get("balances.spkb"), Some(&json!(500)));
    }

    #[tokio::test]
    async fn username_lookup_finds_a_seeded_account() {
        let store = FakeGraphStore::new();
        store.seed(0xabc, "Account", [("username", json!("alice"))]);

        let vars = BTreeMap::from([("$username".to_string(), "alice".to_string())]);
        let response = store.query("{ account(func: eq(username, $username)) { uid } }", &vars).await.unwrap();
        assert_eq!(response["account"][0]["uid"], json!("0xabc"));

        let vars = BTreeMap::from([("$username".to_string(), "bob".to_string())]);
        let response = store.query("{ account(func: eq(username, $username)) { uid } }", &vars).await.unwrap();
        assert_eq!(response["account"].as_array().unwrap().len(), 0);
    }
}
