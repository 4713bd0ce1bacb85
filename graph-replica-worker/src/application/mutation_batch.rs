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

//! Translates [Mutation] (the transformer's output) into a [MutationBatch] (the store's input).
//! Blank-node labels are derived deterministically from each entity's natural key so that the
//! store's own upsert-on-unique-field behavior, not this crate, is what guarantees idempotence
//! (spec §4.10's "the store's own idempotence … is [the guarantee]").

use graph_replica_common::domain::ids::EntityRef;
use graph_replica_core::domain::Mutation;
use graph_replica_store::domain::store::MutationBatch;
use serde_json::{Map, Value, json};

fn sanitize(label: &str) -> String {
    label.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect()
}

fn entity_ref_uid(entity_ref: &EntityRef) -> Value {
    match entity_ref {
        EntityRef::Local(id) => json!(format!("_:{}", sanitize(&id.0))),
        EntityRef::Stored(id) => json!(format!("0x{:x}", id.0)),
        EntityRef::Name(name) => json!(format!("_:{}", sanitize(&name.0))),
    }
}

/// Converts one [Mutation] into a `set`-mutation JSON document tagged with its Dgraph type and a
/// deterministic `uid`.
fn mutation_to_value(mutation: Mutation) -> Value {
    let (dgraph_type, uid, mut fields): (String, Value, Map<String, Value>) = match mutation {
        Mutation::Account(account) => {
            let uid = entity_ref_uid(&account.id);
            (
                "Account".to_string(),
                uid,
                serde_json::to_value(account).and_then(as_object).unwrap_or_default(),
            )
        }
        Mutation::StorageContract(contract) => {
            let uid = json!(format!("_:{}", sanitize(&contract.id)));
            (
                "StorageContract".to_string(),
                uid,
                serde_json::to_value(contract).and_then(as_object).unwrap_or_default(),
            )
        }
        Mutation::ContractFile(file) => {
            let uid = json!(format!("_:{}", sanitize(&file.cid)));
            (
                "ContractFile".to_string(),
                uid,
                serde_json::to_value(file).and_then(as_object).unwrap_or_default(),
            )
        }
        Mutation::Path(path) => {
            let uid = json!(format!("_:{}", sanitize(&format!("{}:{}", path.owner, path.full_path))));
            ("Path".to_string(), uid, serde_json::to_value(path).and_then(as_object).unwrap_or_default())
        }
        Mutation::Transaction(transaction) => {
            let uid = json!(format!(
                "_:{}",
                sanitize(&format!("{}:{}", transaction.block_num, transaction.tx_id))
            ));
            (
                "Transaction".to_string(),
                uid,
                serde_json::to_value(transaction).and_then(as_object).unwrap_or_default(),
            )
        }
        Mutation::DexMarket(market) => {
            let uid = json!(format!("_:{}", sanitize(&market.id())));
            ("DexMarket".to_string(), uid, serde_json::to_value(market).and_then(as_object).unwrap_or_default())
        }
        Mutation::DexOrder(order) => {
            let uid = json!(format!("_:{}", sanitize(&order.id)));
            ("DexOrder".to_string(), uid, serde_json::to_value(order).and_then(as_object).unwrap_or_default())
        }
        Mutation::OhlcData { market_id, block_bucket, data } => {
            let uid = json!(format!("_:{}", sanitize(&format!("{market_id}:{block_bucket}"))));
            let mut fields = serde_json::to_value(data).and_then(as_object).unwrap_or_default();
            fields.insert("marketId".to_string(), json!(market_id));
            fields.insert("blockBucket".to_string(), json!(block_bucket));
            ("OHLCData".to_string(), uid, fields)
        }
        Mutation::OrderCancellation { market_id, order_id } => {
            let uid = json!(format!("_:{}", sanitize(&format!("cancel:{market_id}:{order_id}"))));
            let mut fields = Map::new();
            fields.insert("marketId".to_string(), json!(market_id));
            fields.insert("orderId".to_string(), json!(order_id));
            ("OrderCancellation".to_string(), uid, fields)
        }
        Mutation::Generic { kind, id, fields } => {
            let uid = entity_ref_uid(&id);
            (kind, uid, fields)
        }
    };

    fields.insert("uid".to_string(), uid);
    fields.insert("dgraph.type".to_string(), json!(dgraph_type));
    Value::Object(fields)
}

fn as_object(value: Value) -> Result<Map<String, Value>, serde_json::Error> {
    match value {
        Value::Object(map) => Ok(map),
        other => Ok(Map::from_iter([("value".to_string(), other)])),
    }
}

pub fn to_mutation_batch(mutations: Vec<Mutation>) -> MutationBatch {
    let set = mutations.into_iter().map(mutation_to_value).collect();
    MutationBatch { set, delete: Vec::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph_replica_common::domain::ids::LocalId;
    use graph_replica_core::domain::Account;

    #[test]
    fn account_mutation_carries_a_stable_blank_node_derived_from_its_ref() {
        let account = Account::new(LocalId::new("account_alice").into(), "alice", 100);
        let batch = to_mutation_batch(vec![Mutation::Account(account)]);

        assert_eq!(batch.set.len(), 1);
        assert_eq!(batch.set[0]["uid"], json!("_:account_alice"));
        assert_eq!(batch.set[0]["dgraph.type"], json!("Account"));
        assert_eq!(batch.set[0]["username"], json!("alice"));
    }
}
