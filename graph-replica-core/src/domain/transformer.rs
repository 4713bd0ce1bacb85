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

//! Data Transformer (C8, spec §4.6-§4.7): orchestrates the metadata parser, feed parser, path
//! accumulator and account cache to turn a batch of path-addressed operations into entity
//! mutations, in the output order the graph store's deferred-id resolution requires.

mod dex;

use crate::domain::account_cache::{AccountCache, AccountLookup};
use crate::domain::feed;
use crate::domain::metadata;
use crate::domain::path_accumulator::PathAccumulator;
use crate::domain::{
    Account, ContractExtension, ContractFile, EncryptionKey, FileFlags, Mutation, Path, PathType,
    StorageContract, StorageNodeValidation, Validator,
};
use graph_replica_common::domain::ids::{EntityRef, LocalId, NameRef};
use graph_replica_common::domain::protocol::ContractStatus;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;

pub use dex::transform_dex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Put,
    Del,
    WriteMarker,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub op_type: OperationType,
    pub path: Vec<String>,
    pub data: Value,
    pub index: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BlockInfo {
    pub block_num: u32,
}

#[derive(Debug, Error)]
pub enum TransformError<E> {
    #[error("account lookup failed: {0}")]
    AccountLookup(#[source] E),
}

/// Prefixes routed to the plain numeric/string Account fields in [crate::domain::TokenBalances]
/// (spec §4.6's balances row).
const BALANCE_PREFIXES: &[&str] = &[
    "balances", "spk", "spkb", "spkp", "cbalances", "cbroca", "cspk", "lbroca", "sbroca",
    "vbroca", "nomention",
];

/// Prefixes whose operations are purely internal bookkeeping and produce no mutation (spec
/// §4.6's "skipped" row).
const SKIPPED_PREFIXES: &[&str] = &[
    "witness", "rand", "IPFS", "cPointers", "escrow", "chain", "chrono", "forks", "temp",
    "validation",
];

/// Splits a `"NNN,base64block"` field into its integer amount and optional decoded block number
/// (spec §4.6). Values without a comma are parsed whole; unparseable leading digits coerce to 0
/// per the numeric coercion pass (spec §4.6).
fn split_amount_and_block(value: &Value) -> (i64, Option<u32>) {
    match value {
        Value::Number(n) => (n.as_i64().unwrap_or(0), None),
        Value::String(s) => {
            let mut parts = s.splitn(2, ',');
            let amount = parts
                .next()
                .and_then(|s| s.trim().parse::<i64>().ok())
                .unwrap_or(0);
            let block = parts
                .next()
                .and_then(|b| graph_replica_common::domain::protocol::decode_block_number(b).ok())
                .map(|n| n as u32);
            (amount, block)
        }
        _ => (0, None),
    }
}

fn coerce_i64(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n.as_i64().unwrap_or_else(|| n.as_f64().unwrap_or(0.0).floor() as i64),
        Value::String(s) => s
            .split(',')
            .next()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .unwrap_or(0),
        Value::Bool(b) => *b as i64,
        _ => 0,
    }
}

fn coerce_str(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Orchestrates C4-C7 over one batch of operations (spec §4.6). Not `Clone`: it owns per-batch
/// scratch state (the in-batch account map) that must not leak between calls.
pub struct Transformer<'a> {
    pub path_accumulator: &'a PathAccumulator,
    pub account_cache: &'a AccountCache,
}

impl<'a> Transformer<'a> {
    pub fn new(path_accumulator: &'a PathAccumulator, account_cache: &'a AccountCache) -> Self {
        Transformer { path_accumulator, account_cache }
    }

    /// `transform(ops, blockInfo) -> mutationList` (spec §4.6's public contract).
    pub async fn transform<L: AccountLookup>(
        &self,
        ops: &[Operation],
        block_info: BlockInfo,
        lookup: &L,
    ) -> Result<Vec<Mutation>, TransformError<L::Error>> {
        self.path_accumulator.start_batch();

        let mut in_batch = HashMap::new();
        let mut accounts: Vec<Account> = Vec::new();
        let mut contracts: Vec<StorageContract> = Vec::new();
        let mut files: Vec<ContractFile> = Vec::new();
        let mut paths: HashMap<(String, String), Path> = HashMap::new();
        let mut transactions: Vec<Mutation> = Vec::new();
        let mut markets: Vec<Mutation> = Vec::new();
        let mut orders: Vec<Mutation> = Vec::new();
        let mut ohlc: Vec<Mutation> = Vec::new();
        let mut other: Vec<Mutation> = Vec::new();

        for op in ops {
            if op.op_type == OperationType::WriteMarker {
                continue;
            }

            let Some(prefix) = op.path.first().cloned() else {
                continue;
            };

            if SKIPPED_PREFIXES.contains(&prefix.as_str()) {
                continue;
            }

            match prefix.as_str() {
                "feed" => {
                    if op.op_type == OperationType::Del {
                        continue;
                    }
                    if let Some(key) = op.path.get(1) {
                        transactions.push(Mutation::Transaction(feed::parse_feed_entry(
                            key, &op.data,
                        )));
                    }
                }
                "authorities" => {
                    let Some(username) = op.path.get(1) else { continue };
                    let (id, fresh) = self
                        .account_cache
                        .ensure_account(username, &mut in_batch, lookup, block_info.block_num)
                        .await
                        .map_err(TransformError::AccountLookup)?;
                    if let Some(account) = fresh {
                        accounts.push(account);
                    }
                    apply_to_account(&mut accounts, &id, |account| match &op.data {
                        Value::String(s) => account.public_key = Some(s.clone()),
                        value => account.authority_data = Some(value.clone()),
                    });
                }
                "broca" => {
                    let Some(username) = op.path.get(1) else { continue };
                    let (id, fresh) = self
                        .account_cache
                        .ensure_account(username, &mut in_batch, lookup, block_info.block_num)
                        .await
                        .map_err(TransformError::AccountLookup)?;
                    if let Some(account) = fresh {
                        accounts.push(account);
                    }
                    let (amount, block) = split_amount_and_block(&op.data);
                    apply_to_account(&mut accounts, &id, |account| {
                        account.broca = amount.max(0) as u64;
                        if let Some(block) = block {
                            account.broca_last_update_block = block as u64;
                        }
                    });
                }
                "bpow" => {
                    let Some(username) = op.path.get(1) else { continue };
                    let (id, fresh) = self
                        .account_cache
                        .ensure_account(username, &mut in_batch, lookup, block_info.block_num)
                        .await
                        .map_err(TransformError::AccountLookup)?;
                    if let Some(account) = fresh {
                        accounts.push(account);
                    }
                    let amount = coerce_i64(&op.data);
                    apply_to_account(&mut accounts, &id, |account| {
                        account.broca_power = amount.max(0) as u64;
                    });
                }
                "pow" => {
                    let Some(username) = op.path.get(1) else { continue };
                    if op.data.is_object() {
                        other.push(generic_mutation("POWReport", LocalId::new(format!(
                            "powreport_{username}_{}",
                            block_info.block_num
                        )), &op.data));
                        continue;
                    }
                    let (id, fresh) = self
                        .account_cache
                        .ensure_account(username, &mut in_batch, lookup, block_info.block_num)
                        .await
                        .map_err(TransformError::AccountLookup)?;
                    if let Some(account) = fresh {
                        accounts.push(account);
                    }
                    let amount = coerce_i64(&op.data);
                    apply_to_account(&mut accounts, &id, |account| {
                        account.power = amount.max(0) as u64;
                    });
                }
                "granted" | "granting" => {
                    let Some(username) = op.path.get(1) else { continue };
                    let (id, fresh) = self
                        .account_cache
                        .ensure_account(username, &mut in_batch, lookup, block_info.block_num)
                        .await
                        .map_err(TransformError::AccountLookup)?;
                    if let Some(account) = fresh {
                        accounts.push(account);
                    }

                    if op.path.get(2).map(String::as_str) == Some("t") {
                        let amount = coerce_i64(&op.data).max(0) as u64;
                        apply_to_account(&mut accounts, &id, |account| {
                            if prefix == "granted" {
                                account.power_granted = amount;
                            } else {
                                account.power_granting = amount;
                            }
                        });
                    } else if prefix == "granted" {
                        if let Some(grantee) = op.path.get(2) {
                            other.push(generic_mutation(
                                "PowerGrant",
                                LocalId::new(format!("grant_{username}_{grantee}")),
                                &op.data,
                            ));
                        }
                    }
                }
                "contract" => {
                    if op.op_type == OperationType::Del {
                        other.push(deletion_mutation(&op.path));
                        continue;
                    }
                    if let Some((contract, new_files, new_paths, touched_accounts)) = self
                        .transform_contract(&op.path, &op.data, block_info, &mut in_batch, lookup)
                        .await?
                    {
                        for account in touched_accounts {
                            if !accounts.iter().any(|a| a.id == account.id) {
                                accounts.push(account);
                            }
                        }
                        contracts.push(contract);
                        files.extend(new_files);
                        for path in new_paths {
                            paths
                                .entry((path.owner.clone(), path.full_path.clone()))
                                .and_modify(|existing| {
                                    if path.newest_block_number >= existing.newest_block_number {
                                        *existing = path.clone();
                                    }
                                })
                                .or_insert(path);
                        }
                    }
                }
                "contracts" => {
                    if let Some(purchaser) = op.path.get(1) {
                        other.push(generic_mutation(
                            "DexContract",
                            LocalId::new(format!("dexcontract_{purchaser}_{}", op.index)),
                            &op.data,
                        ));
                    }
                }
                "services" | "service" | "list" => {
                    if prefix == "service" {
                        continue;
                    }
                    let Some(provider) = op.path.get(1) else { continue };
                    other.push(generic_mutation(
                        if prefix == "services" { "Service" } else { "ServiceList" },
                        LocalId::new(format!("{prefix}_{provider}")),
                        &op.data,
                    ));
                }
                "dex" | "dexb" | "dexs" => {
                    let result = dex::transform_dex(&prefix, &op.path, op.op_type, &op.data);
                    if let Some(market) = result.market {
                        markets.push(Mutation::DexMarket(market));
                    }
                    orders.extend(result.orders.into_iter().map(Mutation::DexOrder));
                    orders.extend(result.cancellations);
                    ohlc.extend(result.ohlc);
                }
                "spkVote" => {
                    let Some(username) = op.path.get(1) else { continue };
                    let (id, fresh) = self
                        .account_cache
                        .ensure_account(username, &mut in_batch, lookup, block_info.block_num)
                        .await
                        .map_err(TransformError::AccountLookup)?;
                    if let Some(account) = fresh {
                        accounts.push(account);
                    }
                    let vote = coerce_str(&op.data);
                    let choices = vote
                        .as_bytes()
                        .chunks(2)
                        .filter_map(|chunk| std::str::from_utf8(chunk).ok().map(str::to_string))
                        .collect();
                    apply_to_account(&mut accounts, &id, |account| {
                        account.spk_vote = Some(vote.clone());
                        account.spk_vote_choices = choices;
                    });
                }
                "val" => {
                    let Some(code) = op.path.get(1) else { continue };
                    let Some(username) = op.data.as_str() else { continue };
                    let (id, fresh) = self
                        .account_cache
                        .ensure_account(username, &mut in_batch, lookup, block_info.block_num)
                        .await
                        .map_err(TransformError::AccountLookup)?;
                    if let Some(account) = fresh {
                        accounts.push(account);
                    }
                    other.push(Mutation::Generic {
                        kind: "Validator".to_string(),
                        id: LocalId::new(format!("validator_{code}")).into(),
                        fields: validator_fields(Validator { code: code.clone(), account: id, voting_power: 0 }),
                    });
                }
                "proffer" => {
                    if let Some(id) = op.path.get(1) {
                        other.push(generic_mutation(
                            "Proffer",
                            LocalId::new(format!("proffer_{id}")),
                            &op.data,
                        ));
                    }
                }
                "stats" => {
                    other.push(generic_mutation(
                        "StatsData",
                        LocalId::new(format!("stats_{}", block_info.block_num)),
                        &op.data,
                    ));
                }
                "delegations" => {
                    if let Some(id) = op.path.get(1) {
                        other.push(generic_mutation(
                            "Delegation",
                            LocalId::new(format!("delegation_{id}")),
                            &op.data,
                        ));
                    }
                }
                _ => {
                    if let Some(field) = BALANCE_PREFIXES.iter().find(|p| **p == prefix) {
                        let Some(username) = op.path.get(1) else { continue };
                        let (id, fresh) = self
                            .account_cache
                            .ensure_account(username, &mut in_batch, lookup, block_info.block_num)
                            .await
                            .map_err(TransformError::AccountLookup)?;
                        if let Some(account) = fresh {
                            accounts.push(account);
                        }
                        let (amount, block) = split_amount_and_block(&op.data);
                        apply_to_account(&mut accounts, &id, |account| {
                            if let Some(slot) = account.balances.field_mut(field) {
                                *slot = amount;
                            }
                            if let Some(block) = block {
                                account.last_update_block = block;
                            }
                        });
                    } else if prefix == "market" && op.path.get(1).map(String::as_str) == Some("node")
                    {
                        if let Some(id) = op.path.get(2) {
                            other.push(generic_mutation(
                                "NodeMarketBid",
                                LocalId::new(format!("nodebid_{id}")),
                                &op.data,
                            ));
                        }
                    } else {
                        other.push(deletion_mutation(&op.path));
                    }
                }
            }
        }

        self.path_accumulator.end_batch();

        // Output ordering per spec §4.6: accounts -> contracts -> files -> paths -> transactions
        // -> DEX markets -> orders -> OHLC -> other. A pre-existing account never emits a full
        // Mutation::Account: this batch's in-memory copy is zero-inited apart from whatever this
        // batch touched, and a full document would clobber every other field already on the row.
        let mut result = Vec::new();
        result.extend(accounts.into_iter().map(|account| {
            if account.is_existing {
                existing_account_patch(account)
            } else {
                Some(Mutation::Account(account))
            }
        }).flatten());
        result.extend(contracts.into_iter().map(Mutation::StorageContract));
        result.extend(files.into_iter().map(Mutation::ContractFile));
        result.extend(paths.into_values().map(Mutation::Path));
        result.extend(transactions);
        result.extend(markets);
        result.extend(orders);
        result.extend(ohlc);
        result.extend(other);

        Ok(result)
    }

    /// `transformContract` (spec §4.6): the densest single operation in the transformer.
    #[allow(clippy::type_complexity)]
    async fn transform_contract<L: AccountLookup>(
        &self,
        path: &[String],
        data: &Value,
        block_info: BlockInfo,
        in_batch: &mut HashMap<String, EntityRef>,
        lookup: &L,
    ) -> Result<
        Option<(StorageContract, Vec<ContractFile>, Vec<Path>, Vec<Account>)>,
        TransformError<L::Error>,
    > {
        let Some(object) = data.as_object() else { return Ok(None) };

        let (purchaser_name, contract_id) = match path.len() {
            3 => {
                let owner = &path[1];
                let suffix = &path[2];
                let purchaser = object
                    .get("f")
                    .and_then(Value::as_str)
                    .unwrap_or(owner.as_str());
                (purchaser.to_string(), format!("{owner}:{suffix}"))
            }
            2 => {
                let full_id = &path[1];
                let purchaser = full_id.split(':').next().unwrap_or(full_id.as_str());
                (purchaser.to_string(), full_id.clone())
            }
            _ => return Ok(None),
        };

        let owner_name = object
            .get("t")
            .and_then(Value::as_str)
            .unwrap_or(purchaser_name.as_str())
            .to_string();

        let mut touched = Vec::new();
        let (purchaser_id, fresh_purchaser) = self
            .account_cache
            .ensure_account(&purchaser_name, in_batch, lookup, block_info.block_num)
            .await
            .map_err(TransformError::AccountLookup)?;
        if let Some(account) = fresh_purchaser {
            touched.push(account);
        }

        let (owner_id, fresh_owner) = self
            .account_cache
            .ensure_account(&owner_name, in_batch, lookup, block_info.block_num)
            .await
            .map_err(TransformError::AccountLookup)?;
        if let Some(account) = fresh_owner {
            touched.push(account);
        }

        let status = object
            .get("status")
            .and_then(Value::as_u64)
            .and_then(|v| ContractStatus::try_from(v as u8).ok())
            .unwrap_or(ContractStatus::Pending);
        let node_total = object.get("nodeTotal").map(coerce_i64).unwrap_or(0);
        let power = object.get("power").map(coerce_i64).unwrap_or(0);

        let (expires_block, expires_chron_id) = object
            .get("e")
            .and_then(Value::as_str)
            .and_then(|e| e.split_once(':'))
            .map(|(block, chron)| (block.parse::<u32>().ok(), Some(chron.to_string())))
            .unwrap_or((None, None));

        let mut contract = StorageContract {
            id: contract_id.clone(),
            purchaser: purchaser_id.clone(),
            owner: owner_id.clone(),
            status,
            authorized: object.get("authorized").map(coerce_i64).unwrap_or(0),
            broker: object.get("broker").and_then(Value::as_str).map(str::to_string),
            power,
            refunded: object.get("refunded").map(coerce_i64).unwrap_or(0),
            utilized: object.get("utilized").map(coerce_i64).unwrap_or(0),
            verified: object.get("verified").and_then(Value::as_bool).unwrap_or(false),
            node_total,
            file_count: 0,
            expires_block,
            expires_chron_id,
            metadata: object.get("m").and_then(Value::as_str).map(str::to_string),
            encryption_keys: Vec::new(),
            storage_nodes: Vec::new(),
            extensions: Vec::new(),
        };

        let mut cids: Vec<String> = object
            .get("df")
            .and_then(Value::as_object)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        cids.sort();
        contract.file_count = cids.len() as u32;

        let parsed = metadata::parse(contract.metadata.as_deref().unwrap_or(""), cids.len());
        for grant in &parsed.encryption_grants {
            contract.encryption_keys.push(EncryptionKey {
                key_contract: contract_id.clone(),
                shared_with: grant.username.clone(),
                encrypted_key: grant.encrypted_key.clone(),
                key_type: None,
            });
        }

        let mut files = Vec::new();
        let mut paths = Vec::new();
        let block_num = block_info.block_num;

        for (index, cid) in cids.iter().enumerate() {
            let meta = parsed.files.get(index).cloned().unwrap_or_default();
            let flags = FileFlags(meta.flags);
            let folder_path = metadata::folder_full_path(meta.folder_index, &parsed.folders);

            let file = ContractFile {
                cid: cid.clone(),
                size: None,
                name: meta.name.clone().unwrap_or_else(|| cid.clone()),
                extension: meta.extension.clone(),
                mime_type: None,
                flags,
                license: meta.license.clone(),
                labels: meta.labels.clone(),
                thumbnail: meta.thumbnail.clone(),
                path: folder_path.clone(),
                contract: EntityRef::Name(NameRef(
                    contract_id.clone(),
                )),
                contract_block_number: block_num,
            };

            if !flags.is_hidden() {
                ensure_ancestor_paths(&mut paths, &owner_name, &folder_path, block_num);
                let file_full_path = format!(
                    "{}/{}",
                    folder_path.trim_end_matches('/'),
                    file.name
                );
                let file_ref: EntityRef =
                    LocalId::new(format!("file_{cid}")).into();

                self.path_accumulator.add_file_to_path(&owner_name, &folder_path, file_ref.clone());

                paths.push(Path {
                    owner: owner_name.clone(),
                    full_path: file_full_path,
                    path_type: PathType::File,
                    path_name: file.name.clone(),
                    item_count: 0,
                    parent: Some(EntityRef::Name(NameRef(
                        folder_path.clone(),
                    ))),
                    children: Vec::new(),
                    current_file: Some(file_ref),
                    newest_block_number: block_num,
                });
            }

            files.push(file);
        }

        recompute_item_counts(&mut paths, &owner_name, self.path_accumulator);

        if let Some(nodes) = object.get("n").and_then(Value::as_object) {
            for node_username in nodes.keys() {
                let (node_id, fresh_node) = self
                    .account_cache
                    .ensure_account(node_username, in_batch, lookup, block_info.block_num)
                    .await
                    .map_err(TransformError::AccountLookup)?;
                if let Some(account) = fresh_node {
                    touched.push(account);
                }
                contract.storage_nodes.push(StorageNodeValidation { node: node_id, validated: true });
            }
        }

        if let Some(ex) = object.get("ex").and_then(Value::as_str) {
            for entry in ex.split(',') {
                let mut parts = entry.splitn(3, ':');
                let Some(paid_by) = parts.next() else { continue };
                let Some(amount) = parts.next().and_then(|a| a.parse::<i64>().ok()) else { continue };
                let Some((start, end)) = parts
                    .next()
                    .and_then(|r| r.split_once('-'))
                    .and_then(|(s, e)| Some((s.parse::<u32>().ok()?, e.parse::<u32>().ok()?)))
                else {
                    continue;
                };

                let (paid_by_id, fresh) = self
                    .account_cache
                    .ensure_account(paid_by, in_batch, lookup, block_info.block_num)
                    .await
                    .map_err(TransformError::AccountLookup)?;
                if let Some(account) = fresh {
                    touched.push(account);
                }
                contract.extensions.push(ContractExtension {
                    paid_by: paid_by_id,
                    amount,
                    start_block: start,
                    end_block: end,
                });
            }
        }

        Ok(Some((contract, files, paths, touched)))
    }
}

/// Ensures every ancestor directory of `full_path` exists in `paths`, creating lazily as needed.
fn ensure_ancestor_paths(paths: &mut Vec<Path>, owner: &str, full_path: &str, block_num: u32) {
    if full_path == "/" {
        return;
    }

    let segments: Vec<&str> = full_path.trim_matches('/').split('/').collect();
    let mut current = String::from("/");

    for segment in segments {
        let parent = current.clone();
        current = if current == "/" {
            format!("/{segment}")
        } else {
            format!("{current}/{segment}")
        };

        if !paths.iter().any(|p| p.owner == owner && p.full_path == current) {
            paths.push(Path {
                owner: owner.to_string(),
                full_path: current.clone(),
                path_type: PathType::Directory,
                path_name: segment.to_string(),
                item_count: 0,
                parent: Some(EntityRef::Name(NameRef(parent))),
                children: Vec::new(),
                current_file: None,
                newest_block_number: block_num,
            });
        }
    }
}

/// Directory itemCount rule (spec §4.3): bottom-up by depth, files-if-any else subdirectories.
fn recompute_item_counts(paths: &mut [Path], owner: &str, accumulator: &PathAccumulator) {
    let mut directories: Vec<usize> = paths
        .iter()
        .enumerate()
        .filter(|(_, p)| p.path_type == PathType::Directory && p.owner == owner)
        .map(|(i, _)| i)
        .collect();
    directories.sort_by_key(|&i| std::cmp::Reverse(paths[i].full_path.matches('/').count()));

    for i in directories {
        let full_path = paths[i].full_path.clone();
        let file_children = accumulator.file_count(owner, &full_path);
        let dir_children = paths
            .iter()
            .filter(|p| {
                p.owner == owner
                    && p.path_type == PathType::Directory
                    && p.parent.as_ref().is_some_and(|parent| {
                        matches!(parent, EntityRef::Name(name) if name.0 == full_path)
                    })
            })
            .count();

        paths[i].item_count = if file_children > 0 { file_children as u32 } else { dir_children as u32 };
    }
}

fn apply_to_account(accounts: &mut [Account], id: &EntityRef, f: impl FnOnce(&mut Account)) {
    if let Some(account) = accounts.iter_mut().find(|a| &a.id == id) {
        f(account);
    }
}

/// Diffs `account` against a freshly-constructed default with the same id/username/created_block
/// to recover just the fields this batch set, so an existing row's untouched predicates survive
/// the store's upsert.
fn existing_account_patch(account: Account) -> Option<Mutation> {
    let default = Account::new(account.id.clone(), account.username.clone(), account.created_block);
    let current = serde_json::to_value(&account).ok()?;
    let default = serde_json::to_value(&default).ok()?;
    let (Value::Object(current), Value::Object(default)) = (current, default) else { return None };

    let mut fields = Map::new();
    for (key, value) in &current {
        if key == "is_existing" {
            continue;
        }
        flatten_diff(key, value, default.get(key).unwrap_or(&Value::Null), &mut fields);
    }

    (!fields.is_empty()).then(|| Mutation::Generic { kind: "Account".to_string(), id: account.id, fields })
}

/// Diffs nested objects (e.g. `balances`) field-by-field into dotted keys so a patch that only
/// touched one sub-field never carries stale siblings that would clobber an earlier patch's value.
fn flatten_diff(path: &str, current: &Value, default: &Value, out: &mut Map<String, Value>) {
    match (current, default) {
        (Value::Object(current), Value::Object(default)) => {
            for (key, value) in current {
                flatten_diff(&format!("{path}.{key}"), value, default.get(key).unwrap_or(&Value::Null), out);
            }
        }
        (current, default) => {
            if current != default {
                out.insert(path.to_string(), current.clone());
            }
        }
    }
}

fn generic_mutation(kind: &str, id: impl Into<EntityRef>, data: &Value) -> Mutation {
    let fields = data.as_object().cloned().unwrap_or_default();
    Mutation::Generic { kind: kind.to_string(), id: id.into(), fields }
}

fn deletion_mutation(path: &[String]) -> Mutation {
    let mut fields = Map::new();
    fields.insert("path".to_string(), Value::String(path.join("/")));
    Mutation::Generic {
        kind: "Deletion".to_string(),
        id: LocalId::new(format!("deletion_{}", path.join("_"))).into(),
        fields,
    }
}

fn validator_fields(validator: Validator) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("code".to_string(), Value::String(validator.code));
    fields.insert("account".to_string(), Value::String(validator.account.to_string()));
    fields.insert("votingPower".to_string(), Value::from(validator.voting_power));
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::convert::Infallible;

    struct EmptyStore;

    impl AccountLookup for EmptyStore {
        type Error = Infallible;

        async fn find_by_username(&self, _username: &str) -> Result<Option<u64>, Self::Error> {
            Ok(None)
        }
    }

    fn put(path: &[&str], data: Value, index: u32) -> Operation {
        Operation {
            op_type: OperationType::Put,
            path: path.iter().map(|s| s.to_string()).collect(),
            data,
            index,
        }
    }

    #[tokio::test]
    async fn broca_splits_amount_and_base64_block() {
        let accumulator = PathAccumulator::new();
        let cache = AccountCache::new();
        let transformer = Transformer::new(&accumulator, &cache);

        let ops = vec![put(&["broca", "bob"], json!("80975487,5qUoh"), 0)];
        let mutations = transformer
            .transform(&ops, BlockInfo { block_num: 1 }, &EmptyStore)
            .await
            .unwrap();

        let Mutation::Account(account) = mutations.into_iter().find(|m| matches!(m, Mutation::Account(a) if a.username == "bob")).unwrap() else {
            panic!("expected account mutation");
        };
        assert_eq!(account.broca, 80_975_487);
        assert_eq!(
            account.broca_last_update_block,
            graph_replica_common::domain::protocol::decode_block_number("5qUoh").unwrap()
        );
    }

    #[tokio::test]
    async fn two_contracts_accumulate_into_same_directory() {
        let accumulator = PathAccumulator::new();
        let cache = AccountCache::new();
        let transformer = Transformer::new(&accumulator, &cache);

        let contract_a = json!({
            "f": "alice", "t": "alice", "status": 3, "nodeTotal": 2, "power": 3,
            "m": "1|TestFolder,file1,txt,,0,file2,txt,,0",
            "df": {"QmA1": 1000, "QmA2": 2000},
        });
        let ops_a = vec![put(&["contract", "alice", "alice:0:100-aaa"], contract_a, 0)];
        transformer
            .transform(&ops_a, BlockInfo { block_num: 100 }, &EmptyStore)
            .await
            .unwrap();

        let contract_b = json!({
            "f": "alice", "t": "alice", "status": 3, "nodeTotal": 2, "power": 3,
            "m": "1|TestFolder,file3,txt,,0",
            "df": {"QmA3": 3000},
        });
        let ops_b = vec![put(&["contract", "alice", "alice:0:101-bbb"], contract_b, 0)];
        let mutations_b = transformer
            .transform(&ops_b, BlockInfo { block_num: 101 }, &EmptyStore)
            .await
            .unwrap();

        assert_eq!(accumulator.file_count("alice", "/TestFolder"), 3);

        let path = mutations_b.into_iter().find_map(|m| match m {
            Mutation::Path(p) if p.full_path == "/TestFolder" => Some(p),
            _ => None,
        });
        assert!(path.is_some(), "expected /TestFolder path in second batch's mutations");
    }

    #[tokio::test]
    async fn hidden_file_is_not_linked_into_a_path() {
        let accumulator = PathAccumulator::new();
        let cache = AccountCache::new();
        let transformer = Transformer::new(&accumulator, &cache);

        let contract = json!({
            "f": "alice", "t": "alice", "status": 3, "nodeTotal": 1, "power": 1,
            "m": "1|Pics,photo,jpg,QmThumb,0--,thumb,jpg,,2--",
            "df": {"QmPhoto": 10, "QmThumb": 2},
        });
        let ops = vec![put(&["contract", "alice", "alice:0:100-aaa"], contract, 0)];
        let mutations = transformer
            .transform(&ops, BlockInfo { block_num: 100 }, &EmptyStore)
            .await
            .unwrap();

        let file_paths: Vec<String> = mutations
            .iter()
            .filter_map(|m| match m {
                Mutation::Path(p) if p.path_type == PathType::File => Some(p.full_path.clone()),
                _ => None,
            })
            .collect();
        assert!(file_paths.iter().any(|p| p.ends_with("photo")));
        assert!(!file_paths.iter().any(|p| p.ends_with("thumb")));

        let pics_item_count = mutations.iter().find_map(|m| match m {
            Mutation::Path(p) if p.full_path == "/Pics" => Some(p.item_count),
            _ => None,
        });
        assert_eq!(pics_item_count, Some(1));
    }

    struct ExistingStore(u64);

    impl AccountLookup for ExistingStore {
        type Error = Infallible;

        async fn find_by_username(&self, _username: &str) -> Result<Option<u64>, Self::Error> {
            Ok(Some(self.0))
        }
    }

    #[tokio::test]
    async fn balance_updates_to_a_pre_existing_account_patch_rather_than_replace() {
        let accumulator = PathAccumulator::new();
        let cache = AccountCache::new();
        let transformer = Transformer::new(&accumulator, &cache);
        let store = ExistingStore(0xabc);

        let first = vec![put(&["balances", "alice"], json!("1000"), 0)];
        let mutations_1 = transformer
            .transform(&first, BlockInfo { block_num: 100 }, &store)
            .await
            .unwrap();
        assert_eq!(mutations_1.len(), 1);
        let Mutation::Generic { kind, id, fields } = &mutations_1[0] else {
            panic!("expected a generic patch mutation for the existing account");
        };
        assert_eq!(kind, "Account");
        assert_eq!(*id, EntityRef::Stored(graph_replica_common::domain::ids::StoredId(0xabc)));
        assert_eq!(fields.get("balances.balances"), Some(&json!(1000)));

        let second = vec![put(&["spkb", "alice"], json!("500"), 0)];
        let mutations_2 = transformer
            .transform(&second, BlockInfo { block_num: 101 }, &store)
            .await
            .unwrap();
        assert_eq!(mutations_2.len(), 1);
        let Mutation::Generic { fields, .. } = &mutations_2[0] else {
            panic!("expected a generic patch mutation for the existing account");
        };
        // Only the touched sub-field appears, so this patch can't clobber the first one's
        // balances.balances when both land on the same stored node.
        assert_eq!(fields.get("balances.spkb"), Some(&json!(500)));
        assert_eq!(fields.get("balances.balances"), None);
    }
}
