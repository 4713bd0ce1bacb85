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

//! Plain entity types (spec §3). These are shapes the transformer produces, not storage rows —
//! the mapping onto the graph store's node/edge model lives in `graph-replica-store`.

use derive_more::Display;
use graph_replica_common::domain::{
    ids::EntityRef,
    protocol::{ContractStatus, Quote, Token},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Per-token-prefix balance fields on an [Account], named after the path prefixes they come from
/// (spec §4.6 dispatch table) rather than renamed to a token name, so the transformer's dispatch
/// can address a field by the prefix string directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalances {
    pub balances: i64,
    pub spk: i64,
    pub spkb: i64,
    pub spkp: i64,
    pub cbalances: i64,
    pub cbroca: i64,
    pub cspk: i64,
    pub lbroca: i64,
    pub sbroca: i64,
    pub vbroca: i64,
    pub nomention: i64,
}

impl TokenBalances {
    /// Mutable access to the field matching a path prefix, or `None` if `prefix` isn't one of
    /// these simple integer balance fields.
    pub fn field_mut(&mut self, prefix: &str) -> Option<&mut i64> {
        Some(match prefix {
            "balances" => &mut self.balances,
            "spk" => &mut self.spk,
            "spkb" => &mut self.spkb,
            "spkp" => &mut self.spkp,
            "cbalances" => &mut self.cbalances,
            "cbroca" => &mut self.cbroca,
            "cspk" => &mut self.cspk,
            "lbroca" => &mut self.lbroca,
            "sbroca" => &mut self.sbroca,
            "vbroca" => &mut self.vbroca,
            "nomention" => &mut self.nomention,
            _ => return None,
        })
    }
}

/// One real user, deduplicated globally by `username` (invariant 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: EntityRef,
    pub username: String,
    /// Height at which this account was first referenced. Not named in spec §3 but standard
    /// practice for audit/debugging in comparable indexers.
    pub created_block: u32,
    pub last_update_block: u32,
    pub balances: TokenBalances,
    pub broca: u64,
    pub broca_last_update_block: u64,
    pub broca_power: u64,
    pub power: u64,
    pub power_granted: u64,
    pub power_granting: u64,
    pub public_key: Option<String>,
    pub authority_data: Option<Value>,
    pub spk_vote: Option<String>,
    pub spk_vote_choices: Vec<String>,
    /// Set by the Account Cache when this account resolved to a stored id rather than a freshly
    /// minted blank node, so the worker knows not to emit a duplicate create (spec §4.2).
    pub is_existing: bool,
}

impl Account {
    pub fn new(id: EntityRef, username: impl Into<String>, created_block: u32) -> Self {
        Account {
            id,
            username: username.into(),
            created_block,
            last_update_block: created_block,
            balances: TokenBalances::default(),
            broca: 0,
            broca_last_update_block: 0,
            broca_power: 0,
            power: 0,
            power_granted: 0,
            power_granting: 0,
            public_key: None,
            authority_data: None,
            spk_vote: None,
            spk_vote_choices: Vec::new(),
            is_existing: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageNodeValidation {
    pub node: EntityRef,
    pub validated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractExtension {
    pub paid_by: EntityRef,
    pub amount: i64,
    pub start_block: u32,
    pub end_block: u32,
}

/// Identity `purchaser:contractType:blockHeight-txid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageContract {
    pub id: String,
    pub purchaser: EntityRef,
    pub owner: EntityRef,
    pub status: ContractStatus,
    pub authorized: i64,
    pub broker: Option<String>,
    pub power: i64,
    pub refunded: i64,
    pub utilized: i64,
    pub verified: bool,
    pub node_total: i64,
    pub file_count: u32,
    pub expires_block: Option<u32>,
    pub expires_chron_id: Option<String>,
    pub metadata: Option<String>,
    pub encryption_keys: Vec<EncryptionKey>,
    pub storage_nodes: Vec<StorageNodeValidation>,
    pub extensions: Vec<ContractExtension>,
}

impl StorageContract {
    /// Pure function of `(nodeTotal, power)`, recomputed on every write (invariant 7).
    pub fn is_understored(&self) -> bool {
        self.node_total < self.power
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptionKey {
    pub key_contract: String,
    pub shared_with: String,
    pub encrypted_key: String,
    pub key_type: Option<String>,
}

/// File flag bits, already split out for readability at call sites (spec §6).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFlags(pub u8);

impl FileFlags {
    pub fn is_encrypted(self) -> bool {
        graph_replica_common::domain::protocol::file_is_encrypted(self.0)
    }

    pub fn is_hidden(self) -> bool {
        graph_replica_common::domain::protocol::file_is_hidden(self.0)
    }
}

/// Identity is the content id (`cid`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractFile {
    pub cid: String,
    pub size: Option<u64>,
    pub name: String,
    pub extension: Option<String>,
    pub mime_type: Option<String>,
    pub flags: FileFlags,
    pub license: Option<String>,
    pub labels: Option<String>,
    pub thumbnail: Option<String>,
    pub path: String,
    pub contract: EntityRef,
    pub contract_block_number: u32,
}

#[derive(Debug, Clone, Copy, Display, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathType {
    Directory,
    File,
}

/// Identity is `(owner, fullPath)` (invariant 2); root is `(owner, "/")`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub owner: String,
    pub full_path: String,
    pub path_type: PathType,
    pub path_name: String,
    pub item_count: u32,
    pub parent: Option<EntityRef>,
    pub children: Vec<EntityRef>,
    pub current_file: Option<EntityRef>,
    pub newest_block_number: u32,
}

impl Path {
    pub fn is_root(&self) -> bool {
        self.full_path == "/"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub provider: EntityRef,
    pub service_type: String,
    pub api: Option<String>,
    pub enabled: bool,
    pub memo: Option<String>,
    pub ipfs_id: Option<String>,
    pub cost: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceList {
    pub provider: EntityRef,
    pub services: Vec<Service>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Validator {
    pub code: String,
    pub account: EntityRef,
    pub voting_power: i64,
}

#[derive(Debug, Clone, Copy, Display, PartialEq, Eq, Serialize, Deserialize)]
pub enum DexOrderStatus {
    Open,
    Partial,
    Filled,
    Cancelled,
}

/// Identity `market:rate:txid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DexOrder {
    pub id: String,
    pub market_id: String,
    pub rate: f64,
    pub amount: i64,
    pub filled: i64,
    pub remaining: i64,
    pub status: DexOrderStatus,
    pub from: EntityRef,
    pub expire_block: Option<u32>,
    pub token_amount: Option<i64>,
}

impl DexOrder {
    /// `remaining = max(0, amount - filled)`; `status` follows the fill ratio; `token_amount =
    /// floor(amount / rate)` once the rate is known, `None` when `rate <= 0` (spec §4.7, §8).
    pub fn recompute(&mut self) {
        self.remaining = (self.amount - self.filled).max(0);
        self.status = if self.amount > 0 && self.filled >= self.amount {
            DexOrderStatus::Filled
        } else if self.filled > 0 {
            DexOrderStatus::Partial
        } else {
            DexOrderStatus::Open
        };
        self.token_amount = (self.rate > 0.0).then(|| (self.amount as f64 / self.rate).floor() as i64);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DexMarket {
    pub token: Token,
    pub quote: Quote,
    pub buy_orders: Vec<String>,
    pub sell_orders: Vec<String>,
}

impl DexMarket {
    pub fn id(&self) -> String {
        format!("{}:{}", self.token, self.quote)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OHLCData {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume_quote: i64,
    pub volume_token: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAmount {
    pub milliunits: i128,
    pub token: Token,
}

#[derive(Debug, Clone, Copy, Display, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionCategory {
    TokenTransfer,
    DexOrder,
    DexTrade,
    NftMint,
    NftTransfer,
    NftSale,
    PowerUp,
    PowerDown,
    StorageUpload,
    StorageCancel,
    Unknown,
}

/// A parsed feed entry (spec §4.5). The raw payload is kept on every transaction, not only
/// `UNKNOWN` ones, for downstream audit (see SPEC_FULL §8).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub block_num: u32,
    pub tx_id: String,
    pub category: TransactionCategory,
    pub amount: Option<TokenAmount>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub order_type: Option<String>,
    pub nft_id: Option<String>,
    pub contract_id: Option<String>,
    pub raw: Value,
}

/// One entry in the network registry persisted state (spec §6). Prefix (e.g. `spkccT_`) is the
/// map key, kept out of the struct itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRegistryEntry {
    pub name: String,
    pub description: String,
    pub tokens: Vec<Token>,
    pub endpoints: Vec<String>,
    pub schema_path: String,
}

/// Cache record backing the processed-op dedup set (spec §4.10). Kept separate from the raw
/// `(block_num, index, type, path)` tuple so the worker can reason about eviction age.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedOperation {
    pub block_num: u32,
    pub index: u32,
    pub op_type: String,
    pub path_hash: u64,
}

/// Everything the Data Transformer (C8) can emit for one operation, ordered per the output
/// ordering contract of spec §4.6. Entities not given a dedicated variant here (Proffer,
/// StatsData, Delegation, NodeMarketBid/NodeReport, POWReport, PowerGrant, DexContract, and
/// other collaborator-internal prefixes) travel through [Mutation::Generic] with a `kind` tag —
/// spec §4.6 specifies their *routing*, not a concrete schema for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Mutation {
    Account(Account),
    StorageContract(StorageContract),
    ContractFile(ContractFile),
    Path(Path),
    Transaction(Transaction),
    DexMarket(DexMarket),
    DexOrder(DexOrder),
    OhlcData { market_id: String, block_bucket: u32, data: OHLCData },
    OrderCancellation { market_id: String, order_id: String },
    Generic { kind: String, id: EntityRef, fields: Map<String, Value> },
}
