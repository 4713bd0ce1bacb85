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

//! Feed Parser (C7, spec §4.5): classifies one `<blockNum>:<txId>` feed entry into a transaction
//! category. Pure function, no I/O (spec §5 requires parsing stay pure).

use crate::domain::{Transaction, TransactionCategory, TokenAmount};
use graph_replica_common::domain::protocol::Token;
use serde_json::Value;

/// Splits a feed key of the form `<blockNum>:<txId>` into its parts. Returns `None` if `key`
/// doesn't contain the separator; callers treat that as malformed and fall back to `UNKNOWN`.
fn split_feed_key(key: &str) -> Option<(u32, &str)> {
    let (block_num, tx_id) = key.split_once(':')?;
    let block_num = block_num.parse().ok()?;
    Some((block_num, tx_id))
}

/// Classifies a feed entry's `payload` into a [Transaction], using `key` (`<blockNum>:<txId>`)
/// for identity. Unknown shapes pass through with [TransactionCategory::Unknown] and the raw
/// payload preserved (spec §4.5); every other category also keeps the raw payload for audit
/// (SPEC_FULL §8 supplement).
pub fn parse_feed_entry(key: &str, payload: &Value) -> Transaction {
    let Some((block_num, tx_id)) = split_feed_key(key) else {
        return Transaction {
            block_num: 0,
            tx_id: key.to_string(),
            category: TransactionCategory::Unknown,
            amount: None,
            from: None,
            to: None,
            order_type: None,
            nft_id: None,
            contract_id: None,
            raw: payload.clone(),
        };
    };

    let object = payload.as_object();
    let ty = object
        .and_then(|o| o.get("type"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    let amount = object.and_then(|o| parse_amount(o));
    let from = field_str(object, "from").or_else(|| field_str(object, "f"));
    let to = field_str(object, "to").or_else(|| field_str(object, "t"));

    let category = match ty {
        "transfer" | "send" => TransactionCategory::TokenTransfer,
        "order" | "dex_order" => TransactionCategory::DexOrder,
        "trade" | "dex_trade" => TransactionCategory::DexTrade,
        "nft_mint" => TransactionCategory::NftMint,
        "nft_transfer" => TransactionCategory::NftTransfer,
        "nft_sale" => TransactionCategory::NftSale,
        "power_up" | "pu" => TransactionCategory::PowerUp,
        "power_down" | "pd" => TransactionCategory::PowerDown,
        "storage_upload" => TransactionCategory::StorageUpload,
        "storage_cancel" => TransactionCategory::StorageCancel,
        _ => TransactionCategory::Unknown,
    };

    Transaction {
        block_num,
        tx_id: tx_id.to_string(),
        category,
        amount,
        from,
        to,
        order_type: field_str(object, "orderType"),
        nft_id: field_str(object, "nftId"),
        contract_id: field_str(object, "contractId"),
        raw: payload.clone(),
    }
}

fn field_str(object: Option<&serde_json::Map<String, Value>>, key: &str) -> Option<String> {
    object
        .and_then(|o| o.get(key))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn parse_amount(object: &serde_json::Map<String, Value>) -> Option<TokenAmount> {
    let milliunits = match object.get("amount")? {
        Value::Number(n) => n.as_i64()? as i128,
        Value::String(s) => s
            .split(',')
            .next()
            .and_then(|s| s.parse::<i128>().ok())?,
        _ => return None,
    };

    let token = field_str(Some(object), "token").and_then(|t| match t.as_str() {
        "LARYNX" => Some(Token::Larynx),
        "SPK" => Some(Token::Spk),
        "BROCA" => Some(Token::Broca),
        _ => None,
    })?;

    Some(TokenAmount { milliunits, token })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_shape_preserves_raw_payload() {
        let payload = json!({"something": "odd"});
        let tx = parse_feed_entry("100:tx1", &payload);
        assert_eq!(tx.category, TransactionCategory::Unknown);
        assert_eq!(tx.raw, payload);
        assert_eq!(tx.block_num, 100);
        assert_eq!(tx.tx_id, "tx1");
    }

    #[test]
    fn transfer_extracts_amount_and_parties() {
        let payload = json!({"type": "transfer", "amount": "1000,abc", "token": "LARYNX", "from": "alice", "to": "bob"});
        let tx = parse_feed_entry("50:tx2", &payload);
        assert_eq!(tx.category, TransactionCategory::TokenTransfer);
        assert_eq!(tx.amount, Some(TokenAmount { milliunits: 1000, token: Token::Larynx }));
        assert_eq!(tx.from.as_deref(), Some("alice"));
        assert_eq!(tx.to.as_deref(), Some("bob"));
    }

    #[test]
    fn malformed_key_falls_back_to_unknown_with_zero_block() {
        let tx = parse_feed_entry("not-a-key", &json!(null));
        assert_eq!(tx.category, TransactionCategory::Unknown);
        assert_eq!(tx.block_num, 0);
    }
}
