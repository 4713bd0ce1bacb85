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

//! DEX sub-transform (spec §4.7): `dex`/`dexb`/`dexs` paths nest a market, its order book and its
//! OHLC candles under `<token-prefix>/<quote>/...`.

use super::OperationType;
use crate::domain::{DexMarket, DexOrder, DexOrderStatus, Mutation, OHLCData};
use graph_replica_common::domain::ids::{EntityRef, LocalId, NameRef};
use graph_replica_common::domain::protocol::{Quote, Token};
use serde_json::Value;

#[derive(Debug, Default)]
pub struct DexTransformResult {
    pub market: Option<DexMarket>,
    pub orders: Vec<DexOrder>,
    pub cancellations: Vec<Mutation>,
    pub ohlc: Vec<Mutation>,
}

/// `<prefix>/<quote>/{buyOrders,sellOrders}/<rate:txid>` for orders, keyed by a single combined
/// segment; `<prefix>/<quote>/days/<blockBucket>` for candles.
pub fn transform_dex(
    prefix: &str,
    path: &[String],
    op_type: OperationType,
    data: &Value,
) -> DexTransformResult {
    let mut result = DexTransformResult::default();

    let Some(token) = Token::from_dex_prefix(prefix) else {
        return result;
    };
    let Some(quote_segment) = path.get(1) else {
        return result;
    };
    let Some(quote) = Quote::from_path_segment(quote_segment) else {
        return result;
    };

    let market = DexMarket { token, quote, buy_orders: Vec::new(), sell_orders: Vec::new() };
    let market_id = market.id();

    match path.get(2).map(String::as_str) {
        Some("buyOrders") | Some("sellOrders") => {
            let Some(order_key) = path.get(3) else { return result };
            let Some((rate_segment, tx_id)) = order_key.split_once(':') else { return result };

            if op_type == OperationType::Del {
                result.cancellations.push(Mutation::OrderCancellation {
                    market_id: market_id.clone(),
                    order_id: format!("{market_id}:{rate_segment}:{tx_id}"),
                });
                return result;
            }

            let Some(object) = data.as_object() else { return result };
            let rate = rate_segment.parse::<f64>().unwrap_or(0.0);
            let amount = object.get("amount").and_then(Value::as_i64).unwrap_or(0);
            let filled = object.get("filled").and_then(Value::as_i64).unwrap_or(0);
            let from = object
                .get("from")
                .and_then(Value::as_str)
                .map(|name| EntityRef::from(NameRef(name.to_string())))
                .unwrap_or_else(|| EntityRef::from(LocalId::new("unknown_dex_party")));
            let expire_block = object.get("expireBlock").and_then(Value::as_u64).map(|n| n as u32);

            let mut order = DexOrder {
                id: format!("{market_id}:{rate_segment}:{tx_id}"),
                market_id: market_id.clone(),
                rate,
                amount,
                filled,
                remaining: 0,
                status: DexOrderStatus::Open,
                from,
                expire_block,
                token_amount: None,
            };
            order.recompute();

            result.market = Some(market);
            result.orders.push(order);
        }
        Some("days") => {
            let Some(bucket) = path.get(3).and_then(|s| s.parse::<u32>().ok()) else { return result };
            let Some(object) = data.as_object() else { return result };

            let field = |key: &str| object.get(key).and_then(Value::as_f64).unwrap_or(0.0);
            let ohlc = OHLCData {
                open: field("o"),
                high: field("t"),
                low: field("b"),
                close: field("c"),
                volume_quote: object.get("d").and_then(Value::as_i64).unwrap_or(0),
                volume_token: object.get("v").and_then(Value::as_i64).unwrap_or(0),
            };

            result.ohlc.push(Mutation::OhlcData { market_id, block_bucket: bucket, data: ohlc });
        }
        _ => {}
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn buy_order_recomputes_status_from_fill_ratio() {
        let data = json!({"amount": 1000, "filled": 1000, "from": "alice"});
        let result = transform_dex(
            "dex",
            &["dex".into(), "hive".into(), "buyOrders".into(), "0.5:tx1".into()],
            OperationType::Put,
            &data,
        );
        assert_eq!(result.orders.len(), 1);
        assert_eq!(result.orders[0].status, DexOrderStatus::Filled);
        assert_eq!(result.market.unwrap().id(), "Larynx:Hive");
    }

    #[test]
    fn partial_fill_computes_remaining_and_token_amount() {
        let data = json!({"amount": 500, "filled": 200, "from": "alice", "expireBlock": 5_000_000});
        let result = transform_dex(
            "dexs",
            &["dexs".into(), "hbd".into(), "sellOrders".into(), "100.000000:tx1".into()],
            OperationType::Put,
            &data,
        );
        assert_eq!(result.orders.len(), 1);
        let order = &result.orders[0];
        assert_eq!(order.status, DexOrderStatus::Partial);
        assert_eq!(order.remaining, 300);
        assert_eq!(order.token_amount, Some(5));
        assert_eq!(order.id, "Spk:Hbd:100.000000:tx1");
    }

    #[test]
    fn deleted_order_emits_cancellation_not_an_order() {
        let result = transform_dex(
            "dexb",
            &["dexb".into(), "hbd".into(), "sellOrders".into(), "1.0:tx2".into()],
            OperationType::Del,
            &Value::Null,
        );
        assert!(result.orders.is_empty());
        assert_eq!(result.cancellations.len(), 1);
        assert_eq!(result.cancellations[0], Mutation::OrderCancellation {
            market_id: "Broca:Hbd".to_string(),
            order_id: "Broca:Hbd:1.0:tx2".to_string(),
        });
    }

    #[test]
    fn order_key_without_a_colon_is_ignored() {
        let result = transform_dex(
            "dex",
            &["dex".into(), "hive".into(), "buyOrders".into(), "norate".into()],
            OperationType::Put,
            &json!({"amount": 1}),
        );
        assert!(result.orders.is_empty());
        assert!(result.market.is_none());
    }

    #[test]
    fn unknown_quote_segment_produces_nothing() {
        let result = transform_dex(
            "dex",
            &["dex".into(), "usd".into(), "buyOrders".into(), "1:tx3".into()],
            OperationType::Put,
            &json!({"amount": 1}),
        );
        assert!(result.market.is_none());
        assert!(result.orders.is_empty());
    }

    #[test]
    fn ohlc_bucket_reads_single_letter_wire_keys() {
        let data = json!({"o": 1.0, "t": 2.0, "b": 0.5, "c": 1.5, "d": 100, "v": 50});
        let result = transform_dex(
            "dex",
            &["dex".into(), "hive".into(), "days".into(), "12345".into()],
            OperationType::Put,
            &data,
        );
        assert_eq!(result.ohlc.len(), 1);
        let Mutation::OhlcData { market_id, block_bucket, data } = &result.ohlc[0] else {
            panic!("expected an OhlcData mutation");
        };
        assert_eq!(market_id, "Larynx:Hive");
        assert_eq!(*block_bucket, 12345);
        assert_eq!(data.open, 1.0);
        assert_eq!(data.high, 2.0);
        assert_eq!(data.low, 0.5);
        assert_eq!(data.close, 1.5);
        assert_eq!(data.volume_quote, 100);
        assert_eq!(data.volume_token, 50);
    }
}
