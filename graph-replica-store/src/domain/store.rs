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

//! Graph Store Adapter (C1, spec §4.1): a thin typed wrapper over the graph database. No retry
//! logic lives here — failures propagate to the worker, which owns backoff policy.

use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;

/// Maps a blank-node label (`_:account_alice`) to the uid the store assigned it on commit, so
/// callers can correlate logical ids with stored ones across a batch.
#[derive(Debug, Clone, Default, derive_more::Deref, derive_more::DerefMut)]
pub struct UidMap(pub BTreeMap<String, u64>);

/// Set-mutation and delete-mutation documents, already shaped for the store's wire format (blank
/// node labels, `uid` fields, predicate/value pairs). The worker builds these from
/// `graph-replica-core::domain::Mutation`; this crate does not know that type.
#[derive(Debug, Clone, Default)]
pub struct MutationBatch {
    pub set: Vec<Value>,
    pub delete: Vec<Value>,
}

impl MutationBatch {
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.delete.is_empty()
    }
}

/// Implemented by a concrete backend (`graph-replica-store::infra::dgraph::DgraphStore`). Kept as
/// a trait so the worker and tests can swap in a fake.
pub trait GraphStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;
    type Txn: Transaction<Error = Self::Error>;

    fn apply_schema(&self, schema: &str) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn query(
        &self,
        dql: &str,
        vars: &BTreeMap<String, String>,
    ) -> impl Future<Output = Result<Value, Self::Error>> + Send;

    /// Like [GraphStore::query] but against the shared/global namespace rather than one scoped to
    /// a network prefix (spec §4.1's "namespace-stripped" variant).
    fn query_global(
        &self,
        dql: &str,
        vars: &BTreeMap<String, String>,
    ) -> impl Future<Output = Result<Value, Self::Error>> + Send;

    fn health(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn new_transaction(&self) -> impl Future<Output = Result<Self::Txn, Self::Error>> + Send;
}

/// A single graph-store transaction. Either [Transaction::commit]s atomically or
/// [Transaction::discard]s (spec §3 invariant 8); there is no partial-apply path.
pub trait Transaction: Send + Sized {
    type Error: std::error::Error + Send + Sync + 'static;

    fn mutate(
        &mut self,
        batch: MutationBatch,
    ) -> impl Future<Output = Result<UidMap, Self::Error>> + Send;

    fn commit(self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn discard(self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_batch_is_empty() {
        assert!(MutationBatch::default().is_empty());
        let mut batch = MutationBatch::default();
        batch.set.push(Value::Null);
        assert!(!batch.is_empty());
    }
}
