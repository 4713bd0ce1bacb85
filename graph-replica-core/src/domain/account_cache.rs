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

//! Account Cache (C5, spec §4.2): `username -> stable identifier` with read-through to the
//! store. The sole guarantee against account duplication across batches, so it must survive for
//! the life of the process, not just one batch.

use crate::domain::Account;
use graph_replica_common::domain::ids::{EntityRef, LocalId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;

/// Looks an account up by username against the graph store, returning its stored id if one
/// already exists. Implemented by `graph-replica-store`; kept as a trait here so the cache has
/// no dependency on the store crate.
pub trait AccountLookup {
    type Error: std::error::Error + Send + Sync + 'static;

    fn find_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<u64>, Self::Error>> + Send;
}

/// Read-mostly after initial population (spec §5): lookups take a read lock and only escalate to
/// a write lock on first sight of a username.
#[derive(Debug, Default)]
pub struct AccountCache {
    process_wide: RwLock<HashMap<String, EntityRef>>,
}

impl AccountCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// In-batch lookup only (step 1 of spec §4.2's lookup order); callers thread the in-batch map
    /// themselves since its lifetime is a single transform call, not the cache's.
    pub fn peek(&self, username: &str) -> Option<EntityRef> {
        self.process_wide.read().get(username).cloned()
    }

    /// Resolves `username` to a stable reference, creating one if necessary.
    ///
    /// Lookup order (spec §4.2): (1) caller-supplied in-batch map, (2) this process-wide cache,
    /// (3) a store query. On a full miss, mints a deterministic blank node id and marks the
    /// resulting [Account] as not pre-existing so the worker knows to emit a create.
    pub async fn ensure_account<L: AccountLookup>(
        &self,
        username: &str,
        in_batch: &mut HashMap<String, EntityRef>,
        lookup: &L,
        block_num: u32,
    ) -> Result<(EntityRef, Option<Account>), L::Error> {
        if let Some(id) = in_batch.get(username) {
            return Ok((id.clone(), None));
        }

        if let Some(id) = self.peek(username) {
            in_batch.insert(username.to_string(), id.clone());
            return Ok((id, None));
        }

        if let Some(stored_id) = lookup.find_by_username(username).await? {
            let id = EntityRef::Stored(graph_replica_common::domain::ids::StoredId(stored_id));
            self.process_wide
                .write()
                .insert(username.to_string(), id.clone());
            in_batch.insert(username.to_string(), id.clone());

            let mut account = Account::new(id.clone(), username, block_num);
            account.is_existing = true;
            return Ok((id, Some(account)));
        }

        let id: EntityRef = LocalId::for_account(username).into();
        self.process_wide
            .write()
            .insert(username.to_string(), id.clone());
        in_batch.insert(username.to_string(), id.clone());

        let account = Account::new(id.clone(), username, block_num);
        Ok((id, Some(account)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    struct EmptyStore;

    impl AccountLookup for EmptyStore {
        type Error = Infallible;

        async fn find_by_username(&self, _username: &str) -> Result<Option<u64>, Self::Error> {
            Ok(None)
        }
    }

    struct ExistingStore(u64);

    impl AccountLookup for ExistingStore {
        type Error = Infallible;

        async fn find_by_username(&self, _username: &str) -> Result<Option<u64>, Self::Error> {
            Ok(Some(self.0))
        }
    }

    #[tokio::test]
    async fn fresh_username_mints_deterministic_local_id() {
        let cache = AccountCache::new();
        let mut in_batch = HashMap::new();
        let (id, account) = cache
            .ensure_account("alice", &mut in_batch, &EmptyStore, 100)
            .await
            .unwrap();

        assert_eq!(id, LocalId::for_account("alice").into());
        assert!(!account.unwrap().is_existing);
    }

    #[tokio::test]
    async fn second_lookup_in_same_process_hits_cache_not_store() {
        let cache = AccountCache::new();
        let mut batch1 = HashMap::new();
        let (first_id, _) = cache
            .ensure_account("alice", &mut batch1, &EmptyStore, 100)
            .await
            .unwrap();

        let mut batch2 = HashMap::new();
        let (second_id, created) = cache
            .ensure_account("alice", &mut batch2, &EmptyStore, 101)
            .await
            .unwrap();

        assert_eq!(first_id, second_id);
        assert!(created.is_none(), "second batch must not recreate the account");
    }

    #[tokio::test]
    async fn existing_store_row_is_marked_is_existing() {
        let cache = AccountCache::new();
        let mut in_batch = HashMap::new();
        let (id, account) = cache
            .ensure_account("alice", &mut in_batch, &ExistingStore(0xabc), 100)
            .await
            .unwrap();

        assert_eq!(id, EntityRef::Stored(graph_replica_common::domain::ids::StoredId(0xabc)));
        assert!(account.unwrap().is_existing);
    }
}
