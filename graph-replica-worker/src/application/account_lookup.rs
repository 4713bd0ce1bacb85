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

//! Bridges `graph-replica-core`'s [AccountLookup] to a concrete [GraphStore], so the Account
//! Cache's third lookup step (spec §4.2) falls through to a real query instead of a fake.

use fastrace::trace;
use graph_replica_core::domain::account_cache::AccountLookup;
use graph_replica_store::domain::store::GraphStore;
use std::collections::BTreeMap;

const FIND_ACCOUNT_BY_USERNAME: &str = "{ account(func: eq(username, $username)) { uid } }";

pub struct StoreAccountLookup<'a, S> {
    store: &'a S,
}

impl<'a, S> StoreAccountLookup<'a, S> {
    pub fn new(store: &'a S) -> Self {
        StoreAccountLookup { store }
    }
}

impl<'a, S: GraphStore> AccountLookup for StoreAccountLookup<'a, S> {
    type Error = S::Error;

    #[trace]
    async fn find_by_username(&self, username: &str) -> Result<Option<u64>, Self::Error> {
        let vars = BTreeMap::from([("$username".to_string(), username.to_string())]);
        let response = self.store.query(FIND_ACCOUNT_BY_USERNAME, &vars).await?;

        let uid = response
            .get("account")
            .and_then(|rows| rows.as_array())
            .and_then(|rows| rows.first())
            .and_then(|row| row.get("uid"))
            .and_then(|uid| uid.as_str())
            .and_then(|uid| u64::from_str_radix(uid.trim_start_matches("0x"), 16).ok());

        Ok(uid)
    }
}
