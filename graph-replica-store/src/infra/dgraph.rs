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

//! Concrete [GraphStore] backed by a Dgraph-like HTTP API (`/alter`, `/query`, `/mutate`,
//! `/commit`, `/health`). One [DgraphStore] per configured network; `query_global` reaches the
//! shared namespace by passing no namespace header at all.

use crate::domain::store::{GraphStore, MutationBatch, Transaction, UidMap};
use fastrace::trace;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

const NAMESPACE_HEADER: &str = "X-Graph-Namespace";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub endpoint: String,

    /// Network prefix this store instance is scoped to, e.g. `hive`. `None` targets the shared
    /// namespace directly, equivalent to always using `query_global`.
    pub namespace: Option<String>,

    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

#[derive(Debug, Error)]
pub enum DgraphError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned status {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("could not decode response body: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("transaction already finished")]
    TransactionFinished,
}

#[derive(Debug, Clone)]
pub struct DgraphStore {
    client: Client,
    endpoint: String,
    namespace: Option<String>,
}

impl DgraphStore {
    pub fn new(config: Config) -> Result<Self, DgraphError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| DgraphError::Request { url: config.endpoint.clone(), source })?;

        Ok(DgraphStore { client, endpoint: config.endpoint, namespace: config.namespace })
    }

    #[trace]
    async fn query_with_namespace(
        &self,
        dql: &str,
        vars: &BTreeMap<String, String>,
        namespace: Option<&str>,
    ) -> Result<Value, DgraphError> {
        let url = format!("{}/query", self.endpoint);
        let mut request = self.client.post(&url).header("Content-Type", "application/dql");
        if let Some(namespace) = namespace {
            request = request.header(NAMESPACE_HEADER, namespace);
        }
        let body = json!({ "query": dql, "vars": vars });

        let response = request
            .json(&body)
            .send()
            .await
            .map_err(|source| DgraphError::Request { url: url.clone(), source })?;

        decode_response(response, "query").await
    }
}

async fn decode_response(
    response: reqwest::Response,
    endpoint: &'static str,
) -> Result<Value, DgraphError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(DgraphError::Status { endpoint, status, body });
    }
    response.json().await.map_err(DgraphError::Decode)
}

impl GraphStore for DgraphStore {
    type Error = DgraphError;
    type Txn = DgraphTransaction;

    #[trace]
    async fn apply_schema(&self, schema: &str) -> Result<(), Self::Error> {
        let url = format!("{}/alter", self.endpoint);
        let mut request = self.client.post(&url).header("Content-Type", "application/octet-stream");
        if let Some(namespace) = &self.namespace {
            request = request.header(NAMESPACE_HEADER, namespace);
        }

        let response = request
            .body(schema.to_string())
            .send()
            .await
            .map_err(|source| DgraphError::Request { url: url.clone(), source })?;

        decode_response(response, "alter").await.map(|_| ())
    }

    #[trace]
    async fn query(&self, dql: &str, vars: &BTreeMap<String, String>) -> Result<Value, Self::Error> {
        self.query_with_namespace(dql, vars, self.namespace.as_deref()).await
    }

    #[trace]
    async fn query_global(
        &self,
        dql: &str,
        vars: &BTreeMap<String, String>,
    ) -> Result<Value, Self::Error> {
        self.query_with_namespace(dql, vars, None).await
    }

    #[trace]
    async fn health(&self) -> Result<(), Self::Error> {
        let url = format!("{}/health", self.endpoint);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| DgraphError::Request { url: url.clone(), source })?;

        decode_response(response, "health").await.map(|_| ())
    }

    #[trace]
    async fn new_transaction(&self) -> Result<Self::Txn, Self::Error> {
        Ok(DgraphTransaction {
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
            namespace: self.namespace.clone(),
            start_ts: uuid::Uuid::new_v4(),
            finished: false,
        })
    }
}

pub struct DgraphTransaction {
    client: Client,
    endpoint: String,
    namespace: Option<String>,
    start_ts: uuid::Uuid,
    finished: bool,
}

#[derive(Default, Deserialize)]
struct MutateResponseBody {
    #[serde(default)]
    uids: BTreeMap<String, String>,
}

impl Transaction for DgraphTransaction {
    type Error = DgraphError;

    #[trace]
    async fn mutate(&mut self, batch: MutationBatch) -> Result<UidMap, Self::Error> {
        if self.finished {
            return Err(DgraphError::TransactionFinished);
        }
        if batch.is_empty() {
            return Ok(UidMap::default());
        }

        let url = format!("{}/mutate?startTs={}&commitNow=false", self.endpoint, self.start_ts);
        let mut request = self.client.post(&url);
        if let Some(namespace) = &self.namespace {
            request = request.header(NAMESPACE_HEADER, namespace);
        }

        let body = json!({ "set": batch.set, "delete": batch.delete });
        let response = request
            .json(&body)
            .send()
            .await
            .map_err(|source| DgraphError::Request { url: url.clone(), source })?;

        let value = decode_response(response, "mutate").await?;
        let parsed: MutateResponseBody = serde_json::from_value(value).unwrap_or_default();

        let mut uids = BTreeMap::new();
        for (label, uid) in parsed.uids {
            if let Ok(uid) = u64::from_str_radix(uid.trim_start_matches("0x"), 16) {
                uids.insert(label, uid);
            }
        }
        Ok(UidMap(uids))
    }

    #[trace]
    async fn commit(mut self) -> Result<(), Self::Error> {
        if self.finished {
            return Err(DgraphError::TransactionFinished);
        }
        self.finished = true;

        let url = format!("{}/commit?startTs={}", self.endpoint, self.start_ts);
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|source| DgraphError::Request { url: url.clone(), source })?;

        decode_response(response, "commit").await.map(|_| ())
    }

    #[trace]
    async fn discard(mut self) -> Result<(), Self::Error> {
        if self.finished {
            return Err(DgraphError::TransactionFinished);
        }
        self.finished = true;

        let url = format!("{}/commit?startTs={}&abort=true", self.endpoint, self.start_ts);
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|source| DgraphError::Request { url: url.clone(), source })?;

        decode_response(response, "abort").await.map(|_| ())
    }
}
