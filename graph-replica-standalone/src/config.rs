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

use graph_replica_core::domain::registry;
use graph_replica_store::infra::{dgraph, snapshot::command};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Applies `schema_path`'s contents via `apply_schema` before starting the worker.
    #[serde(default)]
    pub apply_schema: bool,

    pub schema_path: Option<PathBuf>,

    #[serde(default = "registry::default_path")]
    pub registry_path: PathBuf,

    #[serde(rename = "worker")]
    pub worker_config: graph_replica_worker::application::Config,

    #[serde(rename = "store")]
    pub store_config: dgraph::Config,

    /// Shells out to a snapshot/clone tool when present; degrades to [NoopSnapshotBackend] when
    /// absent (spec.md §4.9).
    ///
    /// [NoopSnapshotBackend]: graph_replica_store::infra::snapshot::noop::NoopSnapshotBackend
    #[serde(rename = "snapshot", default)]
    pub snapshot_config: Option<command::Config>,

    #[serde(rename = "telemetry")]
    pub telemetry_config: graph_replica_common::telemetry::Config,

    #[cfg(feature = "cloud")]
    #[serde(rename = "nats")]
    pub nats_config: graph_replica_common::infra::pub_sub::nats::Config,
}
