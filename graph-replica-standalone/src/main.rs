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

mod config;

use anyhow::Context;
use config::Config;
use graph_replica_common::{config::ConfigExt, telemetry};
use graph_replica_core::domain::registry::NetworkRegistry;
use graph_replica_store::domain::snapshot::SnapshotController;
use graph_replica_store::domain::store::GraphStore;
use graph_replica_store::infra::dgraph::DgraphStore;
use graph_replica_store::infra::snapshot::{command::CommandSnapshotBackend, noop::NoopSnapshotBackend};
use graph_replica_worker::application;
use graph_replica_worker::domain::InProcessQueue;
use log::{error, info};
use std::panic;
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};

#[tokio::main]
async fn main() {
    telemetry::init_logging();
    panic::set_hook(Box::new(|panic| error!(panic:%; "process panicked")));

    if let Err(error) = run().await {
        let backtrace = error.backtrace();
        let error = format!("{error:#}");
        error!(error, backtrace:%; "process exited with ERROR");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let sigterm = signal(SignalKind::terminate()).expect("SIGTERM handler can be registered");

    let config = Config::load().context("load configuration")?;
    info!(config:?; "starting");

    let Config {
        apply_schema,
        schema_path,
        registry_path,
        worker_config,
        store_config,
        snapshot_config,
        telemetry_config,
        #[cfg(feature = "cloud")]
        nats_config,
    } = config;

    telemetry::init_tracing(telemetry_config.tracing_config);
    telemetry::init_metrics(telemetry_config.metrics_config);

    let registry = NetworkRegistry::new(registry_path);
    registry
        .get(&worker_config.network_prefix)
        .context("read network registry")?
        .with_context(|| format!("network prefix {:?} is not registered", worker_config.network_prefix))?;

    let store = DgraphStore::new(store_config).context("create graph store client")?;

    if apply_schema {
        let schema_path = schema_path.context("schema_path is required when apply_schema is set")?;
        let schema = std::fs::read_to_string(&schema_path)
            .with_context(|| format!("read schema file at {}", schema_path.display()))?;
        store.apply_schema(&schema).await.context("apply graph schema")?;
    }

    let queue = Arc::new(InProcessQueue::new(worker_config.queue_capacity));

    #[cfg(feature = "cloud")]
    let publisher = graph_replica_common::infra::pub_sub::nats::NatsPubSub::connect(nats_config)
        .await
        .context("connect to NATS")?;
    #[cfg(not(feature = "cloud"))]
    let publisher = graph_replica_common::infra::pub_sub::LocalPubSub::new();

    let result = match snapshot_config {
        Some(snapshot_config) => {
            let controller = SnapshotController::new(CommandSnapshotBackend::new(snapshot_config));
            application::run(worker_config, store, Some(controller), queue, publisher, sigterm).await
        }
        None => {
            let controller: SnapshotController<NoopSnapshotBackend> =
                SnapshotController::new(NoopSnapshotBackend);
            application::run(worker_config, store, Some(controller), queue, publisher, sigterm).await
        }
    };

    telemetry::flush_tracing();
    result.context("run graph replica worker")
}
