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

//! Logging, tracing and metrics bootstrap shared by every binary.

use fastrace::collector::Config as FastraceConfig;
use fastrace_opentelemetry::OpenTelemetryReporter;
use log::LevelFilter;
use metrics_exporter_prometheus::PrometheusBuilder;
use opentelemetry::InstrumentationScope;
use opentelemetry_otlp::{Protocol, SpanExporter, WithExportConfig};
use opentelemetry_sdk::Resource;
use serde::Deserialize;
use std::{borrow::Cow, net::SocketAddr, time::Duration};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "tracing")]
    pub tracing_config: Option<TracingConfig>,

    #[serde(rename = "metrics")]
    pub metrics_config: Option<MetricsConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TracingConfig {
    pub service_name: String,
    pub otlp_exporter_endpoint: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub address: SocketAddr,

    #[serde(default = "default_metrics_interval", with = "humantime_serde")]
    pub upkeep_interval: Duration,
}

fn default_metrics_interval() -> Duration {
    Duration::from_secs(5)
}

/// Initializes `log`-facade logging via `logforth`, including structured key-value fields. Must
/// be called exactly once, as early as possible in `main`.
pub fn init_logging() {
    logforth::starter_log::stdout().apply();
    log::set_max_level(LevelFilter::Info);
}

/// Initializes distributed tracing: fastrace spans exported as OpenTelemetry spans via OTLP, if
/// configured. Without a [TracingConfig] this is a no-op and `#[trace]`-annotated functions incur
/// only the cost of a disabled span.
pub fn init_tracing(config: Option<TracingConfig>) {
    let Some(TracingConfig {
        service_name,
        otlp_exporter_endpoint,
    }) = config
    else {
        return;
    };

    let exporter = match SpanExporter::builder()
        .with_tonic()
        .with_endpoint(otlp_exporter_endpoint)
        .with_protocol(Protocol::Grpc)
        .build()
    {
        Ok(exporter) => exporter,
        Err(error) => {
            log::error!(error:%; "cannot build OTLP span exporter, tracing disabled");
            return;
        }
    };

    let reporter = OpenTelemetryReporter::new(
        exporter,
        Cow::Owned(Resource::builder().with_service_name(service_name.clone()).build()),
        InstrumentationScope::builder(service_name).build(),
    );

    fastrace::set_reporter(reporter, FastraceConfig::default());
}

/// Initializes the Prometheus metrics exporter on `address`, if configured.
pub fn init_metrics(config: Option<MetricsConfig>) {
    let Some(MetricsConfig {
        address,
        upkeep_interval,
    }) = config
    else {
        return;
    };

    let builder = PrometheusBuilder::new()
        .with_http_listener(address)
        .upkeep_timeout(upkeep_interval);

    if let Err(error) = builder.install() {
        log::error!(error:%; "cannot install Prometheus metrics exporter, metrics disabled");
    }
}

/// Flushes buffered spans; call on graceful shutdown.
pub fn flush_tracing() {
    fastrace::flush();
}
