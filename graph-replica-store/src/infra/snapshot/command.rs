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

//! Drives an external snapshot/clone tool (e.g. a ZFS or LVM wrapper script) as a subprocess.
//! The pool prefix and dataset name it out of the shared snapshot pool; callers decide whether
//! configuring one is worthwhile versus running with [super::noop::NoopSnapshotBackend].

use crate::domain::snapshot::SnapshotBackend;
use serde_json::Value;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub program: String,
    pub pool_prefix: String,
    pub dataset: String,
}

#[derive(Debug, Error)]
pub enum CommandSnapshotError {
    #[error("spawning {program} failed: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with status {status}: {stderr}")]
    NonZeroExit {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("could not parse {program} stdout as JSON: {source}")]
    Decode {
        program: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone)]
pub struct CommandSnapshotBackend {
    config: Config,
}

impl CommandSnapshotBackend {
    pub fn new(config: Config) -> Self {
        CommandSnapshotBackend { config }
    }

    fn dataset_path(&self, suffix: &str) -> String {
        format!("{}/{}@{}", self.config.pool_prefix, self.config.dataset, suffix)
    }

    async fn run(&self, args: &[&str]) -> Result<Vec<u8>, CommandSnapshotError> {
        let output = Command::new(&self.config.program)
            .args(args)
            .output()
            .await
            .map_err(|source| CommandSnapshotError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(CommandSnapshotError::NonZeroExit {
                program: self.config.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(output.stdout)
    }
}

impl SnapshotBackend for CommandSnapshotBackend {
    type Error = CommandSnapshotError;

    async fn create(&self, block_num: u32, tag: &str) -> Result<(), Self::Error> {
        let snapshot = self.dataset_path(tag);
        let block_num = block_num.to_string();
        self.run(&["create", &snapshot, &block_num]).await.map(|_| ())
    }

    async fn rollback(&self, block_num: u32) -> Result<(), Self::Error> {
        let snapshot = self.dataset_path(&block_num.to_string());
        self.run(&["rollback", &snapshot]).await.map(|_| ())
    }

    async fn clone_checkpoint(&self, block_num: u32, name: &str) -> Result<(), Self::Error> {
        let snapshot = self.dataset_path(&block_num.to_string());
        let target = format!("{}/{}", self.config.pool_prefix, name);
        self.run(&["clone", &snapshot, &target]).await.map(|_| ())
    }

    async fn diff(&self, a: u32, b: u32) -> Result<Value, Self::Error> {
        let from = self.dataset_path(&a.to_string());
        let to = self.dataset_path(&b.to_string());
        let stdout = self.run(&["diff", &from, &to]).await?;
        serde_json::from_slice(&stdout).map_err(|source| CommandSnapshotError::Decode {
            program: self.config.program.clone(),
            source,
        })
    }
}
