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

//! Backend used when no snapshot pool is configured: every call fails immediately so
//! [crate::domain::snapshot::SnapshotController] degrades to its logged-warning no-op path on
//! the first attempt, rather than the caller having to know up front that nothing is configured.

use crate::domain::snapshot::SnapshotBackend;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("no snapshot pool configured")]
pub struct NotConfigured;

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSnapshotBackend;

impl SnapshotBackend for NoopSnapshotBackend {
    type Error = NotConfigured;

    async fn create(&self, _block_num: u32, _tag: &str) -> Result<(), Self::Error> {
        Err(NotConfigured)
    }

    async fn rollback(&self, _block_num: u32) -> Result<(), Self::Error> {
        Err(NotConfigured)
    }

    async fn clone_checkpoint(&self, _block_num: u32, _name: &str) -> Result<(), Self::Error> {
        Err(NotConfigured)
    }

    async fn diff(&self, _a: u32, _b: u32) -> Result<Value, Self::Error> {
        Err(NotConfigured)
    }
}
