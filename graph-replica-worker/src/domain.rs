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

pub mod ingest;
pub mod job;
pub mod processed_ops;
pub mod queue;
pub mod retry;

pub use ingest::{IngestError, IngestSource};
pub use job::{BlockData, CheckpointNotification, ConsensusData, IncomingOperation, Job, JobEnvelope, JobId};
pub use processed_ops::ProcessedOpCache;
pub use queue::{InProcessQueue, KeyedSerializer, Queue};
pub use retry::RetryPolicy;
