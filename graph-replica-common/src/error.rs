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

//! Shared error taxonomy (spec.md §7). Lower-level crates define their own `thiserror` enums for
//! their own failure modes and wrap them into one of these kinds at the boundary where the
//! distinction starts to matter operationally (retry vs. drop vs. fatal).

use std::error::Error as StdError;
use thiserror::Error;

/// Convenience alias matching the teacher's use of a boxed standard error for test doubles.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// The error kinds enumerated in spec.md §7, independent of which component raised them.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// Graph store, queue or snapshot I/O that is expected to succeed on retry. Does not advance
    /// the fork tip; the job is requeued with backoff.
    #[error("transient I/O failure: {0}")]
    TransientIo(#[source] BoxError),

    /// An operation whose path or payload the coercion layer could not rescue. Logged with the
    /// full operation and dropped; the rest of the batch still applies.
    #[error("malformed operation at path {path}: {reason}")]
    MalformedOperation { path: String, reason: String },

    /// The graph schema could not be applied at startup. Fatal.
    #[error("schema conflict: {0}")]
    SchemaConflict(String),

    /// Not really an error: observing a second block at a height already claimed by another
    /// fork. Carried as a variant so callers can match on it without resorting to string
    /// inspection of a generic I/O failure.
    #[error("fork diverged at block {block_num}, parent {parent_hash}")]
    ForkDivergence { block_num: u32, parent_hash: String },

    /// The processed-operation cache recognized this operation as already applied.
    #[error("duplicate operation {block_num}:{index}")]
    DuplicateOperation { block_num: u32, index: u32 },

    /// Inbound request failed signature/timestamp/whitelist verification.
    #[error("authentication failed: {0}")]
    AuthFailure(String),

    /// The snapshot facility is unavailable; the caller should treat this as success with a
    /// logged warning, never as a hard failure.
    #[error("snapshot facility unavailable: {0}")]
    SnapshotUnavailable(String),
}

impl ErrorKind {
    /// Whether a job experiencing this error should be retried with backoff rather than dropped
    /// or surfaced as a terminal failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::TransientIo(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_io_is_retryable() {
        assert!(ErrorKind::TransientIo(anyhow::anyhow!("boom").into()).is_retryable());
        assert!(
            !ErrorKind::DuplicateOperation {
                block_num: 1,
                index: 0
            }
            .is_retryable()
        );
    }
}
