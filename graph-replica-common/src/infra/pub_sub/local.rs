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

//! In-process [Publisher]/[Subscriber] backed by [tokio::sync::broadcast], one channel per
//! subject. Used by the `standalone` binary, where ingest and the event consumers live in the
//! same process and a queue broker would be pure overhead.

use crate::domain::{Event, Publisher, Subscriber};
use dashmap::DashMap;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Error)]
pub enum LocalPubSubError {
    #[error("failed to serialize event: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to deserialize event: {0}")]
    Deserialize(#[source] serde_json::Error),

    #[error("subscriber lagged, {0} events dropped")]
    Lagged(u64),
}

/// Cheaply [Clone]-able handle to a set of per-subject broadcast channels. Publishing to a
/// subject with no subscribers is a no-op, matching how `async-nats` core publish behaves.
#[derive(Clone, Default)]
pub struct LocalPubSub {
    channels: Arc<DashMap<&'static str, broadcast::Sender<Vec<u8>>>>,
}

impl LocalPubSub {
    pub fn new() -> Self {
        Self::default()
    }

    fn channel(&self, subject: &'static str) -> broadcast::Sender<Vec<u8>> {
        self.channels
            .entry(subject)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

impl Publisher for LocalPubSub {
    type Error = LocalPubSubError;

    async fn publish<E: Event>(&mut self, event: &E) -> Result<(), Self::Error> {
        let payload = serde_json::to_vec(event).map_err(LocalPubSubError::Serialize)?;
        // No subscribers is not an error: it mirrors fire-and-forget queue semantics.
        let _ = self.channel(E::SUBJECT).send(payload);
        Ok(())
    }
}

impl Subscriber for LocalPubSub {
    type Error = LocalPubSubError;

    fn subscribe<E: Event>(&self) -> impl Stream<Item = Result<E, Self::Error>> + Send {
        let receiver = self.channel(E::SUBJECT).subscribe();

        BroadcastStream::new(receiver).map(|item| match item {
            Ok(payload) => {
                serde_json::from_slice(&payload).map_err(LocalPubSubError::Deserialize)
            }
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                Err(LocalPubSubError::Lagged(skipped))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OperationBatchIndexed;

    #[tokio::test]
    async fn published_event_reaches_subscriber() {
        let mut bus = LocalPubSub::new();
        let mut events = Box::pin(bus.subscribe::<OperationBatchIndexed>());

        let event = OperationBatchIndexed {
            fork_id: Default::default(),
            block_num: 42,
            max_processed_index: Some(7),
            caught_up: true,
        };
        bus.publish(&event).await.expect("publish");

        let received = events.next().await.expect("stream item").expect("decode");
        assert_eq!(received, event);
    }

    #[tokio::test]
    async fn publish_without_subscribers_does_not_error() {
        let mut bus = LocalPubSub::new();
        let event = OperationBatchIndexed {
            fork_id: Default::default(),
            block_num: 1,
            max_processed_index: None,
            caught_up: false,
        };
        bus.publish(&event).await.expect("publish");
    }
}
