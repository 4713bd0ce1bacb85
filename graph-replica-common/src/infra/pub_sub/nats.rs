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

//! NATS core-publish-backed [Publisher]/[Subscriber], for the `cloud` deployment where ingest and
//! the event consumers run as separate processes (or replicas).

use crate::domain::{Event, Publisher, Subscriber};
use fastrace::trace;
use futures::{Stream, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub urls: Vec<String>,

    #[serde(default)]
    pub credentials: Option<SecretString>,
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("failed to connect to NATS: {0}")]
    Connect(#[source] async_nats::ConnectError),
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to serialize event: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to publish event: {0}")]
    Publish(#[source] async_nats::PublishError),
}

#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error("failed to subscribe: {0}")]
    Subscribe(#[source] async_nats::SubscribeError),

    #[error("failed to deserialize event: {0}")]
    Deserialize(#[source] serde_json::Error),
}

/// Cheaply [Clone]-able handle to a NATS connection, shared between the worker that publishes
/// ingest-completion events and any process that wants to react to them.
#[derive(Clone)]
pub struct NatsPubSub {
    client: async_nats::Client,
}

impl NatsPubSub {
    #[trace]
    pub async fn connect(config: Config) -> Result<Self, ConnectError> {
        let mut options = async_nats::ConnectOptions::new();
        if let Some(credentials) = &config.credentials {
            options = options
                .token(credentials.expose_secret().to_string())
                .retry_on_initial_connect();
        } else {
            options = options.retry_on_initial_connect();
        }

        let client = options
            .connect(config.urls)
            .await
            .map_err(ConnectError::Connect)?;

        Ok(Self { client })
    }
}

impl Publisher for NatsPubSub {
    type Error = PublishError;

    #[trace]
    async fn publish<E: Event>(&mut self, event: &E) -> Result<(), Self::Error> {
        let payload = serde_json::to_vec(event).map_err(PublishError::Serialize)?;
        self.client
            .publish(E::SUBJECT, payload.into())
            .await
            .map_err(PublishError::Publish)?;
        Ok(())
    }
}

impl Subscriber for NatsPubSub {
    type Error = SubscribeError;

    fn subscribe<E: Event>(&self) -> impl Stream<Item = Result<E, Self::Error>> + Send {
        let client = self.client.clone();

        async_stream::try_stream! {
            let mut subscription = client
                .subscribe(E::SUBJECT)
                .await
                .map_err(SubscribeError::Subscribe)?;

            while let Some(message) = subscription.next().await {
                yield serde_json::from_slice(&message.payload)
                    .map_err(SubscribeError::Deserialize)?;
            }
        }
    }
}
