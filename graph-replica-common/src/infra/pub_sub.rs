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

//! [Publisher]/[Subscriber] implementations: an in-process broadcast-channel bus for the
//! `standalone` deployment and a NATS-backed bus for the `cloud` one.

pub mod local;

#[cfg(feature = "cloud")]
pub mod nats;

pub use local::LocalPubSub;

#[cfg(feature = "cloud")]
pub use nats::NatsPubSub;
