// Copyright 2022 eau2 authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The message transport between nodes: one in-process implementation
//! for single-machine clusters and one TCP implementation with a
//! rendezvous bring-up through node 0.

pub mod error;
pub mod ip;
pub mod message;
pub mod pseudo;

use std::sync::Arc;

use async_trait::async_trait;
use eau2_common::types::NodeId;

use crate::error::NetworkResult;
use crate::message::Message;

/// Minimal transport contract. Implementations are internally
/// synchronized; `send`/`recv` may be called from any task.
#[async_trait]
pub trait Network: Send + Sync {
    /// Joins the cluster. For the TCP network this runs the rendezvous
    /// bring-up; the in-process network is registered at creation.
    async fn register(&self) -> NetworkResult<()>;

    /// This node's index.
    fn index(&self) -> NodeId;

    /// Cluster size. Every peer derives chunk placement from it.
    fn num_nodes(&self) -> usize;

    /// Enqueues a message for its target. Messages between the same two
    /// nodes are delivered in send order.
    async fn send(&self, msg: Message) -> NetworkResult<()>;

    /// Blocks until a message addressed to this node arrives.
    async fn recv(&self) -> NetworkResult<Message>;
}

pub type NetworkRef = Arc<dyn Network>;
