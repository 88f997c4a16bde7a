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

//! In-process transport: one FIFO queue per node, all nodes in one
//! process. Used by tests and by `--pseudo` runs.

use async_trait::async_trait;
use eau2_common::types::NodeId;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;

use crate::error::{NetworkError, NetworkResult};
use crate::message::Message;
use crate::Network;

/// One node's handle onto the shared queues. The handle pins its node
/// index at creation, standing in for per-thread registration.
pub struct PseudoNetwork {
    index: NodeId,
    senders: Vec<UnboundedSender<Message>>,
    receiver: Mutex<UnboundedReceiver<Message>>,
}

impl PseudoNetwork {
    /// Creates the whole cluster at once: one handle per node, index
    /// equal to the handle's position.
    pub fn create(num_nodes: usize) -> Vec<PseudoNetwork> {
        assert!(num_nodes >= 1, "a cluster has at least one node");
        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..num_nodes).map(|_| mpsc::unbounded_channel()).unzip();
        receivers
            .into_iter()
            .enumerate()
            .map(|(index, receiver)| PseudoNetwork {
                index: index as NodeId,
                senders: senders.clone(),
                receiver: Mutex::new(receiver),
            })
            .collect()
    }
}

#[async_trait]
impl Network for PseudoNetwork {
    async fn register(&self) -> NetworkResult<()> {
        Ok(())
    }

    fn index(&self) -> NodeId {
        self.index
    }

    fn num_nodes(&self) -> usize {
        self.senders.len()
    }

    async fn send(&self, msg: Message) -> NetworkResult<()> {
        let target = msg.target as usize;
        let sender = self
            .senders
            .get(target)
            .ok_or(NetworkError::UnknownNode(msg.target))?;
        sender.send(msg).map_err(|_| NetworkError::Closed)
    }

    async fn recv(&self) -> NetworkResult<Message> {
        self.receiver
            .lock()
            .await
            .recv()
            .await
            .ok_or(NetworkError::Closed)
    }
}
