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

//! The per-node application harness: registers the network handle,
//! owns the node's KV store, and coordinates cluster shutdown.

use eau2_common::types::NodeId;
use eau2_network::message::{Body, Message};
use eau2_network::NetworkRef;
use eau2_storage::error::StorageError;
use eau2_storage::{KVStore, KVStoreRef};

use crate::error::DataFrameResult;

pub struct Application {
    network: NetworkRef,
    store: KVStoreRef,
}

impl Application {
    /// Joins the cluster and brings up this node's store. For the TCP
    /// network this blocks in the registration rendezvous.
    pub async fn new(network: NetworkRef) -> DataFrameResult<Self> {
        network.register().await.map_err(StorageError::from)?;
        let store = KVStore::new(network.clone());
        tracing::info!(
            node = network.index(),
            num_nodes = network.num_nodes(),
            "application started"
        );
        Ok(Self { network, store })
    }

    pub fn this_store(&self) -> &KVStoreRef {
        &self.store
    }

    pub fn this_node(&self) -> NodeId {
        self.network.index()
    }

    pub fn num_nodes(&self) -> usize {
        self.network.num_nodes()
    }

    /// Broadcasts `Kill` to every other node, then stops this node's
    /// own servicer and joins it.
    pub async fn stop_all(&self) -> DataFrameResult<()> {
        for node in 0..self.num_nodes() as NodeId {
            if node == self.this_node() {
                continue;
            }
            self.network
                .send(Message::new(self.this_node(), node, 0, Body::Kill))
                .await
                .map_err(StorageError::from)?;
        }
        self.stop().await
    }

    /// Stops only this node.
    pub async fn stop(&self) -> DataFrameResult<()> {
        self.store.stop_service().await?;
        self.store.wait_to_close().await;
        Ok(())
    }

    /// Blocks until this node's servicer exits, normally on a peer's
    /// `Kill` broadcast.
    pub async fn await_stop(&self) {
        self.store.wait_to_close().await;
    }
}
