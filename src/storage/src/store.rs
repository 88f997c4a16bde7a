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

//! The per-node key/value store. Local operations go through one lock
//! over the map; operations on keys homed elsewhere become message
//! exchanges handled by the servicer task.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use eau2_common::types::{Key, NodeId, Value};
use eau2_network::message::{Body, Message};
use eau2_network::NetworkRef;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::error::{StorageError, StorageResult};
use crate::stats::StoreStats;

/// How often blocked waiters re-check the shutdown flag. Wakeups for
/// data arrival come from notifications, not from this interval.
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

/// Single-slot rendezvous for the one outstanding remote get.
#[derive(Default)]
struct ReplySlot {
    slot: parking_lot::Mutex<Option<(Key, Value)>>,
    posted: Notify,
}

pub struct KVStore {
    index: NodeId,
    network: NetworkRef,
    entries: parking_lot::RwLock<HashMap<Key, Value>>,
    /// Signaled on every local insert; local get-and-wait callers and
    /// Get waiters sleep on it.
    inserted: Notify,
    reply: ReplySlot,
    /// Held across a Get/Reply exchange: one outstanding remote get per
    /// store, overlapping callers queue here.
    remote_get: tokio::sync::Mutex<()>,
    next_id: AtomicU64,
    shutdown: AtomicBool,
    servicer: parking_lot::Mutex<Option<JoinHandle<()>>>,
    stats: StoreStats,
}

pub type KVStoreRef = Arc<KVStore>;

impl KVStore {
    /// Creates the store and spawns its servicer on the current
    /// runtime.
    pub fn new(network: NetworkRef) -> KVStoreRef {
        let store = Arc::new(Self {
            index: network.index(),
            network,
            entries: parking_lot::RwLock::new(HashMap::new()),
            inserted: Notify::new(),
            reply: ReplySlot::default(),
            remote_get: tokio::sync::Mutex::new(()),
            next_id: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
            servicer: parking_lot::Mutex::new(None),
            stats: StoreStats::default(),
        });
        let handle = tokio::spawn({
            let store = store.clone();
            async move { store.serve().await }
        });
        *store.servicer.lock() = Some(handle);
        store
    }

    pub fn index(&self) -> NodeId {
        self.index
    }

    pub fn num_nodes(&self) -> usize {
        self.network.num_nodes()
    }

    pub fn network(&self) -> &NetworkRef {
        &self.network
    }

    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn insert_local(&self, key: Key, value: Value) {
        self.entries.write().insert(key, value);
        self.stats.record_local_put();
        self.inserted.notify_waiters();
    }

    /// Stores the value at the key's home node. The value is consumed:
    /// locally it moves into the map, remotely it rides a `Put` message.
    pub async fn put(&self, key: Key, value: Value) -> StorageResult<()> {
        if key.node() == self.index {
            self.insert_local(key, value);
            return Ok(());
        }
        self.stats.record_remote_put();
        let msg = Message::new(self.index, key.node(), self.next_id(), Body::Put(key, value));
        self.network.send(msg).await?;
        Ok(())
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Local-only, never blocks. Callers must hold a presence
    /// precondition or use [`KVStore::get_and_wait_value`].
    pub fn get_value(&self, key: &Key) -> StorageResult<Value> {
        assert_eq!(
            key.node(),
            self.index,
            "get_value is local-only; key {} is homed elsewhere",
            key
        );
        self.stats.record_value_get();
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::KeyNotFound(key.clone()))
    }

    /// Blocks until the value exists. A local key waits for the insert
    /// notification; a remote key becomes a `Get` and waits on the
    /// reply rendezvous. Returns `ShuttingDown` once the store stops.
    pub async fn get_and_wait_value(&self, key: &Key) -> StorageResult<Value> {
        self.stats.record_value_get();
        if key.node() == self.index {
            return self.wait_local(key).await;
        }

        self.stats.record_remote_get();
        let _outstanding = self.remote_get.lock().await;
        let msg = Message::new(
            self.index,
            key.node(),
            self.next_id(),
            Body::Get(key.clone()),
        );
        self.network.send(msg).await?;
        self.await_reply(key).await
    }

    /// Waits for a locally-homed key to appear. The notified future is
    /// armed before the re-check so an insert between check and sleep
    /// cannot be lost; the timeout only bounds shutdown observation.
    async fn wait_local(&self, key: &Key) -> StorageResult<Value> {
        loop {
            if let Some(value) = self.entries.read().get(key) {
                return Ok(value.clone());
            }
            if self.shutdown.load(Ordering::SeqCst) {
                return Err(StorageError::ShuttingDown);
            }
            let notified = self.inserted.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Some(value) = self.entries.read().get(key) {
                return Ok(value.clone());
            }
            let _ = tokio::time::timeout(SHUTDOWN_POLL, notified).await;
        }
    }

    async fn await_reply(&self, key: &Key) -> StorageResult<Value> {
        loop {
            {
                let mut slot = self.reply.slot.lock();
                if let Some((reply_key, value)) = slot.take() {
                    if &reply_key == key {
                        return Ok(value);
                    }
                    // Cannot happen under the one-outstanding-get
                    // contract; a stale reply is dropped, not returned.
                    tracing::warn!(expected = %key, got = %reply_key, "dropping mismatched reply");
                }
            }
            if self.shutdown.load(Ordering::SeqCst) {
                return Err(StorageError::ShuttingDown);
            }
            let posted = self.reply.posted.notified();
            tokio::pin!(posted);
            posted.as_mut().enable();
            if self.reply.slot.lock().is_some() {
                continue;
            }
            let _ = tokio::time::timeout(SHUTDOWN_POLL, posted).await;
        }
    }

    async fn reply_to(&self, requester: NodeId, key: Key, value: Value) -> StorageResult<()> {
        self.stats.record_reply_served();
        let msg = Message::new(self.index, requester, self.next_id(), Body::Reply(key, value));
        self.network.send(msg).await?;
        Ok(())
    }

    /// The servicer loop: one per store, consumes inbound messages until
    /// a `Kill` arrives.
    async fn serve(self: Arc<Self>) {
        tracing::debug!(node = self.index, "servicer started");
        loop {
            let msg = match self.network.recv().await {
                Ok(msg) => msg,
                Err(err) => {
                    if !self.shutdown.load(Ordering::SeqCst) {
                        tracing::error!(node = self.index, %err, "servicer receive failed");
                    }
                    break;
                }
            };
            match msg.body {
                Body::Put(key, value) => {
                    assert_eq!(
                        key.node(),
                        self.index,
                        "protocol violation: Put for {} routed to node {}",
                        key,
                        self.index
                    );
                    self.insert_local(key, value);
                }
                Body::Get(key) => {
                    assert_eq!(
                        key.node(),
                        self.index,
                        "protocol violation: Get for {} routed to node {}",
                        key,
                        self.index
                    );
                    let requester = msg.sender;
                    let existing = self.entries.read().get(&key).cloned();
                    if let Some(value) = existing {
                        if let Err(err) = self.reply_to(requester, key, value).await {
                            tracing::error!(node = self.index, %err, "failed to send reply");
                        }
                        continue;
                    }
                    // The key does not exist yet; a waiter task answers
                    // once it does. Several waiters for one key may run
                    // at a time.
                    let store = self.clone();
                    tokio::spawn(async move {
                        match store.wait_local(&key).await {
                            Ok(value) => {
                                if let Err(err) = store.reply_to(requester, key, value).await {
                                    tracing::error!(node = store.index, %err, "failed to send reply");
                                }
                            }
                            Err(StorageError::ShuttingDown) => {
                                tracing::debug!(node = store.index, key = %key, "waiter cancelled by shutdown");
                            }
                            Err(err) => {
                                tracing::error!(node = store.index, %err, "waiter failed");
                            }
                        }
                    });
                }
                Body::Reply(key, value) => {
                    *self.reply.slot.lock() = Some((key, value));
                    self.reply.posted.notify_waiters();
                }
                Body::Kill => {
                    tracing::debug!(node = self.index, from = msg.sender, "kill received");
                    self.begin_shutdown();
                    break;
                }
                Body::Status(status) => {
                    tracing::debug!(node = self.index, from = msg.sender, %status, "status");
                }
                // Bring-up traffic; nothing to do in steady state.
                Body::Register { .. } | Body::Directory { .. } => {}
            }
        }
        tracing::info!(
            node = self.index,
            puts = self.stats.local_puts(),
            gets = self.stats.value_gets(),
            remote_gets = self.stats.remote_gets(),
            replies = self.stats.replies_served(),
            "servicer stopped"
        );
    }

    fn begin_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // Wake everything blocked on data so it can observe the flag.
        self.inserted.notify_waiters();
        self.reply.posted.notify_waiters();
    }

    /// Asks the own servicer to exit by sending a self-addressed Kill.
    pub async fn stop_service(&self) -> StorageResult<()> {
        self.begin_shutdown();
        let msg = Message::new(self.index, self.index, self.next_id(), Body::Kill);
        self.network.send(msg).await?;
        Ok(())
    }

    /// Joins the servicer task.
    pub async fn wait_to_close(&self) {
        let handle = self.servicer.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                tracing::error!(node = self.index, %err, "servicer panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use eau2_network::pseudo::PseudoNetwork;

    use super::*;

    fn value(text: &str) -> Value {
        Value::new(Bytes::copy_from_slice(text.as_bytes()))
    }

    fn cluster(num_nodes: usize) -> Vec<KVStoreRef> {
        PseudoNetwork::create(num_nodes)
            .into_iter()
            .map(|net| KVStore::new(Arc::new(net)))
            .collect()
    }

    async fn stop_all(stores: &[KVStoreRef]) {
        for store in stores {
            store.stop_service().await.unwrap();
            store.wait_to_close().await;
        }
    }

    #[tokio::test]
    async fn test_local_put_get() {
        let stores = cluster(1);
        let key = Key::new("k", 0);
        stores[0].put(key.clone(), value("v")).await.unwrap();
        assert_eq!(stores[0].get_value(&key).unwrap(), value("v"));
        stop_all(&stores).await;
    }

    #[tokio::test]
    async fn test_local_get_missing_is_error() {
        let stores = cluster(1);
        let err = stores[0].get_value(&Key::new("absent", 0)).unwrap_err();
        assert!(matches!(err, StorageError::KeyNotFound(_)));
        stop_all(&stores).await;
    }

    #[tokio::test]
    async fn test_put_then_wait_observes_put() {
        let stores = cluster(1);
        let key = Key::new("k", 0);
        stores[0].put(key.clone(), value("v")).await.unwrap();
        let got = stores[0].get_and_wait_value(&key).await.unwrap();
        assert_eq!(got, value("v"));
        stop_all(&stores).await;
    }

    #[tokio::test]
    async fn test_local_wait_blocks_until_put() {
        let stores = cluster(1);
        let key = Key::new("later", 0);

        let waiter = {
            let store = stores[0].clone();
            let key = key.clone();
            tokio::spawn(async move { store.get_and_wait_value(&key).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        stores[0].put(key, value("arrived")).await.unwrap();
        assert_eq!(waiter.await.unwrap().unwrap(), value("arrived"));
        stop_all(&stores).await;
    }

    #[tokio::test]
    async fn test_remote_put_and_get() {
        let stores = cluster(2);
        let key = Key::new("remote", 1);

        // Node 0 writes to node 1's store, then reads it back remotely.
        stores[0].put(key.clone(), value("across")).await.unwrap();
        let got = stores[0].get_and_wait_value(&key).await.unwrap();
        assert_eq!(got, value("across"));

        // The value lives on node 1, not node 0.
        assert!(stores[1].contains(&key));
        assert!(!stores[0].contains(&key));
        stop_all(&stores).await;
    }

    #[tokio::test]
    async fn test_remote_get_waits_for_producer() {
        let stores = cluster(2);
        let key = Key::new("pending", 1);

        let consumer = {
            let store = stores[0].clone();
            let key = key.clone();
            tokio::spawn(async move { store.get_and_wait_value(&key).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!consumer.is_finished());

        stores[1].put(key, value("produced")).await.unwrap();
        assert_eq!(consumer.await.unwrap().unwrap(), value("produced"));
        assert_eq!(stores[1].stats().replies_served(), 1);
        stop_all(&stores).await;
    }

    #[tokio::test]
    async fn test_concurrent_waiters_same_key() {
        let stores = cluster(1);
        let key = Key::new("shared", 0);

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let store = stores[0].clone();
                let key = key.clone();
                tokio::spawn(async move { store.get_and_wait_value(&key).await })
            })
            .collect();
        tokio::time::sleep(Duration::from_millis(10)).await;
        stores[0].put(key, value("fan-out")).await.unwrap();
        for waiter in waiters {
            assert_eq!(waiter.await.unwrap().unwrap(), value("fan-out"));
        }
        stop_all(&stores).await;
    }

    #[tokio::test]
    async fn test_overlapping_remote_gets_serialize() {
        let stores = cluster(2);
        let first = Key::new("first", 1);
        let second = Key::new("second", 1);
        stores[1].put(first.clone(), value("1")).await.unwrap();
        stores[1].put(second.clone(), value("2")).await.unwrap();

        let a = {
            let store = stores[0].clone();
            tokio::spawn(async move { store.get_and_wait_value(&first).await })
        };
        let b = {
            let store = stores[0].clone();
            tokio::spawn(async move { store.get_and_wait_value(&second).await })
        };
        assert_eq!(a.await.unwrap().unwrap(), value("1"));
        assert_eq!(b.await.unwrap().unwrap(), value("2"));
        stop_all(&stores).await;
    }

    #[tokio::test]
    async fn test_shutdown_unblocks_waiters() {
        let stores = cluster(1);
        let waiter = {
            let store = stores[0].clone();
            tokio::spawn(async move { store.get_and_wait_value(&Key::new("never", 0)).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        stores[0].stop_service().await.unwrap();
        stores[0].wait_to_close().await;
        assert!(matches!(
            waiter.await.unwrap(),
            Err(StorageError::ShuttingDown)
        ));
    }

    #[tokio::test]
    async fn test_kill_from_peer_stops_servicer() {
        let stores = cluster(2);
        // Node 0 tells node 1 to stop, the way stop_all broadcasts.
        stores[0]
            .network
            .send(Message::new(0, 1, 0, Body::Kill))
            .await
            .unwrap();
        stores[1].wait_to_close().await;

        stores[0].stop_service().await.unwrap();
        stores[0].wait_to_close().await;
    }
}
