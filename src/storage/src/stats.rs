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

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters over a store's traffic. Tests instrument chunk-load
/// behavior through `value_gets`; the servicer logs a summary at
/// shutdown.
#[derive(Debug, Default)]
pub struct StoreStats {
    /// Values handed out by `get_value`/`get_and_wait_value`.
    value_gets: AtomicU64,
    /// Of those, gets answered by a remote node.
    remote_gets: AtomicU64,
    /// Values inserted locally (own puts and inbound Put messages).
    local_puts: AtomicU64,
    /// Puts forwarded to a remote home node.
    remote_puts: AtomicU64,
    /// Get requests this node answered with a Reply.
    replies_served: AtomicU64,
}

impl StoreStats {
    pub fn record_value_get(&self) {
        self.value_gets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_remote_get(&self) {
        self.remote_gets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_put(&self) {
        self.local_puts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_remote_put(&self) {
        self.remote_puts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reply_served(&self) {
        self.replies_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn value_gets(&self) -> u64 {
        self.value_gets.load(Ordering::Relaxed)
    }

    pub fn remote_gets(&self) -> u64 {
        self.remote_gets.load(Ordering::Relaxed)
    }

    pub fn local_puts(&self) -> u64 {
        self.local_puts.load(Ordering::Relaxed)
    }

    pub fn remote_puts(&self) -> u64 {
        self.remote_puts.load(Ordering::Relaxed)
    }

    pub fn replies_served(&self) -> u64 {
        self.replies_served.load(Ordering::Relaxed)
    }
}
