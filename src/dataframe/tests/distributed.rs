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

//! Behavior of the distributed frame over in-process clusters: factory
//! distribution, deterministic placement, lazy window reloads.

use std::sync::Arc;

use eau2_common::array::Row;
use eau2_common::types::Key;
use eau2_dataframe::distributed::DistributedDataFrame;
use eau2_dataframe::{DataFrameStore, Writer, CHUNK_SIZE};
use eau2_network::pseudo::PseudoNetwork;
use eau2_storage::{KVStore, KVStoreRef};

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
async fn test_from_array_single_node_sum() {
    let stores = cluster(1);
    let key = Key::new("main", 0);
    let values: Vec<f32> = (0..100_000).map(|i| i as f32).collect();

    let mut df = DistributedDataFrame::from_array(&key, &stores[0], &values)
        .await
        .unwrap();
    assert_eq!(df.nrows(), 100_000);
    assert_eq!(df.ncols(), 1);

    let mut sum = 0f64;
    for i in 0..100_000 {
        sum += df.get_float(0, i).await.unwrap() as f64;
    }
    assert_eq!(sum, 4_999_950_000.0);
    stop_all(&stores).await;
}

#[tokio::test]
async fn test_from_array_values_survive_reopen() {
    let stores = cluster(1);
    let key = Key::new("t", 0);
    let values: Vec<f32> = (0..(CHUNK_SIZE + 100)).map(|i| i as f32 * 0.5).collect();
    DistributedDataFrame::from_array(&key, &stores[0], &values)
        .await
        .unwrap();

    // A fresh frame built from the stored root schema sees the data.
    let mut df = stores[0].get(&key).unwrap();
    assert_eq!(df.nrows(), CHUNK_SIZE + 100);
    for i in [0usize, 1, CHUNK_SIZE - 1, CHUNK_SIZE, CHUNK_SIZE + 99] {
        assert_eq!(df.get_float(0, i).await.unwrap(), i as f32 * 0.5);
    }
    stop_all(&stores).await;
}

#[tokio::test]
async fn test_chunk_placement_across_nodes() {
    let stores = cluster(3);
    let key = Key::new("main", 0);
    // Four chunks: homes 0, 1, 2, 0.
    let n = CHUNK_SIZE * 3 + 7;
    let values: Vec<f32> = (0..n).map(|i| i as f32).collect();
    DistributedDataFrame::from_array(&key, &stores[0], &values)
        .await
        .unwrap();

    for chunk in 0..4 {
        let home = chunk % 3;
        let chunk_key = DistributedDataFrame::chunk_key(&key, 0, chunk, 3);
        assert_eq!(chunk_key.node() as usize, home);
        // Remote puts are asynchronous; wait for arrival at the home.
        stores[home].get_and_wait_value(&chunk_key).await.unwrap();
        for (other, store) in stores.iter().enumerate() {
            if other != home {
                assert!(!store.contains(&chunk_key));
            }
        }
    }
    stop_all(&stores).await;
}

#[tokio::test]
async fn test_reads_span_remote_chunks() {
    let stores = cluster(3);
    let key = Key::new("spread", 0);
    let n = CHUNK_SIZE * 3;
    let values: Vec<f32> = (0..n).map(|i| i as f32).collect();
    DistributedDataFrame::from_array(&key, &stores[0], &values)
        .await
        .unwrap();

    // Node 2 reads the whole table, pulling chunks 0 and 3k from their
    // remote homes.
    let mut df = stores[2].get_and_wait(&key).await.unwrap();
    let mut sum = 0f64;
    for i in 0..n {
        sum += df.get_float(0, i).await.unwrap() as f64;
    }
    let expected: f64 = (0..n).map(|i| i as f64).sum();
    assert_eq!(sum, expected);
    stop_all(&stores).await;
}

#[tokio::test]
async fn test_from_scalar_lives_at_root_node() {
    let stores = cluster(3);
    let key = Key::new("ck", 1);
    DistributedDataFrame::from_scalar(&key, &stores[0], 42.5)
        .await
        .unwrap();

    let chunk_key = DistributedDataFrame::chunk_key(&key, 0, 0, 3);
    assert_eq!(chunk_key.node(), 1);
    stores[1].get_and_wait_value(&chunk_key).await.unwrap();

    let mut df = stores[2].get_and_wait(&key).await.unwrap();
    assert_eq!(df.nrows(), 1);
    assert_eq!(df.get_float(0, 0).await.unwrap(), 42.5);
    stop_all(&stores).await;
}

#[tokio::test]
async fn test_lazy_reload_counts() {
    let stores = cluster(1);
    let key = Key::new("two-chunks", 0);
    let values: Vec<f32> = (0..CHUNK_SIZE * 2).map(|i| i as f32).collect();
    let mut df = DistributedDataFrame::from_array(&key, &stores[0], &values)
        .await
        .unwrap();

    let base = stores[0].stats().value_gets();

    // Freshly opened: the first read loads chunk 0.
    df.get_float(0, 0).await.unwrap();
    assert_eq!(stores[0].stats().value_gets() - base, 1);

    // Still chunk 0: no reload.
    df.get_float(0, CHUNK_SIZE - 2).await.unwrap();
    assert_eq!(stores[0].stats().value_gets() - base, 1);

    // Crossing into chunk 1 reloads.
    df.get_float(0, CHUNK_SIZE).await.unwrap();
    assert_eq!(stores[0].stats().value_gets() - base, 2);

    // Back to chunk 0: the window was overwritten, load again.
    df.get_float(0, CHUNK_SIZE - 1).await.unwrap();
    assert_eq!(stores[0].stats().value_gets() - base, 3);
    stop_all(&stores).await;
}

/// Emits `(i, "w<i mod 7>")` rows until a fixed count.
struct CountingWriter {
    next: usize,
    total: usize,
}

impl Writer for CountingWriter {
    fn visit(&mut self, row: &mut Row) {
        row.set_int(0, self.next as i32);
        row.set_str(1, format!("w{}", self.next % 7));
        self.next += 1;
    }

    fn done(&mut self) -> bool {
        self.next >= self.total
    }
}

#[tokio::test]
async fn test_from_visitor_multi_chunk() {
    let stores = cluster(2);
    let key = Key::new("data", 0);
    let total = CHUNK_SIZE + CHUNK_SIZE / 2;
    let mut writer = CountingWriter { next: 0, total };

    let mut df = DistributedDataFrame::from_visitor(&key, &stores[0], "IS", &mut writer)
        .await
        .unwrap();
    assert_eq!(df.nrows(), total);
    assert_eq!(df.ncols(), 2);
    assert_eq!(df.num_chunks(), 2);

    // Spot-check both chunks, including the partial one.
    assert_eq!(df.get_int(0, 0).await.unwrap(), 0);
    assert_eq!(df.get_str(1, 0).await.unwrap(), "w0");
    assert_eq!(df.get_int(0, CHUNK_SIZE).await.unwrap(), CHUNK_SIZE as i32);
    let last = total - 1;
    assert_eq!(df.get_int(0, last).await.unwrap(), last as i32);
    assert_eq!(df.get_str(1, last).await.unwrap(), format!("w{}", last % 7));
    stop_all(&stores).await;
}

#[tokio::test]
async fn test_fill_row_crosses_columns() {
    let stores = cluster(1);
    let key = Key::new("rows", 0);
    let mut writer = CountingWriter { next: 0, total: 100 };
    let mut df = DistributedDataFrame::from_visitor(&key, &stores[0], "IS", &mut writer)
        .await
        .unwrap();

    let mut row = Row::new(df.schema());
    df.fill_row(42, &mut row).await.unwrap();
    assert_eq!(row.idx(), 42);
    assert_eq!(row.get_int(0), 42);
    assert_eq!(row.get_str(1), "w0");
    stop_all(&stores).await;
}
