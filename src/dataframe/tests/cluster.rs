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

//! Multi-node scenarios over the in-process network: cross-node
//! producer/consumer hand-off, a distributed word count, and cluster
//! shutdown.

use std::collections::HashMap;
use std::sync::Arc;

use eau2_common::array::Row;
use eau2_common::types::Key;
use eau2_dataframe::distributed::DistributedDataFrame;
use eau2_dataframe::{Application, DataFrameStore, Rower, Writer};
use eau2_network::pseudo::PseudoNetwork;
use eau2_storage::error::StorageError;

async fn applications(num_nodes: usize) -> Vec<Arc<Application>> {
    let mut apps = Vec::new();
    for net in PseudoNetwork::create(num_nodes) {
        apps.push(Arc::new(Application::new(Arc::new(net)).await.unwrap()));
    }
    apps
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cross_node_producer_consumer() {
    let apps = applications(3).await;
    let main = Key::new("main", 0);
    let verify = Key::new("verif", 0);
    let check = Key::new("ck", 0);
    const SZ: usize = 100_000;

    // Node 0 produces the array and the expected sum.
    let producer = {
        let app = apps[0].clone();
        let (main, check) = (main.clone(), check.clone());
        tokio::spawn(async move {
            let mut sum = 0f32;
            let values: Vec<f32> = (0..SZ)
                .map(|i| {
                    sum += i as f32;
                    i as f32
                })
                .collect();
            DistributedDataFrame::from_array(&main, app.this_store(), &values)
                .await
                .unwrap();
            DistributedDataFrame::from_scalar(&check, app.this_store(), sum)
                .await
                .unwrap();
            app.await_stop().await;
        })
    };

    // Node 1 re-derives the sum from the distributed table.
    let counter = {
        let app = apps[1].clone();
        let (main, verify) = (main.clone(), verify.clone());
        tokio::spawn(async move {
            let mut df = app.this_store().get_and_wait(&main).await.unwrap();
            let mut sum = 0f32;
            for i in 0..SZ {
                sum += df.get_float(0, i).await.unwrap();
            }
            DistributedDataFrame::from_scalar(&verify, app.this_store(), sum)
                .await
                .unwrap();
            app.await_stop().await;
        })
    };

    // Node 2 compares the two and shuts the cluster down.
    let summarizer = {
        let app = apps[2].clone();
        tokio::spawn(async move {
            let mut result = app.this_store().get_and_wait(&verify).await.unwrap();
            let mut expected = app.this_store().get_and_wait(&check).await.unwrap();
            let got = result.get_float(0, 0).await.unwrap();
            let want = expected.get_float(0, 0).await.unwrap();
            assert_eq!(got, want);
            app.stop_all().await.unwrap();
        })
    };

    summarizer.await.unwrap();
    producer.await.unwrap();
    counter.await.unwrap();
}

/// Words into rows, the word-count ingestion side.
struct WordWriter {
    words: Vec<String>,
    next: usize,
}

impl Writer for WordWriter {
    fn visit(&mut self, row: &mut Row) {
        row.set_str(0, self.words[self.next].clone());
        self.next += 1;
    }

    fn done(&mut self) -> bool {
        self.next >= self.words.len()
    }
}

/// Counts words into a map, the word-count reduction side.
struct Adder {
    counts: HashMap<String, i32>,
}

impl Rower for Adder {
    fn accept(&mut self, row: &Row) -> bool {
        *self.counts.entry(row.get_str(0).to_owned()).or_insert(0) += 1;
        false
    }
}

/// Replays a count map as (word, count) rows.
struct Summer {
    entries: Vec<(String, i32)>,
    next: usize,
}

impl Writer for Summer {
    fn visit(&mut self, row: &mut Row) {
        let (word, count) = &self.entries[self.next];
        row.set_str(0, word.clone());
        row.set_int(1, *count);
        self.next += 1;
    }

    fn done(&mut self) -> bool {
        self.next >= self.entries.len()
    }
}

/// Merges per-node (word, count) frames.
struct Merger {
    counts: HashMap<String, i32>,
}

impl Rower for Merger {
    fn accept(&mut self, row: &Row) -> bool {
        *self.counts.entry(row.get_str(0).to_owned()).or_insert(0) += row.get_int(1);
        false
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distributed_word_count() {
    let apps = applications(2).await;
    let data = Key::new("data", 0);
    let corpus: Vec<String> = (0..40_000).map(|i| format!("word{}", i % 301)).collect();
    let total_words = corpus.len();

    let mut handles = Vec::new();
    for app in &apps {
        let app = app.clone();
        let data = data.clone();
        let corpus = corpus.clone();
        handles.push(tokio::spawn(async move {
            if app.this_node() == 0 {
                let mut writer = WordWriter {
                    words: corpus,
                    next: 0,
                };
                DistributedDataFrame::from_visitor(&data, app.this_store(), "S", &mut writer)
                    .await
                    .unwrap();
            }

            // Count over the chunks homed on this node.
            let mut words = app.this_store().get_and_wait(&data).await.unwrap();
            let mut adder = Adder {
                counts: HashMap::new(),
            };
            words.local_map(&mut adder).await.unwrap();

            // Publish this node's partial counts.
            let mut summer = Summer {
                entries: adder.counts.into_iter().collect(),
                next: 0,
            };
            let partial = Key::new(format!("wc-map-{}", app.this_node()), app.this_node());
            DistributedDataFrame::from_visitor(&partial, app.this_store(), "SI", &mut summer)
                .await
                .unwrap();

            // Node 0 reduces all partial maps.
            if app.this_node() == 0 {
                let mut merger = Merger {
                    counts: HashMap::new(),
                };
                for node in 0..app.num_nodes() {
                    let key = Key::new(format!("wc-map-{}", node), node as u32);
                    let mut partial = app.this_store().get_and_wait(&key).await.unwrap();
                    partial.distributed_map(&mut merger).await.unwrap();
                }
                let merged_total: i32 = merger.counts.values().sum();
                assert_eq!(merged_total as usize, total_words);
                assert_eq!(merger.counts.len(), 301);
                assert_eq!(merger.counts["word0"], (total_words / 301 + 1) as i32);
                app.stop_all().await.unwrap();
            } else {
                app.await_stop().await;
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stop_all_releases_blocked_waiters() {
    let apps = applications(3).await;

    // Nodes 1 and 2 block on keys nobody will ever produce.
    let blocked: Vec<_> = (1..3)
        .map(|node| {
            let app = apps[node].clone();
            tokio::spawn(async move {
                let absent = Key::new("never", app.this_node());
                let err = app
                    .this_store()
                    .get_and_wait_value(&absent)
                    .await
                    .unwrap_err();
                assert!(matches!(err, StorageError::ShuttingDown));
                app.await_stop().await;
            })
        })
        .collect();

    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
    apps[0].stop_all().await.unwrap();

    for handle in blocked {
        handle.await.unwrap();
    }
}
